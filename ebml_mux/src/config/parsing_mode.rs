/// The parsing strictness mode
///
/// This can be set with [`UnmarshalOptions::parsing_mode`](super::UnmarshalOptions::parsing_mode).
///
/// # Examples
///
/// ```rust
/// use ebml_mux::config::{ParsingMode, UnmarshalOptions};
///
/// // We only want to read inputs that map exactly onto our structures
/// let options = UnmarshalOptions::new().parsing_mode(ParsingMode::Strict);
/// ```
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
#[non_exhaustive]
pub enum ParsingMode {
	/// Will eagerly error on invalid input
	///
	/// ## Examples of behavior
	///
	/// * Unknown element ID - The parser will error
	/// * Known element with no matching field - The parser will error
	Strict,
	/// Default mode, less eager to error on input that doesn't match the destination
	///
	/// ## Examples of behavior
	///
	/// * Unknown element ID - The parser will error
	/// * Known element with no matching field - The element is skipped
	#[default]
	BestAttempt,
	/// Least eager to error, may produce partial output
	///
	/// ## Examples of behavior
	///
	/// * Unknown element ID - The element is skipped
	/// * Known element with no matching field - The element is skipped
	Relaxed,
}
