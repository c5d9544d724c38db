use super::ParsingMode;

/// Options to control how elements are decoded
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct UnmarshalOptions {
	pub(crate) parsing_mode: ParsingMode,
	pub(crate) allocation_limit: usize,
	pub(crate) max_id_length: u8,
	pub(crate) max_size_length: u8,
}

impl Default for UnmarshalOptions {
	/// The default implementation for `UnmarshalOptions`
	///
	/// The defaults are as follows:
	///
	/// ```rust,ignore
	/// UnmarshalOptions {
	/// 	parsing_mode: ParsingMode::BestAttempt,
	/// 	allocation_limit: 16 * 1024 * 1024,
	/// 	max_id_length: 4,
	/// 	max_size_length: 8,
	/// }
	/// ```
	fn default() -> Self {
		Self::new()
	}
}

impl UnmarshalOptions {
	/// Default parsing mode
	pub const DEFAULT_PARSING_MODE: ParsingMode = ParsingMode::BestAttempt;

	/// Default allocation limit for any single element
	pub const DEFAULT_ALLOCATION_LIMIT: usize = 16 * 1024 * 1024;

	/// Creates a new `UnmarshalOptions`, alias for `Default` implementation
	///
	/// See also: [`UnmarshalOptions::default`]
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::config::UnmarshalOptions;
	///
	/// let options = UnmarshalOptions::new();
	/// ```
	#[must_use]
	pub const fn new() -> Self {
		Self {
			parsing_mode: Self::DEFAULT_PARSING_MODE,
			allocation_limit: Self::DEFAULT_ALLOCATION_LIMIT,
			// https://www.rfc-editor.org/rfc/rfc8794.html#name-ebmlmaxidlength-element
			max_id_length: 4,
			// https://www.rfc-editor.org/rfc/rfc8794.html#name-ebmlmaxsizelength-element
			max_size_length: 8,
		}
	}

	/// The parsing mode to use, see [`ParsingMode`] for details
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::config::{ParsingMode, UnmarshalOptions};
	///
	/// // Skip over anything we don't understand
	/// let options = UnmarshalOptions::new().parsing_mode(ParsingMode::Relaxed);
	/// ```
	pub fn parsing_mode(&mut self, parsing_mode: ParsingMode) -> Self {
		self.parsing_mode = parsing_mode;
		*self
	}

	/// The maximum number of bytes to allocate for any single element
	///
	/// Binary, string, and block elements larger than this will error with
	/// [`ErrorKind::TooMuchData`](crate::error::ErrorKind::TooMuchData).
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::config::UnmarshalOptions;
	///
	/// // Our frames are never larger than 1 MiB
	/// let options = UnmarshalOptions::new().allocation_limit(1024 * 1024);
	/// ```
	pub fn allocation_limit(&mut self, allocation_limit: usize) -> Self {
		self.allocation_limit = allocation_limit;
		*self
	}

	/// The maximum length of an element ID in octets
	///
	/// This is clamped to `1..=8`.
	pub fn max_id_length(&mut self, max_id_length: u8) -> Self {
		self.max_id_length = max_id_length.clamp(1, 8);
		*self
	}

	/// The maximum length of an element size in octets
	///
	/// This is clamped to `1..=8`.
	pub fn max_size_length(&mut self, max_size_length: u8) -> Self {
		self.max_size_length = max_size_length.clamp(1, 8);
		*self
	}
}
