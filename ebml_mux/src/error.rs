//! Contains the errors that can arise within ebml_mux
//!
//! The primary error is [`EbmlError`]. The type of error is determined by [`ErrorKind`],
//! which can be extended at any time.
//!
//! Errors can be wrapped with the stage that produced them (see [`EbmlError::context`]). The
//! wrapped error stays reachable through [`std::error::Error::source`], [`EbmlError::root`], and
//! [`EbmlError::is`].

use crate::ebml::{ElementId, ElementType};

use std::collections::TryReserveError;
use std::fmt::{Debug, Display, Formatter};

/// Alias for `Result<T, EbmlError>`
pub type Result<T> = std::result::Result<T, EbmlError>;

/// The types of errors that can occur
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
	// Element structure
	/// A VInt has an invalid octet length, or its value cannot be represented
	BadVintSize,
	/// Encountered an element ID that is not part of the schema
	UnknownElement(ElementId),
	/// A tag references an element name that is not part of the schema
	UnknownElementName(String),
	/// A known element was encountered, but the destination has no field for it
	///
	/// This is only raised with [`ParsingMode::Strict`](crate::config::ParsingMode::Strict).
	UnassignableElement(ElementType),
	/// An integer element declared a size outside of `0..=8`, or a value doesn't fit in its declared size
	InvalidIntSize,
	/// A float element declared a size other than 0, 4, or 8
	InvalidFloatSize,
	/// An element's size disagrees with its surroundings or its declared size
	SizeMismatch,
	/// A value of the given kind cannot be stored in (or encoded from) the destination
	IncompatibleType(&'static str),
	/// A tag string could not be parsed
	InvalidTag(String),
	/// Master elements are nested deeper than the engine allows
	MaxDepthExceeded,
	/// Attempting to read/write an abnormally large amount of data
	TooMuchData,

	// Lacing
	/// More than one frame was given to a block without lacing
	MultipleFramesNoLace,
	/// Frames of different sizes were given to a fixed-size lace
	UnevenFixedLace,
	/// A fixed-size lace payload cannot be evenly divided between its frames
	FixedLaceUndivisible,
	/// A lace holds more than 256 frames
	TooManyFrames,
	/// A laced frame would have a size of zero or less
	WrongLaceSize,

	// Muxing
	/// A frame was too old to be placed in the current cluster, and was dropped
	IgnoreOldFrame,
	/// A block's timestamp can't be represented
	TimestampOutOfRange,
	/// The track list given to a writer or reader is invalid
	InvalidTrack(&'static str),
	/// The options given to a block sorter are invalid
	InvalidSorterOptions,
	/// The pipeline behind a track handle has already shut down
	PipelineClosed,

	/// An error annotated with the stage that failed
	Context {
		/// What was being done when the error occurred
		stage: String,
		/// The underlying error
		source: Box<EbmlError>,
	},

	// Conversions for external errors
	/// Unable to convert bytes to a String
	StringFromUtf8(std::string::FromUtf8Error),
	/// Represents all cases of [`std::io::Error`].
	Io(std::io::Error),
	/// Failure to allocate enough memory
	Alloc(TryReserveError),
}

/// Errors that could occur within ebml_mux
pub struct EbmlError {
	pub(crate) kind: ErrorKind,
}

impl EbmlError {
	/// Create an `EbmlError` from an [`ErrorKind`]
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::error::{EbmlError, ErrorKind};
	///
	/// let too_many = EbmlError::new(ErrorKind::TooManyFrames);
	/// ```
	#[must_use]
	pub const fn new(kind: ErrorKind) -> Self {
		Self { kind }
	}

	/// Returns the [`ErrorKind`]
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::error::{EbmlError, ErrorKind};
	///
	/// let err = EbmlError::new(ErrorKind::WrongLaceSize);
	/// if let ErrorKind::WrongLaceSize = err.kind() {
	/// 	println!("Bad lace!");
	/// }
	/// ```
	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// Wraps the error with a description of the stage that failed
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::error::{EbmlError, ErrorKind};
	///
	/// let err = EbmlError::new(ErrorKind::InvalidIntSize).context("reading TrackNumber");
	/// assert_eq!(err.to_string(), "reading TrackNumber: Integer element has an invalid size");
	/// assert!(matches!(err.root().kind(), ErrorKind::InvalidIntSize));
	/// ```
	#[must_use]
	pub fn context(self, stage: impl Into<String>) -> Self {
		Self::new(ErrorKind::Context {
			stage: stage.into(),
			source: Box::new(self),
		})
	}

	/// Returns the innermost error, skipping any [`ErrorKind::Context`] layers
	pub fn root(&self) -> &EbmlError {
		let mut current = self;
		while let ErrorKind::Context { source, .. } = &current.kind {
			current = source;
		}

		current
	}

	/// Whether any layer of this error satisfies `predicate`
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::error::{EbmlError, ErrorKind};
	///
	/// let err = EbmlError::new(ErrorKind::TooManyFrames)
	/// 	.context("lacing")
	/// 	.context("writing SimpleBlock");
	/// assert!(err.is(|kind| matches!(kind, ErrorKind::TooManyFrames)));
	/// assert!(!err.is(|kind| matches!(kind, ErrorKind::WrongLaceSize)));
	/// ```
	pub fn is<F>(&self, predicate: F) -> bool
	where
		F: Fn(&ErrorKind) -> bool,
	{
		let mut current = self;
		loop {
			if predicate(&current.kind) {
				return true;
			}

			match &current.kind {
				ErrorKind::Context { source, .. } => current = source,
				_ => return false,
			}
		}
	}

	/// Whether the root cause is an I/O error of the given kind
	pub fn is_io(&self, kind: std::io::ErrorKind) -> bool {
		matches!(&self.root().kind, ErrorKind::Io(err) if err.kind() == kind)
	}
}

/// Adds [`EbmlError::context`] to `Result`s
pub(crate) trait ResultExt<T> {
	fn context<S, F>(self, stage: F) -> Result<T>
	where
		S: Into<String>,
		F: FnOnce() -> S;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
	E: Into<EbmlError>,
{
	fn context<S, F>(self, stage: F) -> Result<T>
	where
		S: Into<String>,
		F: FnOnce() -> S,
	{
		self.map_err(|e| e.into().context(stage()))
	}
}

impl std::error::Error for EbmlError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match &self.kind {
			ErrorKind::Context { source, .. } => Some(&**source),
			ErrorKind::StringFromUtf8(err) => Some(err),
			ErrorKind::Io(err) => Some(err),
			ErrorKind::Alloc(err) => Some(err),
			_ => None,
		}
	}
}

impl Debug for EbmlError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.kind)
	}
}

impl From<ErrorKind> for EbmlError {
	fn from(kind: ErrorKind) -> Self {
		Self { kind }
	}
}

impl From<std::io::Error> for EbmlError {
	fn from(input: std::io::Error) -> Self {
		Self {
			kind: ErrorKind::Io(input),
		}
	}
}

impl From<std::string::FromUtf8Error> for EbmlError {
	fn from(input: std::string::FromUtf8Error) -> Self {
		Self {
			kind: ErrorKind::StringFromUtf8(input),
		}
	}
}

impl From<TryReserveError> for EbmlError {
	fn from(input: TryReserveError) -> Self {
		Self {
			kind: ErrorKind::Alloc(input),
		}
	}
}

impl Display for EbmlError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.kind {
			// Conversions
			ErrorKind::StringFromUtf8(ref err) => write!(f, "{err}"),
			ErrorKind::Io(ref err) => write!(f, "{err}"),
			ErrorKind::Alloc(ref err) => write!(f, "{err}"),

			ErrorKind::Context {
				ref stage,
				ref source,
			} => write!(f, "{stage}: {source}"),

			// Element structure
			ErrorKind::BadVintSize => write!(f, "VInt has an invalid octet length or value"),
			ErrorKind::UnknownElement(id) => write!(f, "Unknown element ID: {id:#X}"),
			ErrorKind::UnknownElementName(ref name) => {
				write!(f, "Tag references an unknown element: \"{name}\"")
			},
			ErrorKind::UnassignableElement(element) => write!(
				f,
				"Element `{}` has no matching field in the destination",
				element.name()
			),
			ErrorKind::InvalidIntSize => write!(f, "Integer element has an invalid size"),
			ErrorKind::InvalidFloatSize => {
				write!(f, "Float element has an invalid size (expected 0, 4, or 8)")
			},
			ErrorKind::SizeMismatch => write!(
				f,
				"Encountered an invalid element size, either too big or too small to be valid"
			),
			ErrorKind::IncompatibleType(kind) => write!(
				f,
				"A value of kind `{kind}` is incompatible with the element or field"
			),
			ErrorKind::InvalidTag(ref message) => write!(f, "Invalid tag: {message}"),
			ErrorKind::MaxDepthExceeded => write!(f, "Maximum element depth reached"),
			ErrorKind::TooMuchData => write!(
				f,
				"Attempted to read/write an abnormally large amount of data"
			),

			// Lacing
			ErrorKind::MultipleFramesNoLace => {
				write!(f, "Multiple frames given to a block without lacing")
			},
			ErrorKind::UnevenFixedLace => write!(f, "Fixed lacing requires frames of equal size"),
			ErrorKind::FixedLaceUndivisible => {
				write!(f, "Fixed lace payload is not divisible by its frame count")
			},
			ErrorKind::TooManyFrames => write!(f, "A lace can hold at most 256 frames"),
			ErrorKind::WrongLaceSize => write!(f, "Lace describes a frame with an invalid size"),

			// Muxing
			ErrorKind::IgnoreOldFrame => write!(
				f,
				"Frame is too old for the current cluster and was dropped"
			),
			ErrorKind::TimestampOutOfRange => write!(f, "Block timestamp is out of range"),
			ErrorKind::InvalidTrack(message) => write!(f, "Invalid track: {message}"),
			ErrorKind::InvalidSorterOptions => write!(
				f,
				"Exactly one of `max_delayed_packets` and `max_timescale_delay` must be set"
			),
			ErrorKind::PipelineClosed => write!(f, "The block pipeline has been closed"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{EbmlError, ErrorKind, ResultExt};
	use std::error::Error;

	#[test_log::test]
	fn source_walks_through_context() {
		let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
		let err = Err::<(), _>(io)
			.context(|| "reading Timecode")
			.context(|| "reading Cluster")
			.unwrap_err();

		assert_eq!(err.to_string(), "reading Cluster: reading Timecode: short");
		assert!(err.is_io(std::io::ErrorKind::UnexpectedEof));

		let inner = err.source().unwrap();
		assert_eq!(inner.to_string(), "reading Timecode: short");
		assert!(inner.source().unwrap().source().is_some());
	}

	#[test_log::test]
	fn root_of_plain_error_is_itself() {
		let err = EbmlError::new(ErrorKind::UnevenFixedLace);
		assert!(matches!(err.root().kind(), ErrorKind::UnevenFixedLace));
		assert!(err.source().is_none());
	}
}
