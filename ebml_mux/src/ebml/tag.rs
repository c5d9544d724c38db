use crate::ebml::ElementType;
use crate::error::{EbmlError, ErrorKind, Result};
use crate::macros::err;

/// The size an element is written with
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DeclaredSize {
	/// The smallest size that fits the value
	#[default]
	Default,
	/// Exactly this many octets of data
	///
	/// Integers are padded with leading zeros (or sign bits), strings and binaries with
	/// trailing NULs. Floats can only be 4 or 8 octets.
	Exact(u64),
	/// The unknown size sentinel, only valid for master elements
	///
	/// The element's children are streamed, the element ends at EOF or at the next
	/// top-level element.
	Unknown,
}

/// How a field maps onto an element
///
/// Tags are usually generated by `#[derive(Ebml)]` from `#[ebml("Name,option,...")]`
/// attributes, but can be built or parsed at runtime for documents assembled on the fly.
///
/// # Examples
///
/// ```rust
/// use ebml_mux::ebml::{DeclaredSize, ElementType, Tag};
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let tag = Tag::parse("SeekPosition,size=8")?;
/// assert_eq!(
/// 	tag,
/// 	Tag::new(ElementType::SeekPosition).size(DeclaredSize::Exact(8))
/// );
/// # Ok(()) }
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Tag {
	/// The element the field is written as
	pub element: ElementType,
	/// The size to write the element with
	pub size: DeclaredSize,
	/// Skip the element when the field holds its zero value
	pub omit_empty: bool,
	/// Stop unmarshaling once this element has been read
	pub stop: bool,
}

impl Tag {
	/// A tag with no options
	pub const fn new(element: ElementType) -> Self {
		Self {
			element,
			size: DeclaredSize::Default,
			omit_empty: false,
			stop: false,
		}
	}

	/// Set the `omitempty` option
	pub const fn omit_empty(mut self) -> Self {
		self.omit_empty = true;
		self
	}

	/// Set the declared size
	pub const fn size(mut self, size: DeclaredSize) -> Self {
		self.size = size;
		self
	}

	/// Set the `stop` option
	pub const fn stop(mut self) -> Self {
		self.stop = true;
		self
	}

	/// Parse a tag string of the form `Name[,option...]`
	///
	/// The options are `omitempty`, `size=<N>`, `size=unknown` (or the deprecated `inf`),
	/// and `stop`.
	///
	/// # Errors
	///
	/// * `Name` is not in the schema ([`ErrorKind::UnknownElementName`])
	/// * An option is unknown, malformed, or empty ([`ErrorKind::InvalidTag`])
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::Tag;
	///
	/// assert!(Tag::parse("Cluster,size=unknown").is_ok());
	/// assert!(Tag::parse("Cluster,,omitempty").is_err());
	/// assert!(Tag::parse("Cluster,sideways").is_err());
	/// assert!(Tag::parse("NotAnElement").is_err());
	/// ```
	pub fn parse(tag: &str) -> Result<Self> {
		let mut segments = tag.split(',');

		let name = segments.next().unwrap_or_default();
		let Some(element) = ElementType::from_name(name) else {
			err!(UnknownElementName(name.to_string()));
		};

		let mut ret = Self::new(element);
		for option in segments {
			match option {
				"" => err!(InvalidTag(format!("empty option in \"{tag}\""))),
				"omitempty" => ret.omit_empty = true,
				"inf" | "size=unknown" => ret.size = DeclaredSize::Unknown,
				"stop" => ret.stop = true,
				_ => {
					let Some(size) = option.strip_prefix("size=") else {
						err!(InvalidTag(format!("unknown option \"{option}\"")));
					};

					let size = size.parse::<u64>().map_err(|_| {
						EbmlError::new(ErrorKind::InvalidTag(format!(
							"invalid size \"{size}\""
						)))
					})?;
					ret.size = DeclaredSize::Exact(size);
				},
			}
		}

		Ok(ret)
	}
}

#[cfg(test)]
mod tests {
	use super::{DeclaredSize, Tag};
	use crate::ebml::ElementType;
	use crate::error::ErrorKind;

	#[test_log::test]
	fn options() {
		let tag = Tag::parse("Segment,inf").unwrap();
		assert_eq!(tag.size, DeclaredSize::Unknown);

		let tag = Tag::parse("PrevSize,omitempty").unwrap();
		assert_eq!(tag, Tag::new(ElementType::PrevSize).omit_empty());

		let tag = Tag::parse("Tracks,stop").unwrap();
		assert!(tag.stop);
		assert!(!tag.omit_empty);
	}

	#[test_log::test]
	fn malformed_tags() {
		for tag in [
			"Timecode,",
			"Timecode,,omitempty",
			"Timecode,size=",
			"Timecode,size=-1",
			"Timecode,omitEmpty",
		] {
			let err = Tag::parse(tag).unwrap_err();
			assert!(
				matches!(err.kind(), ErrorKind::InvalidTag(_)),
				"{tag} gave {err:?}"
			);
		}

		let err = Tag::parse("").unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::UnknownElementName(_)));

		let err = Tag::parse("timecode").unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::UnknownElementName(name) if name == "timecode"));
	}
}
