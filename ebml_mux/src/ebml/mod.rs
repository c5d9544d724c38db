//! EBML encoding and decoding
//!
//! Values are mapped onto elements through [`Tagged`] and [`Field`]. Structs usually get
//! these through `#[derive(Ebml)]`, while [`ElementMap`] can hold any document.
//!
//! # Examples
//!
//! ```rust
//! use ebml_mux::Ebml;
//! use ebml_mux::config::{MarshalOptions, UnmarshalOptions};
//! use ebml_mux::ebml::{marshal, unmarshal};
//!
//! #[derive(Ebml, Default, Debug, PartialEq)]
//! struct Header {
//! 	#[ebml("DocType")]
//! 	doc_type: String,
//! 	#[ebml("DocTypeVersion,omitempty")]
//! 	doc_type_version: u64,
//! }
//!
//! #[derive(Ebml, Default, Debug, PartialEq)]
//! struct Document {
//! 	#[ebml("EBML")]
//! 	header: Header,
//! }
//!
//! # fn main() -> ebml_mux::error::Result<()> {
//! let document = Document {
//! 	header: Header {
//! 		doc_type: String::from("webm"),
//! 		doc_type_version: 0,
//! 	},
//! };
//!
//! let mut encoded = Vec::new();
//! marshal(&document, &mut encoded, MarshalOptions::default())?;
//!
//! // EBML ID, size, then `DocType` (`DocTypeVersion` is omitted)
//! assert_eq!(
//! 	encoded,
//! 	[0x1A, 0x45, 0xDF, 0xA3, 0x87, 0x42, 0x82, 0x84, b'w', b'e', b'b', b'm']
//! );
//!
//! let mut decoded = Document::default();
//! unmarshal(&encoded[..], &mut decoded, UnmarshalOptions::default())?;
//! assert_eq!(decoded, document);
//! # Ok(()) }
//! ```

mod block;
pub(crate) mod element_reader;
mod field;
mod lacing;
mod map;
pub(crate) mod marshal;
pub mod schema;
mod tag;
pub(crate) mod type_encodings;
mod unmarshal;
pub(crate) mod value;
pub(crate) mod vint;

pub use block::Block;
pub use field::{Field, FieldList, MasterRef, Tagged};
pub use lacing::LacingMode;
pub use map::ElementMap;
pub use marshal::{ElementRecord, Marshaler, marshal};
pub use schema::{ElementDataType, ElementDescriptor, ElementType};
pub use tag::{DeclaredSize, Tag};
pub use unmarshal::{ReadOutcome, Unmarshaler, unmarshal};
pub use value::{Value, ValueRef};
pub use vint::{ElementId, VInt};
