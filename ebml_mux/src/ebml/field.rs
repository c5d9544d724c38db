//! The capability interface between the marshal engines and user types
//!
//! A master element is anything implementing [`Tagged`], which lists its children as
//! `(Tag, &dyn Field)` pairs. A child is anything implementing [`Field`].
//!
//! Both traits are normally implemented with `#[derive(Ebml)]`:
//!
//! ```rust
//! use ebml_mux::Ebml;
//!
//! #[derive(Ebml, Default, Debug, PartialEq)]
//! struct Seek {
//! 	#[ebml("SeekID")]
//! 	id: Vec<u8>,
//! 	#[ebml("SeekPosition,size=8")]
//! 	position: u64,
//! }
//! ```

use crate::ebml::{Block, ElementType, Tag, Value, ValueRef};
use crate::error::Result;
use crate::macros::err;

use std::time::SystemTime;

/// A master element, a collection of tagged children
pub trait Tagged {
	/// Every tagged child, in the order they are written
	///
	/// An element may appear multiple times.
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)>;

	/// The field to read `element` into, if any
	fn tagged_field_mut(&mut self, element: ElementType) -> Option<(Tag, &mut dyn Field)>;

	/// Called once every child of this master element has been read
	///
	/// # Errors
	///
	/// Implementation specific
	fn end_master(&mut self) -> Result<()> {
		Ok(())
	}
}

/// A value that can be stored in an element
pub trait Field {
	/// The value to marshal
	fn value(&self) -> ValueRef<'_>;

	/// Whether the field holds its zero value, see the `omitempty` tag option
	fn is_zero(&self) -> bool;

	/// Store a decoded scalar or block value
	///
	/// # Errors
	///
	/// * The value cannot be converted to the field's type ([`ErrorKind::IncompatibleType`](crate::error::ErrorKind::IncompatibleType))
	fn assign(&mut self, value: Value) -> Result<()> {
		err!(IncompatibleType(value.kind()))
	}

	/// The master element to read children into, if this field is one
	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		None
	}
}

impl Field for u64 {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Uint(*self)
	}

	fn is_zero(&self) -> bool {
		*self == 0
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Uint(value) => value,
			Value::Int(value) if value >= 0 => value as u64,
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

impl Field for i64 {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Int(*self)
	}

	fn is_zero(&self) -> bool {
		*self == 0
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Int(value) => value,
			Value::Uint(value) if i64::try_from(value).is_ok() => value as i64,
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

// Flags are stored as unsigned integers
impl Field for bool {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Uint(u64::from(*self))
	}

	fn is_zero(&self) -> bool {
		!*self
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let Value::Uint(value) = value else {
			err!(IncompatibleType(value.kind()));
		};

		if value > 1 {
			log::warn!("Flag value `{}` is out of range, assuming true", value);
		}

		*self = value != 0;
		Ok(())
	}
}

impl Field for f32 {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Float32(*self)
	}

	fn is_zero(&self) -> bool {
		*self == 0.0
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Float32(value) => value,
			Value::Float64(value) => value as f32,
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

impl Field for f64 {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Float64(*self)
	}

	fn is_zero(&self) -> bool {
		*self == 0.0
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Float32(value) => f64::from(value),
			Value::Float64(value) => value,
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

impl Field for String {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::String(self)
	}

	fn is_zero(&self) -> bool {
		self.is_empty()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let Value::String(value) = value else {
			err!(IncompatibleType(value.kind()));
		};

		*self = value;
		Ok(())
	}
}

impl Field for Vec<u8> {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Binary(self)
	}

	fn is_zero(&self) -> bool {
		self.is_empty()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Binary(value) => value,
			Value::String(value) => value.into_bytes(),
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

impl Field for SystemTime {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Date(*self)
	}

	fn is_zero(&self) -> bool {
		*self == crate::ebml::value::ebml_epoch()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let Value::Date(value) = value else {
			err!(IncompatibleType(value.kind()));
		};

		*self = value;
		Ok(())
	}
}

impl Field for Block {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Block(self)
	}

	fn is_zero(&self) -> bool {
		self.track_number == 0 && self.frames.is_empty()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = match value {
			Value::Block(block) => block,
			Value::Binary(bytes) => Block::parse(&bytes)?,
			_ => err!(IncompatibleType(value.kind())),
		};

		Ok(())
	}
}

/// A repeated element, every occurrence is appended
impl<T> Field for Vec<T>
where
	T: Field + Default,
{
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Repeated(self.iter().map(|item| -> &dyn Field { item }).collect())
	}

	fn is_zero(&self) -> bool {
		self.is_empty()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let mut item = T::default();
		item.assign(value)?;
		self.push(item);
		Ok(())
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		let mut item = T::default();
		item.master_mut()?;

		self.push(item);
		self.last_mut().and_then(Field::master_mut)
	}
}

/// An optional element, `None` is never written
impl<T> Field for Option<T>
where
	T: Field + Default,
{
	fn value(&self) -> ValueRef<'_> {
		match self {
			Some(value) => value.value(),
			None => ValueRef::Absent,
		}
	}

	fn is_zero(&self) -> bool {
		self.is_none()
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let mut item = T::default();
		item.assign(value)?;
		*self = Some(item);
		Ok(())
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		if self.is_none() {
			let mut item = T::default();
			item.master_mut()?;
			*self = Some(item);
		}

		self.as_mut().and_then(Field::master_mut)
	}
}

impl Field for Box<dyn Tagged + Send> {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Master(&**self)
	}

	fn is_zero(&self) -> bool {
		false
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		Some(&mut **self)
	}
}

/// A borrowed master element, for marshaling only
#[derive(Copy, Clone)]
pub struct MasterRef<'a>(pub &'a dyn Tagged);

impl Field for MasterRef<'_> {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Master(self.0)
	}

	fn is_zero(&self) -> bool {
		false
	}
}

/// A master element assembled at runtime from borrowed fields
///
/// This is used for documents that only exist to be written, such as a stream header.
///
/// # Examples
///
/// ```rust
/// use ebml_mux::config::MarshalOptions;
/// use ebml_mux::ebml::{ElementType, FieldList, Tag, marshal};
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let timecode = 5u64;
/// let prev_size = 0u64;
///
/// let cluster = FieldList::new()
/// 	.with(Tag::new(ElementType::Timecode), &timecode)
/// 	.with(Tag::new(ElementType::PrevSize).omit_empty(), &prev_size);
/// let document = FieldList::new().with(Tag::new(ElementType::Cluster), &cluster);
///
/// let mut out = Vec::new();
/// marshal(&document, &mut out, MarshalOptions::default())?;
/// assert_eq!(out, [0x1F, 0x43, 0xB6, 0x75, 0x83, 0xE7, 0x81, 0x05]);
/// # Ok(()) }
/// ```
#[derive(Default, Clone)]
pub struct FieldList<'a> {
	fields: Vec<(Tag, &'a dyn Field)>,
}

impl<'a> FieldList<'a> {
	/// Create an empty `FieldList`
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a field
	pub fn push(&mut self, tag: Tag, field: &'a dyn Field) {
		self.fields.push((tag, field));
	}

	/// Append a field, builder style
	pub fn with(mut self, tag: Tag, field: &'a dyn Field) -> Self {
		self.push(tag, field);
		self
	}
}

impl Tagged for FieldList<'_> {
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)> {
		self.fields.clone()
	}

	fn tagged_field_mut(&mut self, _: ElementType) -> Option<(Tag, &mut dyn Field)> {
		None
	}
}

impl Field for FieldList<'_> {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Master(self)
	}

	fn is_zero(&self) -> bool {
		self.fields.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use crate::ebml::{Field, Value, ValueRef};
	use crate::error::ErrorKind;

	#[test_log::test]
	fn integer_conversions() {
		let mut unsigned = 0u64;
		unsigned.assign(Value::Int(5)).unwrap();
		assert_eq!(unsigned, 5);

		let err = unsigned.assign(Value::Int(-5)).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::IncompatibleType("int")));

		let mut signed = 0i64;
		signed.assign(Value::Uint(7)).unwrap();
		assert_eq!(signed, 7);
		assert!(signed.assign(Value::Uint(u64::MAX)).is_err());

		let mut flag = false;
		flag.assign(Value::Uint(2)).unwrap();
		assert!(flag);
		assert!(matches!(flag.value(), ValueRef::Uint(1)));
	}

	#[test_log::test]
	fn repeated_and_optional() {
		let mut repeated: Vec<u64> = Vec::new();
		repeated.assign(Value::Uint(1)).unwrap();
		repeated.assign(Value::Uint(2)).unwrap();
		assert_eq!(repeated, [1, 2]);

		// A failed assignment leaves nothing behind
		assert!(repeated.assign(Value::String(String::from("3"))).is_err());
		assert_eq!(repeated.len(), 2);

		// Scalars aren't masters
		assert!(repeated.master_mut().is_none());
		assert_eq!(repeated.len(), 2);

		let mut optional: Option<String> = None;
		assert!(optional.is_zero());
		assert!(matches!(optional.value(), ValueRef::Absent));

		optional.assign(Value::String(String::from("und"))).unwrap();
		assert_eq!(optional.as_deref(), Some("und"));
		assert!(optional.master_mut().is_none());
	}

	#[test_log::test]
	fn incompatible_types() {
		let mut name = String::new();
		let err = name.assign(Value::Binary(vec![1, 2])).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::IncompatibleType("binary")));

		let mut float = 0.0f32;
		float.assign(Value::Float64(0.5)).unwrap();
		assert_eq!(float, 0.5);
		assert!(float.assign(Value::Uint(1)).is_err());
	}
}
