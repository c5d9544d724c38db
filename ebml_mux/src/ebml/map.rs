use crate::ebml::{ElementDataType, ElementType, Field, Tag, Tagged, Value, ValueRef};
use crate::error::Result;
use crate::macros::err;

/// A schema-free master element
///
/// Every child is kept, in the order it was read, grouped by element. Nested masters become
/// nested `ElementMap`s. This can be used to inspect documents without declaring their
/// structure up front.
///
/// # Examples
///
/// ```rust
/// use ebml_mux::config::{MarshalOptions, UnmarshalOptions};
/// use ebml_mux::ebml::{ElementMap, ElementType, Value, marshal, unmarshal};
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let mut info = ElementMap::new();
/// info.push(ElementType::TimecodeScale, Value::Uint(1_000_000));
/// info.push_named("MuxingApp", Value::String(String::from("ebml_mux")))?;
///
/// let mut document = ElementMap::new();
/// document.push(ElementType::Info, Value::Master(info.clone()));
///
/// let mut encoded = Vec::new();
/// marshal(&document, &mut encoded, MarshalOptions::default())?;
///
/// let mut decoded = ElementMap::new();
/// unmarshal(&mut &encoded[..], &mut decoded, UnmarshalOptions::default())?;
/// assert_eq!(decoded.get(ElementType::Info), Some(&Value::Master(info)));
/// # Ok(()) }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementMap {
	entries: Vec<(ElementType, Vec<Value>)>,
}

impl ElementMap {
	/// Create an empty `ElementMap`
	pub fn new() -> Self {
		Self::default()
	}

	/// The first value of `element`
	pub fn get(&self, element: ElementType) -> Option<&Value> {
		self.get_all(element).first()
	}

	/// Every value of `element`, in the order they were read or pushed
	pub fn get_all(&self, element: ElementType) -> &[Value] {
		self.entries
			.iter()
			.find(|(e, _)| *e == element)
			.map_or(&[], |(_, values)| values.as_slice())
	}

	/// Append a value for `element`
	pub fn push(&mut self, element: ElementType, value: Value) {
		self.values_mut(element).push(value);
	}

	/// Append a value for the element named `name`
	///
	/// # Errors
	///
	/// * `name` is not in the schema ([`ErrorKind::UnknownElementName`](crate::error::ErrorKind::UnknownElementName))
	pub fn push_named(&mut self, name: &str, value: Value) -> Result<()> {
		let Some(element) = ElementType::from_name(name) else {
			err!(UnknownElementName(name.to_string()));
		};

		self.push(element, value);
		Ok(())
	}

	/// Iterate over every `(element, value)` pair
	///
	/// Values are grouped by element, elements are in the order they first appeared.
	pub fn iter(&self) -> impl Iterator<Item = (ElementType, &Value)> + '_ {
		self.entries
			.iter()
			.flat_map(|(element, values)| values.iter().map(move |value| (*element, value)))
	}

	/// The total number of values
	pub fn len(&self) -> usize {
		self.entries.iter().map(|(_, values)| values.len()).sum()
	}

	/// Whether the map holds no values
	pub fn is_empty(&self) -> bool {
		self.entries.iter().all(|(_, values)| values.is_empty())
	}

	fn values_mut(&mut self, element: ElementType) -> &mut Vec<Value> {
		let pos = match self.entries.iter().position(|(e, _)| *e == element) {
			Some(pos) => pos,
			None => {
				self.entries.push((element, Vec::new()));
				self.entries.len() - 1
			},
		};

		&mut self.entries[pos].1
	}
}

impl Tagged for ElementMap {
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)> {
		self.iter()
			.map(|(element, value)| -> (Tag, &dyn Field) { (Tag::new(element), value) })
			.collect()
	}

	// Every occurrence gets a fresh value
	fn tagged_field_mut(&mut self, element: ElementType) -> Option<(Tag, &mut dyn Field)> {
		let value = match element.data_type() {
			ElementDataType::Master => Value::Master(ElementMap::new()),
			_ => Value::default(),
		};

		let values = self.values_mut(element);
		values.push(value);

		let value: &mut dyn Field = values.last_mut()?;
		Some((Tag::new(element), value))
	}
}

impl Field for ElementMap {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Master(self)
	}

	fn is_zero(&self) -> bool {
		self.is_empty()
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		Some(self)
	}
}

#[cfg(test)]
mod tests {
	use super::ElementMap;
	use crate::ebml::{ElementType, Tagged, Value};

	#[test_log::test]
	fn repeated_values_keep_their_order() {
		let mut map = ElementMap::new();
		map.push(ElementType::TrackEntry, Value::Master(ElementMap::new()));
		map.push(ElementType::Void, Value::Binary(vec![0; 2]));
		map.push(ElementType::TrackEntry, Value::Uint(3));

		assert_eq!(map.len(), 3);
		assert_eq!(map.get_all(ElementType::TrackEntry).len(), 2);
		assert_eq!(map.get(ElementType::Void), Some(&Value::Binary(vec![0; 2])));
		assert!(map.get(ElementType::Cues).is_none());

		let order = map
			.tagged_fields()
			.into_iter()
			.map(|(tag, _)| tag.element)
			.collect::<Vec<_>>();
		assert_eq!(
			order,
			[
				ElementType::TrackEntry,
				ElementType::TrackEntry,
				ElementType::Void
			]
		);
	}

	#[test_log::test]
	fn unknown_names_are_rejected() {
		let mut map = ElementMap::new();
		assert!(map.push_named("NotAnElement", Value::Uint(1)).is_err());
		assert!(map.is_empty());
	}
}
