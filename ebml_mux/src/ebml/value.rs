use crate::ebml::{Block, ElementMap, Field, Tagged};
use crate::error::Result;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// 2001-01-01T00:00:00 UTC
const EBML_EPOCH_UNIX_SECONDS: u64 = 978_307_200;

pub(crate) fn ebml_epoch() -> SystemTime {
	UNIX_EPOCH + Duration::from_secs(EBML_EPOCH_UNIX_SECONDS)
}

/// Nanoseconds relative to 2001-01-01T00:00:00 UTC, saturating at the bounds of an `i64`
pub(crate) fn date_to_nanos(date: SystemTime) -> i64 {
	match date.duration_since(ebml_epoch()) {
		Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
		Err(before) => i64::try_from(before.duration().as_nanos())
			.map(i64::wrapping_neg)
			.unwrap_or(i64::MIN),
	}
}

pub(crate) fn nanos_to_date(nanos: i64) -> SystemTime {
	let offset = Duration::from_nanos(nanos.unsigned_abs());
	if nanos < 0 {
		ebml_epoch() - offset
	} else {
		ebml_epoch() + offset
	}
}

/// An owned, decoded element value
///
/// This is what the unmarshal engine hands to [`Field::assign`], and what the
/// schema-free [`ElementMap`] stores.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	/// A signed integer element
	Int(i64),
	/// An unsigned integer element
	Uint(u64),
	/// A 4 octet float element
	Float32(f32),
	/// An 8 octet (or empty) float element
	Float64(f64),
	/// A String or UTF-8 element
	String(String),
	/// A date element
	Date(SystemTime),
	/// A binary element
	Binary(Vec<u8>),
	/// A Block or SimpleBlock element
	Block(Block),
	/// A master element
	Master(ElementMap),
}

impl Default for Value {
	fn default() -> Self {
		Value::Uint(0)
	}
}

impl Value {
	/// A short name for the kind of value, used in error messages
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Int(_) => "int",
			Value::Uint(_) => "uint",
			Value::Float32(_) => "float32",
			Value::Float64(_) => "float64",
			Value::String(_) => "string",
			Value::Date(_) => "date",
			Value::Binary(_) => "binary",
			Value::Block(_) => "block",
			Value::Master(_) => "master",
		}
	}
}

impl Field for Value {
	fn value(&self) -> ValueRef<'_> {
		match self {
			Value::Int(value) => ValueRef::Int(*value),
			Value::Uint(value) => ValueRef::Uint(*value),
			Value::Float32(value) => ValueRef::Float32(*value),
			Value::Float64(value) => ValueRef::Float64(*value),
			Value::String(value) => ValueRef::String(value),
			Value::Date(value) => ValueRef::Date(*value),
			Value::Binary(value) => ValueRef::Binary(value),
			Value::Block(value) => ValueRef::Block(value),
			Value::Master(value) => ValueRef::Master(value),
		}
	}

	fn is_zero(&self) -> bool {
		match self {
			Value::Int(value) => *value == 0,
			Value::Uint(value) => *value == 0,
			Value::Float32(value) => *value == 0.0,
			Value::Float64(value) => *value == 0.0,
			Value::String(value) => value.is_empty(),
			Value::Date(value) => *value == ebml_epoch(),
			Value::Binary(value) => value.is_empty(),
			Value::Block(value) => value.is_zero(),
			Value::Master(value) => value.is_empty(),
		}
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		*self = value;
		Ok(())
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		match self {
			Value::Master(map) => Some(map),
			_ => None,
		}
	}
}

/// A borrowed element value, produced by [`Field::value`] for marshaling
pub enum ValueRef<'a> {
	/// A signed integer element
	Int(i64),
	/// An unsigned integer element
	Uint(u64),
	/// A 4 octet float element
	Float32(f32),
	/// An 8 octet float element
	Float64(f64),
	/// A String or UTF-8 element
	String(&'a str),
	/// A date element
	Date(SystemTime),
	/// A binary element
	Binary(&'a [u8]),
	/// A Block or SimpleBlock element
	Block(&'a Block),
	/// A master element
	Master(&'a dyn Tagged),
	/// The element is written once for every item
	Repeated(Vec<&'a dyn Field>),
	/// Nothing is written
	Absent,
}

impl ValueRef<'_> {
	/// A short name for the kind of value, used in error messages
	pub fn kind(&self) -> &'static str {
		match self {
			ValueRef::Int(_) => "int",
			ValueRef::Uint(_) => "uint",
			ValueRef::Float32(_) => "float32",
			ValueRef::Float64(_) => "float64",
			ValueRef::String(_) => "string",
			ValueRef::Date(_) => "date",
			ValueRef::Binary(_) => "binary",
			ValueRef::Block(_) => "block",
			ValueRef::Master(_) => "master",
			ValueRef::Repeated(_) => "repeated",
			ValueRef::Absent => "absent",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{date_to_nanos, ebml_epoch, nanos_to_date};
	use std::time::{Duration, UNIX_EPOCH};

	#[test_log::test]
	fn dates_are_relative_to_2001() {
		assert_eq!(date_to_nanos(ebml_epoch()), 0);
		assert_eq!(date_to_nanos(UNIX_EPOCH), -978_307_200_000_000_000);

		let date = ebml_epoch() + Duration::from_millis(1500);
		assert_eq!(date_to_nanos(date), 1_500_000_000);
		assert_eq!(nanos_to_date(1_500_000_000), date);
		assert_eq!(nanos_to_date(-978_307_200_000_000_000), UNIX_EPOCH);
	}
}
