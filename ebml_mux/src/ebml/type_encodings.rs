use crate::ebml::value::date_to_nanos;
use crate::ebml::{DeclaredSize, ElementDataType, ElementType, ValueRef};
use crate::error::Result;
use crate::macros::err;

/// Encode the data of a non-master element
///
/// Integers use the fewest octets possible (at least one), unless `size` asks for more.
pub(crate) fn encode_payload(
	element: ElementType,
	value: &ValueRef<'_>,
	size: DeclaredSize,
) -> Result<Vec<u8>> {
	let exact = match size {
		DeclaredSize::Default => None,
		DeclaredSize::Exact(size) => Some(size),
		DeclaredSize::Unknown => {
			log::debug!("Only master elements can have an unknown size ({:?})", element);
			err!(SizeMismatch)
		},
	};

	match (element.data_type(), value) {
		(ElementDataType::UnsignedInt, ValueRef::Uint(value)) => encode_unsigned(*value, exact),
		(ElementDataType::UnsignedInt, ValueRef::Int(value)) if *value >= 0 => {
			encode_unsigned(*value as u64, exact)
		},
		(ElementDataType::SignedInt, ValueRef::Int(value)) => encode_signed(*value, exact),
		(ElementDataType::SignedInt, ValueRef::Uint(value)) if i64::try_from(*value).is_ok() => {
			encode_signed(*value as i64, exact)
		},
		(ElementDataType::Float, ValueRef::Float32(value)) => {
			encode_float(f64::from(*value), exact.unwrap_or(4))
		},
		(ElementDataType::Float, ValueRef::Float64(value)) => {
			encode_float(*value, exact.unwrap_or(8))
		},
		(ElementDataType::String | ElementDataType::Utf8, ValueRef::String(value)) => {
			pad(value.as_bytes(), exact)
		},
		(ElementDataType::Binary, ValueRef::Binary(value)) => pad(value, exact),
		(ElementDataType::Binary, ValueRef::String(value)) => pad(value.as_bytes(), exact),
		(ElementDataType::Date, ValueRef::Date(value)) => {
			if exact.is_some_and(|size| size != 8) {
				err!(SizeMismatch)
			}

			Ok(date_to_nanos(*value).to_be_bytes().to_vec())
		},
		(ElementDataType::Block, ValueRef::Block(block)) => {
			let bytes = block.to_bytes()?;
			if exact.is_some_and(|size| size != bytes.len() as u64) {
				err!(SizeMismatch)
			}

			Ok(bytes)
		},
		(ElementDataType::Block, ValueRef::Binary(value)) => pad(value, exact),
		_ => err!(IncompatibleType(value.kind())),
	}
}

fn encode_unsigned(value: u64, exact: Option<u64>) -> Result<Vec<u8>> {
	let minimal = (8 - value.leading_zeros() as usize / 8).max(1);
	let len = integer_length(minimal, exact)?;
	Ok(value.to_be_bytes()[8 - len..].to_vec())
}

// Two's complement, with as many sign bits as needed to keep the sign
fn encode_signed(value: i64, exact: Option<u64>) -> Result<Vec<u8>> {
	let minimal = (1..=8)
		.find(|len| {
			let shift = 64 - 8 * len;
			(value << shift) >> shift == value
		})
		.unwrap_or(8);

	let len = integer_length(minimal, exact)?;
	Ok(value.to_be_bytes()[8 - len..].to_vec())
}

fn integer_length(minimal: usize, exact: Option<u64>) -> Result<usize> {
	match exact {
		None => Ok(minimal),
		Some(size) if size <= 8 && size as usize >= minimal => Ok(size as usize),
		Some(_) => err!(InvalidIntSize),
	}
}

fn encode_float(value: f64, size: u64) -> Result<Vec<u8>> {
	match size {
		4 => Ok((value as f32).to_be_bytes().to_vec()),
		8 => Ok(value.to_be_bytes().to_vec()),
		_ => err!(InvalidFloatSize),
	}
}

// Strings and binaries are padded with NULs
fn pad(value: &[u8], exact: Option<u64>) -> Result<Vec<u8>> {
	let Some(size) = exact else {
		return Ok(value.to_vec());
	};

	if (value.len() as u64) > size {
		err!(SizeMismatch)
	}

	let mut ret = value.to_vec();
	ret.resize(size as usize, 0);
	Ok(ret)
}

#[cfg(test)]
mod tests {
	use super::encode_payload;
	use crate::ebml::{DeclaredSize, ElementType, ValueRef};
	use crate::error::ErrorKind;

	fn encode(element: ElementType, value: &ValueRef<'_>, size: DeclaredSize) -> Vec<u8> {
		encode_payload(element, value, size).unwrap()
	}

	#[test_log::test]
	fn minimal_integers() {
		let cases: [(u64, &[u8]); 4] = [
			(0, &[0]),
			(0xFF, &[0xFF]),
			(0x100, &[1, 0]),
			(u64::MAX, &[0xFF; 8]),
		];
		for (value, expected) in cases {
			let encoded = encode(
				ElementType::TrackUID,
				&ValueRef::Uint(value),
				DeclaredSize::Default,
			);
			assert_eq!(encoded, expected);
		}

		let cases: [(i64, &[u8]); 5] = [
			(0, &[0]),
			(-1, &[0xFF]),
			(127, &[0x7F]),
			(128, &[0x00, 0x80]),
			(-129, &[0xFF, 0x7F]),
		];
		for (value, expected) in cases {
			let encoded = encode(
				ElementType::ReferenceBlock,
				&ValueRef::Int(value),
				DeclaredSize::Default,
			);
			assert_eq!(encoded, expected, "{value}");
		}
	}

	#[test_log::test]
	fn exact_sizes() {
		let encoded = encode(
			ElementType::SeekPosition,
			&ValueRef::Uint(0x1234),
			DeclaredSize::Exact(8),
		);
		assert_eq!(encoded, [0, 0, 0, 0, 0, 0, 0x12, 0x34]);

		let encoded = encode(
			ElementType::ReferenceBlock,
			&ValueRef::Int(-2),
			DeclaredSize::Exact(3),
		);
		assert_eq!(encoded, [0xFF, 0xFF, 0xFE]);

		let encoded = encode(
			ElementType::DocType,
			&ValueRef::String("webm"),
			DeclaredSize::Exact(6),
		);
		assert_eq!(encoded, b"webm\0\0");

		let encoded = encode(
			ElementType::Duration,
			&ValueRef::Float64(1.5),
			DeclaredSize::Exact(4),
		);
		assert_eq!(encoded, 1.5f32.to_be_bytes());
	}

	#[test_log::test]
	fn bad_sizes() {
		let err = encode_payload(
			ElementType::SeekPosition,
			&ValueRef::Uint(0x1234),
			DeclaredSize::Exact(1),
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidIntSize));

		let err = encode_payload(
			ElementType::Duration,
			&ValueRef::Float64(1.0),
			DeclaredSize::Exact(2),
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidFloatSize));

		let err = encode_payload(
			ElementType::DocType,
			&ValueRef::String("matroska"),
			DeclaredSize::Exact(4),
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::SizeMismatch));

		let err = encode_payload(
			ElementType::Timecode,
			&ValueRef::Uint(1),
			DeclaredSize::Unknown,
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::SizeMismatch));
	}

	#[test_log::test]
	fn kinds_must_match() {
		let err = encode_payload(
			ElementType::Timecode,
			&ValueRef::String("1"),
			DeclaredSize::Default,
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::IncompatibleType("string")));

		let err = encode_payload(
			ElementType::Timecode,
			&ValueRef::Int(-1),
			DeclaredSize::Default,
		)
		.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::IncompatibleType("int")));
	}
}
