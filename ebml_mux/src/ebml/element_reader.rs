use crate::config::UnmarshalOptions;
use crate::ebml::schema::ElementTrie;
use crate::ebml::value::nanos_to_date;
use crate::ebml::vint::verify_length;
use crate::ebml::{Block, ElementDataType, ElementId, ElementType, VInt, Value};
use crate::error::Result;
use crate::macros::{err, try_vec};

use std::io::{self, Read};
use std::time::SystemTime;

use byteorder::{BigEndian, ReadBytesExt};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct ElementHeader {
	pub(crate) id: ElementId,
	/// `None` if the ID isn't in the schema
	pub(crate) element: Option<ElementType>,
	pub(crate) size: VInt<u64>,
	/// The length of the ID and size
	pub(crate) header_len: u64,
}

/// An EBML element reader
///
/// This keeps track of the absolute position in the stream, so element positions can be
/// reported without requiring `Seek`.
pub(crate) struct ElementReader<R> {
	reader: R,
	position: u64,
	max_id_length: u8,
	max_size_length: u8,
	allocation_limit: usize,
}

impl<R> Read for ElementReader<R>
where
	R: Read,
{
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let ret = self.reader.read(buf)?;
		self.position += ret as u64;
		Ok(ret)
	}
}

impl<R> ElementReader<R>
where
	R: Read,
{
	pub(crate) fn new(reader: R, options: UnmarshalOptions) -> Self {
		Self {
			reader,
			position: 0,
			max_id_length: options.max_id_length,
			max_size_length: options.max_size_length,
			allocation_limit: options.allocation_limit,
		}
	}

	/// The number of bytes read so far
	pub(crate) fn position(&self) -> u64 {
		self.position
	}

	pub(crate) fn into_inner(self) -> R {
		self.reader
	}

	/// Read the next element ID and size
	///
	/// The ID is resolved against the schema one octet at a time. This returns `None` if the
	/// stream ends cleanly before the header starts.
	pub(crate) fn read_header(&mut self) -> Result<Option<ElementHeader>> {
		let start = self.position;

		let mut first = [0; 1];
		loop {
			match self.read(&mut first) {
				Ok(0) => return Ok(None),
				Ok(_) => break,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e.into()),
			}
		}

		let id_length = verify_length(first[0], self.max_id_length)?;

		let trie = ElementTrie::get();
		let mut cursor = trie.step(trie.root(), first[0]);
		let mut id = u64::from(first[0]);
		for _ in 1..id_length {
			let octet = self.read_u8()?;
			id = (id << 8) | u64::from(octet);
			cursor = cursor.and_then(|cursor| trie.step(cursor, octet));
		}

		let element = cursor.and_then(|cursor| trie.element(cursor));
		let (size, _) = VInt::<u64>::parse(self, self.max_size_length)?;

		let header = ElementHeader {
			id: ElementId(id),
			element,
			size,
			header_len: self.position - start,
		};

		log::trace!(
			"Element {:#X} ({:?}) at {}, size: {:?}",
			id,
			element,
			start,
			size
		);

		Ok(Some(header))
	}

	pub(crate) fn skip(&mut self, length: u64) -> Result<()> {
		log::trace!("Skipping {} bytes", length);

		let skipped = io::copy(&mut self.by_ref().take(length), &mut io::sink())?;
		if skipped != length {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				"Element ends past the end of the stream",
			)
			.into());
		}

		Ok(())
	}

	/// Decode the data of a non-master element
	pub(crate) fn read_value(&mut self, data_type: ElementDataType, length: u64) -> Result<Value> {
		Ok(match data_type {
			ElementDataType::SignedInt => Value::Int(self.read_signed_int(length)?),
			ElementDataType::UnsignedInt => Value::Uint(self.read_unsigned_int(length)?),
			ElementDataType::Float => self.read_float(length)?,
			ElementDataType::String | ElementDataType::Utf8 => {
				Value::String(self.read_string(length)?)
			},
			ElementDataType::Date => Value::Date(self.read_date(length)?),
			ElementDataType::Binary => Value::Binary(self.read_binary(length)?),
			ElementDataType::Block => Value::Block(self.read_block(length)?),
			ElementDataType::Master => err!(IncompatibleType("master")),
		})
	}

	pub(crate) fn read_signed_int(&mut self, element_length: u64) -> Result<i64> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.1
		// A Signed Integer Element MUST declare a length from zero to eight octets
		if element_length > 8 {
			err!(InvalidIntSize)
		}

		if element_length == 0 {
			return Ok(0);
		}

		let mut buf = [0; 8];
		self.read_exact(&mut buf[8 - element_length as usize..])?;
		let value = u64::from_be_bytes(buf);

		// Signed Integers are stored with two's complement notation with the leftmost bit being the sign bit.
		let value_width = element_length * 8;
		let shift = (64 - value_width) as u32;
		Ok((value.wrapping_shl(shift) as i64).wrapping_shr(shift))
	}

	pub(crate) fn read_unsigned_int(&mut self, element_length: u64) -> Result<u64> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.2
		// An Unsigned Integer Element MUST declare a length from zero to eight octets
		if element_length > 8 {
			err!(InvalidIntSize)
		}

		let mut buf = [0; 8];
		self.read_exact(&mut buf[8 - element_length as usize..])?;
		Ok(u64::from_be_bytes(buf))
	}

	pub(crate) fn read_float(&mut self, element_length: u64) -> Result<Value> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.3
		// A Float Element MUST declare a length of either zero octets (0 bit),
		// four octets (32 bit), or eight octets (64 bit)
		Ok(match element_length {
			0 => Value::Float64(0.0),
			4 => Value::Float32(self.read_f32::<BigEndian>()?),
			8 => Value::Float64(self.read_f64::<BigEndian>()?),
			_ => err!(InvalidFloatSize),
		})
	}

	pub(crate) fn read_string(&mut self, element_length: u64) -> Result<String> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.4
		// A String Element MUST declare a length in octets from zero to VINTMAX
		let mut content = self.read_binary(element_length)?;

		// https://www.rfc-editor.org/rfc/rfc8794.html#section-13
		// Null Octets, which are octets with all bits set to zero,
		// MAY follow the value of a String Element or UTF-8 Element to serve as a terminator.
		let new_len = content.iter().rposition(|x| *x != 0).map_or(0, |i| i + 1);
		content.truncate(new_len);

		String::from_utf8(content).map_err(Into::into)
	}

	pub(crate) fn read_date(&mut self, element_length: u64) -> Result<SystemTime> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.6
		// A Date Element MUST declare a length of either zero octets or eight octets
		match element_length {
			0 => Ok(nanos_to_date(0)),
			8 => Ok(nanos_to_date(self.read_i64::<BigEndian>()?)),
			_ => err!(SizeMismatch),
		}
	}

	pub(crate) fn read_binary(&mut self, element_length: u64) -> Result<Vec<u8>> {
		// https://www.rfc-editor.org/rfc/rfc8794.html#section-7.8
		// A Binary Element MUST declare a length in octets from zero to VINTMAX.
		if element_length > VInt::<u64>::MAX {
			err!(TooMuchData)
		}

		let Ok(element_length) = usize::try_from(element_length) else {
			err!(TooMuchData)
		};

		let mut content = try_vec![0; element_length, self.allocation_limit];
		self.read_exact(&mut content)?;
		Ok(content)
	}

	pub(crate) fn read_block(&mut self, element_length: u64) -> Result<Block> {
		let content = self.read_binary(element_length)?;
		Block::parse(&content)
	}
}

#[cfg(test)]
mod tests {
	use super::ElementReader;
	use crate::config::UnmarshalOptions;
	use crate::ebml::{ElementType, Value};
	use crate::error::ErrorKind;

	fn reader(data: &[u8]) -> ElementReader<&[u8]> {
		ElementReader::new(data, UnmarshalOptions::new())
	}

	#[test_log::test]
	fn headers() {
		let mut reader = reader(&[0x1A, 0x45, 0xDF, 0xA3, 0x80, 0x40, 0x01, 0x81, 0x00]);

		let header = reader.read_header().unwrap().unwrap();
		assert_eq!(header.element, Some(ElementType::EBML));
		assert_eq!(header.size, 0);
		assert_eq!(header.header_len, 5);

		// Well formed, but not in the schema
		let header = reader.read_header().unwrap().unwrap();
		assert_eq!(header.id, 0x4001);
		assert_eq!(header.element, None);
		reader.skip(header.size.value()).unwrap();

		assert_eq!(reader.position(), 9);
		assert!(reader.read_header().unwrap().is_none());
	}

	#[test_log::test]
	fn id_longer_than_allowed() {
		let mut reader = reader(&[0x08, 0x00, 0x00, 0x00, 0x01, 0x80]);
		let err = reader.read_header().unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::BadVintSize));
	}

	#[test_log::test]
	fn integers() {
		assert_eq!(reader(&[0xFF, 0xFE]).read_signed_int(2).unwrap(), -2);
		assert_eq!(reader(&[0x7F]).read_signed_int(1).unwrap(), 127);
		assert_eq!(reader(&[]).read_signed_int(0).unwrap(), 0);
		assert_eq!(reader(&[0x01, 0x00]).read_unsigned_int(2).unwrap(), 256);

		let err = reader(&[0; 9]).read_unsigned_int(9).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidIntSize));
	}

	#[test_log::test]
	fn floats() {
		let value = reader(&0.5f32.to_be_bytes()).read_float(4).unwrap();
		assert_eq!(value, Value::Float32(0.5));

		assert_eq!(reader(&[]).read_float(0).unwrap(), Value::Float64(0.0));

		let err = reader(&[0; 2]).read_float(2).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidFloatSize));
	}

	#[test_log::test]
	fn strings_lose_their_padding() {
		let value = reader(b"webm\0\0\0").read_string(7).unwrap();
		assert_eq!(value, "webm");

		let value = reader(b"\0\0").read_string(2).unwrap();
		assert_eq!(value, "");
	}

	#[test_log::test]
	fn allocation_limit() {
		let data = [0; 32];
		let mut reader = ElementReader::new(
			&data[..],
			UnmarshalOptions::new().allocation_limit(16),
		);

		let err = reader.read_binary(32).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::TooMuchData));
	}

	#[test_log::test]
	fn skip_past_the_end() {
		let err = reader(&[0; 4]).skip(5).unwrap_err();
		assert!(err.is_io(std::io::ErrorKind::UnexpectedEof));
	}
}
