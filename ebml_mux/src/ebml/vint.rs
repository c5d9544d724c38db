use crate::error::Result;
use crate::macros::err;

use std::fmt::{Debug, Display, UpperHex};
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

macro_rules! impl_vint {
	($($t:ty),*) => {
		$(
			paste::paste! {
				impl VInt<$t> {
					/// A `VInt` with a value of 0
					pub const ZERO: Self = Self(0);

					/// Gets the inner value of the `VInt`
					///
					/// # Examples
					///
					/// ```rust
					/// use ebml_mux::ebml::VInt;
					///
					/// # fn main() -> ebml_mux::error::Result<()> {
					#[doc = " let vint = VInt::<" $t ">::try_from(2)?;"]
					/// assert_eq!(vint.value(), 2);
					/// # Ok(()) }
					/// ```
					#[inline]
					pub fn value(self) -> $t {
						self.0
					}

					/// Converts the `VInt` into a byte Vec
					///
					/// # Errors
					///
					/// * Unable to write to the buffer
					/// * The value needs more octets than `max_length` allows
					pub fn as_bytes(self, max_length: Option<u8>) -> Result<Vec<u8>> {
						let mut ret = Vec::with_capacity(8);
						self.write_to(None, max_length, &mut ret)?;
						Ok(ret)
					}
				}

				impl PartialEq<$t> for VInt<$t> {
					fn eq(&self, other: &$t) -> bool {
						self.0 == *other
					}
				}
			}
		)*
	};
}

/// An EBML variable-size integer
///
/// A `VInt` is an integer composed of up to 8 octets, with 7 usable bits per octet.
///
/// * `VInt<u64>` is used for element sizes, track numbers, and the first size of an EBML lace.
///   It is always encoded with the fewest octets possible, and reserves the all-ones pattern
///   for [`VInt::<u64>::UNKNOWN`].
/// * `VInt<i64>` is the signed form used for the size deltas of an EBML lace. It is stored as
///   an unsigned `VInt` of length `L`, biased by `2^(7L-1) - 1`.
///
/// To ensure safe construction of `VInt`s, users must create them through the `TryFrom` implementations or `VInt::parse`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VInt<T>(pub(crate) T);

impl<T> VInt<T> {
	// Each octet will shave a single bit off each byte
	const USABLE_BITS_PER_BYTE: u32 = 7;
	const MAX_OCTET_LENGTH: u8 = 8;
}

impl_vint!(u64, i64);

impl VInt<u64> {
	/// The maximum value that can be represented by a `VInt`
	///
	/// `2^56 - 1` is all data bits set to one in 8 octets, which is reserved for [`Self::UNKNOWN`].
	pub const MAX: u64 = (1 << 56) - 2;
	/// An unknown-sized `VInt`
	///
	/// See [`Self::is_unknown()`]
	pub const UNKNOWN: Self = Self(u64::MAX);

	/// Whether this `VInt` represents an unknown size
	///
	/// Since EBML is built for streaming, elements can specify that their data length
	/// is unknown.
	#[inline]
	pub fn is_unknown(self) -> bool {
		self == Self::UNKNOWN
	}

	/// Parse a `VInt` from a reader
	///
	/// `max_length` can be used to specify the maximum number of octets the number should
	/// occupy, otherwise it should be `8`.
	///
	/// # Errors
	///
	/// * The octet length is 0 or greater than `max_length`
	/// * The reader ends before the `VInt` does
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::VInt;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// // This octet count (9) is too large to represent
	/// let mut invalid_vint_reader = &[0b0000_0000_1];
	/// let invalid_vint = VInt::<u64>::parse(&mut &invalid_vint_reader[..], 8);
	/// assert!(invalid_vint.is_err());
	///
	/// // This octet count (4) is too large to represent given our `max_length`
	/// let mut invalid_vint_reader2 = &[0b0001_1111];
	/// let invalid_vint2 = VInt::<u64>::parse(&mut &invalid_vint_reader2[..], 3);
	/// assert!(invalid_vint2.is_err());
	///
	/// // This value is small enough to represent
	/// let mut valid_vint_reader = &[0b1000_0010];
	/// let (valid_vint, _bytes_read) = VInt::<u64>::parse(&mut &valid_vint_reader[..], 8)?;
	/// assert_eq!(valid_vint.value(), 2);
	/// # Ok(()) }
	/// ```
	pub fn parse<R>(reader: &mut R, max_length: u8) -> Result<(Self, u8)>
	where
		R: Read,
	{
		let (val, bytes_read) = parse_vint(reader, max_length, false)?;
		Ok((Self(val), bytes_read))
	}

	/// Represents the length of the `VInt` in octets
	///
	/// NOTE: The value returned will always be <= 8
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::VInt;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// // Anything < 127 will fit into a single octet
	/// let vint = VInt::try_from(100u64)?;
	/// assert_eq!(vint.octet_length(), 1);
	///
	/// // 127 would be all ones, which is reserved
	/// let vint = VInt::try_from(127u64)?;
	/// assert_eq!(vint.octet_length(), 2);
	///
	/// // A larger number will need more
	/// let vint = VInt::try_from(500_000u64)?;
	/// assert_eq!(vint.octet_length(), 3);
	/// # Ok(()) }
	/// ```
	#[inline]
	pub fn octet_length(self) -> u8 {
		if self.is_unknown() {
			return Self::MAX_OCTET_LENGTH;
		}

		octet_length(self.0)
	}

	/// Write the `VInt` to a writer, returning the number of octets written
	///
	/// * `min_length` can be used to specify the minimum number of octets the number should
	///   occupy. An unknown size is written with `min_length` octets, or 8 if not provided.
	/// * `max_length` can be used to specify the maximum number of octets the number should
	///   occupy.
	pub(crate) fn write_to<W>(
		self,
		min_length: Option<u8>,
		max_length: Option<u8>,
		writer: &mut W,
	) -> Result<u8>
	where
		W: Write + ?Sized,
	{
		let max_length = max_length.unwrap_or(Self::MAX_OCTET_LENGTH);

		let (octets, data) = if self.is_unknown() {
			let octets = min_length.unwrap_or(Self::MAX_OCTET_LENGTH).max(1);
			(octets, all_ones(octets))
		} else {
			if self.0 > Self::MAX {
				err!(BadVintSize);
			}

			(
				std::cmp::max(octet_length(self.0), min_length.unwrap_or(0)),
				self.0,
			)
		};

		if octets > max_length || octets > Self::MAX_OCTET_LENGTH {
			err!(BadVintSize);
		}

		// Add the octet length
		let value = data | (1 << (u32::from(octets) * Self::USABLE_BITS_PER_BYTE));

		let mut byte_shift = i32::from(octets) - 1;
		while byte_shift >= 0 {
			writer.write_u8((value >> (byte_shift * 8)) as u8)?;
			byte_shift -= 1;
		}

		Ok(octets)
	}
}

impl TryFrom<u64> for VInt<u64> {
	type Error = crate::error::EbmlError;

	fn try_from(value: u64) -> Result<Self> {
		if value > Self::MAX {
			err!(BadVintSize);
		}

		Ok(Self(value))
	}
}

impl Debug for VInt<u64> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut debug = f.debug_tuple("VInt");
		if self.is_unknown() {
			debug.field(&"<unknown>");
		} else {
			debug.field(&self.0);
		}
		debug.finish()
	}
}

impl VInt<i64> {
	/// The maximum value that can be represented by a signed `VInt`
	pub const MAX: i64 = (1 << 55) - 1;
	/// The minimum value that can be represented by a signed `VInt`
	pub const MIN: i64 = -Self::MAX;

	/// Parse a signed `VInt` from a reader
	///
	/// # Errors
	///
	/// * The octet length is 0 or greater than `max_length`
	/// * The reader ends before the `VInt` does
	/// * The `VInt` has all of its data bits set, which has no signed meaning
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::VInt;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// // 0x3F is the bias of a single octet
	/// let (zero, _) = VInt::<i64>::parse(&mut &[0x80 | 0x3F][..], 8)?;
	/// assert_eq!(zero.value(), 0);
	///
	/// let (negative, _) = VInt::<i64>::parse(&mut &[0x80 | 0x3D][..], 8)?;
	/// assert_eq!(negative.value(), -2);
	/// # Ok(()) }
	/// ```
	pub fn parse<R>(reader: &mut R, max_length: u8) -> Result<(Self, u8)>
	where
		R: Read,
	{
		let (raw, bytes_read) = parse_vint(reader, max_length, false)?;
		if raw == VInt::<u64>::UNKNOWN.0 {
			err!(BadVintSize);
		}

		Ok((Self(raw as i64 - signed_bias(bytes_read)), bytes_read))
	}

	/// Represents the length of the signed `VInt` in octets
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::VInt;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// assert_eq!(VInt::<i64>::try_from(-63)?.octet_length(), 1);
	/// assert_eq!(VInt::<i64>::try_from(64)?.octet_length(), 2);
	/// # Ok(()) }
	/// ```
	pub fn octet_length(self) -> u8 {
		let magnitude = self.0.unsigned_abs();

		let mut octets = 1;
		while octets < Self::MAX_OCTET_LENGTH && magnitude > signed_bias(octets) as u64 {
			octets += 1;
		}

		octets
	}

	pub(crate) fn write_to<W>(
		self,
		_min_length: Option<u8>,
		max_length: Option<u8>,
		writer: &mut W,
	) -> Result<u8>
	where
		W: Write + ?Sized,
	{
		let octets = self.octet_length();
		let raw = (self.0 + signed_bias(octets)) as u64;
		VInt::<u64>(raw).write_to(Some(octets), max_length, writer)
	}
}

impl TryFrom<i64> for VInt<i64> {
	type Error = crate::error::EbmlError;

	fn try_from(value: i64) -> Result<Self> {
		if !(Self::MIN..=Self::MAX).contains(&value) {
			err!(BadVintSize);
		}

		Ok(Self(value))
	}
}

impl Debug for VInt<i64> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("VInt").field(&self.0).finish()
	}
}

impl<T> Display for VInt<T>
where
	T: Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

fn parse_vint<R>(reader: &mut R, max_length: u8, retain_marker: bool) -> Result<(u64, u8)>
where
	R: Read + ?Sized,
{
	let start = reader.read_u8()?;
	parse_vint_from(start, reader, max_length, retain_marker)
}

/// Finish parsing a VInt whose first octet has already been read
pub(crate) fn parse_vint_from<R>(
	start: u8,
	reader: &mut R,
	max_length: u8,
	retain_marker: bool,
) -> Result<(u64, u8)>
where
	R: Read + ?Sized,
{
	let octet_length = verify_length(start, max_length)?;

	let mut bytes_read = 1;

	let mut val = u64::from(start);
	if !retain_marker {
		val ^= 1 << start.ilog2();
	}

	while bytes_read < octet_length {
		bytes_read += 1;
		val = (val << 8) | u64::from(reader.read_u8()?);
	}

	// Special case for unknown VInts (all data bits set to one)
	if !retain_marker && val == all_ones(bytes_read) {
		return Ok((VInt::<u64>::UNKNOWN.0, bytes_read));
	}

	Ok((val, bytes_read))
}

/// Verify that the octet length is nonzero and <= `max_length`
pub(crate) fn verify_length(first_byte: u8, max_length: u8) -> Result<u8> {
	// A value of 0b0000_0000 indicates either an invalid VInt, or one with an octet length > 8
	if first_byte == 0b0000_0000 {
		err!(BadVintSize);
	}

	let octet_length = first_byte.leading_zeros() as u8 + 1;
	if octet_length > max_length {
		err!(BadVintSize);
	}

	Ok(octet_length)
}

fn octet_length(value: u64) -> u8 {
	let mut octets = 1;
	while octets < VInt::<()>::MAX_OCTET_LENGTH && value >= all_ones(octets) {
		octets += 1;
	}

	octets
}

// All data bits set to one for the given octet length
fn all_ones(octets: u8) -> u64 {
	(1 << (u32::from(octets) * VInt::<()>::USABLE_BITS_PER_BYTE)) - 1
}

fn signed_bias(octets: u8) -> i64 {
	(1 << (u32::from(octets) * VInt::<()>::USABLE_BITS_PER_BYTE - 1)) - 1
}

/// An EBML element ID
///
/// An `ElementId` is a [`VInt`], but with the following conditions:
///
/// * The `VINT_MARKER` is retained after parsing
/// * It is written back verbatim, its leading bits are part of its identity
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
	/// Parse an `ElementId` from a reader
	///
	/// An element ID is parsed similarly to a normal [`VInt`], but the `VINT_MARKER` is retained.
	///
	/// # Errors
	///
	/// * The ID cannot fit within the maximum width
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::ElementId;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// // Parse the EBML header element ID
	/// let mut reader = &[0x1A, 0x45, 0xDF, 0xA3][..];
	/// let (id, _bytes_read) = ElementId::parse(&mut reader, 8)?;
	/// assert_eq!(id, 0x1A45DFA3);
	/// # Ok(()) }
	/// ```
	pub fn parse<R>(reader: &mut R, max_id_length: u8) -> Result<(Self, u8)>
	where
		R: Read,
	{
		let (val, bytes_read) = parse_vint(reader, max_id_length, true)?;
		Ok((Self(val), bytes_read))
	}

	/// Get the inner value of the `ElementId`
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::ElementId;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// let (id, _bytes_read) = ElementId::parse(&mut &[0x1A, 0x45, 0xDF, 0xA3][..], 8)?;
	/// assert_eq!(id.value(), 0x1A45DFA3);
	/// # Ok(()) }
	/// ```
	pub fn value(&self) -> u64 {
		self.0
	}

	/// The number of octets the ID occupies
	pub fn octet_length(self) -> u8 {
		(self.0.ilog2() / 8 + 1) as u8
	}

	/// Converts the `ElementId` into a byte Vec
	///
	/// * `max_length` can be used to specify the maximum number of octets the number should occupy.
	///
	/// # Errors
	///
	/// * The octet length is greater than `max_length` (if provided)
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::ElementId;
	///
	/// const EBML_ID: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// let (id, _bytes_read) = ElementId::parse(&mut &EBML_ID[..], 8)?;
	/// let bytes = id.as_bytes(None)?;
	///
	/// assert_eq!(bytes, &EBML_ID);
	/// # Ok(()) }
	/// ```
	pub fn as_bytes(self, max_length: Option<u8>) -> Result<Vec<u8>> {
		let mut buf = Vec::with_capacity(4);
		self.write_to(max_length, &mut buf)?;
		Ok(buf)
	}

	pub(crate) fn write_to<W>(self, max_length: Option<u8>, writer: &mut W) -> Result<u8>
	where
		W: Write + ?Sized,
	{
		let octets = self.octet_length();
		if octets > max_length.unwrap_or(VInt::<()>::MAX_OCTET_LENGTH) {
			err!(BadVintSize);
		}

		writer.write_all(&self.0.to_be_bytes()[8 - usize::from(octets)..])?;
		Ok(octets)
	}
}

impl TryFrom<u64> for ElementId {
	type Error = crate::error::EbmlError;

	/// Validates that the ID's length marker agrees with its width
	fn try_from(value: u64) -> Result<Self> {
		if value == 0 {
			err!(BadVintSize);
		}

		let octets = (value.ilog2() / 8 + 1) as u8;
		let first = (value >> ((u32::from(octets) - 1) * 8)) as u8;
		if verify_length(first, VInt::<()>::MAX_OCTET_LENGTH)? != octets {
			err!(BadVintSize);
		}

		Ok(Self(value))
	}
}

impl PartialEq<u64> for ElementId {
	fn eq(&self, other: &u64) -> bool {
		self.0 == *other
	}
}

impl UpperHex for ElementId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::UpperHex::fmt(&self.0, f)
	}
}

impl Debug for ElementId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ElementId({:#X})", self.0)
	}
}
