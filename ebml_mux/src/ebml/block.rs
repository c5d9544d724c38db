use crate::ebml::{LacingMode, VInt};
use crate::error::Result;
use crate::macros::err;

use std::io::Write;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

const KEYFRAME_FLAG: u8 = 0b1000_0000;
const INVISIBLE_FLAG: u8 = 0b0000_1000;
const DISCARDABLE_FLAG: u8 = 0b0000_0001;

/// The payload of a `Block` or `SimpleBlock` element
///
/// Layout:
///
/// ```text
/// track number (VInt) | timecode (i16, big endian) | flags | [lace header] | frames
/// ```
///
/// The flags octet is always derived from the fields of this struct. `keyframe` and
/// `discardable` only have a meaning in a `SimpleBlock`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Block {
	/// The track the block belongs to
	pub track_number: u64,
	/// The timecode, relative to the enclosing cluster
	pub timecode: i16,
	/// The block only contains keyframes
	pub keyframe: bool,
	/// The frames should not be rendered
	pub invisible: bool,
	/// The frames can be dropped during playback
	pub discardable: bool,
	/// How the frames are packed
	pub lacing: LacingMode,
	/// The frames
	pub frames: Vec<Vec<u8>>,
}

impl Block {
	/// Parse a block from its element data
	///
	/// # Errors
	///
	/// * The data is too short, or the track number is invalid
	/// * The frames are malformed, see [`LacingMode::read_frames`]
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::{Block, LacingMode};
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// let block = Block::parse(&[0x81, 0x00, 0x10, 0x80, 0xDE, 0xAD])?;
	/// assert_eq!(block.track_number, 1);
	/// assert_eq!(block.timecode, 16);
	/// assert!(block.keyframe);
	/// assert_eq!(block.lacing, LacingMode::No);
	/// assert_eq!(block.frames, [vec![0xDE, 0xAD]]);
	/// # Ok(()) }
	/// ```
	pub fn parse(data: &[u8]) -> Result<Self> {
		let mut reader = data;

		let (track_number, _) = VInt::<u64>::parse(&mut reader, 8)?;
		if track_number.is_unknown() {
			err!(BadVintSize);
		}

		let timecode = reader.read_i16::<BigEndian>()?;
		let flags = reader.read_u8()?;

		let lacing = LacingMode::from_flags(flags);
		let frames = lacing.read_frames(reader)?;

		Ok(Self {
			track_number: track_number.value(),
			timecode,
			keyframe: flags & KEYFRAME_FLAG != 0,
			invisible: flags & INVISIBLE_FLAG != 0,
			discardable: flags & DISCARDABLE_FLAG != 0,
			lacing,
			frames,
		})
	}

	/// The flags octet for this block
	pub fn flags(&self) -> u8 {
		let mut flags = self.lacing.flag_bits();
		if self.keyframe {
			flags |= KEYFRAME_FLAG;
		}
		if self.invisible {
			flags |= INVISIBLE_FLAG;
		}
		if self.discardable {
			flags |= DISCARDABLE_FLAG;
		}

		flags
	}

	/// Write the block's element data
	///
	/// # Errors
	///
	/// * The track number can't be represented as a VInt
	/// * The frames can't be laced, see [`LacingMode::write_frames`]
	/// * `writer` fails
	pub fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
		VInt::<u64>::try_from(self.track_number)?.write_to(None, None, writer)?;
		writer.write_i16::<BigEndian>(self.timecode)?;
		writer.write_u8(self.flags())?;
		self.lacing.write_frames(&self.frames, writer)
	}

	/// Encode the block's element data into a new `Vec`
	///
	/// # Errors
	///
	/// See [`Block::write_to`]
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let mut ret = Vec::with_capacity(4 + self.frames.iter().map(Vec::len).sum::<usize>());
		self.write_to(&mut ret)?;
		Ok(ret)
	}
}
