use crate::ebml::VInt;
use crate::error::Result;
use crate::macros::err;

use std::io::Write;

use byteorder::{ReadBytesExt, WriteBytesExt};

const MAX_LACED_FRAMES: usize = 256;

/// How the frames of a block are packed into its payload
///
/// Every mode other than [`LacingMode::No`] starts with an octet holding `frame count - 1`,
/// and the size of the last frame is always implied by the remaining payload.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum LacingMode {
	/// A single frame
	#[default]
	No,
	/// Frame sizes as runs of `0xFF` octets, ending with an octet `< 0xFF`
	Xiph,
	/// Every frame has the same size
	Fixed,
	/// The first frame size as a VInt, followed by signed VInt differences
	Ebml,
}

impl LacingMode {
	const FLAG_MASK: u8 = 0b0000_0110;

	pub(crate) fn from_flags(flags: u8) -> Self {
		match flags & Self::FLAG_MASK {
			0b0000_0010 => LacingMode::Xiph,
			0b0000_0100 => LacingMode::Fixed,
			0b0000_0110 => LacingMode::Ebml,
			_ => LacingMode::No,
		}
	}

	pub(crate) fn flag_bits(self) -> u8 {
		match self {
			LacingMode::No => 0,
			LacingMode::Xiph => 0b0000_0010,
			LacingMode::Fixed => 0b0000_0100,
			LacingMode::Ebml => 0b0000_0110,
		}
	}

	/// Write `frames` as a laced block payload
	///
	/// An empty frame list writes nothing.
	///
	/// # Errors
	///
	/// * More than one frame with [`LacingMode::No`] ([`ErrorKind::MultipleFramesNoLace`](crate::error::ErrorKind::MultipleFramesNoLace))
	/// * More than 256 frames ([`ErrorKind::TooManyFrames`](crate::error::ErrorKind::TooManyFrames))
	/// * Frames of different sizes with [`LacingMode::Fixed`] ([`ErrorKind::UnevenFixedLace`](crate::error::ErrorKind::UnevenFixedLace))
	/// * `writer` fails
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::ebml::LacingMode;
	///
	/// # fn main() -> ebml_mux::error::Result<()> {
	/// let frames = vec![vec![0xAA; 300], vec![0xBB; 2]];
	///
	/// let mut payload = Vec::new();
	/// LacingMode::Xiph.write_frames(&frames, &mut payload)?;
	///
	/// // 2 frames, and the first is 255 + 45 octets long
	/// assert_eq!(&payload[..3], &[1, 0xFF, 45]);
	/// assert_eq!(LacingMode::Xiph.read_frames(&payload)?, frames);
	/// # Ok(()) }
	/// ```
	pub fn write_frames(self, frames: &[Vec<u8>], writer: &mut dyn Write) -> Result<()> {
		let Some((last, leading)) = frames.split_last() else {
			return Ok(());
		};

		if self == LacingMode::No {
			if !leading.is_empty() {
				err!(MultipleFramesNoLace);
			}

			writer.write_all(last)?;
			return Ok(());
		}

		if frames.len() > MAX_LACED_FRAMES {
			err!(TooManyFrames);
		}

		writer.write_u8((frames.len() - 1) as u8)?;

		match self {
			LacingMode::Xiph => {
				for frame in leading {
					let mut size = frame.len();
					while size >= 0xFF {
						writer.write_u8(0xFF)?;
						size -= 0xFF;
					}

					writer.write_u8(size as u8)?;
				}
			},
			LacingMode::Fixed => {
				if frames.iter().any(|frame| frame.len() != last.len()) {
					err!(UnevenFixedLace);
				}
			},
			LacingMode::Ebml => {
				let mut previous = None;
				for frame in leading {
					let size = frame.len() as u64;
					match previous {
						None => VInt::<u64>::try_from(size)?.write_to(None, None, writer)?,
						Some(previous) => VInt::<i64>::try_from(size as i64 - previous as i64)?
							.write_to(None, None, writer)?,
					};

					previous = Some(size);
				}
			},
			LacingMode::No => unreachable!(),
		}

		for frame in frames {
			writer.write_all(frame)?;
		}

		Ok(())
	}

	/// Split a laced block payload back into its frames
	///
	/// An empty payload has no frames.
	///
	/// # Errors
	///
	/// * The lace header ends early ([`std::io::ErrorKind::UnexpectedEof`])
	/// * The sizes leave nothing for the last frame ([`ErrorKind::WrongLaceSize`](crate::error::ErrorKind::WrongLaceSize))
	/// * A fixed lace can't be evenly divided ([`ErrorKind::FixedLaceUndivisible`](crate::error::ErrorKind::FixedLaceUndivisible))
	pub fn read_frames(self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
		if payload.is_empty() {
			return Ok(Vec::new());
		}

		if self == LacingMode::No {
			return Ok(vec![payload.to_vec()]);
		}

		let mut reader = payload;
		let count = usize::from(reader.read_u8()?) + 1;

		let mut sizes = Vec::with_capacity(count);
		match self {
			LacingMode::Xiph => {
				for _ in 1..count {
					let mut size = 0u64;
					loop {
						let octet = reader.read_u8()?;
						size += u64::from(octet);
						if octet != 0xFF {
							break;
						}
					}

					sizes.push(size);
				}
			},
			LacingMode::Fixed => {
				if reader.len() % count != 0 {
					err!(FixedLaceUndivisible);
				}

				let size = (reader.len() / count) as u64;
				sizes.resize(count - 1, size);
			},
			LacingMode::Ebml => {
				let mut previous = 0i64;
				for i in 1..count {
					let size = if i == 1 {
						let (size, _) = VInt::<u64>::parse(&mut reader, 8)?;
						if size.is_unknown() {
							err!(WrongLaceSize);
						}

						size.value() as i64
					} else {
						let (delta, _) = VInt::<i64>::parse(&mut reader, 8)?;
						previous + delta.value()
					};

					// No single frame can be larger than what is left
					if size < 0 || size as u64 > reader.len() as u64 {
						err!(WrongLaceSize);
					}

					sizes.push(size as u64);
					previous = size;
				}
			},
			LacingMode::No => unreachable!(),
		}

		let Some(leading_total) = sizes
			.iter()
			.try_fold(0u64, |total, size| total.checked_add(*size))
		else {
			err!(WrongLaceSize);
		};

		if leading_total >= reader.len() as u64 {
			log::debug!(
				"Lace sizes ({} octets) leave nothing of the remaining {} for the last frame",
				leading_total,
				reader.len()
			);
			err!(WrongLaceSize);
		}

		let mut frames = Vec::with_capacity(count);
		for size in sizes {
			let (frame, rest) = reader.split_at(size as usize);
			frames.push(frame.to_vec());
			reader = rest;
		}

		frames.push(reader.to_vec());
		Ok(frames)
	}
}
