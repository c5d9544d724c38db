use crate::error::{EbmlError, ErrorKind, Result};

/// A single media sample
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
	/// The track the frame belongs to
	pub track_number: u64,
	/// Whether the frame can be decoded on its own
	pub keyframe: bool,
	/// The absolute timestamp, in timecode scale units (milliseconds by default)
	pub timestamp: i64,
	/// The frame data
	pub data: Vec<u8>,
}

/// A sink of frames for a single track
pub trait BlockWriter {
	/// Write a frame
	///
	/// Writers that belong to a track overwrite [`Frame::track_number`] with their own.
	///
	/// # Errors
	///
	/// Implementation specific. The writers in this crate fail with
	/// [`ErrorKind::PipelineClosed`] once the stage they feed has shut down.
	fn write_frame(&mut self, frame: Frame) -> Result<()>;

	/// Write a frame from its parts, returning the number of payload bytes written
	///
	/// # Errors
	///
	/// See [`BlockWriter::write_frame`]
	fn write(&mut self, keyframe: bool, timestamp: i64, data: &[u8]) -> Result<usize> {
		self.write_frame(Frame {
			track_number: 0,
			keyframe,
			timestamp,
			data: data.to_vec(),
		})?;

		Ok(data.len())
	}
}

/// A source of frames for a single track
pub trait BlockReader {
	/// Read the next frame, `None` once the track has ended
	///
	/// # Errors
	///
	/// Implementation specific
	fn read(&mut self) -> Result<Option<Frame>>;
}

/// The writing end of a channel between two pipeline stages
///
/// These are handed to a [`BlockInterceptor`](crate::mkv::BlockInterceptor), and feed the
/// stream writer.
#[derive(Clone)]
pub struct FilterWriter {
	track_number: u64,
	tx: flume::Sender<Frame>,
}

impl FilterWriter {
	pub(crate) fn new(track_number: u64, tx: flume::Sender<Frame>) -> Self {
		Self { track_number, tx }
	}

	/// The track this writer belongs to
	pub fn track_number(&self) -> u64 {
		self.track_number
	}
}

impl BlockWriter for FilterWriter {
	fn write_frame(&mut self, mut frame: Frame) -> Result<()> {
		frame.track_number = self.track_number;
		self.tx
			.send(frame)
			.map_err(|_| EbmlError::new(ErrorKind::PipelineClosed))
	}
}

/// The reading end of a channel between two pipeline stages
///
/// These are handed to a [`BlockInterceptor`](crate::mkv::BlockInterceptor), and are fed by
/// the track handles.
pub struct FilterReader {
	track_number: u64,
	rx: flume::Receiver<Frame>,
}

impl FilterReader {
	pub(crate) fn new(track_number: u64, rx: flume::Receiver<Frame>) -> Self {
		Self { track_number, rx }
	}

	/// The track this reader belongs to
	pub fn track_number(&self) -> u64 {
		self.track_number
	}
}

impl BlockReader for FilterReader {
	fn read(&mut self) -> Result<Option<Frame>> {
		// Disconnection means every handle for the track is gone
		Ok(self.rx.recv().ok())
	}
}

#[cfg(test)]
mod tests {
	use super::{BlockReader, BlockWriter, FilterReader, FilterWriter, Frame};
	use crate::error::ErrorKind;

	#[test_log::test]
	fn filter_writers_stamp_their_track() {
		let (tx, rx) = flume::unbounded();
		let mut writer = FilterWriter::new(3, tx);
		let mut reader = FilterReader::new(3, rx);

		assert_eq!(writer.write(true, 40, &[1, 2, 3]).unwrap(), 3);
		assert_eq!(
			reader.read().unwrap(),
			Some(Frame {
				track_number: 3,
				keyframe: true,
				timestamp: 40,
				data: vec![1, 2, 3],
			})
		);

		drop(writer);
		assert_eq!(reader.read().unwrap(), None);
	}

	#[test_log::test]
	fn closed_reader() {
		let (tx, rx) = flume::bounded(0);
		let mut writer = FilterWriter::new(1, tx);
		drop(rx);

		let err = writer.write(false, 0, &[0]).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::PipelineClosed));
	}
}
