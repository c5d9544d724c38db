use crate::error::Result;
use crate::macros::err;
use crate::mkv::frame::{BlockReader, BlockWriter, Frame};

use std::collections::VecDeque;
use std::thread;

/// A stage between the track handles and the stream writer
///
/// An interceptor gets a reader and a writer for every track, in the order the tracks were
/// given to [`new_simple_block_writer`](crate::mkv::new_simple_block_writer). It runs on its
/// own thread, and the stream is finished once it returns and its writers are dropped.
pub trait BlockInterceptor {
	/// Move frames from `readers` to `writers`
	fn intercept(
		self: Box<Self>,
		readers: Vec<Box<dyn BlockReader + Send>>,
		writers: Vec<Box<dyn BlockWriter + Send>>,
	);
}

/// What to do with frames older than the last frame written
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BlockSorterRule {
	/// Drop them
	#[default]
	DropOutdated,
	/// Write them anyway, out of order
	WriteOutdated,
}

/// Options for [`MultiTrackBlockSorter`]
///
/// Exactly one of `max_delayed_packets` and `max_timescale_delay` must be non-zero.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SorterOptions {
	/// Write the oldest frame once a track has more than this many frames waiting
	pub max_delayed_packets: usize,
	/// Write the oldest frame once the waiting frames span more than this many timecode units
	pub max_timescale_delay: i64,
	/// What to do with frames older than the last frame written
	pub rule: BlockSorterRule,
}

/// Sorts the frames of every track by timestamp
///
/// A frame is held back until every track has a frame waiting, so the oldest one can be
/// picked. Tracks that stall would hold back the others forever, which is what the limits in
/// [`SorterOptions`] prevent.
///
/// When two tracks have frames with the same timestamp, the frame of the track given first
/// is written first.
///
/// # Examples
///
/// ```rust
/// use ebml_mux::mkv::{BlockWriterOptions, MultiTrackBlockSorter, SorterOptions};
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let sorter = MultiTrackBlockSorter::new(SorterOptions {
/// 	max_delayed_packets: 16,
/// 	..SorterOptions::default()
/// })?;
///
/// let options = BlockWriterOptions::new().interceptor(sorter);
/// # Ok(()) }
/// ```
#[derive(Copy, Clone, Debug)]
pub struct MultiTrackBlockSorter {
	options: SorterOptions,
}

impl MultiTrackBlockSorter {
	/// Create a new `MultiTrackBlockSorter`
	///
	/// # Errors
	///
	/// Both or neither of the limits are set ([`ErrorKind::InvalidSorterOptions`](crate::error::ErrorKind::InvalidSorterOptions))
	pub fn new(options: SorterOptions) -> Result<Self> {
		if (options.max_delayed_packets == 0) == (options.max_timescale_delay == 0) {
			err!(InvalidSorterOptions);
		}

		if options.max_timescale_delay < 0 {
			err!(InvalidSorterOptions);
		}

		Ok(Self { options })
	}
}

impl BlockInterceptor for MultiTrackBlockSorter {
	fn intercept(
		self: Box<Self>,
		readers: Vec<Box<dyn BlockReader + Send>>,
		mut writers: Vec<Box<dyn BlockWriter + Send>>,
	) {
		let mut sorter = FrameSorter::new(readers.len(), self.options);
		let (tx, rx) = flume::bounded::<(usize, Frame)>(0);

		thread::scope(|scope| {
			for (index, mut reader) in readers.into_iter().enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					loop {
						match reader.read() {
							Ok(Some(frame)) => {
								if tx.send((index, frame)).is_err() {
									break;
								}
							},
							Ok(None) => break,
							Err(e) => {
								log::warn!("Failed to read frames of track #{}: {}", index, e);
								break;
							},
						}
					}
				});
			}

			// Only the readers hold senders now, the loop ends when they are all done
			drop(tx);

			let mut write = |(index, frame): (usize, Frame)| {
				let Some(writer) = writers.get_mut(index) else {
					return;
				};

				if let Err(e) = writer.write_frame(frame) {
					log::warn!("Failed to write a frame of track #{}: {}", index, e);
				}
			};

			for (index, frame) in &rx {
				sorter.push(index, frame).into_iter().for_each(&mut write);
			}

			log::debug!("Every track ended, writing the remaining frames");
			sorter.finish().into_iter().for_each(&mut write);
		});
	}
}

/// The state of a [`MultiTrackBlockSorter`]
///
/// Tracks are identified by their index.
#[derive(Clone, Debug)]
pub struct FrameSorter {
	buffers: Vec<VecDeque<Frame>>,
	// The timestamp of the last frame written
	done: i64,
	options: SorterOptions,
}

impl FrameSorter {
	/// Create a new `FrameSorter` for `tracks` tracks
	pub fn new(tracks: usize, options: SorterOptions) -> Self {
		Self {
			buffers: vec![VecDeque::new(); tracks],
			done: i64::MIN,
			options,
		}
	}

	/// Add a frame, returning the frames that can be written
	///
	/// # Panics
	///
	/// `track` is not a valid track index
	pub fn push(&mut self, track: usize, frame: Frame) -> Vec<(usize, Frame)> {
		if frame.timestamp < self.done && self.options.rule == BlockSorterRule::DropOutdated {
			log::debug!(
				"Dropping outdated frame of track #{} at {}, already wrote {}",
				track,
				frame.timestamp,
				self.done
			);
			return Vec::new();
		}

		self.buffers[track].push_back(frame);
		self.flush(false)
	}

	/// Write every remaining frame, in order
	pub fn finish(&mut self) -> Vec<(usize, Frame)> {
		self.flush(true)
	}

	/// The number of frames waiting
	pub fn len(&self) -> usize {
		self.buffers.iter().map(VecDeque::len).sum()
	}

	fn flush(&mut self, force_all: bool) -> Vec<(usize, Frame)> {
		let required = if force_all { 1 } else { self.buffers.len() };

		let mut ret = Vec::new();
		loop {
			let mut oldest: Option<(usize, i64)> = None;
			let mut non_empty = 0;
			let mut max_backlog = 0;
			let mut min_head = i64::MAX;
			let mut max_tail = i64::MIN;

			for (index, buffer) in self.buffers.iter().enumerate() {
				let (Some(head), Some(tail)) = (buffer.front(), buffer.back()) else {
					continue;
				};

				non_empty += 1;
				max_backlog = max_backlog.max(buffer.len());
				min_head = min_head.min(head.timestamp);
				max_tail = max_tail.max(tail.timestamp);

				// Strictly older, ties go to the lower index
				if oldest.is_none_or(|(_, timestamp)| head.timestamp < timestamp) {
					oldest = Some((index, head.timestamp));
				}
			}

			let Some((index, _)) = oldest else {
				break;
			};

			let backlogged = self.options.max_delayed_packets != 0
				&& max_backlog > self.options.max_delayed_packets;
			let delayed = self.options.max_timescale_delay != 0
				&& max_tail.saturating_sub(min_head) > self.options.max_timescale_delay;

			if non_empty < required && !backlogged && !delayed {
				break;
			}

			let Some(frame) = self.buffers[index].pop_front() else {
				break;
			};

			self.done = frame.timestamp;
			ret.push((index, frame));
		}

		ret
	}
}

#[cfg(test)]
mod tests {
	use super::{BlockSorterRule, FrameSorter, MultiTrackBlockSorter, SorterOptions};
	use crate::error::ErrorKind;
	use crate::mkv::frame::Frame;

	fn frame(timestamp: i64) -> Frame {
		Frame {
			timestamp,
			..Frame::default()
		}
	}

	fn order(emitted: &[(usize, Frame)]) -> Vec<(usize, i64)> {
		emitted
			.iter()
			.map(|(index, frame)| (*index, frame.timestamp))
			.collect()
	}

	fn run(sorter: &mut FrameSorter, arrivals: &[(usize, i64)]) -> Vec<(usize, i64)> {
		let mut emitted = Vec::new();
		for &(track, timestamp) in arrivals {
			emitted.extend(sorter.push(track, frame(timestamp)));
		}
		emitted.extend(sorter.finish());

		order(&emitted)
	}

	#[test_log::test]
	fn options_need_exactly_one_limit() {
		let neither = MultiTrackBlockSorter::new(SorterOptions::default()).unwrap_err();
		assert!(matches!(neither.kind(), ErrorKind::InvalidSorterOptions));

		let both = MultiTrackBlockSorter::new(SorterOptions {
			max_delayed_packets: 1,
			max_timescale_delay: 1,
			..SorterOptions::default()
		})
		.unwrap_err();
		assert!(matches!(both.kind(), ErrorKind::InvalidSorterOptions));

		MultiTrackBlockSorter::new(SorterOptions {
			max_timescale_delay: 100,
			..SorterOptions::default()
		})
		.unwrap();
	}

	#[test_log::test]
	fn packet_limit() {
		let mut sorter = FrameSorter::new(
			2,
			SorterOptions {
				max_delayed_packets: 2,
				..SorterOptions::default()
			},
		);

		let arrivals = [
			(0, 10),
			(0, 11),
			(1, 9),
			(0, 16),
			(0, 17),
			(0, 18),
			(1, 15),
			(1, 18),
		];
		assert_eq!(
			run(&mut sorter, &arrivals),
			[(1, 9), (0, 10), (0, 11), (0, 16), (0, 17), (0, 18), (1, 18)]
		);
		assert_eq!(sorter.len(), 0);
	}

	#[test_log::test]
	fn outdated_frames_can_be_kept() {
		let mut sorter = FrameSorter::new(
			2,
			SorterOptions {
				max_delayed_packets: 2,
				rule: BlockSorterRule::WriteOutdated,
				..SorterOptions::default()
			},
		);

		let emitted = run(&mut sorter, &[(0, 10), (0, 11), (0, 12), (1, 5)]);
		assert_eq!(emitted, [(0, 10), (1, 5), (0, 11), (0, 12)]);
	}

	#[test_log::test]
	fn timescale_limit() {
		let mut sorter = FrameSorter::new(
			2,
			SorterOptions {
				max_timescale_delay: 100,
				..SorterOptions::default()
			},
		);

		// Track 1 never shows up, frames are held until they span more than 100
		assert!(sorter.push(0, frame(0)).is_empty());
		assert!(sorter.push(0, frame(50)).is_empty());
		assert!(sorter.push(0, frame(100)).is_empty());
		assert_eq!(order(&sorter.push(0, frame(101))), [(0, 0)]);
		assert_eq!(sorter.len(), 3);
	}

	#[test_log::test]
	fn ties_go_to_the_first_track() {
		let mut sorter = FrameSorter::new(
			3,
			SorterOptions {
				max_delayed_packets: 8,
				..SorterOptions::default()
			},
		);

		let emitted = run(&mut sorter, &[(2, 5), (1, 5), (0, 5)]);
		assert_eq!(emitted, [(0, 5), (1, 5), (2, 5)]);
	}
}
