use crate::Ebml;
use crate::config::UnmarshalOptions;
use crate::ebml::{
	Block, ElementType, Field, ReadOutcome, Tag, Tagged, Unmarshaler, Value, ValueRef,
};
use crate::error::{EbmlError, ErrorKind, Result};
use crate::macros::err;
use crate::mkv::frame::{BlockReader, Frame};
use crate::mkv::schema::{EbmlHeader, Info, SeekHead, TrackEntry, Tracks};
use crate::mkv::writer::ErrorHandler;

use std::io::Read;
use std::sync::Arc;
use std::thread;

/// The number of frames a track buffers before the reader waits for it
const TRACK_BUFFER: usize = 16;

/// Options for [`new_simple_block_reader`]
#[derive(Clone, Default)]
pub struct BlockReaderOptions {
	unmarshal_options: UnmarshalOptions,
	on_fatal: Option<ErrorHandler>,
}

impl BlockReaderOptions {
	/// Creates a new `BlockReaderOptions`, alias for `Default` implementation
	pub fn new() -> Self {
		Self::default()
	}

	/// The options to decode every element with
	pub fn unmarshal_options(mut self, unmarshal_options: UnmarshalOptions) -> Self {
		self.unmarshal_options = unmarshal_options;
		self
	}

	/// Receive the error that stopped the reader, such as malformed input
	pub fn on_fatal<F>(mut self, on_fatal: F) -> Self
	where
		F: Fn(EbmlError) + Send + Sync + 'static,
	{
		self.on_fatal = Some(Arc::new(on_fatal));
		self
	}
}

/// A track's handle to a stream reader
pub struct BlockReadCloserWithTrackEntry {
	track_entry: TrackEntry,
	rx: flume::Receiver<Frame>,
}

impl BlockReadCloserWithTrackEntry {
	/// The `TrackEntry` of the track, as found in the stream header
	pub fn track_entry(&self) -> &TrackEntry {
		&self.track_entry
	}

	/// Stop reading the track
	///
	/// Frames of the track are skipped from here on.
	pub fn close(self) {
		log::debug!("Closing track {}", self.track_entry.track_number);
	}
}

impl BlockReader for BlockReadCloserWithTrackEntry {
	fn read(&mut self) -> Result<Option<Frame>> {
		// Disconnects once the stream ends
		Ok(self.rx.recv().ok())
	}
}

#[derive(Ebml, Default)]
struct SegmentHead {
	#[ebml("SeekHead")]
	seek_head: Option<SeekHead>,
	#[ebml("Info")]
	info: Info,
	#[ebml("Tracks,stop")]
	tracks: Tracks,
}

#[derive(Ebml, Default)]
struct StreamHeader {
	#[ebml("EBML")]
	header: EbmlHeader,
	#[ebml("Segment")]
	segment: SegmentHead,
}

/// Create a stream reader with a handle for every track
///
/// The stream header is read before this returns. The blocks are read by a dedicated thread,
/// which sends the frames of every track to its handle. A handle that falls behind holds
/// back every other track.
///
/// The timestamp of a frame is its cluster's timecode plus its block's timecode. A frame
/// from a `BlockGroup` is considered a keyframe if its `ReferencePriority` is not zero, which
/// is an approximation.
///
/// # Errors
///
/// * The stream header is malformed
/// * The stream ends before the `Tracks` element
/// * A thread can't be spawned
pub fn new_simple_block_reader<R>(
	source: R,
	options: BlockReaderOptions,
) -> Result<Vec<BlockReadCloserWithTrackEntry>>
where
	R: Read + Send + 'static,
{
	let BlockReaderOptions {
		unmarshal_options,
		on_fatal,
	} = options;

	let mut unmarshaler = Unmarshaler::new(source, unmarshal_options);

	let mut header = StreamHeader::default();
	if unmarshaler.unmarshal(&mut header)? != ReadOutcome::Stopped {
		err!(InvalidTrack("the stream has no track list"));
	}

	log::debug!(
		"Read a {} stream header with {} tracks",
		header.header.doc_type,
		header.segment.tracks.track_entries.len()
	);

	let mut handles = Vec::new();
	let mut senders = Vec::new();
	for track_entry in header.segment.tracks.track_entries {
		let (tx, rx) = flume::bounded(TRACK_BUFFER);
		senders.push((track_entry.track_number, tx));
		handles.push(BlockReadCloserWithTrackEntry { track_entry, rx });
	}

	let mut stream = ClusterStream {
		cluster: ClusterSink::new(FrameEmitter {
			tracks: senders,
			cluster_timecode: 0,
		}),
	};

	thread::Builder::new()
		.name(String::from("ebml_mux-reader"))
		.spawn(move || match unmarshaler.unmarshal(&mut stream) {
			Ok(_) => log::debug!("Reached the end of the stream"),
			Err(e) if e.is(|kind| matches!(kind, ErrorKind::PipelineClosed)) => {
				log::debug!("Every track was closed, stopping");
			},
			Err(e) => {
				log::error!("Block reader stopped: {}", e);
				if let Some(on_fatal) = on_fatal {
					on_fatal(e);
				}
			},
		})?;

	Ok(handles)
}

// Sends frames to the track handles
#[derive(Clone)]
struct FrameEmitter {
	tracks: Vec<(u64, flume::Sender<Frame>)>,
	cluster_timecode: u64,
}

impl FrameEmitter {
	fn emit(&mut self, block: Block, keyframe: bool) -> Result<()> {
		let Some(index) = self
			.tracks
			.iter()
			.position(|(track_number, _)| *track_number == block.track_number)
		else {
			if self.tracks.is_empty() {
				err!(PipelineClosed);
			}

			log::trace!("Skipping a block of unknown or closed track {}", block.track_number);
			return Ok(());
		};

		let Some(timestamp) = i64::try_from(self.cluster_timecode)
			.ok()
			.and_then(|timecode| timecode.checked_add(i64::from(block.timecode)))
		else {
			log::debug!(
				"Block timecode {} overflows in a cluster at {}",
				block.timecode,
				self.cluster_timecode
			);
			err!(TimestampOutOfRange);
		};
		for data in block.frames {
			let frame = Frame {
				track_number: block.track_number,
				keyframe,
				timestamp,
				data,
			};

			if self.tracks[index].1.send(frame).is_err() {
				log::debug!("Track {} was closed", block.track_number);
				self.tracks.remove(index);
				break;
			}
		}

		if self.tracks.is_empty() {
			err!(PipelineClosed);
		}

		Ok(())
	}
}

// `SimpleBlock`s are sent as soon as they are read
impl Field for FrameEmitter {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Absent
	}

	fn is_zero(&self) -> bool {
		true
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		let block = match value {
			Value::Block(block) => block,
			Value::Binary(bytes) => Block::parse(&bytes)?,
			_ => err!(IncompatibleType(value.kind())),
		};

		let keyframe = block.keyframe;
		self.emit(block, keyframe)
	}
}

// Reads a `BlockGroup`, and sends its block once the group ends
struct BlockGroupSink {
	emitter: FrameEmitter,
	block: Option<Block>,
	block_duration: u64,
	reference_priority: u64,
	reference_blocks: Vec<i64>,
}

impl Tagged for BlockGroupSink {
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)> {
		Vec::new()
	}

	fn tagged_field_mut(&mut self, element: ElementType) -> Option<(Tag, &mut dyn Field)> {
		let field: &mut dyn Field = match element {
			ElementType::Block => &mut self.block,
			ElementType::BlockDuration => &mut self.block_duration,
			ElementType::ReferencePriority => &mut self.reference_priority,
			ElementType::ReferenceBlock => &mut self.reference_blocks,
			_ => return None,
		};

		Some((Tag::new(element), field))
	}

	fn end_master(&mut self) -> Result<()> {
		let keyframe = self.reference_priority != 0;
		self.block_duration = 0;
		self.reference_priority = 0;
		self.reference_blocks.clear();

		match self.block.take() {
			Some(block) => self.emitter.emit(block, keyframe),
			None => {
				log::warn!("Skipping a BlockGroup without a Block");
				Ok(())
			},
		}
	}
}

impl Field for BlockGroupSink {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Absent
	}

	fn is_zero(&self) -> bool {
		true
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		Some(self)
	}
}

// Reads a `Cluster`, sending each block as it is read
struct ClusterSink {
	emitter: FrameEmitter,
	group: BlockGroupSink,
	prev_size: u64,
	position: u64,
}

impl ClusterSink {
	fn new(emitter: FrameEmitter) -> Self {
		Self {
			group: BlockGroupSink {
				emitter: emitter.clone(),
				block: None,
				block_duration: 0,
				reference_priority: 0,
				reference_blocks: Vec::new(),
			},
			emitter,
			prev_size: 0,
			position: 0,
		}
	}
}

impl Tagged for ClusterSink {
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)> {
		Vec::new()
	}

	fn tagged_field_mut(&mut self, element: ElementType) -> Option<(Tag, &mut dyn Field)> {
		let field: &mut dyn Field = match element {
			ElementType::Timecode => &mut self.emitter.cluster_timecode,
			ElementType::PrevSize => &mut self.prev_size,
			ElementType::Position => &mut self.position,
			ElementType::SimpleBlock => &mut self.emitter,
			ElementType::BlockGroup => {
				self.group.emitter.cluster_timecode = self.emitter.cluster_timecode;
				&mut self.group
			},
			_ => return None,
		};

		Some((Tag::new(element), field))
	}

	fn end_master(&mut self) -> Result<()> {
		self.emitter.cluster_timecode = 0;
		Ok(())
	}
}

impl Field for ClusterSink {
	fn value(&self) -> ValueRef<'_> {
		ValueRef::Absent
	}

	fn is_zero(&self) -> bool {
		true
	}

	fn master_mut(&mut self) -> Option<&mut dyn Tagged> {
		Some(self)
	}
}

// Everything after the track list
struct ClusterStream {
	cluster: ClusterSink,
}

impl Tagged for ClusterStream {
	fn tagged_fields(&self) -> Vec<(Tag, &dyn Field)> {
		Vec::new()
	}

	fn tagged_field_mut(&mut self, element: ElementType) -> Option<(Tag, &mut dyn Field)> {
		match element {
			ElementType::Cluster => {
				let field: &mut dyn Field = &mut self.cluster;
				Some((Tag::new(element), field))
			},
			_ => None,
		}
	}
}
