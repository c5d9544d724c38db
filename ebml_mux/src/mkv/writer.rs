use crate::config::MarshalOptions;
use crate::ebml::{Block, DeclaredSize, ElementType, FieldList, Tag, Tagged, marshal};
use crate::error::{EbmlError, ErrorKind, Result};
use crate::macros::err;
use crate::mkv::frame::{BlockReader, BlockWriter, FilterReader, FilterWriter, Frame};
use crate::mkv::interceptor::BlockInterceptor;
use crate::mkv::schema::{Cluster, EbmlHeader, Info, SeekHead, TrackEntry};
use crate::mkv::seek_head;

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::thread;

/// Block timecodes are 16 bit signed integers, frames this far from the cluster origin need a
/// new cluster
const MAX_TIMECODE_DELTA: i64 = 0x7FFF;

/// A callback receiving pipeline errors
pub type ErrorHandler = Arc<dyn Fn(EbmlError) + Send + Sync>;

/// A track to create a writer for
pub struct TrackDescription {
	/// The number used by the track's blocks, must not be 0
	pub track_number: u64,
	/// The `TrackEntry` written to the stream header
	pub track_entry: Box<dyn Tagged + Send>,
}

impl TrackDescription {
	/// Create a new `TrackDescription`
	///
	/// `track_entry` can be any master element, usually a [`TrackEntry`].
	pub fn new<T>(track_number: u64, track_entry: T) -> Self
	where
		T: Tagged + Send + 'static,
	{
		Self {
			track_number,
			track_entry: Box::new(track_entry),
		}
	}
}

impl From<TrackEntry> for TrackDescription {
	fn from(track_entry: TrackEntry) -> Self {
		Self::new(track_entry.track_number, track_entry)
	}
}

#[derive(Copy, Clone, Debug)]
struct MainTrack {
	track_number: u64,
	max_keyframe_interval: i64,
}

/// Options for [`new_simple_block_writer`]
pub struct BlockWriterOptions {
	ebml_header: EbmlHeader,
	segment_info: Info,
	seek_head: bool,
	interceptor: Option<Box<dyn BlockInterceptor + Send>>,
	main_track: Option<MainTrack>,
	on_error: Option<ErrorHandler>,
	on_fatal: Option<ErrorHandler>,
	marshal_options: MarshalOptions,
}

impl Default for BlockWriterOptions {
	/// The default implementation for `BlockWriterOptions`
	///
	/// The defaults are as follows:
	///
	/// ```rust,ignore
	/// BlockWriterOptions {
	/// 	ebml_header: EbmlHeader::webm(),
	/// 	segment_info: Info::new("ebml_mux"),
	/// 	seek_head: false,
	/// 	interceptor: None,
	/// 	main_track: None,
	/// 	on_error: None,
	/// 	on_fatal: None,
	/// 	marshal_options: MarshalOptions::default(),
	/// }
	/// ```
	fn default() -> Self {
		Self::new()
	}
}

impl BlockWriterOptions {
	/// Creates a new `BlockWriterOptions`, alias for `Default` implementation
	///
	/// See also: [`BlockWriterOptions::default`]
	pub fn new() -> Self {
		Self {
			ebml_header: EbmlHeader::webm(),
			segment_info: Info::new("ebml_mux"),
			seek_head: false,
			interceptor: None,
			main_track: None,
			on_error: None,
			on_fatal: None,
			marshal_options: MarshalOptions::new(),
		}
	}

	/// The `EBML` header to write
	pub fn ebml_header(mut self, ebml_header: EbmlHeader) -> Self {
		self.ebml_header = ebml_header;
		self
	}

	/// The segment `Info` to write
	pub fn segment_info(mut self, segment_info: Info) -> Self {
		self.segment_info = segment_info;
		self
	}

	/// Whether to write a `SeekHead` indexing `Info` and `Tracks`
	pub fn seek_head(mut self, seek_head: bool) -> Self {
		self.seek_head = seek_head;
		self
	}

	/// A stage to pass the frames of every track through before they are written
	///
	/// See [`MultiTrackBlockSorter`](crate::mkv::MultiTrackBlockSorter).
	pub fn interceptor<I>(mut self, interceptor: I) -> Self
	where
		I: BlockInterceptor + Send + 'static,
	{
		self.interceptor = Some(Box::new(interceptor));
		self
	}

	/// Start a new cluster on keyframes of `track_number`
	///
	/// A keyframe only starts a cluster once the current one spans at least
	/// `max_keyframe_interval` timecode units.
	pub fn main_track(mut self, track_number: u64, max_keyframe_interval: u64) -> Self {
		self.main_track = Some(MainTrack {
			track_number,
			max_keyframe_interval: i64::try_from(max_keyframe_interval).unwrap_or(i64::MAX),
		});
		self
	}

	/// Receive errors that don't stop the pipeline, such as [`ErrorKind::IgnoreOldFrame`]
	pub fn on_error<F>(mut self, on_error: F) -> Self
	where
		F: Fn(EbmlError) + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(on_error));
		self
	}

	/// Receive the error that stopped the pipeline, such as a sink failure
	pub fn on_fatal<F>(mut self, on_fatal: F) -> Self
	where
		F: Fn(EbmlError) + Send + Sync + 'static,
	{
		self.on_fatal = Some(Arc::new(on_fatal));
		self
	}

	/// The options to encode every element with
	pub fn marshal_options(mut self, marshal_options: MarshalOptions) -> Self {
		self.marshal_options = marshal_options;
		self
	}
}

/// A track's handle to a stream writer
///
/// Dropping the handle without [`close`](BlockWriteCloser::close) ends the track without
/// waiting for the stream to be finished.
pub struct BlockWriteCloser {
	track_number: u64,
	tx: flume::Sender<Frame>,
	done: flume::Receiver<()>,
}

impl BlockWriteCloser {
	/// The track this handle writes to
	pub fn track_number(&self) -> u64 {
		self.track_number
	}

	/// End the track, and wait for the stream to be finished
	///
	/// The stream is only finished once every track has ended, so this blocks until every
	/// other handle is closed or dropped.
	pub fn close(self) {
		let Self {
			track_number,
			tx,
			done,
		} = self;

		log::debug!("Closing track {}", track_number);
		drop(tx);

		// Only disconnects, nothing is ever sent
		let _ = done.recv();
	}
}

impl BlockWriter for BlockWriteCloser {
	fn write_frame(&mut self, mut frame: Frame) -> Result<()> {
		frame.track_number = self.track_number;
		self.tx
			.send(frame)
			.map_err(|_| EbmlError::new(ErrorKind::PipelineClosed))
	}
}

/// Create a stream writer with a handle for every track
///
/// The stream header is written to `sink` before this returns. Everything else is written by
/// a dedicated thread that owns `sink`, which is closed once every track has ended.
///
/// Frames should be written in timestamp order, an interceptor can take care of that for
/// frames of different tracks. Frames too old to fit in the current cluster are dropped, and
/// reported through [`BlockWriterOptions::on_error`].
///
/// # Errors
///
/// * `tracks` is empty, has a track number of 0, or a duplicate track number
/// * The main track isn't in `tracks`
/// * The stream header can't be encoded or written
/// * A thread can't be spawned
pub fn new_simple_block_writer<W>(
	mut sink: W,
	tracks: Vec<TrackDescription>,
	options: BlockWriterOptions,
) -> Result<Vec<BlockWriteCloser>>
where
	W: Write + Send + 'static,
{
	validate_tracks(&tracks, options.main_track)?;

	let BlockWriterOptions {
		ebml_header,
		segment_info,
		seek_head,
		interceptor,
		main_track,
		on_error,
		on_fatal,
		marshal_options,
	} = options;

	let header_len = write_header(
		&mut sink,
		&tracks,
		&ebml_header,
		&segment_info,
		seek_head,
		marshal_options,
	)?;

	let track_numbers = tracks
		.iter()
		.map(|track| track.track_number)
		.collect::<Vec<_>>();
	drop(tracks);

	let (frame_tx, frame_rx) = flume::bounded::<Frame>(0);
	let (done_tx, done_rx) = flume::bounded::<()>(0);

	let cluster_writer =
		ClusterWriter::new(sink, header_len, main_track, marshal_options, on_error);
	thread::Builder::new()
		.name(String::from("ebml_mux-writer"))
		.spawn(move || {
			if let Err(e) = cluster_writer.run(&frame_rx) {
				log::error!("Block writer stopped: {}", e);

				// Pending writes fail from here on
				drop(frame_rx);
				if let Some(on_fatal) = on_fatal {
					on_fatal(e);
				}
			}

			drop(done_tx);
		})?;

	let Some(interceptor) = interceptor else {
		return Ok(track_numbers
			.into_iter()
			.map(|track_number| BlockWriteCloser {
				track_number,
				tx: frame_tx.clone(),
				done: done_rx.clone(),
			})
			.collect());
	};

	let mut handles = Vec::with_capacity(track_numbers.len());
	let mut readers = Vec::with_capacity(track_numbers.len());
	let mut writers = Vec::with_capacity(track_numbers.len());
	for track_number in track_numbers {
		let (tx, rx) = flume::bounded(0);

		let reader: Box<dyn BlockReader + Send> = Box::new(FilterReader::new(track_number, rx));
		let writer: Box<dyn BlockWriter + Send> =
			Box::new(FilterWriter::new(track_number, frame_tx.clone()));
		readers.push(reader);
		writers.push(writer);

		handles.push(BlockWriteCloser {
			track_number,
			tx,
			done: done_rx.clone(),
		});
	}

	thread::Builder::new()
		.name(String::from("ebml_mux-interceptor"))
		.spawn(move || interceptor.intercept(readers, writers))?;

	Ok(handles)
}

fn validate_tracks(tracks: &[TrackDescription], main_track: Option<MainTrack>) -> Result<()> {
	if tracks.is_empty() {
		err!(InvalidTrack("no tracks given"));
	}

	let mut seen = HashSet::with_capacity(tracks.len());
	for track in tracks {
		if track.track_number == 0 {
			err!(InvalidTrack("track numbers start at 1"));
		}

		if !seen.insert(track.track_number) {
			err!(InvalidTrack("duplicate track number"));
		}
	}

	if let Some(main_track) = main_track {
		if !seen.contains(&main_track.track_number) {
			err!(InvalidTrack("the main track isn't in the track list"));
		}
	}

	Ok(())
}

fn segment_fields<'a>(
	seek_head: Option<&'a SeekHead>,
	info: &'a Info,
	tracks: &'a FieldList<'a>,
) -> FieldList<'a> {
	let mut fields = FieldList::new();
	if let Some(seek_head) = seek_head {
		fields.push(Tag::new(ElementType::SeekHead), seek_head);
	}

	fields
		.with(Tag::new(ElementType::Info), info)
		.with(Tag::new(ElementType::Tracks), tracks)
}

fn header_document<'a>(ebml_header: &'a EbmlHeader, segment: &'a FieldList<'a>) -> FieldList<'a> {
	FieldList::new()
		.with(Tag::new(ElementType::EBML), ebml_header)
		.with(
			Tag::new(ElementType::Segment).size(DeclaredSize::Unknown),
			segment,
		)
}

// Write the EBML header, and the start of the segment up to the first cluster
fn write_header<W>(
	sink: &mut W,
	tracks: &[TrackDescription],
	ebml_header: &EbmlHeader,
	info: &Info,
	with_seek_head: bool,
	options: MarshalOptions,
) -> Result<u64>
where
	W: Write,
{
	let mut track_list = FieldList::new();
	for track in tracks {
		track_list.push(Tag::new(ElementType::TrackEntry), &track.track_entry);
	}

	let mut seek_head = None;
	if with_seek_head {
		let mut placeholder = seek_head::placeholder()?;
		let records = {
			let segment = segment_fields(Some(&placeholder), info, &track_list);
			seek_head::dry_run(&header_document(ebml_header, &segment), options)?
		};

		seek_head::fill(&mut placeholder, &records);
		seek_head = Some(placeholder);
	}

	let segment = segment_fields(seek_head.as_ref(), info, &track_list);
	let written = marshal(&header_document(ebml_header, &segment), &mut *sink, options)?;

	log::debug!("Wrote a {} byte stream header", written);
	Ok(written)
}

// Places frames into clusters, owned by the writer thread
struct ClusterWriter<W> {
	sink: W,
	position: u64,
	main_track: Option<MainTrack>,
	options: MarshalOptions,
	on_error: Option<ErrorHandler>,
	// The timestamp of the first frame
	origin: Option<i64>,
	// The timestamp the current cluster starts at
	anchor: Option<i64>,
	last_timestamp: Option<i64>,
	cluster_start: Option<u64>,
}

impl<W> ClusterWriter<W>
where
	W: Write,
{
	fn new(
		sink: W,
		position: u64,
		main_track: Option<MainTrack>,
		options: MarshalOptions,
		on_error: Option<ErrorHandler>,
	) -> Self {
		Self {
			sink,
			position,
			main_track,
			options,
			on_error,
			origin: None,
			anchor: None,
			last_timestamp: None,
			cluster_start: None,
		}
	}

	// Write frames until every sender is gone
	fn run(mut self, frames: &flume::Receiver<Frame>) -> Result<()> {
		for frame in frames {
			self.write_frame(frame)?;
		}

		self.finish()
	}

	fn needs_cluster(&self, frame: &Frame, anchor: i64) -> bool {
		let delta = frame.timestamp.saturating_sub(anchor);
		if delta >= MAX_TIMECODE_DELTA {
			return true;
		}

		self.main_track.is_some_and(|main_track| {
			frame.keyframe
				&& frame.track_number == main_track.track_number
				&& delta >= main_track.max_keyframe_interval
		})
	}

	fn write_frame(&mut self, frame: Frame) -> Result<()> {
		let origin = *self.origin.get_or_insert(frame.timestamp);

		let anchor = match self.anchor {
			Some(anchor) if !self.needs_cluster(&frame, anchor) => anchor,
			_ => {
				self.open_cluster(frame.timestamp.saturating_sub(origin).max(0) as u64)?;
				self.anchor = Some(frame.timestamp);
				frame.timestamp
			},
		};

		let delta = frame.timestamp.saturating_sub(anchor);
		if delta <= -MAX_TIMECODE_DELTA {
			log::warn!(
				"Dropping frame of track {} at {}, the current cluster starts at {}",
				frame.track_number,
				frame.timestamp,
				anchor
			);

			if let Some(on_error) = &self.on_error {
				on_error(EbmlError::new(ErrorKind::IgnoreOldFrame));
			}

			return Ok(());
		}

		let timestamp = frame.timestamp;
		let block = Block {
			track_number: frame.track_number,
			timecode: delta as i16,
			keyframe: frame.keyframe,
			frames: vec![frame.data],
			..Block::default()
		};

		let document = FieldList::new().with(Tag::new(ElementType::SimpleBlock), &block);
		self.position += marshal(&document, &mut self.sink, self.options)?;
		self.last_timestamp = Some(timestamp);

		Ok(())
	}

	fn open_cluster(&mut self, timecode: u64) -> Result<()> {
		let prev_size = self
			.cluster_start
			.map_or(0, |cluster_start| self.position - cluster_start);

		let cluster = Cluster {
			timecode,
			prev_size,
			..Cluster::default()
		};
		let document = FieldList::new().with(
			Tag::new(ElementType::Cluster).size(DeclaredSize::Unknown),
			&cluster,
		);

		log::debug!(
			"Starting a cluster at {} (timecode: {}, previous size: {})",
			self.position,
			timecode,
			prev_size
		);

		self.cluster_start = Some(self.position);
		self.position += marshal(&document, &mut self.sink, self.options)?;
		Ok(())
	}

	// An empty cluster marks the end of the stream, carrying the last timestamp
	fn finish(mut self) -> Result<()> {
		let timecode = match (self.origin, self.last_timestamp) {
			(Some(origin), Some(last_timestamp)) => {
				last_timestamp.saturating_sub(origin).max(0) as u64
			},
			_ => 0,
		};

		self.open_cluster(timecode)?;
		self.sink.flush()?;

		log::debug!("Finished the stream after {} bytes", self.position);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::{ClusterWriter, MainTrack, TrackDescription, validate_tracks};
	use crate::config::{MarshalOptions, UnmarshalOptions};
	use crate::ebml::{ElementMap, ElementType, Value, unmarshal};
	use crate::error::{EbmlError, ErrorKind};
	use crate::mkv::frame::Frame;
	use crate::mkv::schema::{TrackEntry, track_type};

	use std::sync::{Arc, Mutex};

	fn frame(track_number: u64, timestamp: i64, keyframe: bool) -> Frame {
		Frame {
			track_number,
			keyframe,
			timestamp,
			data: vec![timestamp as u8],
		}
	}

	// Every cluster as an `ElementMap`
	fn clusters(out: &[u8]) -> Vec<ElementMap> {
		let mut document = ElementMap::new();
		unmarshal(out, &mut document, UnmarshalOptions::new()).unwrap();

		document
			.get_all(ElementType::Cluster)
			.iter()
			.map(|cluster| match cluster {
				Value::Master(cluster) => cluster.clone(),
				other => panic!("Unexpected cluster value: {other:?}"),
			})
			.collect()
	}

	fn timecodes(cluster: &ElementMap) -> Vec<i16> {
		cluster
			.get_all(ElementType::SimpleBlock)
			.iter()
			.map(|block| match block {
				Value::Block(block) => block.timecode,
				other => panic!("Unexpected block value: {other:?}"),
			})
			.collect()
	}

	#[test_log::test]
	fn keyframes_of_the_main_track_start_clusters() {
		let main_track = MainTrack {
			track_number: 1,
			max_keyframe_interval: 0x800,
		};

		let mut out = Vec::new();
		let mut writer =
			ClusterWriter::new(&mut out, 0, Some(main_track), MarshalOptions::new(), None);
		writer.write_frame(frame(1, 0, true)).unwrap();
		writer.write_frame(frame(1, 1, false)).unwrap();
		writer.write_frame(frame(1, 0x1000, false)).unwrap();
		writer.write_frame(frame(1, 0x1001, true)).unwrap();
		writer.finish().unwrap();

		let clusters = clusters(&out);
		// The last one is the trailer
		assert_eq!(clusters.len(), 3);

		assert_eq!(clusters[0].get(ElementType::Timecode), Some(&Value::Uint(0)));
		assert_eq!(timecodes(&clusters[0]), [0, 1, 0x1000]);

		assert_eq!(clusters[1].get(ElementType::Timecode), Some(&Value::Uint(0x1001)));
		assert_eq!(timecodes(&clusters[1]), [0]);
		assert!(clusters[1].get(ElementType::PrevSize).is_some());

		assert_eq!(clusters[2].get(ElementType::Timecode), Some(&Value::Uint(0x1001)));
		assert!(timecodes(&clusters[2]).is_empty());
	}

	#[test_log::test]
	fn large_gaps_start_clusters() {
		let mut out = Vec::new();
		let mut writer = ClusterWriter::new(&mut out, 0, None, MarshalOptions::new(), None);
		writer.write_frame(frame(1, 100, false)).unwrap();
		writer.write_frame(frame(1, 100 + 0x7FFE, false)).unwrap();
		writer.write_frame(frame(1, 100 + 0x7FFF, false)).unwrap();
		writer.finish().unwrap();

		let clusters = clusters(&out);
		assert_eq!(clusters.len(), 3);
		assert_eq!(timecodes(&clusters[0]), [0, 0x7FFE]);
		assert_eq!(clusters[1].get(ElementType::Timecode), Some(&Value::Uint(0x7FFF)));
		assert_eq!(timecodes(&clusters[1]), [0]);
	}

	#[test_log::test]
	fn old_frames_are_dropped() {
		let errors = Arc::new(Mutex::new(Vec::<EbmlError>::new()));
		let reported = Arc::clone(&errors);

		let mut out = Vec::new();
		let mut writer = ClusterWriter::new(
			&mut out,
			0,
			None,
			MarshalOptions::new(),
			Some(Arc::new(move |e| reported.lock().unwrap().push(e))),
		);
		writer.write_frame(frame(1, 0x10000, false)).unwrap();
		writer.write_frame(frame(2, 0x10000 - 0x7FFF, false)).unwrap();
		writer.write_frame(frame(2, 0x10000 - 0x7FFE, false)).unwrap();
		writer.finish().unwrap();

		let errors = errors.lock().unwrap();
		assert_eq!(errors.len(), 1);
		assert!(matches!(errors[0].kind(), ErrorKind::IgnoreOldFrame));

		let clusters = clusters(&out);
		assert_eq!(timecodes(&clusters[0]), [0, -0x7FFE]);
	}

	#[test_log::test]
	fn extreme_timestamps() {
		let mut out = Vec::new();
		let mut writer = ClusterWriter::new(&mut out, 0, None, MarshalOptions::new(), None);
		writer.write_frame(frame(1, i64::MIN, false)).unwrap();
		writer.write_frame(frame(1, i64::MAX, false)).unwrap();
		writer.finish().unwrap();

		let clusters = clusters(&out);
		assert_eq!(clusters.len(), 3);
		assert_eq!(timecodes(&clusters[0]), [0]);
		assert_eq!(clusters[1].get(ElementType::Timecode), Some(&Value::Uint(i64::MAX as u64)));
		assert_eq!(timecodes(&clusters[1]), [0]);

		let errors = Arc::new(Mutex::new(Vec::<EbmlError>::new()));
		let reported = Arc::clone(&errors);

		let mut out = Vec::new();
		let mut writer = ClusterWriter::new(
			&mut out,
			0,
			None,
			MarshalOptions::new(),
			Some(Arc::new(move |e| reported.lock().unwrap().push(e))),
		);
		writer.write_frame(frame(1, i64::MAX, false)).unwrap();
		writer.write_frame(frame(1, i64::MIN, false)).unwrap();
		writer.finish().unwrap();

		let errors = errors.lock().unwrap();
		assert_eq!(errors.len(), 1);
		assert!(matches!(errors[0].kind(), ErrorKind::IgnoreOldFrame));

		let clusters = self::clusters(&out);
		assert_eq!(clusters.len(), 2);
		assert_eq!(timecodes(&clusters[0]), [0]);
	}

	#[test_log::test]
	fn empty_stream_trailer() {
		let mut out = Vec::new();
		ClusterWriter::new(&mut out, 0, None, MarshalOptions::new(), None)
			.finish()
			.unwrap();

		#[rustfmt::skip]
		let expected = [
			// Cluster, unknown size
			0x1F, 0x43, 0xB6, 0x75, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
			// Timecode 0
			0xE7, 0x81, 0x00,
		];
		assert_eq!(out, expected);
	}

	#[test_log::test]
	fn track_validation() {
		let track = |number| {
			TrackDescription::new(number, TrackEntry::new(number, track_type::VIDEO, "V_VP8"))
		};

		let err = validate_tracks(&[], None).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidTrack(_)));

		let err = validate_tracks(&[track(0)], None).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidTrack(_)));

		let err = validate_tracks(&[track(1), track(1)], None).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidTrack(_)));

		let main_track = MainTrack {
			track_number: 3,
			max_keyframe_interval: 0,
		};
		let err = validate_tracks(&[track(1), track(2)], Some(main_track)).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidTrack(_)));

		validate_tracks(&[track(1), track(2)], None).unwrap();
	}
}
