#![allow(missing_docs)]

use ebml_mux::config::{MarshalOptions, UnmarshalOptions};
use ebml_mux::ebml::{ElementRecord, ElementType, FieldList, Tag, Unmarshaler, marshal, unmarshal};
use ebml_mux::error::ErrorKind;
use ebml_mux::mkv::schema::{Document, EbmlHeader};
use ebml_mux::mkv::{
	BlockReader, BlockReaderOptions, BlockWriteCloser, BlockWriter, BlockWriterOptions, Frame,
	MultiTrackBlockSorter, SorterOptions, TrackDescription, TrackEntry, new_simple_block_reader,
	new_simple_block_writer, track_type,
};

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
	fn contents(&self) -> Vec<u8> {
		self.0.lock().unwrap().clone()
	}
}

impl Write for SharedBuffer {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

fn video_and_audio() -> Vec<TrackDescription> {
	vec![
		TrackEntry::new(1, track_type::VIDEO, "V_VP8").into(),
		TrackEntry::new(2, track_type::AUDIO, "A_OPUS").into(),
	]
}

fn decode(stream: &[u8]) -> Document {
	let mut document = Document::default();
	unmarshal(stream, &mut document, UnmarshalOptions::new()).unwrap();
	document
}

// Every simple block as (track, timestamp)
fn block_order(document: &Document) -> Vec<(u64, i64)> {
	document
		.segment
		.clusters
		.iter()
		.flat_map(|cluster| {
			cluster.simple_blocks.iter().map(move |block| {
				(
					block.track_number,
					cluster.timecode as i64 + i64::from(block.timecode),
				)
			})
		})
		.collect()
}

fn write_all(writer: &mut BlockWriteCloser, frames: &[(i64, bool)]) {
	for &(timestamp, keyframe) in frames {
		writer.write(keyframe, timestamp, &[timestamp as u8]).unwrap();
	}
}

#[test_log::test]
fn written_streams_can_be_read_back() {
	let buffer = SharedBuffer::default();
	let mut writers =
		new_simple_block_writer(buffer.clone(), video_and_audio(), BlockWriterOptions::new())
			.unwrap();

	let mut audio = writers.pop().unwrap();
	let mut video = writers.pop().unwrap();
	assert_eq!((video.track_number(), audio.track_number()), (1, 2));

	video.write(true, 0, &[0x01]).unwrap();
	audio.write(true, 5, &[0x02]).unwrap();
	video.write(false, 40, &[0x03]).unwrap();
	audio.write(true, 45, &[0x04]).unwrap();

	let closing = thread::spawn(move || video.close());
	audio.close();
	closing.join().unwrap();

	let mut readers =
		new_simple_block_reader(Cursor::new(buffer.contents()), BlockReaderOptions::new()).unwrap();
	assert_eq!(readers.len(), 2);

	let mut audio = readers.pop().unwrap();
	let mut video = readers.pop().unwrap();
	assert_eq!(video.track_entry().codec_id, "V_VP8");
	assert_eq!(audio.track_entry().track_type, track_type::AUDIO);

	let video_frames = std::iter::from_fn(|| video.read().unwrap()).collect::<Vec<_>>();
	assert_eq!(
		video_frames,
		[
			Frame {
				track_number: 1,
				keyframe: true,
				timestamp: 0,
				data: vec![0x01],
			},
			Frame {
				track_number: 1,
				keyframe: false,
				timestamp: 40,
				data: vec![0x03],
			},
		]
	);

	let audio_frames = std::iter::from_fn(|| audio.read().unwrap())
		.map(|frame| (frame.timestamp, frame.data))
		.collect::<Vec<_>>();
	assert_eq!(audio_frames, [(5, vec![0x02]), (45, vec![0x04])]);
}

#[test_log::test]
fn clusters_follow_the_main_track() {
	let buffer = SharedBuffer::default();
	let options = BlockWriterOptions::new().main_track(1, 0x800);
	let mut writers = new_simple_block_writer(buffer.clone(), video_and_audio(), options).unwrap();

	let audio = writers.pop().unwrap();
	let mut video = writers.pop().unwrap();
	write_all(&mut video, &[(0, true), (1, false), (0x1000, false), (0x1001, true)]);

	drop(audio);
	video.close();

	let document = decode(&buffer.contents());
	let clusters = &document.segment.clusters;

	// Two clusters holding blocks, and the trailer
	assert_eq!(clusters.len(), 3);
	assert_eq!(clusters[0].simple_blocks.len(), 3);
	assert_eq!(clusters[1].timecode, 0x1001);
	assert_eq!(clusters[1].simple_blocks.len(), 1);
	assert!(clusters[1].simple_blocks[0].keyframe);
	assert!(clusters[2].simple_blocks.is_empty());

	assert_eq!(
		block_order(&document),
		[(1, 0), (1, 1), (1, 0x1000), (1, 0x1001)]
	);
}

#[test_log::test]
fn old_frames_are_reported() {
	let errors = Arc::new(Mutex::new(Vec::new()));
	let reported = Arc::clone(&errors);

	let buffer = SharedBuffer::default();
	let options = BlockWriterOptions::new().on_error(move |e| reported.lock().unwrap().push(e));
	let mut writers = new_simple_block_writer(buffer.clone(), video_and_audio(), options).unwrap();

	let mut audio = writers.pop().unwrap();
	let mut video = writers.pop().unwrap();
	video.write(true, 0x10000, &[0x01]).unwrap();
	// Too old for the cluster, but the write itself succeeds
	audio.write(true, 0x10000 - 0x7FFF, &[0x02]).unwrap();
	audio.write(true, 0x10000 - 0x7FFE, &[0x03]).unwrap();

	drop(video);
	audio.close();

	let errors = errors.lock().unwrap();
	assert_eq!(errors.len(), 1);
	assert!(matches!(errors[0].kind(), ErrorKind::IgnoreOldFrame));

	let document = decode(&buffer.contents());
	assert_eq!(block_order(&document), [(1, 0), (2, -0x7FFE)]);
}

#[test_log::test]
fn close_waits_for_every_track() {
	let buffer = SharedBuffer::default();
	let mut writers =
		new_simple_block_writer(buffer.clone(), video_and_audio(), BlockWriterOptions::new())
			.unwrap();

	let audio = writers.pop().unwrap();
	let video = writers.pop().unwrap();

	let (closed_tx, closed_rx) = flume::bounded(1);
	let closing = thread::spawn(move || {
		video.close();
		closed_tx.send(()).unwrap();
	});

	// The audio track is still open
	assert!(closed_rx.recv_timeout(Duration::from_millis(100)).is_err());

	audio.close();
	closed_rx.recv_timeout(Duration::from_secs(5)).unwrap();
	closing.join().unwrap();

	// Closing both writes the trailer
	assert_eq!(decode(&buffer.contents()).segment.clusters.len(), 1);
}

#[test_log::test]
fn writes_after_a_fatal_error_fail() {
	// Fails every write once `full` is set
	struct FailingSink(Arc<AtomicBool>);

	impl Write for FailingSink {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			if self.0.load(Ordering::SeqCst) {
				return Err(std::io::Error::other("sink is full"));
			}

			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	let full = Arc::new(AtomicBool::new(false));
	let fatal = Arc::new(Mutex::new(None));
	let reported = Arc::clone(&fatal);

	let options = BlockWriterOptions::new().on_fatal(move |e| *reported.lock().unwrap() = Some(e));
	let mut writers =
		new_simple_block_writer(FailingSink(Arc::clone(&full)), video_and_audio(), options)
			.unwrap();

	full.store(true, Ordering::SeqCst);

	// The first frame is taken by the writer thread, which then fails to write it
	let mut video = writers.remove(0);
	video.write(true, 0, &[0x01]).unwrap();

	let err = video.write(true, 1, &[0x02]).unwrap_err();
	assert!(matches!(err.kind(), ErrorKind::PipelineClosed));

	drop(writers);
	video.close();

	let fatal = fatal.lock().unwrap();
	assert!(fatal.as_ref().is_some_and(|e| e.is_io(std::io::ErrorKind::Other)));
}

#[test_log::test]
fn sorted_tracks() {
	let sorter = MultiTrackBlockSorter::new(SorterOptions {
		max_delayed_packets: 4,
		..SorterOptions::default()
	})
	.unwrap();

	let buffer = SharedBuffer::default();
	let options = BlockWriterOptions::new().interceptor(sorter);
	let writers = new_simple_block_writer(buffer.clone(), video_and_audio(), options).unwrap();

	let threads = writers
		.into_iter()
		.map(|mut writer| {
			thread::spawn(move || {
				let offset = (writer.track_number() as i64 - 1) * 10;
				let frames = (0..4).map(|i| (i * 20 + offset, true)).collect::<Vec<_>>();
				write_all(&mut writer, &frames);
				writer.close();
			})
		})
		.collect::<Vec<_>>();

	for thread in threads {
		thread.join().unwrap();
	}

	let document = decode(&buffer.contents());
	assert_eq!(
		block_order(&document),
		[
			(1, 0),
			(2, 10),
			(1, 20),
			(2, 30),
			(1, 40),
			(2, 50),
			(1, 60),
			(2, 70)
		]
	);
}

#[test_log::test]
fn seek_head_points_at_the_header_elements() {
	let buffer = SharedBuffer::default();
	let options = BlockWriterOptions::new().seek_head(true);
	let mut writers = new_simple_block_writer(buffer.clone(), video_and_audio(), options).unwrap();

	let last = writers.pop().unwrap();
	drop(writers);
	last.close();

	let stream = buffer.contents();

	let records = Arc::new(Mutex::new(Vec::<ElementRecord>::new()));
	let recorded = Arc::clone(&records);

	let mut document = Document::default();
	Unmarshaler::new(&stream[..], UnmarshalOptions::new())
		.with_hook(move |record: &ElementRecord| recorded.lock().unwrap().push(*record))
		.unmarshal(&mut document)
		.unwrap();

	let records = records.lock().unwrap();
	let position_of = |element| {
		records
			.iter()
			.find(|record| record.element == element)
			.unwrap()
			.position
	};

	let segment_data = records
		.iter()
		.find(|record| record.element == ElementType::Segment)
		.unwrap()
		.data_position();

	let seeks = &document.segment.seek_head.unwrap().seeks;
	assert_eq!(seeks.len(), 2);
	assert_eq!(seeks[0].seek_id, [0x15, 0x49, 0xA9, 0x66]);
	assert_eq!(seeks[0].seek_position, position_of(ElementType::Info) - segment_data);
	assert_eq!(seeks[1].seek_id, [0x16, 0x54, 0xAE, 0x6B]);
	assert_eq!(seeks[1].seek_position, position_of(ElementType::Tracks) - segment_data);
}

#[test_log::test]
fn truncated_streams_are_reported() {
	let buffer = SharedBuffer::default();
	let mut writers =
		new_simple_block_writer(buffer.clone(), video_and_audio(), BlockWriterOptions::new())
			.unwrap();

	let audio = writers.pop().unwrap();
	let mut video = writers.pop().unwrap();
	write_all(&mut video, &[(0, true), (10, false)]);
	drop(audio);
	video.close();

	// Cut the trailer's `Timecode` short
	let mut stream = buffer.contents();
	stream.pop();

	let fatal = Arc::new(Mutex::new(None));
	let reported = Arc::clone(&fatal);
	let options = BlockReaderOptions::new().on_fatal(move |e| *reported.lock().unwrap() = Some(e));

	let mut readers = new_simple_block_reader(Cursor::new(stream), options).unwrap();
	let mut video = readers.remove(0);

	let frames = std::iter::from_fn(|| video.read().unwrap()).count();
	assert_eq!(frames, 2);

	let fatal = fatal.lock().unwrap();
	assert!(
		fatal
			.as_ref()
			.is_some_and(|e| e.is_io(std::io::ErrorKind::UnexpectedEof))
	);
}

#[test_log::test]
fn streams_without_tracks() {
	let mut header = Vec::new();
	let document = EbmlHeader::webm();
	marshal(
		&FieldList::new().with(Tag::new(ElementType::EBML), &document),
		&mut header,
		MarshalOptions::new(),
	)
	.unwrap();

	let Err(err) = new_simple_block_reader(Cursor::new(header), BlockReaderOptions::new()) else {
		panic!("a stream without tracks should be rejected");
	};
	assert!(matches!(err.kind(), ErrorKind::InvalidTrack(_)));
}
