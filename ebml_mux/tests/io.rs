#![allow(missing_docs)]

use ebml_mux::config::{MarshalOptions, ParsingMode, UnmarshalOptions};
use ebml_mux::mkv::schema::{Audio, EbmlHeader, Info};
use ebml_mux::mkv::{
	BlockReader, BlockReaderOptions, BlockWriter, BlockWriterOptions, TrackEntry,
	new_simple_block_reader, new_simple_block_writer, track_type,
};

use std::io::{Read, Seek};

#[test_log::test]
fn stream_to_file() {
	let mut file = tempfile::tempfile().unwrap();

	let mut track = TrackEntry::new(1, track_type::AUDIO, "A_OPUS");
	track.audio = Some(Audio {
		sampling_frequency: 48000.0,
		channels: 2,
		..Audio::default()
	});

	let mut info = Info::new("io test");
	info.title = String::from("Tone");

	let options = BlockWriterOptions::new()
		.ebml_header(EbmlHeader::matroska())
		.segment_info(info)
		.seek_head(true)
		.marshal_options(MarshalOptions::new().size_length(Some(8)));
	let mut writers =
		new_simple_block_writer(file.try_clone().unwrap(), vec![track.clone().into()], options)
			.unwrap();

	let mut writer = writers.remove(0);
	for timestamp in 0..100 {
		writer.write(true, timestamp * 20, &[timestamp as u8; 32]).unwrap();
	}
	writer.close();

	file.rewind().unwrap();
	let mut contents = Vec::new();
	file.read_to_end(&mut contents).unwrap();
	assert_eq!(&contents[..4], [0x1A, 0x45, 0xDF, 0xA3]);

	file.rewind().unwrap();
	let options = BlockReaderOptions::new()
		.unmarshal_options(UnmarshalOptions::new().parsing_mode(ParsingMode::Strict));
	let mut readers = new_simple_block_reader(file, options).unwrap();

	let mut reader = readers.remove(0);
	assert_eq!(reader.track_entry(), &track);

	let mut count = 0;
	while let Some(frame) = reader.read().unwrap() {
		assert_eq!(frame.timestamp, count * 20);
		assert_eq!(frame.data, [count as u8; 32]);
		count += 1;
	}

	assert_eq!(count, 100);
}
