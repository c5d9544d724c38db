#![no_main]

use std::io::Cursor;

use ebml_mux::mkv::{BlockReader, BlockReaderOptions, new_simple_block_reader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: Vec<u8>| {
	// Only one track is read, dropping the others keeps the reader from waiting on them
	let readers = new_simple_block_reader(Cursor::new(data), BlockReaderOptions::new());
	if let Ok(Some(mut reader)) = readers.map(|readers| readers.into_iter().next()) {
		while let Ok(Some(_)) = reader.read() {}
	}
});
