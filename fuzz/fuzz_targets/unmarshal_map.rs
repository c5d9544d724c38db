#![no_main]

use std::io::Cursor;

use ebml_mux::config::{ParsingMode, UnmarshalOptions};
use ebml_mux::ebml::{ElementMap, unmarshal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: Vec<u8>| {
	let mut map = ElementMap::new();
	let options = UnmarshalOptions::new().parsing_mode(ParsingMode::Relaxed);
	let _ = unmarshal(Cursor::new(data), &mut map, options);
});
