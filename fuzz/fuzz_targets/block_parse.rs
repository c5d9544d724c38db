#![no_main]

use ebml_mux::ebml::Block;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
	let _ = Block::parse(data);
});
