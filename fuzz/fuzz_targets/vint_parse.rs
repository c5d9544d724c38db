#![no_main]

use ebml_mux::ebml::{ElementId, VInt};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
	let _ = VInt::<u64>::parse(&mut &data[..], 8);
	let _ = VInt::<i64>::parse(&mut &data[..], 8);
	let _ = ElementId::parse(&mut &data[..], 4);
});
