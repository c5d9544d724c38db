#![no_main]

use ebml_mux::ebml::LacingMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
	for mode in [LacingMode::Xiph, LacingMode::Fixed, LacingMode::Ebml] {
		let _ = mode.read_frames(data);
	}
});
