//! An EBML codec and a streaming Matroska/WebM block muxer.
//!
//! The crate has two layers:
//!
//! * [`ebml`] - Encoding and decoding of EBML elements, including block lacing
//! * [`mkv`] - Pipelines that write blocks from several tracks into a single stream, and read
//!   them back
//!
//! # Examples
//!
//! ## Writing and reading a stream
//!
//! ```rust
//! # fn main() -> ebml_mux::error::Result<()> {
//! use ebml_mux::mkv::{
//! 	BlockReader, BlockReaderOptions, BlockWriter, BlockWriterOptions, Frame, TrackDescription,
//! 	TrackEntry, new_simple_block_reader, new_simple_block_writer, track_type,
//! };
//! use std::io::Cursor;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, Default)]
//! struct SharedBuffer(Arc<Mutex<Vec<u8>>>);
//!
//! impl std::io::Write for SharedBuffer {
//! 	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
//! 		self.0.lock().unwrap().extend_from_slice(buf);
//! 		Ok(buf.len())
//! 	}
//!
//! 	fn flush(&mut self) -> std::io::Result<()> {
//! 		Ok(())
//! 	}
//! }
//!
//! let buffer = SharedBuffer::default();
//! let track = TrackDescription::from(TrackEntry::new(1, track_type::VIDEO, "V_VP8"));
//!
//! let mut writers = new_simple_block_writer(
//! 	buffer.clone(),
//! 	vec![track],
//! 	BlockWriterOptions::new(),
//! )?;
//!
//! let mut writer = writers.remove(0);
//! writer.write(true, 0, &[0xDE, 0xAD])?;
//! writer.write(false, 33, &[0xBE, 0xEF])?;
//! writer.close();
//!
//! let encoded = buffer.0.lock().unwrap().clone();
//! let mut readers = new_simple_block_reader(Cursor::new(encoded), BlockReaderOptions::new())?;
//!
//! let mut reader = readers.remove(0);
//! assert_eq!(reader.track_entry().codec_id, "V_VP8");
//!
//! let Frame { data, timestamp, keyframe, .. } = reader.read()?.unwrap();
//! assert_eq!((data, timestamp, keyframe), (vec![0xDE, 0xAD], 0, true));
//!
//! let second = reader.read()?.unwrap();
//! assert_eq!(second.timestamp, 33);
//! assert_eq!(reader.read()?, None);
//! # Ok(()) }
//! ```
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

// proc macro hacks
extern crate self as ebml_mux;

pub mod config;
pub mod ebml;
pub mod error;
pub(crate) mod macros;
pub mod mkv;
mod util;

pub use ebml_mux_attr::Ebml;
