//! Streaming Matroska/WebM block pipelines
//!
//! [`new_simple_block_writer`] hands out a [`BlockWriteCloser`] per track. Frames written to
//! any of them end up, in arrival order, as `SimpleBlock`s in a single stream. Clusters are
//! started as needed, and the stream is finished once every handle is closed.
//!
//! An optional [`BlockInterceptor`] sits between the handles and the stream, such as the
//! [`MultiTrackBlockSorter`] which orders the frames of every track by timestamp.
//!
//! [`new_simple_block_reader`] does the reverse, reading the stream header and handing out a
//! [`BlockReadCloserWithTrackEntry`] per track.

mod frame;
mod interceptor;
mod reader;
pub mod schema;
mod seek_head;
mod writer;

pub use frame::{BlockReader, BlockWriter, FilterReader, FilterWriter, Frame};
pub use interceptor::{
	BlockInterceptor, BlockSorterRule, FrameSorter, MultiTrackBlockSorter, SorterOptions,
};
pub use reader::{BlockReadCloserWithTrackEntry, BlockReaderOptions, new_simple_block_reader};
pub use schema::{EbmlHeader, Info, TrackEntry, track_type};
pub use writer::{
	BlockWriteCloser, BlockWriterOptions, ErrorHandler, TrackDescription, new_simple_block_writer,
};
