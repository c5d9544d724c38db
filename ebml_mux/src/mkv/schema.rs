//! The Matroska/WebM structures used by the muxer
//!
//! These only cover what is needed to write and read a block stream. Anything else can be
//! read with an [`ElementMap`](crate::ebml::ElementMap).

use crate::Ebml;
use crate::ebml::Block;

/// The default [`Info::timecode_scale`], timestamps are in milliseconds
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// The `EBML` header
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct EbmlHeader {
	/// The EBML version used to write the stream
	#[ebml("EBMLVersion")]
	pub ebml_version: u64,
	/// The minimum EBML version needed to read the stream
	#[ebml("EBMLReadVersion")]
	pub ebml_read_version: u64,
	/// The longest element ID in the stream, in octets
	#[ebml("EBMLMaxIDLength")]
	pub ebml_max_id_length: u64,
	/// The longest element size in the stream, in octets
	#[ebml("EBMLMaxSizeLength")]
	pub ebml_max_size_length: u64,
	/// The document type, such as "webm" or "matroska"
	#[ebml("DocType")]
	pub doc_type: String,
	/// The version of the document type
	#[ebml("DocTypeVersion")]
	pub doc_type_version: u64,
	/// The minimum version of the document type needed to read the stream
	#[ebml("DocTypeReadVersion")]
	pub doc_type_read_version: u64,
}

impl EbmlHeader {
	/// The header of a WebM stream
	pub fn webm() -> Self {
		Self {
			ebml_version: 1,
			ebml_read_version: 1,
			ebml_max_id_length: 4,
			ebml_max_size_length: 8,
			doc_type: String::from("webm"),
			doc_type_version: 2,
			doc_type_read_version: 2,
		}
	}

	/// The header of a Matroska stream
	pub fn matroska() -> Self {
		Self {
			doc_type: String::from("matroska"),
			doc_type_version: 4,
			..Self::webm()
		}
	}
}

/// Segment information
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct Info {
	/// Nanoseconds per timecode unit
	#[ebml("TimecodeScale")]
	pub timecode_scale: u64,
	/// The library that wrote the stream
	#[ebml("MuxingApp")]
	pub muxing_app: String,
	/// The application that wrote the stream
	#[ebml("WritingApp")]
	pub writing_app: String,
	/// The duration of the segment, in timecode units
	#[ebml("Duration,omitempty")]
	pub duration: f64,
	/// A title for the segment
	#[ebml("Title,omitempty")]
	pub title: String,
	/// A random 128 bit ID
	#[ebml("SegmentUID,omitempty")]
	pub segment_uid: Vec<u8>,
}

impl Info {
	/// The info written when no other is specified
	pub fn new(app: &str) -> Self {
		Self {
			timecode_scale: DEFAULT_TIMECODE_SCALE,
			muxing_app: app.to_owned(),
			writing_app: app.to_owned(),
			..Self::default()
		}
	}
}

/// The `SeekHead` element
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct SeekHead {
	/// The indexed elements
	#[ebml("Seek")]
	pub seeks: Vec<Seek>,
}

/// A single `SeekHead` entry
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct Seek {
	/// The ID of the indexed element, as written in the stream
	#[ebml("SeekID")]
	pub seek_id: Vec<u8>,
	/// The position of the element, relative to the start of the segment data
	#[ebml("SeekPosition,size=8")]
	pub seek_position: u64,
}

/// Video settings of a track
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct Video {
	/// The interlacing mode, 0 is undetermined
	#[ebml("FlagInterlaced,omitempty")]
	pub flag_interlaced: u64,
	/// Width of the encoded frames
	#[ebml("PixelWidth")]
	pub pixel_width: u64,
	/// Height of the encoded frames
	#[ebml("PixelHeight")]
	pub pixel_height: u64,
	/// Width to display the frames at
	#[ebml("DisplayWidth,omitempty")]
	pub display_width: u64,
	/// Height to display the frames at
	#[ebml("DisplayHeight,omitempty")]
	pub display_height: u64,
}

/// Audio settings of a track
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct Audio {
	/// Sampling frequency in Hz
	#[ebml("SamplingFrequency")]
	pub sampling_frequency: f64,
	/// Output sampling frequency in Hz, for SBR codecs
	#[ebml("OutputSamplingFrequency,omitempty")]
	pub output_sampling_frequency: f64,
	/// Number of channels
	#[ebml("Channels")]
	pub channels: u64,
	/// Bits per sample
	#[ebml("BitDepth,omitempty")]
	pub bit_depth: u64,
}

/// Track types, see [`TrackEntry::track_type`]
pub mod track_type {
	/// A video track
	pub const VIDEO: u64 = 1;
	/// An audio track
	pub const AUDIO: u64 = 2;
	/// A subtitle track
	pub const SUBTITLE: u64 = 0x11;
}

/// A single track
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct TrackEntry {
	/// The number used by blocks of this track
	#[ebml("TrackNumber")]
	pub track_number: u64,
	/// A unique ID for the track
	#[ebml("TrackUID")]
	pub track_uid: u64,
	/// The kind of track, see [`track_type`]
	#[ebml("TrackType")]
	pub track_type: u64,
	/// Whether the track is eligible for automatic selection
	#[ebml("FlagDefault")]
	pub flag_default: Option<bool>,
	/// Nanoseconds per frame
	#[ebml("DefaultDuration,omitempty")]
	pub default_duration: u64,
	/// A human readable name
	#[ebml("Name,omitempty")]
	pub name: String,
	/// The track language
	#[ebml("Language,omitempty")]
	pub language: String,
	/// The codec, such as "V_VP8" or "A_OPUS"
	#[ebml("CodecID")]
	pub codec_id: String,
	/// Codec specific setup data
	#[ebml("CodecPrivate,omitempty")]
	pub codec_private: Vec<u8>,
	/// Codec built-in delay, in nanoseconds
	#[ebml("CodecDelay,omitempty")]
	pub codec_delay: u64,
	/// Pre-roll needed after a seek, in nanoseconds
	#[ebml("SeekPreRoll,omitempty")]
	pub seek_pre_roll: u64,
	/// Video settings
	#[ebml("Video")]
	pub video: Option<Video>,
	/// Audio settings
	#[ebml("Audio")]
	pub audio: Option<Audio>,
}

impl TrackEntry {
	/// Create a track with a number, UID, type, and codec
	///
	/// The UID is the track number.
	pub fn new(track_number: u64, track_type: u64, codec_id: &str) -> Self {
		Self {
			track_number,
			track_uid: track_number,
			track_type,
			codec_id: codec_id.to_owned(),
			..Self::default()
		}
	}
}

/// The `Tracks` element
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct Tracks {
	/// Every track in the segment
	#[ebml("TrackEntry")]
	pub track_entries: Vec<TrackEntry>,
}

/// A block with extra information
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockGroup {
	/// The block
	#[ebml("Block")]
	pub block: Block,
	/// The duration of the block, in timecode units
	#[ebml("BlockDuration,omitempty")]
	pub block_duration: u64,
	/// How important the block is for decoding the track
	#[ebml("ReferencePriority,omitempty")]
	pub reference_priority: u64,
	/// Timestamps of the blocks this block depends on, relative to this block
	#[ebml("ReferenceBlock")]
	pub reference_blocks: Vec<i64>,
}

/// A group of blocks sharing a timecode origin
#[derive(Ebml, Clone, Debug, Default, PartialEq, Eq)]
pub struct Cluster {
	/// The origin of the block timecodes, relative to the segment
	#[ebml("Timecode")]
	pub timecode: u64,
	/// The size of the previous cluster, in bytes
	#[ebml("PrevSize,omitempty")]
	pub prev_size: u64,
	/// Simple blocks
	#[ebml("SimpleBlock")]
	pub simple_blocks: Vec<Block>,
	/// Block groups
	#[ebml("BlockGroup")]
	pub block_groups: Vec<BlockGroup>,
}

/// The `Segment` element
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct Segment {
	/// The seek index
	#[ebml("SeekHead")]
	pub seek_head: Option<SeekHead>,
	/// Segment information
	#[ebml("Info")]
	pub info: Info,
	/// The tracks
	#[ebml("Tracks")]
	pub tracks: Tracks,
	/// The media data
	#[ebml("Cluster")]
	pub clusters: Vec<Cluster>,
}

/// A complete document, small enough to be held in memory
#[derive(Ebml, Clone, Debug, Default, PartialEq)]
pub struct Document {
	/// The EBML header
	#[ebml("EBML")]
	pub header: EbmlHeader,
	/// The segment
	#[ebml("Segment")]
	pub segment: Segment,
}
