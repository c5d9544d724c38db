//! The element schema
//!
//! Every element the codec understands is declared in the table below. IDs are resolved
//! through a trie keyed on the raw ID octets, which is built once on first use.

use crate::ebml::ElementId;

use std::sync::OnceLock;

/// The type of data an element holds
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ElementDataType {
	/// A big-endian two's complement integer of 0-8 octets
	SignedInt,
	/// A big-endian integer of 0-8 octets
	UnsignedInt,
	/// An IEEE 754 float of 0, 4, or 8 octets
	Float,
	/// A printable ASCII string, optionally NUL padded
	String,
	/// A UTF-8 string, optionally NUL padded
	Utf8,
	/// Nanoseconds since 2001-01-01T00:00:00 UTC, as a signed 8 octet integer
	Date,
	/// An element containing other elements
	Master,
	/// Opaque bytes
	Binary,
	/// A Matroska `Block` or `SimpleBlock`
	Block,
}

// To define an element, use the following syntax:
//
// ElementName: { 0x1234, DataType },
//
// Level 1 elements get an additional `top` flag:
//
// ElementName: { 0x1234_5678, Master, top },
//
// A top-level element found inside of an unknown-sized top-level element ends it.
ebml_mux_attr::ebml_elements! {
	// EBML header
	EBML: { 0x1A45_DFA3, Master },
	EBMLVersion: { 0x4286, UnsignedInt },
	EBMLReadVersion: { 0x42F7, UnsignedInt },
	EBMLMaxIDLength: { 0x42F2, UnsignedInt },
	EBMLMaxSizeLength: { 0x42F3, UnsignedInt },
	DocType: { 0x4282, String },
	DocTypeVersion: { 0x4287, UnsignedInt },
	DocTypeReadVersion: { 0x4285, UnsignedInt },
	DocTypeExtension: { 0x4281, Master },
	DocTypeExtensionName: { 0x4283, String },
	DocTypeExtensionVersion: { 0x4284, UnsignedInt },

	// Global elements
	Void: { 0xEC, Binary },
	CRC32: { 0xBF, Binary },

	// The root element that contains all other top-level elements
	Segment: { 0x1853_8067, Master },

	// segment.seekHead
	SeekHead: { 0x114D_9B74, Master, top },
	Seek: { 0x4DBB, Master },
	SeekID: { 0x53AB, Binary },
	SeekPosition: { 0x53AC, UnsignedInt },

	// segment.info
	Info: { 0x1549_A966, Master, top },
	TimecodeScale: { 0x2AD7_B1, UnsignedInt },
	MuxingApp: { 0x4D80, Utf8 },
	WritingApp: { 0x5741, Utf8 },
	Duration: { 0x4489, Float },
	DateUTC: { 0x4461, Date },
	Title: { 0x7BA9, Utf8 },
	SegmentUID: { 0x73A4, Binary },

	// segment.cluster
	Cluster: { 0x1F43_B675, Master, top },
	Timecode: { 0xE7, UnsignedInt },
	PrevSize: { 0xAB, UnsignedInt },
	Position: { 0xA7, UnsignedInt },
	SimpleBlock: { 0xA3, Block },
	BlockGroup: { 0xA0, Master },
	Block: { 0xA1, Block },
	BlockDuration: { 0x9B, UnsignedInt },
	ReferencePriority: { 0xFA, UnsignedInt },
	ReferenceBlock: { 0xFB, SignedInt },
	DiscardPadding: { 0x75A2, SignedInt },

	// segment.tracks
	Tracks: { 0x1654_AE6B, Master, top },
	TrackEntry: { 0xAE, Master },
	TrackNumber: { 0xD7, UnsignedInt },
	TrackUID: { 0x73C5, UnsignedInt },
	TrackType: { 0x83, UnsignedInt },
	FlagEnabled: { 0xB9, UnsignedInt },
	FlagDefault: { 0x88, UnsignedInt },
	FlagForced: { 0x55AA, UnsignedInt },
	FlagLacing: { 0x9C, UnsignedInt },
	DefaultDuration: { 0x23_E383, UnsignedInt },
	Name: { 0x536E, Utf8 },
	Language: { 0x22_B59C, String },
	CodecID: { 0x86, String },
	CodecPrivate: { 0x63A2, Binary },
	CodecName: { 0x25_8688, Utf8 },
	CodecDelay: { 0x56AA, UnsignedInt },
	SeekPreRoll: { 0x56BB, UnsignedInt },

	// segment.tracks.trackEntry.video
	Video: { 0xE0, Master },
	FlagInterlaced: { 0x9A, UnsignedInt },
	PixelWidth: { 0xB0, UnsignedInt },
	PixelHeight: { 0xBA, UnsignedInt },
	DisplayWidth: { 0x54B0, UnsignedInt },
	DisplayHeight: { 0x54BA, UnsignedInt },
	DisplayUnit: { 0x54B2, UnsignedInt },

	// segment.tracks.trackEntry.audio
	Audio: { 0xE1, Master },
	SamplingFrequency: { 0xB5, Float },
	OutputSamplingFrequency: { 0x78B5, Float },
	Channels: { 0x9F, UnsignedInt },
	BitDepth: { 0x6264, UnsignedInt },

	// segment.cues
	Cues: { 0x1C53_BB6B, Master, top },
	CuePoint: { 0xBB, Master },
	CueTime: { 0xB3, UnsignedInt },
	CueTrackPositions: { 0xB7, Master },
	CueTrack: { 0xF7, UnsignedInt },
	CueClusterPosition: { 0xF1, UnsignedInt },
	CueRelativePosition: { 0xF0, UnsignedInt },

	// Top-level elements the muxer never produces, they only need to be recognized
	Tags: { 0x1254_C367, Master, top },
	Chapters: { 0x1043_A770, Master, top },
	Attachments: { 0x1941_A469, Master, top },
}

/// Everything the schema knows about an element
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ElementDescriptor {
	/// The element
	pub element_type: ElementType,
	/// The element's ID
	pub id: ElementId,
	/// The type of data the element holds
	pub data_type: ElementDataType,
	/// Whether the element is a top-level (level 1) element
	pub top_level: bool,
}

impl ElementType {
	/// Get the [`ElementDescriptor`] for this element
	pub fn descriptor(self) -> ElementDescriptor {
		ElementDescriptor {
			element_type: self,
			id: self.id(),
			data_type: self.data_type(),
			top_level: self.is_top_level(),
		}
	}
}

#[derive(Default)]
struct TrieNode {
	// Sorted by octet
	children: Vec<(u8, u32)>,
	element: Option<ElementType>,
}

/// An arena trie over the raw ID octets of every element in the schema
pub(crate) struct ElementTrie {
	nodes: Vec<TrieNode>,
}

/// A position in the [`ElementTrie`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct TrieCursor(u32);

impl ElementTrie {
	fn build() -> Self {
		let mut trie = Self {
			nodes: vec![TrieNode::default()],
		};

		for element in ElementType::ALL {
			let id = element.id();
			let octets = &id.value().to_be_bytes()[8 - usize::from(id.octet_length())..];

			let mut node = 0;
			for octet in octets {
				node = match trie.nodes[node as usize]
					.children
					.binary_search_by_key(octet, |(o, _)| *o)
				{
					Ok(pos) => trie.nodes[node as usize].children[pos].1,
					Err(pos) => {
						let next = trie.nodes.len() as u32;
						trie.nodes.push(TrieNode::default());
						trie.nodes[node as usize].children.insert(pos, (*octet, next));
						next
					},
				};
			}

			trie.nodes[node as usize].element = Some(*element);
		}

		log::trace!("Built element trie with {} nodes", trie.nodes.len());
		trie
	}

	/// The shared trie, built on first use
	pub(crate) fn get() -> &'static Self {
		static INSTANCE: OnceLock<ElementTrie> = OnceLock::new();
		INSTANCE.get_or_init(Self::build)
	}

	pub(crate) fn root(&self) -> TrieCursor {
		TrieCursor(0)
	}

	/// Descend one octet, returning `None` if no element ID continues with it
	pub(crate) fn step(&self, cursor: TrieCursor, octet: u8) -> Option<TrieCursor> {
		let children = &self.nodes[cursor.0 as usize].children;
		children
			.binary_search_by_key(&octet, |(o, _)| *o)
			.ok()
			.map(|pos| TrieCursor(children[pos].1))
	}

	/// The element that ends at `cursor`, if any
	pub(crate) fn element(&self, cursor: TrieCursor) -> Option<ElementType> {
		self.nodes[cursor.0 as usize].element
	}
}

/// Look up an element from its raw ID octets (length marker included)
///
/// # Examples
///
/// ```rust
/// use ebml_mux::ebml::{ElementType, schema};
///
/// let descriptor = schema::lookup(&[0x1F, 0x43, 0xB6, 0x75]).unwrap();
/// assert_eq!(descriptor.element_type, ElementType::Cluster);
/// assert!(descriptor.top_level);
///
/// // A valid prefix is not an element
/// assert!(schema::lookup(&[0x1F, 0x43]).is_none());
/// ```
pub fn lookup(id_octets: &[u8]) -> Option<ElementDescriptor> {
	let trie = ElementTrie::get();

	let mut cursor = trie.root();
	for octet in id_octets {
		cursor = trie.step(cursor, *octet)?;
	}

	trie.element(cursor).map(ElementType::descriptor)
}

/// Look up an element by its [`ElementId`]
pub fn lookup_id(id: ElementId) -> Option<ElementDescriptor> {
	lookup(&id.value().to_be_bytes()[8 - usize::from(id.octet_length())..])
}

#[cfg(test)]
mod tests {
	use super::{ElementDataType, ElementType, lookup, lookup_id};
	use crate::ebml::ElementId;

	#[test_log::test]
	fn every_element_is_reachable() {
		for element in ElementType::ALL {
			let descriptor = lookup_id(element.id()).unwrap();
			assert_eq!(descriptor.element_type, *element);
			assert_eq!(ElementType::from_name(element.name()), Some(*element));
		}
	}

	#[test_log::test]
	fn lookups() {
		let info = lookup(&[0x15, 0x49, 0xA9, 0x66]).unwrap();
		assert_eq!(info.element_type, ElementType::Info);
		assert_eq!(info.data_type, ElementDataType::Master);
		assert!(info.top_level);

		let simple_block = lookup(&[0xA3]).unwrap();
		assert_eq!(simple_block.data_type, ElementDataType::Block);
		assert!(!simple_block.top_level);

		assert!(!ElementType::EBML.is_top_level());
		assert!(!ElementType::Segment.is_top_level());

		assert!(lookup(&[0x80]).is_none());
		assert!(lookup(&[]).is_none());
		assert!(lookup_id(ElementId::try_from(0x4001).unwrap()).is_none());
	}

	#[test_log::test]
	fn names() {
		assert_eq!(ElementType::TimecodeScale.name(), "TimecodeScale");
		assert_eq!(ElementType::from_name("CodecID"), Some(ElementType::CodecID));
		assert_eq!(ElementType::from_name("codecid"), None);
	}
}
