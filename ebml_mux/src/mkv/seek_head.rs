use crate::config::MarshalOptions;
use crate::ebml::{ElementRecord, ElementType, Marshaler, Tagged};
use crate::error::Result;
use crate::mkv::schema::{Seek, SeekHead};

use std::io;

/// The top-level elements indexed in a stream header
pub(crate) const INDEXED_ELEMENTS: [ElementType; 2] = [ElementType::Info, ElementType::Tracks];

/// A `SeekHead` for `INDEXED_ELEMENTS` with every position zeroed
///
/// `SeekPosition` is always 8 octets, so filling in the positions doesn't change its size.
pub(crate) fn placeholder() -> Result<SeekHead> {
	let seeks = INDEXED_ELEMENTS
		.iter()
		.map(|element| {
			Ok(Seek {
				seek_id: element.id().as_bytes(None)?,
				seek_position: 0,
			})
		})
		.collect::<Result<Vec<_>>>()?;

	Ok(SeekHead { seeks })
}

/// Encode `document` without writing it anywhere, keeping the element positions
pub(crate) fn dry_run(
	document: &dyn Tagged,
	options: MarshalOptions,
) -> Result<Vec<ElementRecord>> {
	let mut records = Vec::new();
	let mut hook = |record: &ElementRecord| records.push(*record);

	Marshaler::new(options)
		.with_hook(&mut hook)
		.marshal(document, io::sink())?;

	Ok(records)
}

/// Fill in the positions of `seek_head` from the records of a dry run
///
/// Positions are relative to the start of the first `Segment`'s data.
pub(crate) fn fill(seek_head: &mut SeekHead, records: &[ElementRecord]) {
	let Some(segment_data) = records
		.iter()
		.find(|record| record.element == ElementType::Segment)
		.map(ElementRecord::data_position)
	else {
		log::warn!("Stream header has no segment, leaving the seek head empty");
		return;
	};

	for seek in &mut seek_head.seeks {
		let Some(record) = records.iter().find(|record| {
			record.position >= segment_data
				&& record
					.element
					.id()
					.as_bytes(None)
					.is_ok_and(|id| id == seek.seek_id)
		}) else {
			log::warn!("Seek entry {:02X?} doesn't match any element", seek.seek_id);
			continue;
		};

		seek.seek_position = record.position - segment_data;
		log::debug!(
			"{} is at offset {} in the segment",
			record.element.name(),
			seek.seek_position
		);
	}
}
