use crate::config::UnmarshalOptions;
use crate::ebml::element_reader::{ElementHeader, ElementReader};
use crate::ebml::marshal::MAX_DEPTH;
use crate::ebml::{ElementDataType, ElementMap, ElementRecord, ElementType, Tagged};
use crate::error::{Result, ResultExt};
use crate::macros::{err, parse_mode_choice};

use std::io::{self, Read};

/// How an unmarshal call ended
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
	/// The stream ended between elements
	Finished,
	/// An element tagged with `stop` was read
	///
	/// The stream is left positioned right after that element, so reading can continue with
	/// another call to [`Unmarshaler::unmarshal`].
	Stopped,
}

// Why a master element stopped reading children
enum MasterEnd {
	// The stream ended
	Eof,
	// A bounded master was fully read
	Exhausted,
	// A `stop` tagged field was read
	Stopped,
	// A top-level element ended an unknown-sized top-level master, the parent reads it instead
	Handoff(ElementHeader),
}

/// Decodes elements into [`Tagged`] values
///
/// An `Unmarshaler` keeps its position between calls, which allows reading a stream in stages.
///
/// # Examples
///
/// ```rust
/// use ebml_mux::config::{MarshalOptions, UnmarshalOptions};
/// use ebml_mux::ebml::{ElementMap, ElementType, ReadOutcome, Unmarshaler, Value, marshal};
/// use ebml_mux::Ebml;
///
/// #[derive(Ebml, Default)]
/// struct Head {
/// 	#[ebml("Info,stop")]
/// 	info: ElementMap,
/// }
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let mut document = ElementMap::new();
/// document.push(ElementType::Info, Value::Master(ElementMap::new()));
/// document.push(ElementType::Void, Value::Binary(vec![0; 4]));
///
/// let mut encoded = Vec::new();
/// marshal(&document, &mut encoded, MarshalOptions::default())?;
///
/// let mut unmarshaler = Unmarshaler::new(&encoded[..], UnmarshalOptions::default());
///
/// let mut head = Head::default();
/// assert_eq!(unmarshaler.unmarshal(&mut head)?, ReadOutcome::Stopped);
///
/// let mut rest = ElementMap::new();
/// assert_eq!(unmarshaler.unmarshal(&mut rest)?, ReadOutcome::Finished);
/// assert_eq!(rest.get(ElementType::Void), Some(&Value::Binary(vec![0; 4])));
/// # Ok(()) }
/// ```
pub struct Unmarshaler<'h, R> {
	reader: ElementReader<R>,
	options: UnmarshalOptions,
	hook: Option<Box<dyn FnMut(&ElementRecord) + Send + 'h>>,
}

impl<'h, R> Unmarshaler<'h, R>
where
	R: Read,
{
	/// Create a new `Unmarshaler`
	pub fn new(reader: R, options: UnmarshalOptions) -> Self {
		Self {
			reader: ElementReader::new(reader, options),
			options,
			hook: None,
		}
	}

	/// Report every element read
	///
	/// The hook is called as each element header is read, including elements that end up
	/// being skipped. It cannot influence the decoding.
	pub fn with_hook<F>(mut self, hook: F) -> Self
	where
		F: FnMut(&ElementRecord) + Send + 'h,
	{
		self.hook = Some(Box::new(hook));
		self
	}

	/// The number of bytes read so far
	pub fn position(&self) -> u64 {
		self.reader.position()
	}

	/// Get the inner reader back
	pub fn into_inner(self) -> R {
		self.reader.into_inner()
	}

	/// Read elements into `target` until the stream ends, or a `stop` tagged element is read
	///
	/// # Errors
	///
	/// * The stream is malformed
	/// * An element is not in the schema, depending on the [`ParsingMode`](crate::config::ParsingMode)
	/// * An element has no field in `target`, with [`ParsingMode::Strict`](crate::config::ParsingMode::Strict)
	/// * A value can't be stored in its field
	/// * The reader fails
	pub fn unmarshal(&mut self, target: &mut dyn Tagged) -> Result<ReadOutcome> {
		match self.read_master(target, None, false, 0)? {
			MasterEnd::Stopped => Ok(ReadOutcome::Stopped),
			_ => Ok(ReadOutcome::Finished),
		}
	}

	fn read_master(
		&mut self,
		target: &mut dyn Tagged,
		end: Option<u64>,
		unknown_top_level: bool,
		depth: usize,
	) -> Result<MasterEnd> {
		if depth > MAX_DEPTH {
			err!(MaxDepthExceeded);
		}

		let parsing_mode = self.options.parsing_mode;

		let mut pending = None;
		loop {
			if end.is_some_and(|end| self.reader.position() >= end) {
				return Ok(MasterEnd::Exhausted);
			}

			let header = match pending.take() {
				Some(header) => header,
				None => match self.reader.read_header()? {
					Some(header) => header,
					None if end.is_some() => {
						return Err(io::Error::new(
							io::ErrorKind::UnexpectedEof,
							"Stream ended inside of a master element",
						)
						.into());
					},
					None => return Ok(MasterEnd::Eof),
				},
			};

			let data_end = if header.size.is_unknown() {
				None
			} else {
				Some(self.reader.position() + header.size.value())
			};

			if let (Some(end), Some(data_end)) = (end, data_end) {
				if data_end > end {
					log::debug!(
						"Element {:#X} ends at {}, past the end of its parent ({})",
						header.id,
						data_end,
						end
					);
					err!(SizeMismatch);
				}
			}

			let Some(element) = header.element else {
				parse_mode_choice!(
					parsing_mode,
					RELAXED: {
						log::debug!("Encountered unknown EBML element: {:X}, skipping", header.id);
						let Some(data_end) = data_end else {
							err!(SizeMismatch)
						};

						self.reader.skip(data_end - self.reader.position())?;
						continue;
					},
					DEFAULT: err!(UnknownElement(header.id))
				);
			};

			if unknown_top_level && element.is_top_level() {
				log::trace!("{} ends the current top-level element", element.name());
				return Ok(MasterEnd::Handoff(header));
			}

			if let Some(hook) = self.hook.as_mut() {
				hook(&ElementRecord {
					element,
					position: self.reader.position() - header.header_len,
					header_len: header.header_len,
					size: data_end.map(|_| header.size.value()),
				});
			}

			let Some((tag, field)) = target.tagged_field_mut(element) else {
				parse_mode_choice!(
					parsing_mode,
					STRICT: err!(UnassignableElement(element)),
					DEFAULT: {}
				);

				log::trace!("No field for {}, skipping", element.name());
				pending = self.skip_element(element, data_end, end, depth)?;
				continue;
			};

			if element.data_type() == ElementDataType::Master {
				let Some(child) = field.master_mut() else {
					err!(IncompatibleType("master"));
				};

				let child_end = data_end.or(end);
				let child_unknown_top_level = data_end.is_none() && element.is_top_level();
				let child_result = self
					.read_master(child, child_end, child_unknown_top_level, depth + 1)
					.context(|| format!("reading {}", element.name()))?;

				if let MasterEnd::Stopped = child_result {
					return Ok(MasterEnd::Stopped);
				}

				child.end_master()?;

				if tag.stop {
					log::debug!("Stopping after {}", element.name());
					return Ok(MasterEnd::Stopped);
				}

				match child_result {
					MasterEnd::Eof => return Ok(MasterEnd::Eof),
					MasterEnd::Handoff(header) => pending = Some(header),
					_ => {},
				}

				continue;
			}

			let Some(data_end) = data_end else {
				log::debug!("Only master elements can have an unknown size ({})", element.name());
				err!(SizeMismatch)
			};

			let value = self
				.reader
				.read_value(element.data_type(), data_end - self.reader.position())
				.context(|| format!("reading {}", element.name()))?;
			field
				.assign(value)
				.context(|| format!("assigning {}", element.name()))?;

			if tag.stop {
				log::debug!("Stopping after {}", element.name());
				return Ok(MasterEnd::Stopped);
			}
		}
	}

	// Skip a known element, returning a header that the caller has to read next
	fn skip_element(
		&mut self,
		element: ElementType,
		data_end: Option<u64>,
		end: Option<u64>,
		depth: usize,
	) -> Result<Option<ElementHeader>> {
		if let Some(data_end) = data_end {
			self.reader.skip(data_end - self.reader.position())?;
			return Ok(None);
		}

		if element.data_type() != ElementDataType::Master {
			err!(SizeMismatch)
		}

		// The only way to find the end of an unknown-sized element is to parse it
		let mut discard = ElementMap::new();
		match self.read_master(&mut discard, end, element.is_top_level(), depth + 1)? {
			MasterEnd::Handoff(header) => Ok(Some(header)),
			_ => Ok(None),
		}
	}
}

/// Read elements from `reader` into `target`
///
/// See [`Unmarshaler::unmarshal`].
///
/// # Errors
///
/// See [`Unmarshaler::unmarshal`]
pub fn unmarshal<R>(
	reader: R,
	target: &mut dyn Tagged,
	options: UnmarshalOptions,
) -> Result<ReadOutcome>
where
	R: Read,
{
	Unmarshaler::new(reader, options).unmarshal(target)
}

#[cfg(test)]
mod tests {
	use super::{ReadOutcome, Unmarshaler, unmarshal};
	use crate::Ebml;
	use crate::config::{ParsingMode, UnmarshalOptions};
	use crate::ebml::{ElementMap, ElementRecord, ElementType, Value};
	use crate::error::ErrorKind;

	use std::sync::{Arc, Mutex};

	#[derive(Ebml, Default, Debug, PartialEq)]
	struct ClusterHead {
		#[ebml("Timecode")]
		timecode: u64,
	}

	#[derive(Ebml, Default, Debug, PartialEq)]
	struct Clusters {
		#[ebml("Cluster")]
		clusters: Vec<ClusterHead>,
	}

	const CLUSTER: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];

	fn options(parsing_mode: ParsingMode) -> UnmarshalOptions {
		UnmarshalOptions::new().parsing_mode(parsing_mode)
	}

	#[test_log::test]
	fn unknown_elements() {
		// 0x4001 is well formed, but not in the schema
		let data = [0x40, 0x01, 0x82, 0x00, 0x00, 0xE7, 0x81, 0x07];

		for mode in [ParsingMode::Strict, ParsingMode::BestAttempt] {
			let err = unmarshal(&data[..], &mut ElementMap::new(), options(mode)).unwrap_err();
			assert!(matches!(err.kind(), ErrorKind::UnknownElement(id) if *id == 0x4001));
		}

		let mut map = ElementMap::new();
		let outcome = unmarshal(&data[..], &mut map, options(ParsingMode::Relaxed)).unwrap();
		assert_eq!(outcome, ReadOutcome::Finished);
		assert_eq!(map.get(ElementType::Timecode), Some(&Value::Uint(7)));
		assert_eq!(map.len(), 1);
	}

	#[test_log::test]
	fn elements_without_a_field() {
		let mut data = CLUSTER.to_vec();
		data.extend([0x86, 0xAB, 0x81, 0x09, 0xE7, 0x81, 0x05]);

		let err = unmarshal(
			&data[..],
			&mut Clusters::default(),
			options(ParsingMode::Strict),
		)
		.unwrap_err();
		assert!(matches!(
			err.root().kind(),
			ErrorKind::UnassignableElement(ElementType::PrevSize)
		));
		assert_eq!(
			err.to_string(),
			"reading Cluster: Element `PrevSize` has no matching field in the destination"
		);

		for mode in [ParsingMode::BestAttempt, ParsingMode::Relaxed] {
			let mut clusters = Clusters::default();
			unmarshal(&data[..], &mut clusters, options(mode)).unwrap();
			assert_eq!(clusters.clusters, [ClusterHead { timecode: 5 }]);
		}
	}

	#[test_log::test]
	fn top_level_elements_end_unknown_sized_ones() {
		let mut data = Vec::new();
		for timecode in [1, 2] {
			data.extend(CLUSTER);
			data.push(0xFF);
			data.extend([0xE7, 0x81, timecode]);
			// Void, not tracked by `ClusterHead`
			data.extend([0xEC, 0x81, 0x00]);
		}

		let mut clusters = Clusters::default();
		let outcome = unmarshal(&data[..], &mut clusters, UnmarshalOptions::new()).unwrap();
		assert_eq!(outcome, ReadOutcome::Finished);
		assert_eq!(
			clusters.clusters,
			[ClusterHead { timecode: 1 }, ClusterHead { timecode: 2 }]
		);
	}

	#[test_log::test]
	fn children_cannot_overrun_their_parent() {
		let mut data = CLUSTER.to_vec();
		data.extend([0x82, 0xE7, 0x82, 0x00, 0x01]);

		let err = unmarshal(&data[..], &mut Clusters::default(), UnmarshalOptions::new())
			.unwrap_err();
		assert!(matches!(err.root().kind(), ErrorKind::SizeMismatch));

		// Declares 3 bytes, but only has 2
		let mut data = CLUSTER.to_vec();
		data.extend([0x83, 0xE7, 0x80]);

		let err = unmarshal(&data[..], &mut Clusters::default(), UnmarshalOptions::new())
			.unwrap_err();
		assert!(err.is_io(std::io::ErrorKind::UnexpectedEof));
	}

	#[test_log::test]
	fn nesting_limit() {
		// BlockGroups with unknown sizes, each one inside of the last
		let data = [0xA0, 0xFF].repeat(40);

		let err = unmarshal(&data[..], &mut ElementMap::new(), UnmarshalOptions::new())
			.unwrap_err();
		assert!(err.is(|kind| matches!(kind, ErrorKind::MaxDepthExceeded)));
	}

	#[test_log::test]
	fn read_hook() {
		let mut data = CLUSTER.to_vec();
		data.extend([0x83, 0xE7, 0x81, 0x05]);

		let records = Arc::new(Mutex::new(Vec::new()));
		let hook_records = Arc::clone(&records);

		let mut unmarshaler = Unmarshaler::new(&data[..], UnmarshalOptions::new())
			.with_hook(move |record: &ElementRecord| hook_records.lock().unwrap().push(*record));
		unmarshaler.unmarshal(&mut Clusters::default()).unwrap();
		assert_eq!(unmarshaler.position(), data.len() as u64);

		let records = records.lock().unwrap();
		assert_eq!(
			*records,
			[
				ElementRecord {
					element: ElementType::Cluster,
					position: 0,
					header_len: 5,
					size: Some(3),
				},
				ElementRecord {
					element: ElementType::Timecode,
					position: 5,
					header_len: 2,
					size: Some(1),
				},
			]
		);
	}
}
