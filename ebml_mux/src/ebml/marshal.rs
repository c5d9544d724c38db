use crate::config::MarshalOptions;
use crate::ebml::type_encodings::encode_payload;
use crate::ebml::{
	DeclaredSize, ElementDataType, ElementId, ElementType, Tag, Tagged, VInt, ValueRef,
};
use crate::error::{Result, ResultExt};
use crate::macros::err;

use std::io::{self, Write};

/// Master elements can only be nested this deep
pub(crate) const MAX_DEPTH: usize = 32;

/// An element written by a [`Marshaler`] or read by an [`Unmarshaler`](crate::ebml::Unmarshaler)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ElementRecord {
	/// The element
	pub element: ElementType,
	/// The absolute position of the element's ID
	pub position: u64,
	/// The length of the element's ID and size
	pub header_len: u64,
	/// The length of the element's data, `None` for unknown-sized elements
	pub size: Option<u64>,
}

impl ElementRecord {
	/// The absolute position of the element's data
	pub fn data_position(&self) -> u64 {
		self.position + self.header_len
	}
}

#[derive(Copy, Clone)]
pub(crate) struct ElementWriterCtx {
	pub(crate) max_id_len: u8,
	pub(crate) max_size_len: u8,
	pub(crate) size_length: Option<u8>,
}

impl From<MarshalOptions> for ElementWriterCtx {
	fn from(options: MarshalOptions) -> Self {
		Self {
			max_id_len: options.max_id_length,
			max_size_len: options.max_size_length,
			size_length: options.size_length,
		}
	}
}

pub(crate) trait EbmlWriteExt: Write {
	fn write_id(&mut self, ctx: ElementWriterCtx, id: ElementId) -> Result<()> {
		id.write_to(Some(ctx.max_id_len), self)?;
		Ok(())
	}

	fn write_size(&mut self, ctx: ElementWriterCtx, size: u64) -> Result<()> {
		VInt::<u64>::try_from(size)?.write_to(ctx.size_length, Some(ctx.max_size_len), self)?;
		Ok(())
	}

	fn write_unknown_size(&mut self, ctx: ElementWriterCtx) -> Result<()> {
		VInt::<u64>::UNKNOWN.write_to(
			Some(ctx.max_size_len),
			Some(ctx.max_size_len),
			self,
		)?;
		Ok(())
	}
}

impl<T> EbmlWriteExt for T where T: Write + ?Sized {}

// Tracks the position relative to the start of the element being encoded
struct Sink<'a> {
	inner: &'a mut dyn Write,
	position: u64,
}

impl Write for Sink<'_> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let written = self.inner.write(buf)?;
		self.position += written as u64;
		Ok(written)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

/// Encodes [`Tagged`] values
///
/// # Examples
///
/// ```rust
/// use ebml_mux::config::MarshalOptions;
/// use ebml_mux::ebml::{ElementMap, ElementRecord, ElementType, Marshaler, Value};
///
/// # fn main() -> ebml_mux::error::Result<()> {
/// let mut info = ElementMap::new();
/// info.push(ElementType::TimecodeScale, Value::Uint(1_000_000));
///
/// let mut document = ElementMap::new();
/// document.push(ElementType::Info, Value::Master(info));
///
/// let mut records = Vec::new();
/// let mut hook = |record: &ElementRecord| records.push(*record);
///
/// let mut out = Vec::new();
/// Marshaler::new(MarshalOptions::default())
/// 	.with_hook(&mut hook)
/// 	.marshal(&document, &mut out)?;
///
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].element, ElementType::Info);
/// assert_eq!(records[1].element, ElementType::TimecodeScale);
/// assert_eq!(records[1].position, 5);
/// # Ok(()) }
/// ```
pub struct Marshaler<'h> {
	options: MarshalOptions,
	hook: Option<&'h mut dyn FnMut(&ElementRecord)>,
}

impl<'h> Marshaler<'h> {
	/// Create a new `Marshaler`
	pub fn new(options: MarshalOptions) -> Self {
		Self {
			options,
			hook: None,
		}
	}

	/// Report every element written
	///
	/// The hook is called in the order the elements appear in the output, once the whole
	/// value has been written. It cannot influence the encoding.
	pub fn with_hook(mut self, hook: &'h mut dyn FnMut(&ElementRecord)) -> Self {
		self.hook = Some(hook);
		self
	}

	/// Write the children of `value` to `writer`, returning the number of bytes written
	///
	/// # Errors
	///
	/// * A value can't be encoded as its element
	/// * Masters are nested too deep ([`ErrorKind::MaxDepthExceeded`](crate::error::ErrorKind::MaxDepthExceeded))
	/// * `writer` fails
	pub fn marshal<W>(&mut self, value: &dyn Tagged, mut writer: W) -> Result<u64>
	where
		W: Write,
	{
		let mut sink = Sink {
			inner: &mut writer,
			position: 0,
		};

		let mut records = Vec::new();
		self.write_master(value, &mut sink, &mut records, 0)?;

		if let Some(hook) = self.hook.as_mut() {
			for record in &records {
				hook(record);
			}
		}

		Ok(sink.position)
	}

	fn write_master(
		&self,
		master: &dyn Tagged,
		out: &mut Sink<'_>,
		records: &mut Vec<ElementRecord>,
		depth: usize,
	) -> Result<()> {
		if depth > MAX_DEPTH {
			err!(MaxDepthExceeded);
		}

		for (tag, field) in master.tagged_fields() {
			self.write_field(tag, field.value(), field.is_zero(), out, records, depth)?;
		}

		Ok(())
	}

	fn write_field(
		&self,
		tag: Tag,
		value: ValueRef<'_>,
		is_zero: bool,
		out: &mut Sink<'_>,
		records: &mut Vec<ElementRecord>,
		depth: usize,
	) -> Result<()> {
		if tag.omit_empty && is_zero {
			return Ok(());
		}

		let ctx = ElementWriterCtx::from(self.options);
		let element = tag.element;
		match value {
			ValueRef::Absent => Ok(()),
			ValueRef::Repeated(items) => {
				for item in items {
					self.write_field(tag, item.value(), item.is_zero(), out, records, depth)?;
				}

				Ok(())
			},
			ValueRef::Master(child) => {
				if element.data_type() != ElementDataType::Master {
					err!(IncompatibleType("master"));
				}

				if tag.size == DeclaredSize::Unknown {
					log::trace!("Streaming unknown-sized {}", element.name());

					let position = out.position;
					out.write_id(ctx, element.id())?;
					out.write_unknown_size(ctx)?;
					records.push(ElementRecord {
						element,
						position,
						header_len: out.position - position,
						size: None,
					});

					return self.write_master(child, out, records, depth + 1);
				}

				let mut data = Vec::new();
				let mut child_records = Vec::new();
				self.write_master(
					child,
					&mut Sink {
						inner: &mut data,
						position: 0,
					},
					&mut child_records,
					depth + 1,
				)?;

				if let DeclaredSize::Exact(size) = tag.size {
					if size != data.len() as u64 {
						log::debug!(
							"{} encoded to {} bytes, but declares {}",
							element.name(),
							data.len(),
							size
						);
						err!(SizeMismatch);
					}
				}

				let position = out.position;
				out.write_id(ctx, element.id())?;
				out.write_size(ctx, data.len() as u64)?;

				let data_position = out.position;
				records.push(ElementRecord {
					element,
					position,
					header_len: data_position - position,
					size: Some(data.len() as u64),
				});
				records.extend(child_records.into_iter().map(|mut record| {
					record.position += data_position;
					record
				}));

				out.write_all(&data)?;
				Ok(())
			},
			scalar => {
				if element.data_type() == ElementDataType::Master {
					err!(IncompatibleType(scalar.kind()));
				}

				let data = encode_payload(element, &scalar, tag.size)
					.context(|| format!("encoding {}", element.name()))?;

				let position = out.position;
				out.write_id(ctx, element.id())?;
				out.write_size(ctx, data.len() as u64)?;
				records.push(ElementRecord {
					element,
					position,
					header_len: out.position - position,
					size: Some(data.len() as u64),
				});

				out.write_all(&data)?;
				Ok(())
			},
		}
	}
}

/// Write the children of `value` to `writer`, returning the number of bytes written
///
/// See [`Marshaler::marshal`].
///
/// # Errors
///
/// See [`Marshaler::marshal`]
pub fn marshal<W>(value: &dyn Tagged, writer: W, options: MarshalOptions) -> Result<u64>
where
	W: Write,
{
	Marshaler::new(options).marshal(value, writer)
}
