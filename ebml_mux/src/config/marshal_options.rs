/// Options to control how elements are encoded
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct MarshalOptions {
	pub(crate) size_length: Option<u8>,
	pub(crate) max_id_length: u8,
	pub(crate) max_size_length: u8,
}

impl Default for MarshalOptions {
	/// The default implementation for `MarshalOptions`
	///
	/// The defaults are as follows:
	///
	/// ```rust,ignore
	/// MarshalOptions {
	/// 	size_length: None,
	/// 	max_id_length: 4,
	/// 	max_size_length: 8,
	/// }
	/// ```
	fn default() -> Self {
		Self::new()
	}
}

impl MarshalOptions {
	/// Creates a new `MarshalOptions`, alias for `Default` implementation
	///
	/// See also: [`MarshalOptions::default`]
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::config::MarshalOptions;
	///
	/// let options = MarshalOptions::new();
	/// ```
	#[must_use]
	pub const fn new() -> Self {
		Self {
			size_length: None,
			max_id_length: 4,
			max_size_length: 8,
		}
	}

	/// The minimum number of octets to use for element sizes
	///
	/// By default, every size is written with the fewest octets possible. Some players prefer a
	/// fixed width, which also makes it possible to patch sizes in place later.
	///
	/// # Examples
	///
	/// ```rust
	/// use ebml_mux::config::MarshalOptions;
	///
	/// // Always write 4 octet sizes
	/// let options = MarshalOptions::new().size_length(Some(4));
	/// ```
	pub fn size_length(&mut self, size_length: Option<u8>) -> Self {
		self.size_length = size_length.map(|len| len.clamp(1, 8));
		*self
	}

	/// The maximum length of an element ID in octets
	///
	/// This is clamped to `1..=8`.
	pub fn max_id_length(&mut self, max_id_length: u8) -> Self {
		self.max_id_length = max_id_length.clamp(1, 8);
		*self
	}

	/// The maximum length of an element size in octets
	///
	/// This is clamped to `1..=8`.
	pub fn max_size_length(&mut self, max_size_length: u8) -> Self {
		self.max_size_length = max_size_length.clamp(1, 8);
		*self
	}
}
