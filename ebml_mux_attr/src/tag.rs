use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::Ident;

pub(crate) enum DeclaredSize {
	Default,
	Exact(u64),
	Unknown,
}

/// A parsed `#[ebml("Name,option,...")]` attribute
pub(crate) struct TagAttribute {
	pub(crate) element: Ident,
	pub(crate) size: DeclaredSize,
	pub(crate) omit_empty: bool,
	pub(crate) stop: bool,
}

impl TagAttribute {
	// An empty name falls back to the field name in PascalCase
	pub(crate) fn parse(tag: &str, field: &Ident, span: Span) -> Result<Self, String> {
		let mut segments = tag.split(',');

		let name = match segments.next() {
			Some(name) if !name.is_empty() => name.to_string(),
			_ => crate::util::pascal_case(&field.to_string()),
		};

		let Ok(element) = syn::parse_str::<Ident>(&name) else {
			return Err(format!("`{name}` is not a valid element name"));
		};

		let mut ret = Self {
			element: Ident::new(&element.to_string(), span),
			size: DeclaredSize::Default,
			omit_empty: false,
			stop: false,
		};

		for option in segments {
			match option {
				"" => return Err(String::from("Tag contains an empty option")),
				"omitempty" => ret.omit_empty = true,
				"inf" | "size=unknown" => ret.size = DeclaredSize::Unknown,
				"stop" => ret.stop = true,
				_ if option.starts_with("size=") => {
					let Ok(size) = option["size=".len()..].parse::<u64>() else {
						return Err(format!("Invalid size in tag option `{option}`"));
					};

					ret.size = DeclaredSize::Exact(size);
				},
				_ => return Err(format!("Unknown tag option `{option}`")),
			}
		}

		Ok(ret)
	}

	/// Builds the `Tag` constant for this attribute
	pub(crate) fn to_tokens(&self) -> TokenStream {
		let element = &self.element;
		let mut tag = quote! {
			::ebml_mux::ebml::Tag::new(::ebml_mux::ebml::ElementType::#element)
		};

		match self.size {
			DeclaredSize::Default => {},
			DeclaredSize::Exact(size) => {
				tag = quote!(#tag.size(::ebml_mux::ebml::DeclaredSize::Exact(#size)));
			},
			DeclaredSize::Unknown => {
				tag = quote!(#tag.size(::ebml_mux::ebml::DeclaredSize::Unknown));
			},
		}

		if self.omit_empty {
			tag = quote!(#tag.omit_empty());
		}

		if self.stop {
			tag = quote!(#tag.stop());
		}

		tag
	}
}
