use std::collections::{HashMap, HashSet};

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream, Parser};
use syn::punctuated::Punctuated;
use syn::{Ident, LitInt, Token, braced};

const DATA_TYPES: &[&str] = &[
	"SignedInt",
	"UnsignedInt",
	"Float",
	"String",
	"Utf8",
	"Date",
	"Master",
	"Binary",
	"Block",
];

// NAME: { 0x1234, DataType }
// NAME: { 0x1234, DataType, top }
pub(crate) struct ElementDefinition {
	pub(crate) ident: Ident,
	pub(crate) id: u64,
	pub(crate) id_lit: LitInt,
	pub(crate) data_type: Ident,
	pub(crate) top_level: bool,
}

impl Parse for ElementDefinition {
	fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
		let ident = input.parse::<Ident>()?;
		let _: Token![:] = input.parse()?;

		let info;
		braced!(info in input);

		let id_lit = info.parse::<LitInt>()?;
		let id = id_lit.base10_parse()?;
		let _: Token![,] = info.parse()?;

		let data_type = info.parse::<Ident>()?;
		if !DATA_TYPES.iter().any(|ty| data_type == ty) {
			return Err(crate::util::err(
				data_type.span(),
				format!("Unknown data type, expected one of: {}", DATA_TYPES.join(", ")),
			));
		}

		let mut top_level = false;
		if info.parse::<Option<Token![,]>>()?.is_some() && !info.is_empty() {
			let flag = info.parse::<Ident>()?;
			if flag != "top" {
				return Err(crate::util::err(flag.span(), "Expected `top`"));
			}

			top_level = true;
			let _trailing_comma = info.parse::<Option<Token![,]>>()?;
		}

		Ok(Self {
			ident,
			id,
			id_lit,
			data_type,
			top_level,
		})
	}
}

// An ID keeps its VINT_MARKER, so its first octet must agree with its width
fn verify_id(element: &ElementDefinition) -> syn::Result<()> {
	if element.id == 0 {
		return Err(crate::util::err(element.id_lit.span(), "Element IDs cannot be 0"));
	}

	let octets = element.id.ilog2() / 8 + 1;
	if octets > 4 {
		return Err(crate::util::err(
			element.id_lit.span(),
			"Element IDs cannot be longer than 4 octets",
		));
	}

	let first = (element.id >> ((octets - 1) * 8)) as u8;
	if first.leading_zeros() + 1 != octets {
		return Err(crate::util::err(
			element.id_lit.span(),
			"The length marker of this ID does not match its width",
		));
	}

	Ok(())
}

pub(crate) fn parse_element_table(input: TokenStream) -> syn::Result<Vec<ElementDefinition>> {
	let parser = Punctuated::<ElementDefinition, Token![,]>::parse_terminated;
	let elements = parser.parse2(input)?;

	let mut seen_names = HashSet::new();
	let mut seen_ids = HashMap::new();
	for element in &elements {
		verify_id(element)?;

		if !seen_names.insert(element.ident.to_string()) {
			return Err(crate::util::err(
				element.ident.span(),
				"Element defined more than once",
			));
		}

		if let Some(other) = seen_ids.insert(element.id, element.ident.clone()) {
			return Err(crate::util::err(
				element.id_lit.span(),
				format!("ID is already used by `{other}`"),
			));
		}
	}

	Ok(elements.into_iter().collect())
}

pub(crate) fn expand(input: TokenStream) -> syn::Result<TokenStream> {
	let elements = parse_element_table(input)?;

	let idents = elements.iter().map(|e| &e.ident).collect::<Vec<_>>();
	let ids = elements.iter().map(|e| e.id).collect::<Vec<_>>();
	let names = elements
		.iter()
		.map(|e| e.ident.to_string())
		.collect::<Vec<_>>();
	let docs = elements
		.iter()
		.map(|e| format!("`{}` (ID `{:#X}`)", e.ident, e.id))
		.collect::<Vec<_>>();
	let data_types = elements.iter().map(|e| &e.data_type).collect::<Vec<_>>();
	let top_levels = elements.iter().map(|e| e.top_level).collect::<Vec<_>>();

	Ok(quote! {
		/// An element known to the schema
		///
		/// A variant's name is also the element's name in tags, see [`ElementType::from_name`].
		#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
		#[non_exhaustive]
		pub enum ElementType {
			#(
				#[doc = #docs]
				#idents,
			)*
		}

		impl ElementType {
			/// Every element in the schema, in declaration order
			pub const ALL: &'static [ElementType] = &[#(ElementType::#idents),*];

			/// The element's ID, including its length marker
			pub const fn id(self) -> crate::ebml::ElementId {
				match self {
					#(ElementType::#idents => crate::ebml::ElementId(#ids),)*
				}
			}

			/// The element's name
			pub const fn name(self) -> &'static str {
				match self {
					#(ElementType::#idents => #names,)*
				}
			}

			/// The type of data the element holds
			pub const fn data_type(self) -> crate::ebml::ElementDataType {
				match self {
					#(ElementType::#idents => crate::ebml::ElementDataType::#data_types,)*
				}
			}

			/// Whether the element is a top-level (level 1) element
			///
			/// A top-level element ends any unknown-size top-level element it is found in.
			pub const fn is_top_level(self) -> bool {
				match self {
					#(ElementType::#idents => #top_levels,)*
				}
			}

			/// Look up an element by its name
			pub fn from_name(name: &str) -> Option<Self> {
				match name {
					#(#names => Some(ElementType::#idents),)*
					_ => None,
				}
			}
		}
	})
}
