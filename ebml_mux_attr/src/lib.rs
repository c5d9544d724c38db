//! Macros for [ebml_mux](https://crates.io/crates/ebml_mux)

mod derive;
mod elements;
mod tag;
mod util;

use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

/// Maps a struct onto an EBML master element
///
/// Every field with an `#[ebml("Name,option,...")]` attribute becomes a child element, written in
/// declaration order. Fields without the attribute are ignored. An empty name uses the field
/// name in PascalCase.
///
/// Options:
///
/// * `omitempty` - skip the element when the field holds its zero value
/// * `size=N` - write the element with exactly `N` octets of data
/// * `size=unknown` (or the deprecated `inf`) - stream the element with an unknown size
/// * `stop` - stop unmarshaling once this element has been read
///
/// The element names are checked at compile time.
#[proc_macro_derive(Ebml, attributes(ebml))]
pub fn ebml(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);

	let mut errors = Vec::new();
	let ret = derive::parse(&input, &mut errors);

	finish(&ret, &errors)
}

/// Defines the element schema
///
/// ```rust,ignore
/// ebml_elements! {
/// 	EBML: { 0x1A45_DFA3, Master },
/// 	Cluster: { 0x1F43_B675, Master, top },
/// 	Timecode: { 0xE7, UnsignedInt },
/// }
/// ```
///
/// This generates the `ElementType` enum, one variant per element.
#[proc_macro]
#[doc(hidden)]
pub fn ebml_elements(input: TokenStream) -> TokenStream {
	match elements::expand(input.into()) {
		Ok(ret) => TokenStream::from(ret),
		Err(e) => TokenStream::from(e.to_compile_error()),
	}
}

fn finish(ret: &proc_macro2::TokenStream, errors: &[syn::Error]) -> TokenStream {
	let compile_errors = errors.iter().map(syn::Error::to_compile_error);

	TokenStream::from(quote! {
		#(#compile_errors)*
		#ret
	})
}
