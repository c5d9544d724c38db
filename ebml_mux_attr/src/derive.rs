use crate::tag::TagAttribute;
use crate::util::bail;

use std::collections::HashSet;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DataStruct, DeriveInput, Fields, LitStr};

struct TaggedField<'a> {
	ident: &'a syn::Ident,
	tag: TagAttribute,
}

pub(crate) fn parse(input: &DeriveInput, errors: &mut Vec<syn::Error>) -> TokenStream {
	let Data::Struct(DataStruct {
		fields: Fields::Named(fields),
		..
	}) = &input.data
	else {
		bail!(
			errors,
			input.ident.span(),
			"`Ebml` can only be derived for structs with named fields"
		);
	};

	let mut tagged_fields = Vec::new();
	let mut seen_elements = HashSet::new();
	for field in &fields.named {
		let Some(ident) = &field.ident else {
			continue;
		};

		let mut attrs = field.attrs.iter().filter(|attr| attr.path().is_ident("ebml"));
		let Some(attr) = attrs.next() else {
			continue;
		};

		if let Some(extra) = attrs.next() {
			errors.push(crate::util::err(
				extra.bracket_token.span.join(),
				"A field can only have one `#[ebml]` attribute",
			));
			continue;
		}

		let tag_str = match attr.parse_args::<LitStr>() {
			Ok(tag_str) => tag_str,
			Err(e) => {
				errors.push(e);
				continue;
			},
		};

		let tag = match TagAttribute::parse(&tag_str.value(), ident, tag_str.span()) {
			Ok(tag) => tag,
			Err(message) => {
				errors.push(crate::util::err(tag_str.span(), message));
				continue;
			},
		};

		if !seen_elements.insert(tag.element.to_string()) {
			errors.push(crate::util::err(
				tag_str.span(),
				format!("Element `{}` is already assigned to another field", tag.element),
			));
			continue;
		}

		tagged_fields.push(TaggedField { ident, tag });
	}

	let name = &input.ident;
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

	let field_count = tagged_fields.len();
	let field_idents = tagged_fields.iter().map(|f| f.ident).collect::<Vec<_>>();
	let elements = tagged_fields
		.iter()
		.map(|f| &f.tag.element)
		.collect::<Vec<_>>();
	let tags = tagged_fields
		.iter()
		.map(|f| f.tag.to_tokens())
		.collect::<Vec<_>>();
	let tagged_field = quote! { (::ebml_mux::ebml::Tag, &dyn ::ebml_mux::ebml::Field) };

	quote! {
		impl #impl_generics ::ebml_mux::ebml::Tagged for #name #ty_generics #where_clause {
			fn tagged_fields(&self) -> ::std::vec::Vec<#tagged_field> {
				let mut fields: ::std::vec::Vec<#tagged_field> =
					::std::vec::Vec::with_capacity(#field_count);
				#(
					let field: &dyn ::ebml_mux::ebml::Field = &self.#field_idents;
					fields.push((#tags, field));
				)*
				fields
			}

			fn tagged_field_mut(
				&mut self,
				element: ::ebml_mux::ebml::ElementType,
			) -> ::std::option::Option<(::ebml_mux::ebml::Tag, &mut dyn ::ebml_mux::ebml::Field)> {
				match element {
					#(
						::ebml_mux::ebml::ElementType::#elements => {
							let field: &mut dyn ::ebml_mux::ebml::Field = &mut self.#field_idents;
							::std::option::Option::Some((#tags, field))
						},
					)*
					_ => ::std::option::Option::None,
				}
			}
		}

		impl #impl_generics ::ebml_mux::ebml::Field for #name #ty_generics #where_clause {
			fn value(&self) -> ::ebml_mux::ebml::ValueRef<'_> {
				::ebml_mux::ebml::ValueRef::Master(self)
			}

			fn is_zero(&self) -> bool {
				true #(&& ::ebml_mux::ebml::Field::is_zero(&self.#field_idents))*
			}

			fn master_mut(&mut self) -> ::std::option::Option<&mut dyn ::ebml_mux::ebml::Tagged> {
				::std::option::Option::Some(self)
			}
		}
	}
}
