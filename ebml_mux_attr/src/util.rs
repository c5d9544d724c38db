use std::fmt::Display;

use proc_macro2::Span;

macro_rules! bail {
	($errors:ident, $span:expr, $msg:expr) => {
		$errors.push(crate::util::err($span, $msg));
		return proc_macro2::TokenStream::new();
	};
}

pub(crate) use bail;

pub(crate) fn err<T: Display>(span: Span, error: T) -> syn::Error {
	syn::Error::new(span, error)
}

/// `track_number` -> `TrackNumber`
pub(crate) fn pascal_case(field_name: &str) -> String {
	let field_name = field_name.strip_prefix("r#").unwrap_or(field_name);

	let mut ret = String::with_capacity(field_name.len());
	let mut upper = true;
	for c in field_name.chars() {
		if c == '_' {
			upper = true;
			continue;
		}

		if upper {
			ret.extend(c.to_uppercase());
			upper = false;
		} else {
			ret.push(c);
		}
	}

	ret
}
