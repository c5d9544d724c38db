// Shorthand for a fallible `vec![elem; size]` bounded by an allocation limit
//
// Usage:
// - try_vec![0; size, limit]
macro_rules! try_vec {
	($elem:expr; $size:expr, $limit:expr) => {{
		$crate::util::alloc::fallible_vec_from_element($elem, $size, $limit)?
	}};
}

// Shorthand for return Err(EbmlError::new(ErrorKind::Foo))
//
// Usage:
// - err!(Variant)          -> return Err(EbmlError::new(ErrorKind::Variant))
// - err!(Variant(Message)) -> return Err(EbmlError::new(ErrorKind::Variant(Message)))
macro_rules! err {
	($variant:ident) => {
		return Err(crate::error::EbmlError::new(
			crate::error::ErrorKind::$variant,
		))
	};
	($variant:ident($reason:expr)) => {
		return Err(crate::error::EbmlError::new(
			crate::error::ErrorKind::$variant($reason),
		))
	};
}

// A macro for handling the different `ParsingMode`s
//
// NOTE: `STRICT`, `BESTATTEMPT`, and `RELAXED` are optional, any that are missing
// 		 fall through to `DEFAULT`.
//
// Usage:
//
// - parse_mode_choice!(
// 		ident_of_parsing_mode,
// 		STRICT: some_expr,
// 		RELAXED: some_expr,
// 		DEFAULT: some_expr,
// 	 )
macro_rules! parse_mode_choice {
	(
		$parse_mode:ident,
		$(STRICT: $strict_handler:expr,)?
		$(BESTATTEMPT: $best_attempt_handler:expr,)?
		$(RELAXED: $relaxed_handler:expr,)?
		DEFAULT: $default:expr
	) => {
		match $parse_mode {
			$(crate::config::ParsingMode::Strict => { $strict_handler },)?
			$(crate::config::ParsingMode::BestAttempt => { $best_attempt_handler },)?
			$(crate::config::ParsingMode::Relaxed => { $relaxed_handler },)?
			#[allow(unreachable_patterns)]
			_ => { $default }
		}
	};
}

pub(crate) use {err, parse_mode_choice, try_vec};
