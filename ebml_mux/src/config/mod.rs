//! Various configuration options to control ebml_mux

mod marshal_options;
mod parsing_mode;
mod unmarshal_options;

pub use marshal_options::MarshalOptions;
pub use parsing_mode::ParsingMode;
pub use unmarshal_options::UnmarshalOptions;
