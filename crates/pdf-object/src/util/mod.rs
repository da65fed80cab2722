//! Conversions between PDF string conventions and Rust values.

pub mod date;
pub mod text;

pub use date::{DateParseError, format_date, parse_date};
pub use text::{decode_text_string, encode_text_string};
