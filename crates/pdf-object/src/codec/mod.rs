//! Encoders and decoders.
//!
//! - [`object`]: tagged binary encoding of object graphs
//! - [`journal`]: undo history persistence, optionally zstd-compressed
//! - [`snapshot`]: object table plus history
//! - [`print`]: PDF syntax output

pub mod journal;
pub mod object;
pub mod primitives;
pub mod print;
pub mod snapshot;

pub use journal::JournalOptions;
pub use object::{decode_object, encode_object};
pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
pub use print::{Crypt, PrintOptions, print_encrypted_obj, print_obj, sprint_obj};
