//! PDF object model with an undo/redo journal.
//!
//! This crate holds the in-memory objects of a PDF document (null, booleans,
//! numbers, names, strings, arrays, dictionaries, indirect references and
//! streams), the table of indirect objects that owns them, and a journal
//! that groups mutations into operations that can be undone and redone.
//!
//! # Quick Start
//!
//! ```rust
//! use pdf_object::{Document, names};
//!
//! let doc = Document::new();
//! doc.enable_journal();
//!
//! doc.begin_operation("Add page").unwrap();
//! let page = doc.new_dict();
//! page.put_name(names::TYPE, names::PAGE).unwrap();
//! let page_ref = doc.add_object(page.clone()).unwrap();
//! doc.end_operation().unwrap();
//!
//! doc.begin_operation("Rotate").unwrap();
//! page.put_int(names::ROTATE, 90).unwrap();
//! doc.end_operation().unwrap();
//!
//! doc.undo().unwrap();
//! assert!(page.get(&names::ROTATE).is_none());
//! doc.redo().unwrap();
//! assert_eq!(page_ref.resolve().to_string(), "<</Type/Page/Rotate 90>>");
//! ```
//!
//! # Modules
//!
//! - [`model`]: object values and container handles
//! - [`document`]: the indirect object table
//! - [`journal`]: operations, undo and redo
//! - [`guard`]: cycle detection for graph walks
//! - [`codec`]: binary object/journal/snapshot formats and PDF syntax output
//! - [`util`]: date and text string conversions
//! - [`error`]: error types
//! - [`limits`]: ranges and decoder limits
//!
//! # Ownership
//!
//! Objects are reference counted. A container owns its direct children;
//! indirect references hold only a weak link to their document and are
//! resolved through its table, so cycles through references never leak.
//! Handles are not `Send`: one document belongs to one thread.

pub mod codec;
pub mod document;
pub mod error;
pub mod guard;
pub mod journal;
pub mod limits;
pub mod model;
pub mod util;

pub use codec::{
    Crypt, JournalOptions, PrintOptions, decode_object, encode_object, print_encrypted_obj,
    print_obj, sprint_obj,
};
pub use document::{Document, StreamLoader};
pub use error::{DecodeError, EncodeError, Error, ErrorClass, Result};
pub use guard::{CycleList, MarkBits, MarkList};
pub use journal::StepInfo;
pub use model::{
    Array, Comparison, Dict, Indirect, Matrix, MemoSlot, Name, NameTable, Obj, ObjKind,
    PdfString, Rect, Stream, names, objects_equal,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::util::{decode_text_string, encode_text_string, format_date, parse_date};

    proptest! {
        #[test]
        fn prop_array_push_get(values in prop::collection::vec(any::<i64>(), 0..64)) {
            let array = Array::new();
            for &value in &values {
                array.push_int(value).unwrap();
            }
            prop_assert_eq!(array.len(), values.len());
            for (i, &value) in values.iter().enumerate() {
                prop_assert_eq!(array.get_int(i), value);
            }
        }

        #[test]
        fn prop_dict_last_put_wins(puts in prop::collection::vec((0u8..8, any::<i64>()), 0..64)) {
            let dict = Dict::new();
            let mut expected = std::collections::BTreeMap::new();
            for &(key, value) in &puts {
                let key = format!("K{key}");
                dict.put_int(key.as_str(), value).unwrap();
                expected.insert(key, value);
            }
            prop_assert_eq!(dict.len(), expected.len());
            for (key, value) in &expected {
                prop_assert_eq!(dict.get_int(&Name::new(key)), *value);
            }
        }

        #[test]
        fn prop_text_string_round_trip(text in any::<String>()) {
            prop_assert_eq!(decode_text_string(&encode_text_string(&text)), text);
        }

        #[test]
        fn prop_date_round_trip(secs in -62_135_596_800i64..253_402_300_800) {
            prop_assert_eq!(parse_date(&format_date(secs)).unwrap(), secs);
        }

        #[test]
        fn prop_undo_all_redo_all(values in prop::collection::vec(any::<i64>(), 1..16)) {
            let doc = Document::new();
            doc.enable_journal();
            doc.begin_operation("create").unwrap();
            let array = doc.new_array();
            let r = doc.add_object(array.clone()).unwrap();
            doc.end_operation().unwrap();

            for &value in &values {
                doc.begin_operation("push").unwrap();
                array.push_int(value).unwrap();
                doc.end_operation().unwrap();
            }
            let full = r.resolve().deep_copy().unwrap();

            for _ in &values {
                doc.undo().unwrap();
            }
            prop_assert!(array.is_empty());
            while doc.can_redo() {
                doc.redo().unwrap();
            }
            prop_assert!(objects_equal(&r.resolve(), &full, Comparison::Deep));
            prop_assert_eq!(array.len(), values.len());
        }
    }
}
