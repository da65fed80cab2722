//! Document snapshots: the object table plus its undo history.
//!
//! ```text
//! magic     "PDFS"
//! version   u8
//! slots     varint, one more than the highest object number
//! count     varint
//! entry     varint num, varint gen, object    (ascending num)
//! journal   u8: 0 off | 1 length-prefixed journal | 2 on, history lost
//! ```
//!
//! Losing the history never loses content: a journal that cannot be
//! written is recorded as lost, and one that cannot be read is replaced by
//! an empty history.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::codec::journal::JournalOptions;
use crate::codec::object::{DecodeContext, read_object, read_ref, write_object};
use crate::codec::primitives::{Reader, Writer};
use crate::document::{Document, Entry};
use crate::error::{DecodeError, Error, Result};
use crate::limits::{
    FORMAT_VERSION, MAGIC_SNAPSHOT, MAX_ENTRIES, MAX_JOURNAL_SIZE, MAX_SNAPSHOT_SIZE,
    MIN_FORMAT_VERSION,
};
use crate::model::header::bind_tree;

const JOURNAL_OFF: u8 = 0;
const JOURNAL_PRESENT: u8 = 1;
const JOURNAL_LOST: u8 = 2;

impl Document {
    /// Writes every object and, if journalling is on, the undo history.
    pub fn save_snapshot<W: Write>(&self, out: &mut W, options: JournalOptions) -> Result<()> {
        let mut writer = Writer::new();
        writer.write_bytes(MAGIC_SNAPSHOT);
        writer.write_byte(FORMAT_VERSION);
        {
            let table = self.0.table.borrow();
            writer.write_varint(table.len() as u64);
            writer.write_varint(table.iter().flatten().count() as u64);
            for (num, entry) in table.iter().enumerate() {
                let Some(entry) = entry else { continue };
                writer.write_varint(num as u64);
                writer.write_varint(entry.generation as u64);
                write_object(&mut writer, &entry.obj, 0)?;
            }
        }

        match self.encode_journal(options) {
            Ok(journal) => {
                writer.write_byte(JOURNAL_PRESENT);
                writer.write_bytes_prefixed(&journal);
            }
            Err(Error::JournalDisabled) => writer.write_byte(JOURNAL_OFF),
            Err(err) => {
                warn!(error = %err, "saving snapshot without undo history");
                writer.write_byte(JOURNAL_LOST);
            }
        }

        let bytes = writer.into_bytes();
        debug!(len = bytes.len(), objects = self.len() - 1, "saved snapshot");
        out.write_all(&bytes)?;
        Ok(())
    }

    /// Reads a document written by [`Document::save_snapshot`].
    ///
    /// Loaded objects start clean.
    pub fn load_snapshot<R: Read>(input: &mut R) -> Result<Document> {
        let mut bytes = Vec::new();
        input.take(MAX_SNAPSHOT_SIZE + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > MAX_SNAPSHOT_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "snapshot",
                len: bytes.len(),
                max: MAX_SNAPSHOT_SIZE as usize,
            }
            .into());
        }

        let doc = Document::new();
        let mut reader = Reader::new(&bytes);
        let magic: [u8; 4] = reader.read_array("magic")?;
        if &magic != MAGIC_SNAPSHOT {
            return Err(DecodeError::InvalidMagic { found: magic }.into());
        }
        let version = reader.read_byte("version")?;
        if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
            return Err(DecodeError::UnsupportedVersion { version }.into());
        }

        let slots = reader.read_len(MAX_ENTRIES, "slots")?.max(1);
        let count = reader.read_len(MAX_ENTRIES, "entries")?;
        let ctx = DecodeContext::bound(&doc);
        let mut table: Vec<Option<Entry>> = vec![None; slots];
        let mut previous = 0;
        for _ in 0..count {
            let (num, generation) = read_ref(&mut reader)?;
            if num <= previous || num as usize >= slots {
                return Err(DecodeError::ObjectNumberOutOfRange { num: num as u64 }.into());
            }
            previous = num;
            let obj = read_object(&mut reader, &ctx, 0)?;
            bind_tree(&obj, &doc.weak(), num);
            table[num as usize] = Some(Entry {
                generation,
                obj,
                dirty: false,
            });
        }

        let journal_flag = reader.read_byte("journal flag")?;
        let journal = match journal_flag {
            JOURNAL_OFF | JOURNAL_LOST => None,
            JOURNAL_PRESENT => Some(reader.read_bytes_prefixed(MAX_JOURNAL_SIZE, "journal")?),
            _ => {
                return Err(DecodeError::ReservedBitsSet {
                    context: "journal flag",
                }
                .into());
            }
        };
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes {
                context: "snapshot",
                len: reader.remaining_len(),
            }
            .into());
        }

        *doc.0.table.borrow_mut() = table;
        match journal {
            Some(journal) => {
                if doc.decode_journal(journal).is_err() {
                    warn!("loaded snapshot with an empty undo history");
                    doc.enable_journal();
                }
            }
            None if journal_flag == JOURNAL_LOST => {
                warn!("snapshot was saved without its undo history");
                doc.enable_journal();
            }
            None => {}
        }
        debug!(objects = count, "loaded snapshot");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparison, Obj, Stream, names, objects_equal};

    fn sample() -> Document {
        let doc = Document::new();
        doc.enable_journal();
        doc.begin_operation("build").unwrap();
        let catalog = doc.new_dict();
        catalog.put_name(names::TYPE, names::CATALOG).unwrap();
        let catalog_ref = doc.add_object(catalog.clone()).unwrap();
        let page = doc.new_dict();
        page.put_name(names::TYPE, names::PAGE).unwrap();
        page.put(names::PARENT, catalog_ref).unwrap();
        let page_ref = doc.add_object(page).unwrap();
        catalog.put_array(names::KIDS).unwrap().push(page_ref).unwrap();
        doc.add_stream(doc.new_dict(), b"BT /F1 12 Tf ET".to_vec())
            .unwrap();
        doc.end_operation().unwrap();

        doc.begin_operation("scratch").unwrap();
        let scratch = doc.add_object(Obj::Int(1)).unwrap();
        doc.delete_object(scratch.num()).unwrap();
        doc.end_operation().unwrap();
        doc
    }

    fn save(doc: &Document) -> Vec<u8> {
        let mut out = Vec::new();
        doc.save_snapshot(&mut out, JournalOptions::default()).unwrap();
        out
    }

    #[test]
    fn test_snapshot_round_trip() {
        let doc = sample();
        let loaded = Document::load_snapshot(&mut save(&doc).as_slice()).unwrap();

        assert_eq!(loaded.len(), doc.len());
        assert!(loaded.object(4).is_none());
        for num in 1..=3 {
            assert!(objects_equal(
                &doc.object(num).unwrap(),
                &loaded.object(num).unwrap(),
                Comparison::Deep
            ));
        }
        assert!(loaded.dirty_objects().is_empty());

        let page = loaded.object(2).unwrap();
        let parent = page.as_dict().unwrap().get(&names::PARENT).unwrap();
        assert!(parent.as_indirect().unwrap().belongs_to(&loaded.weak()));
        assert!(parent.resolve().is_dict());
        let kids = loaded.object(1).unwrap().as_dict().unwrap().get_array(&names::KIDS).unwrap();
        assert_eq!(kids.parent_num(), 1);

        let stream: Stream = loaded.object(3).unwrap().as_stream().unwrap();
        assert_eq!(&*stream.raw_bytes().unwrap(), b"BT /F1 12 Tf ET");
    }

    #[test]
    fn test_snapshot_keeps_history() {
        let doc = sample();
        let loaded = Document::load_snapshot(&mut save(&doc).as_slice()).unwrap();
        assert_eq!(loaded.history_length_and_cursor(), (2, 2));

        loaded.undo().unwrap();
        loaded.undo().unwrap();
        assert!(loaded.object(1).is_none());
        loaded.redo().unwrap();
        assert_eq!(
            loaded.object(1).unwrap().as_dict().unwrap().get_array(&names::KIDS).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_snapshot_without_journal() {
        let doc = Document::new();
        doc.add_object(Obj::new_text_string("plain")).unwrap();
        let loaded = Document::load_snapshot(&mut save(&doc).as_slice()).unwrap();
        assert!(!loaded.is_journal_enabled());
        assert_eq!(loaded.object(1).unwrap().text_string(), "plain");
    }

    #[test]
    fn test_open_operation_loses_only_history() {
        let doc = sample();
        doc.begin_operation("unfinished").unwrap();
        doc.add_object(Obj::Int(42)).unwrap();

        let loaded = Document::load_snapshot(&mut save(&doc).as_slice()).unwrap();
        assert!(loaded.is_journal_enabled());
        assert!(!loaded.can_undo());
        assert_eq!(loaded.object(5).unwrap().to_int(), 42);
    }

    #[test]
    fn test_corrupt_history_loses_only_history() {
        let doc = sample();
        let mut bytes = save(&doc);
        // the last byte is the flags of the final fragment
        *bytes.last_mut().unwrap() |= 0x80;

        let loaded = Document::load_snapshot(&mut bytes.as_slice()).unwrap();
        assert!(loaded.is_journal_enabled());
        assert_eq!(loaded.history_length_and_cursor(), (0, 0));
        assert!(loaded.object(1).unwrap().is_dict());
    }

    #[test]
    fn test_rejects_malformed_snapshots() {
        let bytes = save(&sample());

        let mut magic = bytes.clone();
        magic[0] = b'X';
        assert!(matches!(
            Document::load_snapshot(&mut magic.as_slice()),
            Err(Error::Decode(DecodeError::InvalidMagic { .. }))
        ));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(
            Document::load_snapshot(&mut trailing.as_slice()),
            Err(Error::Decode(DecodeError::TrailingBytes { .. }))
        ));

        // slot count just after magic and version; shrinking it strands object 3
        let mut slots = bytes.clone();
        slots[5] = 3;
        assert!(matches!(
            Document::load_snapshot(&mut slots.as_slice()),
            Err(Error::Decode(DecodeError::ObjectNumberOutOfRange { num: 3 }))
        ));

        assert!(Document::load_snapshot(&mut &bytes[..bytes.len() / 2]).is_err());
    }
}
