//! Binary journal format.
//!
//! ```text
//! magic     "PDFJ"
//! version   u8
//! table     32-byte SHA-256 of the object table the history applies to
//! cursor    varint
//! count     varint
//! operation flags u8 (bit 0: titled), [title], fragment count, fragments
//! fragment  varint num, varint gen, flags u8 (bit 0: new object,
//!           bit 1: has value), [object]
//! ```
//!
//! The compressed form is `"PDFJZ"`, the varint uncompressed size, then a
//! zstd frame holding the uncompressed form.

use std::io::{Read, Write};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::codec::object::{DecodeContext, read_object, read_ref, write_object};
use crate::codec::primitives::{Reader, Writer};
use crate::document::Document;
use crate::error::{DecodeError, EncodeError, Error, Result};
use crate::journal::{Fragment, Journal, Operation};
use crate::limits::{
    FORMAT_VERSION, MAGIC_JOURNAL, MAGIC_JOURNAL_COMPRESSED, MAX_FRAGMENTS, MAX_JOURNAL_SIZE,
    MAX_OPERATIONS, MAX_TITLE_LEN, MIN_FORMAT_VERSION,
};

const OP_TITLED: u8 = 0x01;

const FRAGMENT_NEW_OBJECT: u8 = 0x01;
const FRAGMENT_HAS_VALUE: u8 = 0x02;

/// Options for serializing a journal.
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalOptions {
    /// zstd level to compress with; `None` writes the uncompressed form.
    pub compression_level: Option<i32>,
}

impl JournalOptions {
    pub fn compressed(level: i32) -> Self {
        JournalOptions {
            compression_level: Some(level),
        }
    }
}

impl Document {
    /// Serializes the undo history.
    ///
    /// Fails if journalling is off or an operation is open.
    pub fn write_journal<W: Write>(&self, out: &mut W, options: JournalOptions) -> Result<()> {
        let bytes = self.encode_journal(options)?;
        out.write_all(&bytes)?;
        Ok(())
    }

    /// Replaces the undo history with one read from `input`.
    ///
    /// The history must have been written against an object table identical
    /// to the current one. On any failure the current history is kept.
    pub fn read_journal<R: Read>(&self, input: &mut R) -> Result<()> {
        let mut bytes = Vec::new();
        input
            .take(MAX_JOURNAL_SIZE as u64 + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() > MAX_JOURNAL_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "journal",
                len: bytes.len(),
                max: MAX_JOURNAL_SIZE,
            }
            .into());
        }
        self.decode_journal(&bytes)
    }

    pub(crate) fn encode_journal(&self, options: JournalOptions) -> Result<Vec<u8>> {
        let journal = self.0.journal.borrow();
        let Some(journal) = journal.as_ref() else {
            return Err(Error::JournalDisabled);
        };
        if journal.is_open() {
            return Err(Error::OperationInProgress);
        }

        let mut writer = Writer::new();
        writer.write_bytes(MAGIC_JOURNAL);
        writer.write_byte(FORMAT_VERSION);
        writer.write_bytes(&self.table_fingerprint()?);
        writer.write_varint(journal.cursor as u64);
        writer.write_varint(journal.history.len() as u64);
        for operation in &journal.history {
            write_operation(&mut writer, operation)?;
        }
        let uncompressed = writer.into_bytes();
        debug!(
            operations = journal.history.len(),
            cursor = journal.cursor,
            len = uncompressed.len(),
            "encoded journal"
        );

        let Some(level) = options.compression_level else {
            return Ok(uncompressed);
        };
        let compressed = zstd::encode_all(uncompressed.as_slice(), level)
            .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        let mut writer = Writer::with_capacity(5 + 10 + compressed.len());
        writer.write_bytes(MAGIC_JOURNAL_COMPRESSED);
        writer.write_varint(uncompressed.len() as u64);
        writer.write_bytes(&compressed);
        Ok(writer.into_bytes())
    }

    pub(crate) fn decode_journal(&self, input: &[u8]) -> Result<()> {
        if self.in_operation() {
            return Err(Error::OperationInProgress);
        }
        let journal = match self.parse_journal(input) {
            Ok(journal) => journal,
            Err(err) => {
                warn!(error = %err, "discarding unreadable journal");
                return Err(err);
            }
        };
        debug!(
            operations = journal.history.len(),
            cursor = journal.cursor,
            "loaded journal"
        );
        *self.0.journal.borrow_mut() = Some(journal);
        Ok(())
    }

    fn parse_journal(&self, input: &[u8]) -> Result<Journal> {
        let decompressed;
        let input = if input.starts_with(MAGIC_JOURNAL_COMPRESSED) {
            decompressed = decompress_zstd(&input[MAGIC_JOURNAL_COMPRESSED.len()..])?;
            decompressed.as_slice()
        } else {
            input
        };

        let mut reader = Reader::new(input);
        let magic: [u8; 4] = reader.read_array("magic")?;
        if &magic != MAGIC_JOURNAL {
            return Err(DecodeError::InvalidMagic { found: magic }.into());
        }
        let version = reader.read_byte("version")?;
        if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
            return Err(DecodeError::UnsupportedVersion { version }.into());
        }
        let fingerprint: [u8; 32] = reader.read_array("table fingerprint")?;
        let cursor = reader.read_varint("cursor")?;
        let count = reader.read_len(MAX_OPERATIONS, "operations")?;

        let ctx = DecodeContext::detached(self);
        let mut history = Vec::with_capacity(count.min(reader.remaining_len()));
        for _ in 0..count {
            history.push(read_operation(&mut reader, &ctx)?);
        }
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes {
                context: "journal",
                len: reader.remaining_len(),
            }
            .into());
        }
        if cursor > history.len() as u64 {
            return Err(DecodeError::CursorOutOfRange {
                cursor: cursor.min(usize::MAX as u64) as usize,
                len: history.len(),
            }
            .into());
        }
        if fingerprint != self.table_fingerprint()? {
            return Err(DecodeError::FingerprintMismatch.into());
        }
        Ok(Journal::new(history, cursor as usize))
    }

    /// Hashes every live table entry, in object number order.
    fn table_fingerprint(&self) -> Result<[u8; 32], EncodeError> {
        let table = self.0.table.borrow();
        let mut hasher = Sha256::new();
        let mut writer = Writer::new();
        for (num, entry) in table.iter().enumerate() {
            let Some(entry) = entry else { continue };
            writer.write_varint(num as u64);
            writer.write_varint(entry.generation as u64);
            write_object(&mut writer, &entry.obj, 0)?;
            hasher.update(writer.as_bytes());
            writer = Writer::new();
        }
        Ok(hasher.finalize().into())
    }
}

fn write_operation(writer: &mut Writer, operation: &Operation) -> Result<(), EncodeError> {
    match &operation.title {
        Some(title) => {
            writer.write_byte(OP_TITLED);
            writer.write_string(title);
        }
        None => writer.write_byte(0),
    }
    writer.write_varint(operation.fragments.len() as u64);
    for fragment in &operation.fragments {
        writer.write_varint(fragment.num as u64);
        writer.write_varint(fragment.generation as u64);
        let mut flags = 0;
        if fragment.new_object {
            flags |= FRAGMENT_NEW_OBJECT;
        }
        if fragment.has_value() {
            flags |= FRAGMENT_HAS_VALUE;
        }
        writer.write_byte(flags);
        if let Some(value) = fragment.saved_value()? {
            write_object(writer, &value, 0)?;
        }
    }
    Ok(())
}

fn read_operation(reader: &mut Reader<'_>, ctx: &DecodeContext) -> Result<Operation, DecodeError> {
    let flags = reader.read_byte("operation flags")?;
    if flags & !OP_TITLED != 0 {
        return Err(DecodeError::ReservedBitsSet {
            context: "operation flags",
        });
    }
    let title = if flags & OP_TITLED != 0 {
        Some(reader.read_string(MAX_TITLE_LEN, "title")?)
    } else {
        None
    };
    let count = reader.read_len(MAX_FRAGMENTS, "fragments")?;
    let mut fragments = Vec::with_capacity(count.min(reader.remaining_len()));
    for _ in 0..count {
        let (num, generation) = read_ref(reader)?;
        if num == 0 {
            return Err(DecodeError::ObjectNumberOutOfRange { num: 0 });
        }
        let flags = reader.read_byte("fragment flags")?;
        if flags & !(FRAGMENT_NEW_OBJECT | FRAGMENT_HAS_VALUE) != 0 {
            return Err(DecodeError::ReservedBitsSet {
                context: "fragment flags",
            });
        }
        let value = if flags & FRAGMENT_HAS_VALUE != 0 {
            Some(read_object(reader, ctx, 0)?)
        } else {
            None
        };
        fragments.push(Fragment::new(
            num,
            generation,
            flags & FRAGMENT_NEW_OBJECT != 0,
            value,
        ));
    }
    Ok(Operation { title, fragments })
}

fn decompress_zstd(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_varint("uncompressed_size")? as usize;
    if declared_size > MAX_JOURNAL_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed_size",
            len: declared_size,
            max: MAX_JOURNAL_SIZE,
        });
    }

    let mut decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
    let mut decompressed = Vec::with_capacity(declared_size);
    decoder
        .by_ref()
        .take(MAX_JOURNAL_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}
