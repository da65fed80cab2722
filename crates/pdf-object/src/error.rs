//! Error types for the object store, the journal and the binary codecs.

use thiserror::Error;

use crate::limits::{MAX_GEN_NUMBER, MAX_OBJECT_NUMBER};

/// Broad classes of failure.
///
/// Callers use this to tell recoverable usage mistakes apart from
/// corrupt input or I/O trouble without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad index, wrong object kind, journal misuse, history boundaries.
    Usage,
    /// Reference cycles and nesting beyond the supported depth.
    Structural,
    /// Failure of the underlying byte stream.
    Io,
    /// Malformed serialized data.
    Corrupt,
}

/// Error raised by the object store and the journal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("index {index} out of bounds (length: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("object number {num} out of range [0, {max}]", max = MAX_OBJECT_NUMBER)]
    ObjectNumberOutOfRange { num: u64 },

    #[error("generation number {generation} out of range [0, {max}]", max = MAX_GEN_NUMBER)]
    GenerationOutOfRange { generation: u64 },

    #[error("object {num} does not exist")]
    NoSuchObject { num: u32 },

    #[error("container and item belong to different documents")]
    DocumentMismatch,

    #[error("cannot insert a container into itself")]
    DirectCycle,

    #[error("reference cycle through object {num}")]
    Cycle { num: u32 },

    #[error("object nesting exceeds maximum depth {max}")]
    TooDeep { max: usize },

    #[error("cannot alter a journalled document outside an operation")]
    NotInOperation,

    #[error("no operation is open")]
    NoOpenOperation,

    #[error("an operation is still open")]
    OperationInProgress,

    #[error("journalling is not enabled")]
    JournalDisabled,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("stream {num} has no bytes available: {reason}")]
    StreamUnavailable { num: u32, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Cycle { .. } | Error::TooDeep { .. } | Error::DirectCycle => {
                ErrorClass::Structural
            }
            Error::Io(_) | Error::StreamUnavailable { .. } => ErrorClass::Io,
            Error::Decode(_) => ErrorClass::Corrupt,
            Error::Encode(EncodeError::TooDeep { .. }) => ErrorClass::Structural,
            _ => ErrorClass::Usage,
        }
    }

    pub(crate) fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Error::TypeMismatch { expected, found }
    }
}

/// Error during binary decoding of objects, journals and snapshots.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("invalid magic bytes: found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid object tag: {tag}")]
    InvalidTag { tag: u8 },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("object number {num} out of range")]
    ObjectNumberOutOfRange { num: u64 },

    #[error("generation number {generation} out of range")]
    GenerationOutOfRange { generation: u64 },

    #[error("duplicate dictionary key /{key}")]
    DuplicateKey { key: String },

    #[error("object nesting exceeds maximum depth {max}")]
    NestingTooDeep { max: usize },

    #[error("history cursor {cursor} exceeds operation count {len}")]
    CursorOutOfRange { cursor: usize, len: usize },

    #[error("journal was recorded against a different document state")]
    FingerprintMismatch,

    #[error("{len} trailing bytes after {context}")]
    TrailingBytes { context: &'static str, len: usize },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("object nesting exceeds maximum depth {max}")]
    TooDeep { max: usize },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),
}

/// Crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
