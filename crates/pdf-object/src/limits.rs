//! Ranges, limits and format constants.
//!
//! The decoders treat their input as untrusted: every count and length read
//! from a journal or snapshot is checked against these bounds before any
//! allocation happens.

/// Highest valid object number.
pub const MAX_OBJECT_NUMBER: u32 = 8_388_607;

/// Highest valid generation number.
pub const MAX_GEN_NUMBER: u16 = 65_535;

/// Maximum nesting of direct containers accepted by the recursive
/// algorithms (copy, compare, print, encode, decode).
pub const MAX_DEPTH: usize = 1024;

/// Maximum length of a decoded string, name or stream body.
pub const MAX_STRING_LEN: usize = 256 * 1024 * 1024;

/// Maximum number of elements in a decoded array or dictionary.
pub const MAX_CONTAINER_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of operations in a decoded history.
pub const MAX_OPERATIONS: usize = 1 << 20;

/// Maximum number of fragments in one decoded operation.
pub const MAX_FRAGMENTS: usize = 1 << 22;

/// Maximum number of table entries in a decoded snapshot.
pub const MAX_ENTRIES: usize = MAX_OBJECT_NUMBER as usize + 1;

/// Maximum length of an operation title.
pub const MAX_TITLE_LEN: usize = 4096;

/// Maximum size of a serialized journal (after decompression).
pub const MAX_JOURNAL_SIZE: usize = 1024 * 1024 * 1024;

/// Maximum size of a serialized snapshot.
pub const MAX_SNAPSHOT_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Maximum encoded length of a varint.
pub const MAX_VARINT_BYTES: usize = 10;

/// Number of memo slots carried by every container.
pub const MEMO_SLOTS: usize = 4;

/// Magic bytes of an uncompressed journal.
pub const MAGIC_JOURNAL: &[u8; 4] = b"PDFJ";

/// Magic bytes of a zstd-compressed journal.
pub const MAGIC_JOURNAL_COMPRESSED: &[u8; 5] = b"PDFJZ";

/// Magic bytes of a document snapshot.
pub const MAGIC_SNAPSHOT: &[u8; 4] = b"PDFS";

/// Current journal/snapshot format version.
pub const FORMAT_VERSION: u8 = 1;

/// Oldest format version still accepted by the decoders.
pub const MIN_FORMAT_VERSION: u8 = 1;
