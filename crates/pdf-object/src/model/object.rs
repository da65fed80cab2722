//! The PDF object value.
//!
//! [`Obj`] is a closed sum over the ten object kinds. Scalars are plain
//! values; strings share an immutable buffer; arrays, dictionaries and
//! streams are reference-counted handles whose contents live in a cell that
//! only the container's own methods mutate. Cloning an `Obj` is the `keep`
//! of the reference-counting model and dropping it is the release.

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::document::{DocInner, Document};
use crate::error::{Error, Result};
use crate::guard::MarkList;
use crate::limits::{MAX_GEN_NUMBER, MAX_OBJECT_NUMBER};
use crate::model::header::Header;
use crate::model::{Array, Dict, MemoSlot, Name, Stream};
use crate::util::date::{format_date, parse_date};
use crate::util::text::{decode_text_string, encode_text_string};

/// Object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    Null,
    Bool,
    Int,
    Real,
    Name,
    String,
    Indirect,
    Array,
    Dict,
    Stream,
}

impl ObjKind {
    /// Human-readable kind, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::Null => "null",
            ObjKind::Bool => "boolean",
            ObjKind::Int => "integer",
            ObjKind::Real => "real",
            ObjKind::Name => "name",
            ObjKind::String => "string",
            ObjKind::Indirect => "indirect reference",
            ObjKind::Array => "array",
            ObjKind::Dict => "dictionary",
            ObjKind::Stream => "stream",
        }
    }
}

/// A PDF object.
#[derive(Clone, Default)]
pub enum Obj {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f32),
    Name(Name),
    String(PdfString),
    Indirect(Indirect),
    Array(Array),
    Dict(Dict),
    Stream(Stream),
}

// =============================================================================
// STRINGS
// =============================================================================

/// An immutable PDF string: arbitrary bytes, NULs included.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfString(Rc<[u8]>);

impl PdfString {
    pub fn new(bytes: &[u8]) -> Self {
        PdfString(Rc::from(bytes))
    }

    /// Encodes `text` as a PDF text string (ASCII or UTF-16BE with BOM).
    pub fn from_text(text: &str) -> Self {
        PdfString(Rc::from(encode_text_string(text)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the string as a text string.
    pub fn to_text(&self) -> String {
        decode_text_string(&self.0)
    }
}

impl From<Vec<u8>> for PdfString {
    fn from(bytes: Vec<u8>) -> Self {
        PdfString(Rc::from(bytes))
    }
}

impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", String::from_utf8_lossy(&self.0))
    }
}

// =============================================================================
// INDIRECT REFERENCES
// =============================================================================

/// A non-owning `num gen R` reference, resolved through a document table.
#[derive(Clone)]
pub struct Indirect {
    num: u32,
    generation: u16,
    doc: Weak<DocInner>,
}

impl Indirect {
    /// Creates a reference that is not bound to any document. It resolves
    /// to null until rebuilt through [`Document::new_indirect`].
    pub fn new(num: u32, generation: u32) -> Result<Self> {
        let (num, generation) = check_ref_range(num as u64, generation as u64)?;
        Ok(Indirect {
            num,
            generation,
            doc: Weak::new(),
        })
    }

    pub(crate) fn bound(num: u32, generation: u16, doc: Weak<DocInner>) -> Self {
        Indirect {
            num,
            generation,
            doc,
        }
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn document(&self) -> Option<Document> {
        self.doc.upgrade().map(Document::from_inner)
    }

    /// Looks up the target, following reference chains. Missing objects and
    /// cyclic chains resolve to null.
    pub fn resolve(&self) -> Obj {
        Obj::Indirect(self.clone()).resolve()
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.doc.strong_count() > 0
    }

    pub(crate) fn belongs_to(&self, doc: &Weak<DocInner>) -> bool {
        Weak::ptr_eq(&self.doc, doc)
    }

    /// One step of resolution: the table entry, without following chains.
    fn lookup(&self) -> Obj {
        match self.document() {
            Some(doc) => doc.resolve(self.num, self.generation),
            None => {
                trace!(num = self.num, "reference is not bound to a document");
                Obj::Null
            }
        }
    }
}

impl PartialEq for Indirect {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.generation == other.generation
    }
}

impl Eq for Indirect {}

impl std::hash::Hash for Indirect {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.num.hash(state);
        self.generation.hash(state);
    }
}

impl fmt::Debug for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Validates an object/generation pair coming from outside the crate.
pub(crate) fn check_ref_range(num: u64, generation: u64) -> Result<(u32, u16)> {
    if num > MAX_OBJECT_NUMBER as u64 {
        return Err(Error::ObjectNumberOutOfRange { num });
    }
    if generation > MAX_GEN_NUMBER as u64 {
        return Err(Error::GenerationOutOfRange { generation });
    }
    Ok((num as u32, generation as u16))
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl Obj {
    pub fn new_bool(value: bool) -> Obj {
        Obj::Bool(value)
    }

    pub fn new_int(value: i64) -> Obj {
        Obj::Int(value)
    }

    pub fn new_real(value: f32) -> Obj {
        Obj::Real(value)
    }

    pub fn new_name(text: &str) -> Obj {
        Obj::Name(Name::new(text))
    }

    pub fn new_string(bytes: &[u8]) -> Obj {
        Obj::String(PdfString::new(bytes))
    }

    /// Creates a text string: ASCII when possible, otherwise UTF-16BE with
    /// a byte-order mark.
    pub fn new_text_string(text: &str) -> Obj {
        Obj::String(PdfString::from_text(text))
    }

    /// Creates a `D:` date string for `secs` seconds since the Unix epoch.
    pub fn new_date(secs: i64) -> Obj {
        Obj::String(PdfString::new(format_date(secs).as_bytes()))
    }

    /// Creates an unbound, empty array.
    pub fn new_array() -> Obj {
        Obj::Array(Array::new())
    }

    /// Creates an unbound, empty dictionary.
    pub fn new_dict() -> Obj {
        Obj::Dict(Dict::new())
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Obj {
                fn from(value: $ty) -> Self {
                    Obj::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i64 => Int,
    f32 => Real,
    Name => Name,
    PdfString => String,
    Indirect => Indirect,
    Array => Array,
    Dict => Dict,
    Stream => Stream,
}

impl From<i32> for Obj {
    fn from(value: i32) -> Self {
        Obj::Int(value as i64)
    }
}

impl From<u32> for Obj {
    fn from(value: u32) -> Self {
        Obj::Int(value as i64)
    }
}

impl From<usize> for Obj {
    fn from(value: usize) -> Self {
        Obj::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

// =============================================================================
// INSPECTION
// =============================================================================

impl Obj {
    pub fn kind(&self) -> ObjKind {
        match self {
            Obj::Null => ObjKind::Null,
            Obj::Bool(_) => ObjKind::Bool,
            Obj::Int(_) => ObjKind::Int,
            Obj::Real(_) => ObjKind::Real,
            Obj::Name(_) => ObjKind::Name,
            Obj::String(_) => ObjKind::String,
            Obj::Indirect(_) => ObjKind::Indirect,
            Obj::Array(_) => ObjKind::Array,
            Obj::Dict(_) => ObjKind::Dict,
            Obj::Stream(_) => ObjKind::Stream,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Runs `f` on the resolved object without cloning direct objects.
    fn with_resolved<R>(&self, f: impl FnOnce(&Obj) -> R) -> R {
        match self {
            Obj::Indirect(_) => f(&self.resolve()),
            direct => f(direct),
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, Obj::Indirect(_))
    }

    pub fn is_null(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Null))
    }

    pub fn is_bool(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Bool(_)))
    }

    pub fn is_int(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Int(_)))
    }

    pub fn is_real(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Real(_)))
    }

    pub fn is_number(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Int(_) | Obj::Real(_)))
    }

    pub fn is_name(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Name(_)))
    }

    pub fn is_string(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::String(_)))
    }

    pub fn is_array(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Array(_)))
    }

    /// True for dictionaries and for streams, which carry one.
    pub fn is_dict(&self) -> bool {
        self.with_resolved(|obj| matches!(obj, Obj::Dict(_) | Obj::Stream(_)))
    }

    /// True if the object resolves to a stream. A cyclic reference chain is
    /// never a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self.resolve_checked(), Ok(Obj::Stream(_)))
    }

    /// Returns true if the object is an array, dictionary or stream.
    pub fn is_container(&self) -> bool {
        matches!(self, Obj::Array(_) | Obj::Dict(_) | Obj::Stream(_))
    }

    /// Returns true if both handles refer to the same container.
    pub fn same_container(&self, other: &Obj) -> bool {
        match (self.container_addr(), other.container_addr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

impl Obj {
    /// Resolves indirect references, following chains.
    ///
    /// Non-references are returned unchanged. References to missing objects,
    /// and chains that loop back on themselves, resolve to null.
    pub fn resolve(&self) -> Obj {
        self.resolve_checked().unwrap_or(Obj::Null)
    }

    /// Like [`Obj::resolve`], but reports a looping chain as
    /// [`Error::Cycle`].
    pub fn resolve_checked(&self) -> Result<Obj> {
        let Obj::Indirect(first) = self else {
            return Ok(self.clone());
        };
        let mut chain = MarkList::new();
        let mut current = first.clone();
        loop {
            if !chain.push(current.num) {
                return Err(Error::Cycle { num: current.num });
            }
            match current.lookup() {
                Obj::Indirect(next) => current = next,
                target => return Ok(target),
            }
        }
    }

    /// Object number of an indirect reference, 0 for direct objects.
    pub fn to_num(&self) -> u32 {
        match self {
            Obj::Indirect(r) => r.num,
            _ => 0,
        }
    }

    /// Generation of an indirect reference, 0 for direct objects.
    pub fn to_generation(&self) -> u16 {
        match self {
            Obj::Indirect(r) => r.generation,
            _ => 0,
        }
    }

    pub fn as_indirect(&self) -> Option<&Indirect> {
        match self {
            Obj::Indirect(r) => Some(r),
            _ => None,
        }
    }
}

// =============================================================================
// TYPED ACCESS
// =============================================================================

fn real_to_int(value: f32) -> i64 {
    (value + 0.5).floor() as i64
}

impl Obj {
    pub fn to_bool(&self) -> bool {
        self.to_bool_or(false)
    }

    pub fn to_bool_or(&self, default: bool) -> bool {
        self.with_resolved(|obj| match obj {
            Obj::Bool(value) => *value,
            _ => default,
        })
    }

    /// Integer value; reals are rounded to the nearest integer.
    pub fn to_int(&self) -> i64 {
        self.to_int_or(0)
    }

    pub fn to_int_or(&self, default: i64) -> i64 {
        self.with_resolved(|obj| match obj {
            Obj::Int(value) => *value,
            Obj::Real(value) => real_to_int(*value),
            _ => default,
        })
    }

    pub fn to_real(&self) -> f32 {
        self.to_real_or(0.0)
    }

    pub fn to_real_or(&self, default: f32) -> f32 {
        self.with_resolved(|obj| match obj {
            Obj::Int(value) => *value as f32,
            Obj::Real(value) => *value,
            _ => default,
        })
    }

    pub fn as_name(&self) -> Option<Name> {
        self.with_resolved(|obj| match obj {
            Obj::Name(name) => Some(name.clone()),
            _ => None,
        })
    }

    pub fn as_string(&self) -> Option<PdfString> {
        self.with_resolved(|obj| match obj {
            Obj::String(string) => Some(string.clone()),
            _ => None,
        })
    }

    pub fn as_array(&self) -> Option<Array> {
        self.with_resolved(|obj| match obj {
            Obj::Array(array) => Some(array.clone()),
            _ => None,
        })
    }

    /// The dictionary of a dictionary or stream.
    pub fn as_dict(&self) -> Option<Dict> {
        self.with_resolved(|obj| match obj {
            Obj::Dict(dict) => Some(dict.clone()),
            Obj::Stream(stream) => Some(stream.dict()),
            _ => None,
        })
    }

    pub fn as_stream(&self) -> Option<Stream> {
        self.with_resolved(|obj| match obj {
            Obj::Stream(stream) => Some(stream.clone()),
            _ => None,
        })
    }

    pub fn try_name(&self) -> Result<Name> {
        self.as_name().ok_or_else(|| self.mismatch(ObjKind::Name))
    }

    pub fn try_array(&self) -> Result<Array> {
        self.as_array().ok_or_else(|| self.mismatch(ObjKind::Array))
    }

    pub fn try_dict(&self) -> Result<Dict> {
        self.as_dict().ok_or_else(|| self.mismatch(ObjKind::Dict))
    }

    pub fn try_stream(&self) -> Result<Stream> {
        self.as_stream().ok_or_else(|| self.mismatch(ObjKind::Stream))
    }

    pub fn try_int(&self) -> Result<i64> {
        self.with_resolved(|obj| match obj {
            Obj::Int(value) => Ok(*value),
            other => Err(Error::type_mismatch(ObjKind::Int.name(), other.type_name())),
        })
    }

    fn mismatch(&self, expected: ObjKind) -> Error {
        let found = self.with_resolved(|obj| obj.type_name());
        Error::type_mismatch(expected.name(), found)
    }

    /// Decodes a string object as text; anything else gives an empty string.
    pub fn text_string(&self) -> String {
        self.as_string().map(|s| s.to_text()).unwrap_or_default()
    }

    /// Parses a `D:` date string into seconds since the Unix epoch.
    pub fn to_date(&self) -> Option<i64> {
        parse_date(&self.text_string()).ok()
    }
}

// =============================================================================
// BOOKKEEPING
// =============================================================================

impl Obj {
    pub(crate) fn header(&self) -> Option<&Header> {
        match self {
            Obj::Array(array) => Some(array.header()),
            Obj::Dict(dict) => Some(dict.header()),
            Obj::Stream(stream) => Some(stream.header()),
            _ => None,
        }
    }

    pub(crate) fn container_addr(&self) -> Option<usize> {
        match self {
            Obj::Array(array) => Some(array.addr()),
            Obj::Dict(dict) => Some(dict.addr()),
            Obj::Stream(stream) => Some(stream.addr()),
            _ => None,
        }
    }

    /// Pushes the direct children of a container onto `out`.
    ///
    /// A stream's only child is its dictionary.
    pub(crate) fn collect_children(&self, out: &mut Vec<Obj>) {
        match self {
            Obj::Array(array) => out.extend(array.0.items.borrow().iter().cloned()),
            Obj::Dict(dict) => out.extend(dict.0.entries.borrow().iter().map(|(_, v)| v.clone())),
            Obj::Stream(stream) => out.push(Obj::Dict(stream.dict())),
            _ => {}
        }
    }

    /// Returns another handle to the same object.
    pub fn keep(&self) -> Obj {
        self.clone()
    }

    /// Number of live handles to the object's shared storage; 1 for values
    /// that have none.
    pub fn ref_count(&self) -> usize {
        match self {
            Obj::Array(array) => array.ref_count(),
            Obj::Dict(dict) => dict.ref_count(),
            Obj::Stream(stream) => stream.ref_count(),
            Obj::String(string) => Rc::strong_count(&string.0),
            _ => 1,
        }
    }

    /// The document the object is bound to. Scalars are never bound.
    pub fn document(&self) -> Option<Document> {
        match self {
            Obj::Indirect(r) => r.document(),
            other => other.header().and_then(Header::document),
        }
    }

    /// Number of the indirect object a container is stored in, or 0.
    pub fn parent_num(&self) -> u32 {
        self.header().map_or(0, Header::parent_num)
    }

    pub fn is_dirty(&self) -> bool {
        self.header().is_some_and(Header::is_dirty)
    }

    pub fn mark_dirty(&self) {
        if let Some(header) = self.header() {
            header.set_dirty();
        }
    }

    pub fn clean(&self) {
        if let Some(header) = self.header() {
            header.clean();
        }
    }

    /// Sets the scratch mark of a container, returning its previous state.
    /// Scalars report false.
    pub fn mark(&self) -> bool {
        self.header().is_some_and(Header::mark)
    }

    pub fn unmark(&self) {
        if let Some(header) = self.header() {
            header.unmark();
        }
    }

    pub fn is_marked(&self) -> bool {
        self.header().is_some_and(Header::is_marked)
    }

    pub fn memo(&self, slot: MemoSlot) -> Option<i64> {
        self.header().and_then(|header| header.memo(slot))
    }

    pub fn set_memo(&self, slot: MemoSlot, value: i64) {
        if let Some(header) = self.header() {
            header.set_memo(slot, value);
        }
    }

    /// Returns the memo in `slot`, computing and storing it on a miss.
    pub fn memoize(&self, slot: MemoSlot, compute: impl FnOnce(&Obj) -> i64) -> i64 {
        if let Some(value) = self.memo(slot) {
            return value;
        }
        let value = compute(self);
        self.set_memo(slot, value);
        value
    }
}

// =============================================================================
// RELEASE
// =============================================================================

/// Drops a batch of objects without recursing into nested containers.
///
/// Containers whose last handle is in the batch give up their children to
/// the work list before being freed, so freeing a deeply nested graph uses
/// constant stack.
pub(crate) fn release(mut pending: Vec<Obj>) {
    while let Some(obj) = pending.pop() {
        match obj {
            Obj::Array(array) => {
                if let Ok(mut cell) = Rc::try_unwrap(array.0) {
                    pending.append(cell.items.get_mut());
                }
            }
            Obj::Dict(dict) => {
                if let Ok(mut cell) = Rc::try_unwrap(dict.0) {
                    pending.extend(cell.entries.get_mut().drain(..).map(|(_, value)| value));
                }
            }
            Obj::Stream(stream) => {
                if let Ok(cell) = Rc::try_unwrap(stream.0) {
                    pending.push(Obj::Dict(cell.dict));
                }
            }
            _ => {}
        }
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = crate::codec::PrintOptions {
            tight: true,
            ascii: true,
        };
        match crate::codec::sprint_obj(self, options) {
            Ok(bytes) => f.write_str(&String::from_utf8_lossy(&bytes)),
            Err(_) => f.write_str("<nested too deeply>"),
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Shallow structural equality; see [`crate::model::objects_equal`].
impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        crate::model::objects_equal(self, other, crate::model::Comparison::Shallow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::names;

    #[test]
    fn test_typed_defaults() {
        assert_eq!(Obj::Null.to_int(), 0);
        assert_eq!(Obj::Null.to_int_or(7), 7);
        assert_eq!(Obj::new_name("X").to_real_or(1.5), 1.5);
        assert!(Obj::Int(1).to_bool_or(true));
        assert_eq!(Obj::Real(2.5).to_int(), 3);
        assert_eq!(Obj::Real(-2.5).to_int(), -2);
        assert_eq!(Obj::Int(4).to_real(), 4.0);
    }

    #[test]
    fn test_wrong_variant_access() {
        let name = Obj::Name(names::PAGE);
        let err = name.try_dict().unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: "dictionary",
                found: "name"
            }
        ));
        assert!(name.as_array().is_none());
        assert_eq!(name.try_name().unwrap(), names::PAGE);
    }

    #[test]
    fn test_resolve_is_idempotent_for_direct_objects() {
        let obj = Obj::Int(42);
        assert_eq!(obj.resolve(), obj);
        assert_eq!(obj.resolve().resolve(), obj);
    }

    #[test]
    fn test_unbound_reference_resolves_to_null() {
        let r = Indirect::new(12, 0).unwrap();
        assert!(r.resolve().is_null());
        assert!(Obj::Indirect(r).is_null());
    }

    #[test]
    fn test_reference_ranges() {
        assert!(Indirect::new(MAX_OBJECT_NUMBER, MAX_GEN_NUMBER as u32).is_ok());
        assert!(matches!(
            Indirect::new(MAX_OBJECT_NUMBER + 1, 0),
            Err(Error::ObjectNumberOutOfRange { .. })
        ));
        assert!(matches!(
            Indirect::new(1, 65_536),
            Err(Error::GenerationOutOfRange { generation: 65_536 })
        ));
    }

    #[test]
    fn test_text_string_encoding() {
        let ascii = Obj::new_text_string("Hello");
        assert_eq!(ascii.as_string().unwrap().as_bytes(), b"Hello");
        let unicode = Obj::new_text_string("Grüße");
        let bytes = unicode.as_string().unwrap();
        assert_eq!(&bytes.as_bytes()[..2], &[0xFE, 0xFF]);
        assert_eq!(unicode.text_string(), "Grüße");
    }

    #[test]
    fn test_strings_keep_nul_bytes() {
        let s = Obj::new_string(b"a\0b");
        assert_eq!(s.as_string().unwrap().len(), 3);
    }

    #[test]
    fn test_release_deep_nesting() {
        let root = Array::new();
        let mut current = root.clone();
        for _ in 0..200_000 {
            let next = Array::new();
            current.push(Obj::Array(next.clone())).unwrap();
            current = next;
        }
        drop(current);
        drop(root);
    }

    #[test]
    fn test_keep_shares_identity() {
        let array = Obj::new_array();
        let kept = array.keep();
        assert_eq!(array.ref_count(), 2);
        assert!(array.same_container(&kept));
        drop(kept);
        assert_eq!(array.ref_count(), 1);
    }

    #[test]
    fn test_date_round_trip() {
        let date = Obj::new_date(1_700_000_000);
        assert_eq!(date.to_date(), Some(1_700_000_000));
    }
}
