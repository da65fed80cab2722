//! The document object table.
//!
//! A [`Document`] owns the indirect objects of one PDF file: a table indexed
//! by object number, the interning table its names come from, an optional
//! stream loader, and the undo journal. In-graph references never own their
//! targets; they are resolved through this table on demand, so reference
//! cycles between indirect objects never keep each other alive.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::guard::{MarkBits, Visited};
use crate::journal::Journal;
use crate::limits::MAX_OBJECT_NUMBER;
use crate::model::header::{bind_tree, clean_tree, prepare_adoption, unbind_tree};
use crate::model::{Array, Dict, Indirect, Name, NameTable, Obj, Stream, check_ref_range, names};

/// Supplies stream payloads that are not held in memory, and undoes
/// stream filters.
///
/// Parsing and decompression live outside this crate; a document forwards
/// [`Stream::raw_bytes`] and [`Stream::decoded_bytes`] requests here.
pub trait StreamLoader {
    /// Returns the undecoded bytes of the stream stored as object
    /// `num generation` in the source file.
    fn raw_bytes(&self, num: u32, generation: u16) -> io::Result<Vec<u8>>;

    /// Undoes the filters named in `dict` on `raw`.
    fn decode(&self, dict: &Dict, raw: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) generation: u16,
    pub(crate) obj: Obj,
    pub(crate) dirty: bool,
}

pub(crate) struct DocInner {
    /// Slot 0 is reserved and always empty.
    pub(crate) table: RefCell<Vec<Option<Entry>>>,
    pub(crate) journal: RefCell<Option<Journal>>,
    names: &'static NameTable,
    loader: RefCell<Option<Rc<dyn StreamLoader>>>,
}

/// A handle to a document. Clones share the same document.
#[derive(Clone)]
pub struct Document(pub(crate) Rc<DocInner>);

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document interning names through the standard table.
    pub fn new() -> Self {
        Self::with_names(NameTable::standard())
    }

    pub fn with_names(names: &'static NameTable) -> Self {
        Document(Rc::new(DocInner {
            table: RefCell::new(vec![None]),
            journal: RefCell::new(None),
            names,
            loader: RefCell::new(None),
        }))
    }

    pub(crate) fn from_inner(inner: Rc<DocInner>) -> Self {
        Document(inner)
    }

    pub(crate) fn weak(&self) -> Weak<DocInner> {
        Rc::downgrade(&self.0)
    }

    /// Returns true if both handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn names(&self) -> &'static NameTable {
        self.0.names
    }

    /// Interns `text` through the document's name table.
    pub fn name(&self, text: &str) -> Name {
        self.0.names.intern(text.as_bytes())
    }

    pub fn set_stream_loader(&self, loader: impl StreamLoader + 'static) {
        *self.0.loader.borrow_mut() = Some(Rc::new(loader));
    }

    pub(crate) fn stream_loader(&self) -> Option<Rc<dyn StreamLoader>> {
        self.0.loader.borrow().clone()
    }

    // =========================================================================
    // TABLE
    // =========================================================================

    /// Number of table slots, including the reserved slot 0.
    pub fn len(&self) -> usize {
        self.0.table.borrow().len()
    }

    /// Returns true if no object has ever been allocated.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Highest object number allocated so far.
    pub fn highest_number(&self) -> u32 {
        (self.len() - 1) as u32
    }

    /// Reserves the next object number and installs a null object there.
    pub fn allocate_number(&self) -> Result<u32> {
        let next = self.len();
        if next > MAX_OBJECT_NUMBER as usize {
            return Err(Error::ObjectNumberOutOfRange { num: next as u64 });
        }
        let num = next as u32;
        self.record_fragment(num, true)?;
        self.0.table.borrow_mut().push(Some(Entry {
            generation: 0,
            obj: Obj::Null,
            dirty: true,
        }));
        trace!(num, "allocated object number");
        Ok(num)
    }

    /// Stores `obj` as a new indirect object and returns a reference to it.
    pub fn add_object(&self, obj: impl Into<Obj>) -> Result<Indirect> {
        let obj = obj.into();
        prepare_adoption(None, self.weak(), 0, &obj)?;
        let num = self.allocate_number()?;
        bind_tree(&obj, &self.weak(), num);
        obj.mark_dirty();
        let old = self.install(num, 0, obj);
        drop(old);
        Ok(Indirect::bound(num, 0, self.weak()))
    }

    /// Stores a new stream object, setting its `/Length`.
    pub fn add_stream(&self, dict: Dict, data: impl Into<Rc<[u8]>>) -> Result<Indirect> {
        let data: Rc<[u8]> = data.into();
        dict.put(names::LENGTH, Obj::from(data.len()))?;
        self.add_object(Stream::new(dict, data))
    }

    /// Replaces the value of an existing indirect object.
    pub fn update_object(&self, num: u32, obj: impl Into<Obj>) -> Result<()> {
        let obj = obj.into();
        let generation = self.entry_generation(num)?;
        prepare_adoption(None, self.weak(), num, &obj)?;
        self.record_fragment(num, false)?;
        let old = self.install(num, generation, obj.clone());
        // containers shared with the old value stay bound
        if let Some(old) = &old {
            unbind_tree(old);
        }
        bind_tree(&obj, &self.weak(), num);
        obj.mark_dirty();
        drop(old);
        Ok(())
    }

    /// Removes an indirect object. References to it resolve to null.
    pub fn delete_object(&self, num: u32) -> Result<()> {
        self.entry_generation(num)?;
        self.record_fragment(num, false)?;
        let old = self
            .0
            .table
            .borrow_mut()
            .get_mut(num as usize)
            .and_then(Option::take);
        if let Some(entry) = &old {
            unbind_tree(&entry.obj);
        }
        debug!(num, "deleted object");
        drop(old);
        Ok(())
    }

    fn entry_generation(&self, num: u32) -> Result<u16> {
        self.0
            .table
            .borrow()
            .get(num as usize)
            .and_then(Option::as_ref)
            .filter(|_| num != 0)
            .map(|entry| entry.generation)
            .ok_or(Error::NoSuchObject { num })
    }

    /// Puts `obj` in slot `num`, returning the previous value.
    fn install(&self, num: u32, generation: u16, obj: Obj) -> Option<Obj> {
        let mut table = self.0.table.borrow_mut();
        let slot = &mut table[num as usize];
        let old = slot.take().map(|entry| entry.obj);
        *slot = Some(Entry {
            generation,
            obj,
            dirty: true,
        });
        old
    }

    /// The current value of object `num`, if it exists.
    pub fn object(&self, num: u32) -> Option<Obj> {
        self.0
            .table
            .borrow()
            .get(num as usize)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.obj.clone())
    }

    /// Looks up `num generation R`. Missing objects and generation
    /// mismatches give null.
    pub fn resolve(&self, num: u32, generation: u16) -> Obj {
        let table = self.0.table.borrow();
        match table.get(num as usize).and_then(|slot| slot.as_ref()) {
            Some(entry) if entry.generation == generation => entry.obj.clone(),
            Some(entry) => {
                trace!(num, generation, found = entry.generation, "generation mismatch");
                Obj::Null
            }
            None => {
                trace!(num, generation, "dangling reference");
                Obj::Null
            }
        }
    }

    /// Creates a reference to `num generation R` in this document.
    pub fn new_indirect(&self, num: u32, generation: u32) -> Result<Indirect> {
        let (num, generation) = check_ref_range(num as u64, generation as u64)?;
        Ok(Indirect::bound(num, generation, self.weak()))
    }

    /// Creates an empty array bound to this document.
    pub fn new_array(&self) -> Array {
        Array::from_parts(self.weak(), Vec::new())
    }

    /// Creates an empty dictionary bound to this document.
    pub fn new_dict(&self) -> Dict {
        Dict::from_parts(self.weak(), Vec::new())
    }

    // =========================================================================
    // DIRTY TRACKING
    // =========================================================================

    pub fn is_object_dirty(&self, num: u32) -> bool {
        self.0
            .table
            .borrow()
            .get(num as usize)
            .and_then(|slot| slot.as_ref())
            .is_some_and(|entry| entry.dirty)
    }

    pub(crate) fn mark_entry_dirty(&self, num: u32) {
        if let Some(Some(entry)) = self.0.table.borrow_mut().get_mut(num as usize) {
            entry.dirty = true;
        }
    }

    /// Numbers of the objects changed since they were last cleaned.
    pub fn dirty_objects(&self) -> Vec<u32> {
        self.0
            .table
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|entry| entry.dirty))
            .map(|(num, _)| num as u32)
            .collect()
    }

    /// Clears the dirty state of object `num` and its direct containers.
    pub fn clean_object(&self, num: u32) {
        let obj = {
            let mut table = self.0.table.borrow_mut();
            match table.get_mut(num as usize) {
                Some(Some(entry)) => {
                    entry.dirty = false;
                    entry.obj.clone()
                }
                _ => return,
            }
        };
        clean_tree(&obj);
    }

    /// Clears the dirty state of every object, as after a full save.
    pub fn clean_all(&self) {
        for num in 1..self.len() as u32 {
            self.clean_object(num);
        }
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// A bitmap covering every allocated object number.
    pub fn mark_bits(&self) -> MarkBits {
        MarkBits::new(self.len())
    }

    /// Numbers of the indirect objects reachable from `root`, ascending.
    ///
    /// Every object is visited once, whatever the shape of the graph.
    pub fn reachable_objects(&self, root: &Obj) -> Vec<u32> {
        let mut bits = self.mark_bits();
        let mut visited = Visited::new();
        let mut found = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(obj) = pending.pop() {
            if let Obj::Indirect(reference) = &obj {
                if bits.set(reference.num()) {
                    found.push(reference.num());
                    pending.push(self.resolve(reference.num(), reference.generation()));
                }
                continue;
            }
            if obj.is_container() && visited.first_visit(&obj) {
                obj.collect_children(&mut pending);
            }
        }
        found.sort_unstable();
        found
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("objects", &self.highest_number())
            .field("journal", &self.is_journal_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparison, objects_equal};

    struct FixedLoader;

    impl StreamLoader for FixedLoader {
        fn raw_bytes(&self, num: u32, _generation: u16) -> io::Result<Vec<u8>> {
            match num {
                7 => Ok(b"raw".to_vec()),
                _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such stream")),
            }
        }

        fn decode(&self, _dict: &Dict, raw: &[u8]) -> io::Result<Vec<u8>> {
            Ok(raw.to_ascii_uppercase())
        }
    }

    #[test]
    fn test_add_and_resolve() {
        let doc = Document::new();
        let dict = doc.new_dict();
        dict.put_name(names::TYPE, names::CATALOG).unwrap();
        let root = doc.add_object(dict.clone()).unwrap();
        assert_eq!(root.num(), 1);
        assert_eq!(doc.highest_number(), 1);
        assert_eq!(dict.parent_num(), 1);
        assert!(root.resolve().as_dict().unwrap().ptr_eq(&dict));
        assert!(doc.is_object_dirty(1));
    }

    #[test]
    fn test_dangling_and_mismatched_references() {
        let doc = Document::new();
        doc.add_object(Obj::Int(1)).unwrap();
        assert!(doc.new_indirect(9, 0).unwrap().resolve().is_null());
        assert!(doc.new_indirect(1, 3).unwrap().resolve().is_null());
        assert_eq!(doc.new_indirect(1, 0).unwrap().resolve(), Obj::Int(1));
    }

    #[test]
    fn test_reference_chain_cycle() {
        let doc = Document::new();
        let a = doc.allocate_number().unwrap();
        let b = doc.allocate_number().unwrap();
        doc.update_object(a, doc.new_indirect(b, 0).unwrap()).unwrap();
        doc.update_object(b, doc.new_indirect(a, 0).unwrap()).unwrap();
        let r = Obj::Indirect(doc.new_indirect(a, 0).unwrap());
        assert!(r.resolve().is_null());
        assert!(matches!(r.resolve_checked(), Err(Error::Cycle { .. })));
        assert!(!r.is_stream());
    }

    #[test]
    fn test_document_mismatch() {
        let one = Document::new();
        let two = Document::new();
        let foreign = two.new_dict();
        let local = one.new_dict();
        assert!(matches!(local.put("X", foreign.clone()), Err(Error::DocumentMismatch)));
        assert!(matches!(one.add_object(foreign), Err(Error::DocumentMismatch)));
        let foreign_ref = two.add_object(Obj::Int(1)).unwrap();
        assert!(matches!(local.put("Y", foreign_ref), Err(Error::DocumentMismatch)));
        assert!(local.is_empty());
    }

    #[test]
    fn test_mutual_references_do_not_leak() {
        let doc = Document::new();
        let a = doc.new_dict();
        let b = doc.new_dict();
        let a_ref = doc.add_object(a.clone()).unwrap();
        let b_ref = doc.add_object(b.clone()).unwrap();
        a.put("Other", b_ref).unwrap();
        b.put("Other", a_ref).unwrap();
        let weak_a = std::rc::Rc::downgrade(&a.0);
        drop(a);
        drop(b);
        assert!(weak_a.upgrade().is_some());
        drop(doc);
        assert!(weak_a.upgrade().is_none());
    }

    #[test]
    fn test_update_and_delete() {
        let doc = Document::new();
        let old = doc.new_array();
        let r = doc.add_object(old.clone()).unwrap();
        doc.update_object(r.num(), Obj::Int(3)).unwrap();
        assert_eq!(r.resolve(), Obj::Int(3));
        assert!(old.document().is_none());
        doc.delete_object(r.num()).unwrap();
        assert!(r.resolve().is_null());
        assert!(matches!(doc.delete_object(r.num()), Err(Error::NoSuchObject { .. })));
        assert!(matches!(doc.update_object(0, Obj::Null), Err(Error::NoSuchObject { num: 0 })));
    }

    #[test]
    fn test_dirty_bookkeeping() {
        let doc = Document::new();
        let page = doc.new_dict();
        let r = doc.add_object(page.clone()).unwrap();
        doc.add_object(Obj::Int(1)).unwrap();
        doc.clean_all();
        assert!(doc.dirty_objects().is_empty());
        assert!(!page.is_dirty());

        page.put_int(names::ROTATE, 90).unwrap();
        assert_eq!(doc.dirty_objects(), vec![r.num()]);
        assert!(page.is_dirty());
        doc.clean_object(r.num());
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_reachable_objects_visits_each_once() {
        let doc = Document::new();
        let pages = doc.new_dict();
        let pages_ref = doc.add_object(pages.clone()).unwrap();
        let kids = pages.put_array(names::KIDS).unwrap();
        for _ in 0..3 {
            let page = doc.new_dict();
            page.put(names::PARENT, pages_ref.clone()).unwrap();
            kids.push(doc.add_object(page).unwrap()).unwrap();
        }
        doc.add_object(Obj::Int(0)).unwrap();
        let reachable = doc.reachable_objects(&Obj::Indirect(pages_ref));
        assert_eq!(reachable, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stream_loader() {
        let doc = Document::new();
        doc.set_stream_loader(FixedLoader);
        let dict = doc.new_dict();
        dict.put_name(names::FILTER, names::FLATE_DECODE).unwrap();
        let stream = Stream::deferred(dict, 7, 0).unwrap();
        let r = doc.add_object(stream.clone()).unwrap();
        assert_eq!(&*stream.raw_bytes().unwrap(), b"raw");
        assert_eq!(&*stream.decoded_bytes().unwrap(), b"RAW");
        assert!(r.resolve().is_stream());

        let missing = Stream::deferred(doc.new_dict(), 8, 0).unwrap();
        assert!(matches!(
            missing.raw_bytes(),
            Err(Error::StreamUnavailable { num: 8, .. })
        ));
    }

    #[test]
    fn test_add_stream_sets_length() {
        let doc = Document::new();
        let r = doc.add_stream(doc.new_dict(), b"q Q".to_vec()).unwrap();
        let stream = r.resolve().as_stream().unwrap();
        assert_eq!(stream.dict().get_int(&names::LENGTH), 3);
        let copy = r.resolve().deep_copy().unwrap();
        assert!(objects_equal(&copy, &r.resolve(), Comparison::Deep));
    }
}
