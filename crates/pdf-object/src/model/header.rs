//! Per-container bookkeeping: document binding, parent object number,
//! dirty and mark flags, memo slots.
//!
//! Every mutating container method calls [`Header::prepare_alteration`]
//! before touching its cell. That one hook snapshots the enclosing indirect
//! object into the journal and marks the container dirty, so no mutation can
//! bypass journalling.

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use crate::document::{DocInner, Document};
use crate::error::{Error, Result};
use crate::guard::Visited;
use crate::limits::MEMO_SLOTS;
use crate::model::Obj;

const DIRTY: u8 = 1 << 0;
const MARKED: u8 = 1 << 1;

/// Memo slots available on every container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoSlot {
    /// Whether the subtree uses transparency.
    Transparency = 0,
    /// Whether the subtree uses overprint.
    Overprint = 1,
    /// Free for callers' own per-container results.
    Scratch0 = 2,
    /// Free for callers' own per-container results.
    Scratch1 = 3,
}

pub(crate) struct Header {
    doc: RefCell<Weak<DocInner>>,
    parent: Cell<u32>,
    flags: Cell<u8>,
    memo: Cell<[Option<i64>; MEMO_SLOTS]>,
}

impl Header {
    pub(crate) fn new(doc: Weak<DocInner>) -> Self {
        Header {
            doc: RefCell::new(doc),
            parent: Cell::new(0),
            flags: Cell::new(0),
            memo: Cell::new([None; MEMO_SLOTS]),
        }
    }

    pub(crate) fn unbound() -> Self {
        Self::new(Weak::new())
    }

    pub(crate) fn document(&self) -> Option<Document> {
        self.doc.borrow().upgrade().map(Document::from_inner)
    }

    pub(crate) fn doc_weak(&self) -> Weak<DocInner> {
        self.doc.borrow().clone()
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.doc.borrow().strong_count() > 0
    }

    pub(crate) fn belongs_to(&self, doc: &Weak<DocInner>) -> bool {
        Weak::ptr_eq(&self.doc.borrow(), doc)
    }

    pub(crate) fn set_doc(&self, doc: &Weak<DocInner>) {
        *self.doc.borrow_mut() = doc.clone();
    }

    pub(crate) fn parent_num(&self) -> u32 {
        self.parent.get()
    }

    pub(crate) fn set_parent_num(&self, num: u32) {
        self.parent.set(num);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.flags.get() & DIRTY != 0
    }

    /// Sets the dirty flag and forgets every memo.
    pub(crate) fn set_dirty(&self) {
        self.flags.set(self.flags.get() | DIRTY);
        self.memo.set([None; MEMO_SLOTS]);
    }

    pub(crate) fn clean(&self) {
        self.flags.set(self.flags.get() & !DIRTY);
    }

    /// Sets the mark flag, returning its previous state.
    pub(crate) fn mark(&self) -> bool {
        let flags = self.flags.get();
        self.flags.set(flags | MARKED);
        flags & MARKED != 0
    }

    pub(crate) fn unmark(&self) {
        self.flags.set(self.flags.get() & !MARKED);
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.flags.get() & MARKED != 0
    }

    pub(crate) fn memo(&self, slot: MemoSlot) -> Option<i64> {
        self.memo.get()[slot as usize]
    }

    pub(crate) fn set_memo(&self, slot: MemoSlot, value: i64) {
        let mut memo = self.memo.get();
        memo[slot as usize] = Some(value);
        self.memo.set(memo);
    }

    /// Must run before every mutation of the owning container.
    ///
    /// Unbound containers and containers not yet stored in an indirect
    /// object mutate freely. Otherwise the enclosing object is snapshotted
    /// into the open operation (failing with [`Error::NotInOperation`] if
    /// journalling is on and no operation is open) and marked dirty.
    pub(crate) fn prepare_alteration(&self) -> Result<()> {
        let Some(doc) = self.document() else {
            return Ok(());
        };
        let parent = self.parent.get();
        if parent != 0 {
            doc.record_fragment(parent, false)?;
            doc.mark_entry_dirty(parent);
        }
        self.set_dirty();
        Ok(())
    }

    /// Checks `item` for insertion into the container at `owner` and then
    /// runs [`Header::prepare_alteration`]. The returned adoption binds the
    /// item once the caller has stored it.
    pub(crate) fn prepare_insertion(&self, owner: usize, item: &Obj) -> Result<Adoption> {
        let adoption = prepare_adoption(Some(owner), self.doc_weak(), self.parent_num(), item)?;
        self.prepare_alteration()?;
        Ok(adoption)
    }
}

/// Containers that become part of an owner once an insertion goes ahead.
pub(crate) struct Adoption {
    containers: Vec<Obj>,
    doc: Weak<DocInner>,
    parent: u32,
}

/// Checks that `item` may be stored under an owner bound to `doc` inside
/// indirect object `parent`.
///
/// `owner` is the address of the receiving container, if any; finding it
/// among the direct descendants of `item` would create a direct cycle.
/// Nothing is modified until [`Adoption::apply`] runs.
pub(crate) fn prepare_adoption(
    owner: Option<usize>,
    doc: Weak<DocInner>,
    parent: u32,
    item: &Obj,
) -> Result<Adoption> {
    let owner_bound = doc.strong_count() > 0;
    let mut containers = Vec::new();
    let mut visited = Visited::new();
    let mut pending = vec![item.clone()];
    while let Some(obj) = pending.pop() {
        if let Obj::Indirect(reference) = &obj {
            if owner_bound && reference.is_bound() && !reference.belongs_to(&doc) {
                return Err(Error::DocumentMismatch);
            }
            continue;
        }
        let Some(header) = obj.header() else {
            continue;
        };
        if owner.is_some() && obj.container_addr() == owner {
            return Err(Error::DirectCycle);
        }
        if !visited.first_visit(&obj) {
            continue;
        }
        if owner_bound && header.is_bound() && !header.belongs_to(&doc) {
            return Err(Error::DocumentMismatch);
        }
        obj.collect_children(&mut pending);
        containers.push(obj);
    }
    Ok(Adoption {
        containers,
        doc,
        parent,
    })
}

impl Adoption {
    /// Binds the checked containers to the owner's document and parent.
    pub(crate) fn apply(self) {
        let bound = self.doc.strong_count() > 0;
        for obj in &self.containers {
            if let Some(header) = obj.header() {
                if bound && !header.is_bound() {
                    header.set_doc(&self.doc);
                }
                header.set_parent_num(self.parent);
            }
        }
    }
}

/// Binds every direct container under `root` to `doc` and `parent`.
pub(crate) fn bind_tree(root: &Obj, doc: &Weak<DocInner>, parent: u32) {
    crate::guard::for_each_container(root, |obj| {
        if let Some(header) = obj.header() {
            header.set_doc(doc);
            header.set_parent_num(parent);
        }
    });
}

/// Detaches every direct container under `root` from its document.
pub(crate) fn unbind_tree(root: &Obj) {
    bind_tree(root, &Weak::new(), 0);
}

/// Clears the dirty flag of every direct container under `root`.
pub(crate) fn clean_tree(root: &Obj) {
    crate::guard::for_each_container(root, |obj| {
        if let Some(header) = obj.header() {
            header.clean();
        }
    });
}

/// Implements the bookkeeping accessors shared by the container handles.
macro_rules! container_bookkeeping {
    ($ty:ident) => {
        impl $ty {
            /// Returns the document this container is bound to.
            pub fn document(&self) -> Option<$crate::document::Document> {
                self.header().document()
            }

            /// Number of the indirect object this container is stored in,
            /// or 0 if it is not part of one.
            pub fn parent_num(&self) -> u32 {
                self.header().parent_num()
            }

            /// Returns true if the container changed since it was last
            /// cleaned.
            pub fn is_dirty(&self) -> bool {
                self.header().is_dirty()
            }

            /// Marks the container dirty and drops its memos.
            pub fn mark_dirty(&self) {
                self.header().set_dirty()
            }

            /// Clears the dirty flag.
            pub fn clean(&self) {
                self.header().clean()
            }

            /// Sets the scratch mark, returning whether it was already set.
            pub fn mark(&self) -> bool {
                self.header().mark()
            }

            pub fn unmark(&self) {
                self.header().unmark()
            }

            pub fn is_marked(&self) -> bool {
                self.header().is_marked()
            }

            /// Returns the memoized value in `slot`, if still valid.
            pub fn memo(&self, slot: $crate::model::MemoSlot) -> Option<i64> {
                self.header().memo(slot)
            }

            /// Memoizes `value` in `slot` until the container is dirtied.
            pub fn set_memo(&self, slot: $crate::model::MemoSlot, value: i64) {
                self.header().set_memo(slot, value)
            }

            /// Number of live handles to this container.
            pub fn ref_count(&self) -> usize {
                std::rc::Rc::strong_count(&self.0)
            }

            /// Returns true if both handles refer to the same container.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                std::rc::Rc::ptr_eq(&self.0, &other.0)
            }

            pub(crate) fn addr(&self) -> usize {
                std::rc::Rc::as_ptr(&self.0) as *const () as usize
            }
        }
    };
}

pub(crate) use container_bookkeeping;
