//! Traversal guards for walking object graphs.
//!
//! Direct containers form a DAG, but indirect references can close cycles
//! through the document table. Every algorithm that follows references uses
//! one of these guards:
//!
//! - [`CycleList`]: stack frames linked through the call stack, for
//!   recursive algorithms that need to know the chain back to the root.
//! - [`MarkBits`]: one bit per object number, for single-pass walks that
//!   must visit each indirect object exactly once.
//! - [`MarkList`]: a LIFO list of object numbers, for walks where a number
//!   may be revisited on another branch once the current branch returns.
//!
//! All guards are plain values owned by the algorithm using them, so nested
//! and reentrant walks never share state and nothing outlives the walk.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::model::Obj;

// =============================================================================
// CYCLE LIST
// =============================================================================

/// One frame of a cycle-detection chain.
///
/// Frames live on the call stack; each points at its caller's frame. A frame
/// for a direct object carries number 0, which never matches.
#[derive(Debug, Clone, Copy)]
pub struct CycleList<'a> {
    up: Option<&'a CycleList<'a>>,
    num: u32,
}

impl<'a> CycleList<'a> {
    /// Creates a frame for object number `num` below `up`.
    pub fn push(up: Option<&'a CycleList<'a>>, num: u32) -> Self {
        CycleList { up, num }
    }

    /// Like [`CycleList::push`], but fails if `num` is already on the chain.
    pub fn enter(up: Option<&'a CycleList<'a>>, num: u32) -> Result<Self> {
        if Self::on_chain(up, num) {
            return Err(Error::Cycle { num });
        }
        Ok(Self::push(up, num))
    }

    /// Creates a frame for `obj`, failing if its object number is on the chain.
    pub fn enter_obj(up: Option<&'a CycleList<'a>>, obj: &Obj) -> Result<Self> {
        Self::enter(up, obj.to_num())
    }

    /// Returns true if `num` appears on the chain starting at `list`.
    pub fn on_chain(list: Option<&CycleList<'_>>, num: u32) -> bool {
        num != 0 && list.is_some_and(|frame| frame.contains(num))
    }

    /// Returns true if `num` appears in this frame or any frame above it.
    pub fn contains(&self, num: u32) -> bool {
        if num == 0 {
            return false;
        }
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current.num == num {
                return true;
            }
            frame = current.up;
        }
        false
    }

    /// Object number of this frame.
    pub fn num(&self) -> u32 {
        self.num
    }

    /// Number of frames from this one up to the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = Some(self);
        while let Some(current) = frame {
            depth += 1;
            frame = current.up;
        }
        depth
    }
}

// =============================================================================
// MARK BITS
// =============================================================================

/// A fixed bitmap with one bit per object number.
#[derive(Debug, Clone)]
pub struct MarkBits {
    words: Vec<u64>,
    len: usize,
}

impl MarkBits {
    /// Creates a bitmap covering object numbers `0..len`.
    pub fn new(len: usize) -> Self {
        MarkBits {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of object numbers covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the bit for `num`.
    ///
    /// Returns true if the bit was newly set, false if it was already set
    /// or `num` is out of range.
    pub fn set(&mut self, num: u32) -> bool {
        let index = num as usize;
        if index >= self.len {
            return false;
        }
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Sets the bit for an indirect object; direct objects are never marked.
    pub fn set_obj(&mut self, obj: &Obj) -> bool {
        match obj.to_num() {
            0 => false,
            num => self.set(num),
        }
    }

    /// Returns true if the bit for `num` is set.
    pub fn test(&self, num: u32) -> bool {
        let index = num as usize;
        index < self.len && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Clears the bit for `num`.
    pub fn clear(&mut self, num: u32) {
        let index = num as usize;
        if index < self.len {
            self.words[index / 64] &= !(1u64 << (index % 64));
        }
    }

    /// Clears every bit.
    pub fn reset(&mut self) {
        self.words.fill(0);
    }
}

// =============================================================================
// MARK LIST
// =============================================================================

/// A LIFO list of visited object numbers.
///
/// The first eight entries are stored inline.
#[derive(Debug, Clone, Default)]
pub struct MarkList {
    nums: SmallVec<[u32; 8]>,
}

impl MarkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `num` unless it is already present.
    ///
    /// Returns false, leaving the list unchanged, if `num` was present.
    pub fn push(&mut self, num: u32) -> bool {
        if self.contains(num) {
            return false;
        }
        self.nums.push(num);
        true
    }

    /// Pushes the object number of `obj`.
    ///
    /// Direct objects push a placeholder that never matches, so every
    /// successful push can be paired with a [`MarkList::pop`].
    pub fn push_obj(&mut self, obj: &Obj) -> bool {
        self.push(obj.to_num())
    }

    /// Returns true if `num` is on the list.
    pub fn contains(&self, num: u32) -> bool {
        num != 0 && self.nums.contains(&num)
    }

    /// Returns true if the object number of `obj` is on the list.
    pub fn check(&self, obj: &Obj) -> bool {
        self.contains(obj.to_num())
    }

    /// Removes the most recently pushed number.
    pub fn pop(&mut self) -> Option<u32> {
        self.nums.pop()
    }

    pub fn len(&self) -> usize {
        self.nums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nums.is_empty()
    }

    /// Returns true once the list has outgrown its inline storage.
    pub fn spilled(&self) -> bool {
        self.nums.spilled()
    }
}

// =============================================================================
// VISITED SET
// =============================================================================

/// Identity set of direct containers, used to walk a DAG of shared
/// containers without visiting any of them twice.
#[derive(Debug, Default)]
pub(crate) struct Visited {
    seen: FxHashSet<usize>,
}

impl Visited {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a container is seen. Scalars and
    /// references are never recorded.
    pub(crate) fn first_visit(&mut self, obj: &Obj) -> bool {
        match obj.container_addr() {
            Some(addr) => self.seen.insert(addr),
            None => true,
        }
    }
}

/// Calls `f` once for every direct container reachable from `root`,
/// `root` included, without following indirect references.
pub(crate) fn for_each_container(root: &Obj, mut f: impl FnMut(&Obj)) {
    let mut visited = Visited::new();
    let mut pending = vec![root.clone()];
    while let Some(obj) = pending.pop() {
        if !obj.is_container() || !visited.first_visit(&obj) {
            continue;
        }
        f(&obj);
        obj.collect_children(&mut pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_list_detects_repeat() {
        let root = CycleList::push(None, 5);
        let child = CycleList::enter(Some(&root), 7).unwrap();
        assert!(child.contains(5));
        assert_eq!(child.depth(), 2);
        assert!(matches!(
            CycleList::enter(Some(&child), 5),
            Err(Error::Cycle { num: 5 })
        ));
        // direct objects never collide
        let direct = CycleList::enter(Some(&child), 0).unwrap();
        assert!(CycleList::enter(Some(&direct), 0).is_ok());
    }

    #[test]
    fn test_mark_bits() {
        let mut bits = MarkBits::new(130);
        assert!(bits.set(3));
        assert!(!bits.set(3));
        assert!(bits.set(129));
        assert!(!bits.set(130));
        assert!(bits.test(129));
        bits.clear(3);
        assert!(!bits.test(3));
        bits.reset();
        assert!(!bits.test(129));
    }

    #[test]
    fn test_mark_list_lifo() {
        let mut list = MarkList::new();
        assert!(list.push(4));
        assert!(list.push(9));
        assert!(!list.push(4));
        assert_eq!(list.pop(), Some(9));
        assert!(list.push(9));
        assert_eq!(list.len(), 2);
        assert!(!list.contains(0));
    }

    #[test]
    fn test_mark_list_spills() {
        let mut list = MarkList::new();
        for num in 1..=8 {
            list.push(num);
        }
        assert!(!list.spilled());
        list.push(9);
        assert!(list.spilled());
        assert!(list.contains(9));
    }

    #[test]
    fn test_direct_objects_push_placeholder() {
        let mut list = MarkList::new();
        assert!(list.push_obj(&Obj::Int(3)));
        assert!(list.push_obj(&Obj::Int(4)));
        assert_eq!(list.len(), 2);
        assert!(!list.check(&Obj::Int(3)));
    }
}
