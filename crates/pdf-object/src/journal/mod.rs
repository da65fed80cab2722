//! Undo/redo journal.
//!
//! While journalling is enabled, every change to an indirect object happens
//! inside an operation. The first change to an object within an operation
//! saves the object's prior state into a [`Fragment`]; undo and redo
//! exchange those saved states with the live ones.
//!
//! Containers are restored in place: a fragment keeps the contents of every
//! array, dictionary and stream in the object's tree, keyed by the container
//! itself, and trades them with the live contents. Handles held by callers,
//! nested ones included, stay part of the document and observe the restored
//! state.

use std::rc::Weak;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::document::{Document, Entry};
use crate::error::{EncodeError, Error, Result};
use crate::guard::for_each_container;
use crate::limits::{MAX_DEPTH, MAX_TITLE_LEN};
use crate::model::header::bind_tree;
use crate::model::StreamBody;
use crate::model::{Array, Dict, Name, Obj, Stream};

/// The saved state of one object.
pub(crate) struct Fragment {
    pub(crate) num: u32,
    pub(crate) generation: u16,
    /// The operation created this object number.
    pub(crate) new_object: bool,
    /// The value on the other side of the cursor; `None` for an empty slot.
    value: Option<Obj>,
    /// Contents on the other side of the cursor of every container under
    /// `value`.
    cells: Vec<SavedCell>,
}

struct SavedCell {
    container: Obj,
    contents: Contents,
}

enum Contents {
    Array(Vec<Obj>),
    Dict(Vec<(Name, Obj)>),
    /// A stream's dictionary is saved as a container of its own.
    Stream(StreamBody),
}

impl Contents {
    fn read(container: &Obj) -> Option<Contents> {
        match container {
            Obj::Array(array) => Some(Contents::Array(array.to_vec())),
            Obj::Dict(dict) => Some(Contents::Dict(dict.0.entries.borrow().clone())),
            Obj::Stream(stream) => Some(Contents::Stream(stream.body())),
            _ => None,
        }
    }

    /// Trades these contents with the live contents of `container`.
    fn exchange(&mut self, container: &Obj) {
        match (container, self) {
            (Obj::Array(array), Contents::Array(items)) => {
                std::mem::swap(&mut *array.0.items.borrow_mut(), items);
            }
            (Obj::Dict(dict), Contents::Dict(entries)) => {
                std::mem::swap(&mut *dict.0.entries.borrow_mut(), entries);
            }
            (Obj::Stream(stream), Contents::Stream(body)) => {
                std::mem::swap(&mut *stream.0.body.borrow_mut(), body);
            }
            _ => {}
        }
    }
}

fn saved_cells(root: Option<&Obj>) -> Vec<SavedCell> {
    let mut cells = Vec::new();
    if let Some(root) = root {
        for_each_container(root, |container| {
            if let Some(contents) = Contents::read(container) {
                cells.push(SavedCell {
                    container: container.clone(),
                    contents,
                });
            }
        });
    }
    cells
}

fn cell_addrs(cells: &[SavedCell]) -> FxHashSet<usize> {
    cells
        .iter()
        .filter_map(|cell| cell.container.container_addr())
        .collect()
}

fn container_addrs(root: Option<&Obj>) -> FxHashSet<usize> {
    let mut addrs = FxHashSet::default();
    if let Some(root) = root {
        for_each_container(root, |container| {
            addrs.extend(container.container_addr());
        });
    }
    addrs
}

impl Fragment {
    /// Saves `value` as the state of object `num`.
    pub(crate) fn new(num: u32, generation: u16, new_object: bool, value: Option<Obj>) -> Self {
        let cells = saved_cells(value.as_ref());
        Fragment {
            num,
            generation,
            new_object,
            value,
            cells,
        }
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Builds a detached copy of the saved value, as it will read once the
    /// fragment is swapped in.
    pub(crate) fn saved_value(&self) -> Result<Option<Obj>, EncodeError> {
        self.value
            .as_ref()
            .map(|value| rebuild(value, &self.cells, 0))
            .transpose()
    }
}

fn saved_contents<'a>(cells: &'a [SavedCell], container: &Obj) -> Option<&'a Contents> {
    let addr = container.container_addr()?;
    cells
        .iter()
        .find(|cell| cell.container.container_addr() == Some(addr))
        .map(|cell| &cell.contents)
}

fn rebuild(obj: &Obj, cells: &[SavedCell], depth: usize) -> Result<Obj, EncodeError> {
    if depth > MAX_DEPTH {
        return Err(EncodeError::TooDeep { max: MAX_DEPTH });
    }
    Ok(match obj {
        Obj::Array(array) => {
            let items = match saved_contents(cells, obj) {
                Some(Contents::Array(items)) => items.clone(),
                _ => array.to_vec(),
            };
            let items = items
                .iter()
                .map(|item| rebuild(item, cells, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Obj::Array(Array::from_parts(Weak::new(), items))
        }
        Obj::Dict(dict) => Obj::Dict(rebuild_dict(dict, cells, depth)?),
        Obj::Stream(stream) => {
            let body = match saved_contents(cells, obj) {
                Some(Contents::Stream(body)) => body.clone(),
                _ => stream.body(),
            };
            let dict = rebuild_dict(&stream.dict(), cells, depth)?;
            Obj::Stream(Stream::from_parts(dict, body))
        }
        other => other.clone(),
    })
}

fn rebuild_dict(dict: &Dict, cells: &[SavedCell], depth: usize) -> Result<Dict, EncodeError> {
    let container = Obj::Dict(dict.clone());
    let entries = match saved_contents(cells, &container) {
        Some(Contents::Dict(entries)) => entries.clone(),
        _ => dict.0.entries.borrow().clone(),
    };
    let entries = entries
        .iter()
        .map(|(key, value)| Ok((key.clone(), rebuild(value, cells, depth + 1)?)))
        .collect::<Result<Vec<_>, EncodeError>>()?;
    Ok(Dict::from_parts(Weak::new(), entries))
}

/// Summary of one history entry, as returned by
/// [`Document::operation_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub title: Option<String>,
    /// Number of saved object states in the step.
    pub fragments: usize,
    /// Numbers of the objects the step changes, ascending.
    pub objects: Vec<u32>,
}

/// A named group of fragments forming one undo step.
#[derive(Default)]
pub(crate) struct Operation {
    pub(crate) title: Option<String>,
    pub(crate) fragments: Vec<Fragment>,
}

pub(crate) struct OpenOperation {
    operation: Operation,
    /// Fragment count at each nested begin, outermost first.
    marks: Vec<usize>,
    /// Folds into the preceding history entry when it ends.
    implicit: bool,
}

#[derive(Default)]
pub(crate) struct Journal {
    pub(crate) history: Vec<Operation>,
    pub(crate) cursor: usize,
    open: Option<OpenOperation>,
}

impl Journal {
    pub(crate) fn new(history: Vec<Operation>, cursor: usize) -> Self {
        Journal {
            history,
            cursor,
            open: None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn commit(&mut self, open: OpenOperation) {
        if open.operation.fragments.is_empty() {
            trace!("dropping empty operation");
            return;
        }
        let discarded = self.history.len() - self.cursor;
        self.history.truncate(self.cursor);
        if discarded > 0 {
            debug!(discarded, "discarded redo history");
        }
        if open.implicit && self.cursor > 0 {
            let previous = &mut self.history[self.cursor - 1];
            previous.fragments.extend(open.operation.fragments);
            trace!(step = self.cursor - 1, "folded implicit operation");
        } else {
            debug!(title = ?open.operation.title, step = self.cursor, "committed operation");
            self.history.push(open.operation);
            self.cursor += 1;
        }
    }
}

fn clip_title(title: &str) -> String {
    if title.len() <= MAX_TITLE_LEN {
        return title.to_owned();
    }
    let mut end = MAX_TITLE_LEN;
    while !title.is_char_boundary(end) {
        end -= 1;
    }
    title[..end].to_owned()
}

// =============================================================================
// STATE MACHINE
// =============================================================================

impl Document {
    /// Turns journalling on. Has no effect if it is already on.
    pub fn enable_journal(&self) {
        let mut slot = self.0.journal.borrow_mut();
        if slot.is_none() {
            debug!("journal enabled");
            *slot = Some(Journal::default());
        }
    }

    /// Turns journalling off, dropping the history.
    pub fn disable_journal(&self) {
        let journal = self.0.journal.borrow_mut().take();
        if journal.is_some() {
            debug!("journal disabled");
        }
    }

    pub fn is_journal_enabled(&self) -> bool {
        self.0.journal.borrow().is_some()
    }

    /// Returns true while an operation is open.
    pub fn in_operation(&self) -> bool {
        self.0.journal.borrow().as_ref().is_some_and(Journal::is_open)
    }

    /// Opens a named operation, or nests inside the open one.
    ///
    /// A nested begin shares the enclosing operation. If the enclosing
    /// operation has no title yet it takes this one. Without a journal this
    /// does nothing.
    pub fn begin_operation(&self, title: &str) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let Some(journal) = slot.as_mut() else {
            return Ok(());
        };
        match journal.open.as_mut() {
            Some(open) => {
                open.marks.push(open.operation.fragments.len());
                if open.operation.title.is_none() {
                    open.operation.title = Some(clip_title(title));
                    open.implicit = false;
                }
            }
            None => {
                trace!(title, "begin operation");
                journal.open = Some(OpenOperation {
                    operation: Operation {
                        title: Some(clip_title(title)),
                        fragments: Vec::new(),
                    },
                    marks: vec![0],
                    implicit: false,
                });
            }
        }
        Ok(())
    }

    /// Opens an untitled operation that folds into the previous history
    /// entry, or nests inside the open operation.
    pub fn begin_implicit_operation(&self) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let Some(journal) = slot.as_mut() else {
            return Ok(());
        };
        match journal.open.as_mut() {
            Some(open) => open.marks.push(open.operation.fragments.len()),
            None => {
                journal.open = Some(OpenOperation {
                    operation: Operation::default(),
                    marks: vec![0],
                    implicit: true,
                });
            }
        }
        Ok(())
    }

    /// Closes the innermost begin. Closing the outermost one commits the
    /// operation: the redo history is discarded and the cursor advances.
    /// Operations that changed nothing leave no history entry.
    pub fn end_operation(&self) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let Some(journal) = slot.as_mut() else {
            return Ok(());
        };
        let Some(open) = journal.open.as_mut() else {
            return Err(Error::NoOpenOperation);
        };
        open.marks.pop();
        if !open.marks.is_empty() {
            return Ok(());
        }
        if let Some(open) = journal.open.take() {
            journal.commit(open);
        }
        Ok(())
    }

    /// Closes the innermost begin, reverting every change made since it.
    pub fn abandon_operation(&self) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let Some(journal) = slot.as_mut() else {
            return Ok(());
        };
        let Some(open) = journal.open.as_mut() else {
            return Err(Error::NoOpenOperation);
        };
        let mark = open.marks.pop().unwrap_or(0);
        let mut fragments = open.operation.fragments.split_off(mark);
        if open.marks.is_empty() {
            journal.open = None;
        }
        debug!(fragments = fragments.len(), "abandoning operation");
        for fragment in fragments.iter_mut().rev() {
            self.swap_fragment(fragment);
        }
        Ok(())
    }

    /// Reverts the operation before the cursor.
    pub fn undo(&self) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let journal = slot.as_mut().ok_or(Error::JournalDisabled)?;
        if journal.is_open() {
            return Err(Error::OperationInProgress);
        }
        if journal.cursor == 0 {
            return Err(Error::NothingToUndo);
        }
        journal.cursor -= 1;
        let operation = &mut journal.history[journal.cursor];
        debug!(title = ?operation.title, step = journal.cursor, "undo");
        for fragment in operation.fragments.iter_mut().rev() {
            self.swap_fragment(fragment);
        }
        Ok(())
    }

    /// Reapplies the operation at the cursor.
    pub fn redo(&self) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let journal = slot.as_mut().ok_or(Error::JournalDisabled)?;
        if journal.is_open() {
            return Err(Error::OperationInProgress);
        }
        if journal.cursor >= journal.history.len() {
            return Err(Error::NothingToRedo);
        }
        let operation = &mut journal.history[journal.cursor];
        debug!(title = ?operation.title, step = journal.cursor, "redo");
        for fragment in operation.fragments.iter_mut() {
            self.swap_fragment(fragment);
        }
        journal.cursor += 1;
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.0
            .journal
            .borrow()
            .as_ref()
            .is_some_and(|journal| !journal.is_open() && journal.cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.0
            .journal
            .borrow()
            .as_ref()
            .is_some_and(|journal| !journal.is_open() && journal.cursor < journal.history.len())
    }

    /// Number of history entries and the cursor position.
    pub fn history_length_and_cursor(&self) -> (usize, usize) {
        self.0
            .journal
            .borrow()
            .as_ref()
            .map_or((0, 0), |journal| (journal.history.len(), journal.cursor))
    }

    /// Title of history entry `step`.
    pub fn operation_title(&self, step: usize) -> Option<String> {
        self.0
            .journal
            .borrow()
            .as_ref()
            .and_then(|journal| journal.history.get(step))
            .and_then(|operation| operation.title.clone())
    }

    /// Describes history entry `step`.
    pub fn operation_step(&self, step: usize) -> Option<StepInfo> {
        let slot = self.0.journal.borrow();
        let operation = slot.as_ref()?.history.get(step)?;
        let mut objects: Vec<u32> = operation.fragments.iter().map(|f| f.num).collect();
        objects.sort_unstable();
        objects.dedup();
        Some(StepInfo {
            title: operation.title.clone(),
            fragments: operation.fragments.len(),
            objects,
        })
    }

    /// Drops the whole history, as after repairing a broken file. The
    /// journal stays enabled.
    pub fn discard_journal(&self) {
        let mut slot = self.0.journal.borrow_mut();
        if let Some(journal) = slot.as_mut() {
            debug!(operations = journal.history.len(), "discarding journal");
            *journal = Journal::default();
        }
    }

    // =========================================================================
    // FRAGMENTS
    // =========================================================================

    /// Snapshots object `num` into the open operation before it changes.
    ///
    /// Does nothing without a journal, or if the object was already saved
    /// since the innermost begin.
    pub(crate) fn record_fragment(&self, num: u32, new_object: bool) -> Result<()> {
        let mut slot = self.0.journal.borrow_mut();
        let Some(journal) = slot.as_mut() else {
            return Ok(());
        };
        let Some(open) = journal.open.as_mut() else {
            return Err(Error::NotInOperation);
        };
        let mark = open.marks.last().copied().unwrap_or(0);
        if open.operation.fragments[mark..].iter().any(|f| f.num == num) {
            return Ok(());
        }
        let (generation, value) = match self.0.table.borrow().get(num as usize) {
            Some(Some(entry)) => (entry.generation, Some(entry.obj.clone())),
            _ => (0, None),
        };
        trace!(num, new_object, "recorded fragment");
        open.operation
            .fragments
            .push(Fragment::new(num, generation, new_object, value));
        Ok(())
    }

    /// Exchanges the live state of a fragment's object with its saved one.
    ///
    /// The slot takes the saved root and every saved container takes back
    /// its saved contents. Containers that leave the object are unbound.
    fn swap_fragment(&self, fragment: &mut Fragment) {
        let num = fragment.num;
        let doc = self.weak();
        let old = {
            let mut table = self.0.table.borrow_mut();
            if table.len() <= num as usize {
                table.resize(num as usize + 1, None);
            }
            let slot = &mut table[num as usize];
            let old = slot.take();
            if let Some(obj) = fragment.value.take() {
                *slot = Some(Entry {
                    generation: fragment.generation,
                    obj,
                    dirty: true,
                });
            }
            old
        };
        fragment.generation = old.as_ref().map_or(0, |entry| entry.generation);
        fragment.value = old.map(|entry| entry.obj);

        let retiring = saved_cells(fragment.value.as_ref());
        let leaving = cell_addrs(&retiring);
        let restored = cell_addrs(&fragment.cells);
        for cell in &mut fragment.cells {
            cell.contents.exchange(&cell.container);
            if let Some(header) = cell.container.header() {
                header.set_dirty();
            }
        }
        // The cells now hold the contents just replaced; containers the
        // saved state did not have keep theirs and are saved as they are.
        fragment.cells.retain(|cell| {
            cell.container
                .container_addr()
                .is_some_and(|addr| leaving.contains(&addr))
        });
        fragment.cells.extend(retiring.into_iter().filter(|cell| {
            cell.container
                .container_addr()
                .is_some_and(|addr| !restored.contains(&addr))
        }));

        let live = self.object(num);
        let staying = container_addrs(live.as_ref());
        if let Some(live) = &live {
            bind_tree(live, &doc, num);
            live.mark_dirty();
        }
        for cell in &fragment.cells {
            let stays = cell
                .container
                .container_addr()
                .is_some_and(|addr| staying.contains(&addr));
            if stays {
                continue;
            }
            if let Some(header) = cell.container.header() {
                header.set_doc(&Weak::new());
                header.set_parent_num(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Array, Comparison, Dict, Name, names, objects_equal};

    fn journalled() -> Document {
        let doc = Document::new();
        doc.enable_journal();
        doc
    }

    fn snapshot(doc: &Document, num: u32) -> Obj {
        doc.object(num).unwrap().deep_copy().unwrap()
    }

    #[test]
    fn test_mutation_outside_operation_fails() {
        let doc = journalled();
        assert!(matches!(doc.add_object(Obj::Int(1)), Err(Error::NotInOperation)));
        assert_eq!(doc.highest_number(), 0);

        doc.begin_operation("setup").unwrap();
        let dict = doc.new_dict();
        doc.add_object(dict.clone()).unwrap();
        doc.end_operation().unwrap();
        assert!(matches!(dict.put_int("A", 1), Err(Error::NotInOperation)));
        assert!(dict.is_empty());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let doc = journalled();
        doc.begin_operation("create").unwrap();
        let page = doc.new_dict();
        page.put_name(names::TYPE, names::PAGE).unwrap();
        let r = doc.add_object(page.clone()).unwrap();
        doc.end_operation().unwrap();
        let s0 = snapshot(&doc, r.num());

        doc.begin_operation("rotate").unwrap();
        page.put_int(names::ROTATE, 90).unwrap();
        page.put_array(names::ANNOTS).unwrap().push_int(1).unwrap();
        doc.end_operation().unwrap();
        let s1 = snapshot(&doc, r.num());

        assert_eq!(doc.history_length_and_cursor(), (2, 2));
        doc.undo().unwrap();
        assert!(objects_equal(&doc.object(r.num()).unwrap(), &s0, Comparison::Deep));
        // the caller's handle sees the restored state
        assert_eq!(page.len(), 1);
        assert!(doc.can_redo());

        doc.redo().unwrap();
        assert!(objects_equal(&doc.object(r.num()).unwrap(), &s1, Comparison::Deep));
        assert_eq!(page.get_int(&names::ROTATE), 90);
        assert_eq!(page.get_array(&names::ANNOTS).unwrap().parent_num(), r.num());
    }

    #[test]
    fn test_undo_object_creation() {
        let doc = journalled();
        doc.begin_operation("add").unwrap();
        let r = doc.add_object(Obj::Int(5)).unwrap();
        doc.end_operation().unwrap();

        doc.undo().unwrap();
        assert!(r.resolve().is_null());
        assert!(doc.object(r.num()).is_none());
        doc.redo().unwrap();
        assert_eq!(r.resolve(), Obj::Int(5));
    }

    #[test]
    fn test_nested_implicit_folds_into_one_entry() {
        let doc = journalled();
        doc.begin_operation("setup").unwrap();
        let array = doc.new_array();
        let r = doc.add_object(array.clone()).unwrap();
        doc.end_operation().unwrap();

        doc.begin_operation("A").unwrap();
        doc.begin_implicit_operation().unwrap();
        array.push_int(1).unwrap();
        doc.end_operation().unwrap();
        array.push_int(2).unwrap();
        doc.end_operation().unwrap();

        assert_eq!(doc.history_length_and_cursor(), (2, 2));
        assert_eq!(doc.operation_title(1).as_deref(), Some("A"));
        doc.undo().unwrap();
        assert!(array.is_empty());
        assert_eq!(r.resolve().as_array().map(|a| a.len()), Some(0));
    }

    #[test]
    fn test_implicit_operation_folds_into_previous() {
        let doc = journalled();
        doc.begin_operation("setup").unwrap();
        let dict = doc.new_dict();
        doc.add_object(dict.clone()).unwrap();
        doc.end_operation().unwrap();

        doc.begin_implicit_operation().unwrap();
        dict.put_int("Count", 3).unwrap();
        doc.end_operation().unwrap();

        assert_eq!(doc.history_length_and_cursor(), (1, 1));
        doc.undo().unwrap();
        assert_eq!(doc.highest_number(), 1);
        assert!(doc.object(1).is_none());
    }

    #[test]
    fn test_named_begin_titles_implicit_operation() {
        let doc = journalled();
        doc.begin_implicit_operation().unwrap();
        doc.begin_operation("Rename").unwrap();
        doc.add_object(Obj::Int(1)).unwrap();
        doc.end_operation().unwrap();
        doc.end_operation().unwrap();
        assert_eq!(doc.operation_title(0).as_deref(), Some("Rename"));
    }

    #[test]
    fn test_abandon_restores_state() {
        let doc = journalled();
        doc.begin_operation("setup").unwrap();
        let array = doc.new_array();
        array.push_int(1).unwrap();
        doc.add_object(array.clone()).unwrap();
        doc.end_operation().unwrap();

        doc.begin_operation("edit").unwrap();
        array.push(Obj::Int(3)).unwrap();
        doc.abandon_operation().unwrap();

        assert_eq!(array.len(), 1);
        assert!(!doc.in_operation());
        assert_eq!(doc.history_length_and_cursor(), (1, 1));
    }

    #[test]
    fn test_nested_abandon_keeps_outer_changes() {
        let doc = journalled();
        doc.begin_operation("setup").unwrap();
        let dict = doc.new_dict();
        doc.add_object(dict.clone()).unwrap();
        doc.end_operation().unwrap();

        doc.begin_operation("outer").unwrap();
        dict.put_int("A", 1).unwrap();
        doc.begin_operation("inner").unwrap();
        dict.put_int("A", 2).unwrap();
        dict.put_int("B", 2).unwrap();
        doc.abandon_operation().unwrap();
        assert!(doc.in_operation());
        assert_eq!(dict.get_int(&names::A), 1);
        assert!(!dict.contains_key(&Name::new("B")));
        doc.end_operation().unwrap();

        doc.undo().unwrap();
        assert!(dict.is_empty());
    }

    /// A page (object 1) holding an empty `/Annots` array, both committed.
    fn page_with_annots(doc: &Document) -> (Dict, Array) {
        doc.begin_operation("setup").unwrap();
        let page = doc.new_dict();
        page.put_name(names::TYPE, names::PAGE).unwrap();
        let annots = page.put_array(names::ANNOTS).unwrap();
        doc.add_object(page.clone()).unwrap();
        doc.end_operation().unwrap();
        (page, annots)
    }

    fn live_annots(doc: &Document) -> Array {
        doc.object(1)
            .and_then(|page| page.as_dict())
            .and_then(|page| page.get_array(&names::ANNOTS))
            .unwrap()
    }

    #[test]
    fn test_abandon_restores_nested_handle() {
        let doc = journalled();
        let (_page, annots) = page_with_annots(&doc);

        doc.begin_operation("edit").unwrap();
        annots.push_int(3).unwrap();
        doc.abandon_operation().unwrap();

        assert!(annots.is_empty());
        assert!(annots.ptr_eq(&live_annots(&doc)));
        assert_eq!(annots.parent_num(), 1);
        assert!(matches!(annots.push_int(4), Err(Error::NotInOperation)));
        assert!(live_annots(&doc).is_empty());
    }

    #[test]
    fn test_undo_redo_keep_nested_handle() {
        let doc = journalled();
        let (page, annots) = page_with_annots(&doc);

        doc.begin_operation("annotate").unwrap();
        annots.push_int(1).unwrap();
        annots.push_dict().unwrap().put_int("N", 2).unwrap();
        doc.end_operation().unwrap();
        let inner = annots.get_dict(1).unwrap();

        doc.undo().unwrap();
        assert!(annots.is_empty());
        assert!(annots.ptr_eq(&live_annots(&doc)));
        assert!(matches!(annots.push_int(99), Err(Error::NotInOperation)));
        // the dictionary created by the undone step left the document
        assert_eq!(inner.parent_num(), 0);
        assert!(inner.document().is_none());

        doc.redo().unwrap();
        assert!(annots.ptr_eq(&live_annots(&doc)));
        assert_eq!(annots.len(), 2);
        assert_eq!(annots.get_int(0), 1);
        assert!(annots.get_dict(1).unwrap().ptr_eq(&inner));
        assert_eq!(inner.parent_num(), 1);
        assert!(matches!(annots.push_int(99), Err(Error::NotInOperation)));
        assert!(page.get_array(&names::ANNOTS).unwrap().ptr_eq(&annots));
    }

    #[test]
    fn test_undo_restores_deleted_child_identity() {
        let doc = journalled();
        let (page, annots) = page_with_annots(&doc);

        doc.begin_operation("remove").unwrap();
        page.del(&names::ANNOTS).unwrap();
        doc.end_operation().unwrap();
        assert!(page.get(&names::ANNOTS).is_none());

        doc.undo().unwrap();
        assert!(page.get_array(&names::ANNOTS).unwrap().ptr_eq(&annots));
        assert_eq!(annots.parent_num(), 1);
    }

    #[test]
    fn test_detached_edit_does_not_survive_redo() {
        let doc = journalled();
        let (page, _annots) = page_with_annots(&doc);

        doc.begin_operation("add list").unwrap();
        let kids = page.put_array(names::KIDS).unwrap();
        kids.push_int(1).unwrap();
        doc.end_operation().unwrap();

        doc.undo().unwrap();
        // no longer part of the document, so it mutates freely
        kids.push_int(99).unwrap();
        doc.redo().unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids.get_int(0), 1);
    }

    #[test]
    fn test_operation_step() {
        let doc = journalled();
        let (page, _annots) = page_with_annots(&doc);
        doc.begin_operation("two objects").unwrap();
        page.put_int(names::ROTATE, 90).unwrap();
        doc.add_object(Obj::Int(1)).unwrap();
        page.put_int(names::ROTATE, 180).unwrap();
        doc.end_operation().unwrap();

        let step = doc.operation_step(1).unwrap();
        assert_eq!(step.title.as_deref(), Some("two objects"));
        assert_eq!(step.fragments, 2);
        assert_eq!(step.objects, vec![1, 2]);
        assert_eq!(doc.operation_step(0).unwrap().objects, vec![1]);
        assert!(doc.operation_step(2).is_none());
    }

    #[test]
    fn test_new_edit_discards_redo_history() {
        let doc = journalled();
        for value in 0..3 {
            doc.begin_operation("add").unwrap();
            doc.add_object(Obj::Int(value)).unwrap();
            doc.end_operation().unwrap();
        }
        doc.undo().unwrap();
        doc.undo().unwrap();
        assert_eq!(doc.history_length_and_cursor(), (3, 1));

        doc.begin_operation("other").unwrap();
        doc.add_object(Obj::Int(9)).unwrap();
        doc.end_operation().unwrap();
        assert_eq!(doc.history_length_and_cursor(), (2, 2));
        assert!(!doc.can_redo());
        assert!(matches!(doc.redo(), Err(Error::NothingToRedo)));
    }

    #[test]
    fn test_boundaries_and_contract_errors() {
        let doc = Document::new();
        assert!(matches!(doc.undo(), Err(Error::JournalDisabled)));
        doc.begin_operation("ignored").unwrap();
        doc.end_operation().unwrap();

        doc.enable_journal();
        assert!(matches!(doc.undo(), Err(Error::NothingToUndo)));
        assert!(matches!(doc.end_operation(), Err(Error::NoOpenOperation)));
        assert!(matches!(doc.abandon_operation(), Err(Error::NoOpenOperation)));

        doc.begin_operation("open").unwrap();
        assert!(matches!(doc.undo(), Err(Error::OperationInProgress)));
        assert!(!doc.can_undo());
        doc.end_operation().unwrap();
        // nothing changed, so nothing was recorded
        assert_eq!(doc.history_length_and_cursor(), (0, 0));
    }

    #[test]
    fn test_stream_content_undo() {
        let doc = journalled();
        doc.begin_operation("add").unwrap();
        let r = doc.add_stream(doc.new_dict(), b"old".to_vec()).unwrap();
        doc.end_operation().unwrap();
        let stream = r.resolve().as_stream().unwrap();

        doc.begin_operation("replace").unwrap();
        stream.set_bytes(b"newer".to_vec()).unwrap();
        doc.end_operation().unwrap();

        doc.undo().unwrap();
        assert_eq!(&*stream.raw_bytes().unwrap(), b"old");
        assert_eq!(stream.dict().get_int(&names::LENGTH), 3);
        doc.redo().unwrap();
        assert_eq!(&*stream.raw_bytes().unwrap(), b"newer");
    }

    #[test]
    fn test_discard_journal() {
        let doc = journalled();
        doc.begin_operation("add").unwrap();
        doc.add_object(Array::new()).unwrap();
        doc.end_operation().unwrap();
        doc.discard_journal();
        assert!(doc.is_journal_enabled());
        assert_eq!(doc.history_length_and_cursor(), (0, 0));
        assert!(!doc.can_undo());
    }
}
