use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::document::DocInner;
use crate::error::{Error, Result};
use crate::model::header::{Header, container_bookkeeping};
use crate::model::object::release;
use crate::model::{Comparison, Dict, Matrix, Name, Obj, PdfString, Rect, objects_equal};

/// A PDF array: an ordered sequence of objects.
///
/// `Array` is a handle; clones share the same storage.
#[derive(Clone)]
pub struct Array(pub(crate) Rc<ArrayCell>);

pub(crate) struct ArrayCell {
    pub(crate) header: Header,
    pub(crate) items: RefCell<Vec<Obj>>,
}

impl Drop for ArrayCell {
    fn drop(&mut self) {
        let items = std::mem::take(self.items.get_mut());
        if !items.is_empty() {
            release(items);
        }
    }
}

container_bookkeeping!(Array);

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl Array {
    /// Creates an empty array not bound to any document.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_parts(Weak::new(), Vec::with_capacity(capacity))
    }

    /// Creates an unbound array holding `items`.
    pub fn from_vec(items: Vec<Obj>) -> Self {
        Self::from_parts(Weak::new(), items)
    }

    pub(crate) fn from_parts(doc: Weak<DocInner>, items: Vec<Obj>) -> Self {
        Array(Rc::new(ArrayCell {
            header: Header::new(doc),
            items: RefCell::new(items),
        }))
    }

    pub(crate) fn header(&self) -> &Header {
        &self.0.header
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Returns the element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Obj> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Returns the element at `index`.
    pub fn try_get(&self, index: usize) -> Result<Obj> {
        self.get(index).ok_or_else(|| Error::IndexOutOfBounds {
            index,
            len: self.len(),
        })
    }

    /// Replaces the element at `index`. Putting at `len()` appends; any
    /// other index past the end is an error.
    pub fn put(&self, index: usize, value: impl Into<Obj>) -> Result<()> {
        let value = value.into();
        let len = self.len();
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let adoption = self.header().prepare_insertion(self.addr(), &value)?;
        adoption.apply();
        let old = {
            let mut items = self.0.items.borrow_mut();
            if index == items.len() {
                items.push(value);
                None
            } else {
                Some(std::mem::replace(&mut items[index], value))
            }
        };
        drop(old);
        Ok(())
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<Obj>) -> Result<()> {
        let value = value.into();
        let adoption = self.header().prepare_insertion(self.addr(), &value)?;
        adoption.apply();
        self.0.items.borrow_mut().push(value);
        Ok(())
    }

    /// Inserts an element at `index`, shifting later elements up.
    pub fn insert(&self, index: usize, value: impl Into<Obj>) -> Result<()> {
        let value = value.into();
        let len = self.len();
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let adoption = self.header().prepare_insertion(self.addr(), &value)?;
        adoption.apply();
        self.0.items.borrow_mut().insert(index, value);
        Ok(())
    }

    /// Removes and returns the element at `index`, shifting later elements
    /// down.
    pub fn delete(&self, index: usize) -> Result<Obj> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        self.header().prepare_alteration()?;
        Ok(self.0.items.borrow_mut().remove(index))
    }

    /// Returns the index of the first element equal to `value`.
    ///
    /// Containers compare structurally; references compare by number and
    /// generation without being resolved.
    pub fn find(&self, value: &Obj) -> Option<usize> {
        let items = self.to_vec();
        items
            .iter()
            .position(|item| objects_equal(item, value, Comparison::Shallow))
    }

    pub fn contains(&self, value: &Obj) -> bool {
        self.find(value).is_some()
    }

    /// Iterates over the elements.
    ///
    /// Each step re-reads the array, so the iterator stays valid if the
    /// array is changed while iterating.
    pub fn iter(&self) -> impl Iterator<Item = Obj> + '_ {
        (0..).map_while(move |index| self.get(index))
    }

    /// Returns new handles to all elements.
    pub fn to_vec(&self) -> Vec<Obj> {
        self.0.items.borrow().clone()
    }

    /// Creates a new array in the same document holding the same element
    /// handles.
    pub fn shallow_copy(&self) -> Array {
        Array::from_parts(self.header().doc_weak(), self.to_vec())
    }

    pub fn push_int(&self, value: i64) -> Result<()> {
        self.push(Obj::Int(value))
    }

    pub fn push_real(&self, value: f32) -> Result<()> {
        self.push(Obj::Real(value))
    }

    pub fn push_bool(&self, value: bool) -> Result<()> {
        self.push(Obj::Bool(value))
    }

    pub fn push_name(&self, name: impl Into<Name>) -> Result<()> {
        self.push(Obj::Name(name.into()))
    }

    pub fn push_string(&self, bytes: &[u8]) -> Result<()> {
        self.push(Obj::String(PdfString::new(bytes)))
    }

    pub fn push_text_string(&self, text: &str) -> Result<()> {
        self.push(Obj::new_text_string(text))
    }

    /// Appends a new, empty array and returns it.
    pub fn push_array(&self) -> Result<Array> {
        let child = Array::from_parts(self.header().doc_weak(), Vec::new());
        self.push(Obj::Array(child.clone()))?;
        Ok(child)
    }

    /// Appends a new, empty dictionary and returns it.
    pub fn push_dict(&self) -> Result<Dict> {
        let child = Dict::from_parts(self.header().doc_weak(), Vec::new());
        self.push(Obj::Dict(child.clone()))?;
        Ok(child)
    }

    pub fn put_int(&self, index: usize, value: i64) -> Result<()> {
        self.put(index, Obj::Int(value))
    }

    pub fn put_real(&self, index: usize, value: f32) -> Result<()> {
        self.put(index, Obj::Real(value))
    }

    pub fn put_bool(&self, index: usize, value: bool) -> Result<()> {
        self.put(index, Obj::Bool(value))
    }

    pub fn put_name(&self, index: usize, name: impl Into<Name>) -> Result<()> {
        self.put(index, Obj::Name(name.into()))
    }

    pub fn put_string(&self, index: usize, bytes: &[u8]) -> Result<()> {
        self.put(index, Obj::String(PdfString::new(bytes)))
    }

    pub fn put_text_string(&self, index: usize, text: &str) -> Result<()> {
        self.put(index, Obj::new_text_string(text))
    }

    /// Stores a new, empty array at `index` and returns it.
    pub fn put_array(&self, index: usize) -> Result<Array> {
        let child = Array::from_parts(self.header().doc_weak(), Vec::new());
        self.put(index, Obj::Array(child.clone()))?;
        Ok(child)
    }

    /// Stores a new, empty dictionary at `index` and returns it.
    pub fn put_dict(&self, index: usize) -> Result<Dict> {
        let child = Dict::from_parts(self.header().doc_weak(), Vec::new());
        self.put(index, Obj::Dict(child.clone()))?;
        Ok(child)
    }

    pub fn get_int(&self, index: usize) -> i64 {
        self.get(index).map_or(0, |obj| obj.to_int())
    }

    pub fn get_real(&self, index: usize) -> f32 {
        self.get(index).map_or(0.0, |obj| obj.to_real())
    }

    pub fn get_bool(&self, index: usize) -> bool {
        self.get(index).is_some_and(|obj| obj.to_bool())
    }

    pub fn get_name(&self, index: usize) -> Option<Name> {
        self.get(index).and_then(|obj| obj.as_name())
    }

    pub fn get_string(&self, index: usize) -> Option<PdfString> {
        self.get(index).and_then(|obj| obj.as_string())
    }

    pub fn get_text_string(&self, index: usize) -> String {
        self.get(index).map(|obj| obj.text_string()).unwrap_or_default()
    }

    pub fn get_array(&self, index: usize) -> Option<Array> {
        self.get(index).and_then(|obj| obj.as_array())
    }

    pub fn get_dict(&self, index: usize) -> Option<Dict> {
        self.get(index).and_then(|obj| obj.as_dict())
    }

    pub fn get_rect(&self, index: usize) -> Rect {
        self.get(index).map(|obj| obj.to_rect()).unwrap_or_default()
    }

    pub fn get_matrix(&self, index: usize) -> Matrix {
        self.get(index).map_or(Matrix::IDENTITY, |obj| obj.to_matrix())
    }
}

impl FromIterator<Obj> for Array {
    fn from_iter<I: IntoIterator<Item = Obj>>(iter: I) -> Self {
        Array::from_vec(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&Obj::Array(self.clone()), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(array: &Array) -> Vec<i64> {
        array.iter().map(|obj| obj.to_int()).collect()
    }

    #[test]
    fn test_put_get() {
        let array = Array::new();
        array.push_int(1).unwrap();
        array.push_int(2).unwrap();
        array.put(1, 7).unwrap();
        assert_eq!(array.get(1), Some(Obj::Int(7)));
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn test_put_at_len_appends() {
        let array = Array::new();
        array.put(0, 1).unwrap();
        array.put(1, 2).unwrap();
        assert_eq!(ints(&array), [1, 2]);
        assert!(matches!(
            array.put(5, 3),
            Err(Error::IndexOutOfBounds { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_insert_and_delete_shift() {
        let array: Array = [1, 2, 3].into_iter().map(Obj::from).collect();
        array.insert(0, 0).unwrap();
        assert_eq!(ints(&array), [0, 1, 2, 3]);
        assert_eq!(array.delete(2).unwrap(), Obj::Int(2));
        assert_eq!(ints(&array), [0, 1, 3]);
        assert!(array.delete(3).is_err());
        assert!(array.try_get(3).is_err());
    }

    #[test]
    fn test_find_is_structural() {
        let array = Array::new();
        array.push_name("A").unwrap();
        let inner = array.push_array().unwrap();
        inner.push_int(1).unwrap();

        let needle = Array::new();
        needle.push_int(1).unwrap();
        assert_eq!(array.find(&Obj::Array(needle)), Some(1));
        assert!(array.contains(&Obj::new_name("A")));
        assert!(!array.contains(&Obj::Real(1.0)));
    }

    #[test]
    fn test_typed_puts_replace_in_place() {
        let array: Array = [0, 0, 0, 0].into_iter().map(Obj::from).collect();
        array.put_int(0, 7).unwrap();
        array.put_real(1, 0.5).unwrap();
        array.put_bool(2, true).unwrap();
        array.put_name(3, "Fit").unwrap();
        array.put_string(4, b"raw").unwrap();
        array.put_text_string(5, "caf\u{e9}").unwrap();
        assert_eq!(array.len(), 6);
        assert_eq!(array.get_int(0), 7);
        assert_eq!(array.get_real(1), 0.5);
        assert!(array.get_bool(2));
        assert_eq!(array.get_name(3), Some(Name::new("Fit")));
        assert_eq!(array.get_string(4).map(|s| s.as_bytes().to_vec()), Some(b"raw".to_vec()));
        assert_eq!(array.get_text_string(5), "caf\u{e9}");

        let inner = array.put_array(0).unwrap();
        inner.push_int(1).unwrap();
        let dict = array.put_dict(1).unwrap();
        dict.put_int("N", 2).unwrap();
        assert_eq!(array.get_array(0).map(|a| a.len()), Some(1));
        assert_eq!(array.get_dict(1).map(|d| d.get_int(&Name::new("N"))), Some(2));
        assert!(matches!(
            array.put_int(9, 1),
            Err(Error::IndexOutOfBounds { index: 9, len: 6 })
        ));
    }

    #[test]
    fn test_rect_and_matrix_elements() {
        let array = Array::new();
        array.push(Obj::new_rect(Rect::new(0.0, 0.0, 10.0, 20.0))).unwrap();
        array
            .push(Obj::new_matrix(Matrix::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0)))
            .unwrap();
        array.push_int(3).unwrap();
        assert_eq!(array.get_rect(0), Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(array.get_matrix(1), Matrix::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0));
        assert_eq!(array.get_rect(2), Rect::default());
        assert_eq!(array.get_matrix(7), Matrix::IDENTITY);
    }

    #[test]
    fn test_insert_into_itself_fails() {
        let array = Array::new();
        let child = array.push_array().unwrap();
        assert!(matches!(array.push(array.clone()), Err(Error::DirectCycle)));
        assert!(matches!(child.push(array.clone()), Err(Error::DirectCycle)));
        assert_eq!(child.len(), 0);
    }

    #[test]
    fn test_mutation_marks_dirty_and_drops_memo() {
        let doc = crate::Document::new();
        let array = doc.new_array();
        array.set_memo(crate::model::MemoSlot::Transparency, 1);
        assert_eq!(array.memo(crate::model::MemoSlot::Transparency), Some(1));
        array.push_int(1).unwrap();
        assert!(array.is_dirty());
        assert_eq!(array.memo(crate::model::MemoSlot::Transparency), None);
        array.clean();
        assert!(!array.is_dirty());
    }

    #[test]
    fn test_scratch_memo_slots_are_independent() {
        use crate::model::MemoSlot;
        let doc = crate::Document::new();
        let array = doc.new_array();
        array.set_memo(MemoSlot::Scratch0, 10);
        array.set_memo(MemoSlot::Scratch1, 20);
        assert_eq!(array.memo(MemoSlot::Scratch0), Some(10));
        assert_eq!(array.memo(MemoSlot::Scratch1), Some(20));
        assert_eq!(array.memo(MemoSlot::Overprint), None);
        array.push_int(1).unwrap();
        assert_eq!(array.memo(MemoSlot::Scratch1), None);
    }
}
