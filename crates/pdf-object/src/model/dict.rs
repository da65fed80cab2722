use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::document::DocInner;
use crate::error::{Error, Result};
use crate::guard::MarkList;
use crate::model::header::{Header, container_bookkeeping};
use crate::model::object::release;
use crate::model::{Array, Matrix, Name, Obj, PdfString, Rect, names};

/// A PDF dictionary: unique name keys mapped to objects.
///
/// Entries keep insertion order until [`Dict::sort`] is called. `Dict` is a
/// handle; clones share the same storage.
#[derive(Clone)]
pub struct Dict(pub(crate) Rc<DictCell>);

pub(crate) struct DictCell {
    pub(crate) header: Header,
    pub(crate) entries: RefCell<Vec<(Name, Obj)>>,
}

impl Drop for DictCell {
    fn drop(&mut self) {
        let entries = std::mem::take(self.entries.get_mut());
        if !entries.is_empty() {
            release(entries.into_iter().map(|(_, value)| value).collect());
        }
    }
}

container_bookkeeping!(Dict);

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    /// Creates an empty dictionary not bound to any document.
    pub fn new() -> Self {
        Self::from_parts(Weak::new(), Vec::new())
    }

    pub(crate) fn from_parts(doc: Weak<DocInner>, entries: Vec<(Name, Obj)>) -> Self {
        Dict(Rc::new(DictCell {
            header: Header::new(doc),
            entries: RefCell::new(entries),
        }))
    }

    pub(crate) fn header(&self) -> &Header {
        &self.0.header
    }

    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().is_empty()
    }

    fn position(&self, key: &Name) -> Option<usize> {
        self.0.entries.borrow().iter().position(|(k, _)| k == key)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &Name) -> Option<Obj> {
        self.0
            .entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }

    /// Looks up `key`, falling back to its abbreviated spelling (as used in
    /// inline images, e.g. `/BitsPerComponent` and `/BPC`).
    pub fn get_abbrev(&self, key: &Name, abbrev: &Name) -> Option<Obj> {
        self.get(key).or_else(|| self.get(abbrev))
    }

    /// Looks up `key` here and then up the `/Parent` chain.
    ///
    /// Returns `None` if no ancestor defines the key, or if the chain loops
    /// back on itself.
    pub fn get_inheritable(&self, key: &Name) -> Option<Obj> {
        self.find_inherited(|dict| dict.get(key))
    }

    /// Looks up a `/`-separated key path here and then up the `/Parent`
    /// chain; see [`Dict::get_path`].
    pub fn get_path_inheritable(&self, path: &str) -> Option<Obj> {
        self.find_inherited(|dict| dict.get_path(path))
    }

    fn find_inherited(&self, lookup: impl Fn(&Dict) -> Option<Obj>) -> Option<Obj> {
        let mut chain = MarkList::new();
        let mut current = self.clone();
        loop {
            if let Some(value) = lookup(&current) {
                return Some(value);
            }
            let parent = current.get(&names::PARENT)?;
            if !chain.push_obj(&parent) {
                debug!(num = parent.to_num(), "parent chain loops");
                return None;
            }
            current = parent.as_dict()?;
        }
    }

    /// Follows a `/`-separated key path such as `"Resources/Font/F1"`,
    /// resolving references on the way.
    pub fn get_path(&self, path: &str) -> Option<Obj> {
        let mut current = Obj::Dict(self.clone());
        for key in path.split('/').filter(|key| !key.is_empty()) {
            current = current.as_dict()?.get(&Name::new(key))?;
        }
        Some(current)
    }

    /// Stores `value` at a `/`-separated key path, creating missing
    /// intermediate dictionaries.
    pub fn put_path(&self, path: &str, value: impl Into<Obj>) -> Result<()> {
        let mut keys: Vec<&str> = path.split('/').filter(|key| !key.is_empty()).collect();
        let Some(last) = keys.pop() else {
            return Err(Error::type_mismatch("dictionary key", "empty path"));
        };
        let mut current = self.clone();
        for key in keys {
            let key = Name::new(key);
            current = match current.get(&key) {
                Some(existing) => existing.try_dict()?,
                None => current.put_dict(key)?,
            };
        }
        current.put(last, value)
    }

    pub fn contains_key(&self, key: &Name) -> bool {
        self.position(key).is_some()
    }

    /// Key of the entry at `index`.
    pub fn key_at(&self, index: usize) -> Option<Name> {
        self.0.entries.borrow().get(index).map(|(key, _)| key.clone())
    }

    /// Value of the entry at `index`.
    pub fn value_at(&self, index: usize) -> Option<Obj> {
        self.0.entries.borrow().get(index).map(|(_, value)| value.clone())
    }

    /// Stores `value` under `key`. An existing entry keeps its position.
    pub fn put(&self, key: impl Into<Name>, value: impl Into<Obj>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let adoption = self.header().prepare_insertion(self.addr(), &value)?;
        adoption.apply();
        let old = {
            let mut entries = self.0.entries.borrow_mut();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => Some(std::mem::replace(slot, value)),
                None => {
                    entries.push((key, value));
                    None
                }
            }
        };
        drop(old);
        Ok(())
    }

    /// Removes `key`, returning its value. Later entries shift down.
    /// Deleting an absent key changes nothing.
    pub fn del(&self, key: &Name) -> Result<Option<Obj>> {
        let Some(index) = self.position(key) else {
            return Ok(None);
        };
        self.header().prepare_alteration()?;
        let (_, value) = self.0.entries.borrow_mut().remove(index);
        Ok(Some(value))
    }

    /// Orders the entries by key bytes.
    pub fn sort(&self) -> Result<()> {
        let sorted = self.0.entries.borrow().windows(2).all(|w| w[0].0 <= w[1].0);
        if sorted {
            return Ok(());
        }
        self.header().prepare_alteration()?;
        self.0.entries.borrow_mut().sort_by(|a, b| a.0.cmp(&b.0));
        Ok(())
    }

    /// Iterates over the entries in order, re-reading the dictionary at
    /// every step.
    pub fn iter(&self) -> impl Iterator<Item = (Name, Obj)> + '_ {
        (0..).map_while(move |index| self.0.entries.borrow().get(index).cloned())
    }

    pub fn keys(&self) -> Vec<Name> {
        self.0.entries.borrow().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Creates a new dictionary in the same document holding the same
    /// entries.
    pub fn shallow_copy(&self) -> Dict {
        Dict::from_parts(self.header().doc_weak(), self.0.entries.borrow().clone())
    }

    pub fn get_int(&self, key: &Name) -> i64 {
        self.get_int_or(key, 0)
    }

    pub fn get_int_or(&self, key: &Name, default: i64) -> i64 {
        self.get(key).map_or(default, |obj| obj.to_int_or(default))
    }

    pub fn get_real(&self, key: &Name) -> f32 {
        self.get(key).map_or(0.0, |obj| obj.to_real())
    }

    pub fn get_bool(&self, key: &Name) -> bool {
        self.get(key).is_some_and(|obj| obj.to_bool())
    }

    pub fn get_name(&self, key: &Name) -> Option<Name> {
        self.get(key).and_then(|obj| obj.as_name())
    }

    pub fn get_string(&self, key: &Name) -> Option<PdfString> {
        self.get(key).and_then(|obj| obj.as_string())
    }

    pub fn get_text_string(&self, key: &Name) -> String {
        self.get(key).map(|obj| obj.text_string()).unwrap_or_default()
    }

    pub fn get_array(&self, key: &Name) -> Option<Array> {
        self.get(key).and_then(|obj| obj.as_array())
    }

    pub fn get_dict(&self, key: &Name) -> Option<Dict> {
        self.get(key).and_then(|obj| obj.as_dict())
    }

    pub fn get_rect(&self, key: &Name) -> Rect {
        self.get(key).map(|obj| obj.to_rect()).unwrap_or_default()
    }

    pub fn get_matrix(&self, key: &Name) -> Matrix {
        self.get(key).map_or(Matrix::IDENTITY, |obj| obj.to_matrix())
    }

    /// Seconds since the Unix epoch of a date string entry.
    pub fn get_date(&self, key: &Name) -> Option<i64> {
        self.get(key).and_then(|obj| obj.to_date())
    }

    // =========================================================================
    // INHERITED TYPED GETTERS
    // =========================================================================

    pub fn get_inheritable_int(&self, key: &Name) -> i64 {
        self.get_inheritable(key).map_or(0, |obj| obj.to_int())
    }

    pub fn get_inheritable_real(&self, key: &Name) -> f32 {
        self.get_inheritable(key).map_or(0.0, |obj| obj.to_real())
    }

    pub fn get_inheritable_bool(&self, key: &Name) -> bool {
        self.get_inheritable(key).is_some_and(|obj| obj.to_bool())
    }

    pub fn get_inheritable_name(&self, key: &Name) -> Option<Name> {
        self.get_inheritable(key).and_then(|obj| obj.as_name())
    }

    pub fn get_inheritable_string(&self, key: &Name) -> Option<PdfString> {
        self.get_inheritable(key).and_then(|obj| obj.as_string())
    }

    pub fn get_inheritable_text_string(&self, key: &Name) -> String {
        self.get_inheritable(key)
            .map(|obj| obj.text_string())
            .unwrap_or_default()
    }

    /// Inherited rectangle, as for `/MediaBox` and `/CropBox`.
    pub fn get_inheritable_rect(&self, key: &Name) -> Rect {
        self.get_inheritable(key)
            .map(|obj| obj.to_rect())
            .unwrap_or_default()
    }

    pub fn get_inheritable_matrix(&self, key: &Name) -> Matrix {
        self.get_inheritable(key)
            .map_or(Matrix::IDENTITY, |obj| obj.to_matrix())
    }

    pub fn get_inheritable_date(&self, key: &Name) -> Option<i64> {
        self.get_inheritable(key).and_then(|obj| obj.to_date())
    }

    pub fn put_int(&self, key: impl Into<Name>, value: i64) -> Result<()> {
        self.put(key, Obj::Int(value))
    }

    pub fn put_real(&self, key: impl Into<Name>, value: f32) -> Result<()> {
        self.put(key, Obj::Real(value))
    }

    pub fn put_bool(&self, key: impl Into<Name>, value: bool) -> Result<()> {
        self.put(key, Obj::Bool(value))
    }

    pub fn put_name(&self, key: impl Into<Name>, name: impl Into<Name>) -> Result<()> {
        self.put(key, Obj::Name(name.into()))
    }

    pub fn put_string(&self, key: impl Into<Name>, bytes: &[u8]) -> Result<()> {
        self.put(key, Obj::String(PdfString::new(bytes)))
    }

    pub fn put_text_string(&self, key: impl Into<Name>, text: &str) -> Result<()> {
        self.put(key, Obj::new_text_string(text))
    }

    pub fn put_rect(&self, key: impl Into<Name>, rect: Rect) -> Result<()> {
        self.put(key, Obj::new_rect(rect))
    }

    pub fn put_matrix(&self, key: impl Into<Name>, matrix: Matrix) -> Result<()> {
        self.put(key, Obj::new_matrix(matrix))
    }

    pub fn put_date(&self, key: impl Into<Name>, secs: i64) -> Result<()> {
        self.put(key, Obj::new_date(secs))
    }

    /// Stores a new, empty array under `key` and returns it.
    pub fn put_array(&self, key: impl Into<Name>) -> Result<Array> {
        let child = Array::from_parts(self.header().doc_weak(), Vec::new());
        self.put(key, Obj::Array(child.clone()))?;
        Ok(child)
    }

    /// Stores a new, empty dictionary under `key` and returns it.
    pub fn put_dict(&self, key: impl Into<Name>) -> Result<Dict> {
        let child = Dict::from_parts(self.header().doc_weak(), Vec::new());
        self.put(key, Obj::Dict(child.clone()))?;
        Ok(child)
    }
}

impl<K: Into<Name>> FromIterator<(K, Obj)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, Obj)>>(iter: I) -> Self {
        let mut entries: Vec<(Name, Obj)> = Vec::new();
        for (key, value) in iter {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => entries.push((key, value)),
            }
        }
        Dict::from_parts(Weak::new(), entries)
    }
}

impl std::fmt::Debug for Dict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&Obj::Dict(self.clone()), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_put_existing_key_keeps_len_and_position() {
        let dict = Dict::new();
        dict.put_name(names::TYPE, names::PAGE).unwrap();
        dict.put_int("Count", 1).unwrap();
        dict.put_int(names::TYPE, 5).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.key_at(0), Some(names::TYPE));
        assert_eq!(dict.get(&names::TYPE), Some(Obj::Int(5)));
    }

    #[test]
    fn test_del_shifts_entries() {
        let dict: Dict = [("A", Obj::Int(1)), ("B", Obj::Int(2)), ("C", Obj::Int(3))]
            .into_iter()
            .collect();
        assert_eq!(dict.del(&names::A).unwrap(), Some(Obj::Int(1)));
        assert_eq!(dict.del(&names::A).unwrap(), None);
        assert_eq!(dict.keys(), vec![Name::new("B"), names::C]);
    }

    #[test]
    fn test_sort_orders_by_key_bytes() {
        let dict = Dict::new();
        dict.put_int("Type", 1).unwrap();
        dict.put_int("Annots", 2).unwrap();
        dict.put_int("B", 3).unwrap();
        dict.sort().unwrap();
        let keys: Vec<String> = dict.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["Annots", "B", "Type"]);
    }

    #[test]
    fn test_abbreviated_lookup() {
        let dict = Dict::new();
        dict.put_int(names::BPC, 8).unwrap();
        let value = dict.get_abbrev(&names::BITS_PER_COMPONENT, &names::BPC);
        assert_eq!(value.map(|v| v.to_int()), Some(8));
    }

    #[test]
    fn test_inheritable_lookup_follows_parent() {
        let doc = Document::new();
        let parent = doc.new_dict();
        let resources = parent.put_dict(names::RESOURCES).unwrap();
        resources.put_int("Marker", 1).unwrap();
        let parent_ref = doc.add_object(parent).unwrap();

        let page = doc.new_dict();
        page.put_name(names::TYPE, names::PAGE).unwrap();
        page.put(names::PARENT, parent_ref).unwrap();

        let found = page.get_inheritable(&names::RESOURCES).unwrap();
        assert_eq!(found.as_dict().unwrap().get_int(&Name::new("Marker")), 1);
        assert!(page.get_inheritable(&names::ROTATE).is_none());
    }

    #[test]
    fn test_inheritable_lookup_stops_on_cycle() {
        let doc = Document::new();
        let page = doc.new_dict();
        page.put_name(names::TYPE, names::PAGE).unwrap();
        let page_ref = doc.add_object(page.clone()).unwrap();

        let parent = doc.new_dict();
        parent.put(names::PARENT, page_ref).unwrap();
        let parent_ref = doc.add_object(parent).unwrap();
        page.put(names::PARENT, parent_ref).unwrap();

        assert!(page.get_inheritable(&names::RESOURCES).is_none());
    }

    #[test]
    fn test_inherited_typed_getters() {
        let doc = Document::new();
        let pages = doc.new_dict();
        pages.put_int(names::ROTATE, 90).unwrap();
        pages
            .put_rect(names::MEDIA_BOX, Rect::new(0.0, 0.0, 612.0, 792.0))
            .unwrap();
        pages.put_text_string("Lang", "en").unwrap();
        pages.put_path("Resources/Font/F1", Obj::new_name("Helv")).unwrap();
        let pages_ref = doc.add_object(pages).unwrap();

        let page = doc.new_dict();
        page.put(names::PARENT, pages_ref).unwrap();
        page.put_bool("Hidden", true).unwrap();

        assert_eq!(page.get_inheritable_int(&names::ROTATE), 90);
        assert_eq!(
            page.get_inheritable_rect(&names::MEDIA_BOX),
            Rect::new(0.0, 0.0, 612.0, 792.0)
        );
        assert_eq!(page.get_inheritable_text_string(&Name::new("Lang")), "en");
        assert!(page.get_inheritable_bool(&Name::new("Hidden")));
        assert_eq!(page.get_inheritable_matrix(&names::MATRIX), Matrix::IDENTITY);
        assert_eq!(page.get_inheritable_real(&names::WIDTH), 0.0);
        assert!(page.get_inheritable_name(&names::TYPE).is_none());
        assert!(page.get_inheritable_date(&Name::new("ModDate")).is_none());
        assert_eq!(
            page.get_path_inheritable("Resources/Font/F1")
                .and_then(|obj| obj.as_name()),
            Some(Name::new("Helv"))
        );
        assert!(page.get_path_inheritable("Resources/XObject").is_none());
    }

    #[test]
    fn test_paths() {
        let dict = Dict::new();
        dict.put_path("Resources/Font/F1", Obj::new_name("Helv")).unwrap();
        assert_eq!(
            dict.get_path("Resources/Font/F1").and_then(|o| o.as_name()),
            Some(Name::new("Helv"))
        );
        assert!(dict.get_path("Resources/XObject").is_none());

        dict.put_int("Count", 3).unwrap();
        assert!(matches!(
            dict.put_path("Count/X", Obj::Null),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_typed_getters_default_on_mismatch() {
        let dict = Dict::new();
        dict.put_name("Width", "Wide").unwrap();
        assert_eq!(dict.get_int(&names::WIDTH), 0);
        assert_eq!(dict.get_int_or(&names::HEIGHT, 9), 9);
        assert!(dict.get_dict(&names::WIDTH).is_none());
        assert!(!dict.get_bool(&names::WIDTH));
    }
}
