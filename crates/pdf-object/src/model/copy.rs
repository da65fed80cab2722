//! Deep copies of object graphs.

use std::rc::Weak;

use crate::document::DocInner;
use crate::error::{Error, Result};
use crate::guard::MarkList;
use crate::limits::MAX_DEPTH;
use crate::model::stream::StreamBody;
use crate::model::{Array, Dict, Obj, Stream};

impl Obj {
    /// Copies every direct container under this object.
    ///
    /// References are copied as references, so the copy shares indirect
    /// objects with the original. The copy stays bound to the same document
    /// but is not part of any indirect object, and starts clean.
    pub fn deep_copy(&self) -> Result<Obj> {
        let doc = self
            .header()
            .map(|header| header.doc_weak())
            .unwrap_or_default();
        copy_tree(self, &doc, 0)
    }

    /// Copies the object graph with references replaced by copies of their
    /// targets.
    ///
    /// A reference back to an object already being copied on the current
    /// branch stays a reference, so cyclic graphs terminate while shared
    /// objects on sibling branches are copied in full each time. The result
    /// is not bound to any document.
    pub fn deep_copy_resolved(&self) -> Result<Obj> {
        let mut chain = MarkList::new();
        copy_resolved(self, &mut chain, 0)
    }
}

fn copy_tree(obj: &Obj, doc: &Weak<DocInner>, depth: usize) -> Result<Obj> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep { max: MAX_DEPTH });
    }
    Ok(match obj {
        Obj::Array(array) => {
            let items = array
                .to_vec()
                .iter()
                .map(|item| copy_tree(item, doc, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            Obj::Array(Array::from_parts(doc.clone(), items))
        }
        Obj::Dict(dict) => Obj::Dict(copy_dict(dict, doc, depth)?),
        Obj::Stream(stream) => {
            let dict = copy_dict(&stream.dict(), doc, depth)?;
            Obj::Stream(Stream::from_parts(dict, stream.body()))
        }
        other => other.clone(),
    })
}

fn copy_dict(dict: &Dict, doc: &Weak<DocInner>, depth: usize) -> Result<Dict> {
    let entries = dict
        .iter()
        .map(|(key, value)| Ok((key, copy_tree(&value, doc, depth + 1)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Dict::from_parts(doc.clone(), entries))
}

fn copy_resolved(obj: &Obj, chain: &mut MarkList, depth: usize) -> Result<Obj> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep { max: MAX_DEPTH });
    }
    let copied = match obj {
        Obj::Indirect(reference) => {
            if !chain.push(reference.num()) {
                return Ok(obj.clone());
            }
            let copied = copy_resolved(&reference.resolve(), chain, depth + 1);
            chain.pop();
            return copied;
        }
        Obj::Array(array) => {
            let mut items = Vec::with_capacity(array.len());
            for item in array.iter() {
                items.push(copy_resolved(&item, chain, depth + 1)?);
            }
            Obj::Array(Array::from_vec(items))
        }
        Obj::Dict(dict) => Obj::Dict(copy_resolved_dict(dict, chain, depth)?),
        Obj::Stream(stream) => {
            let dict = copy_resolved_dict(&stream.dict(), chain, depth)?;
            let body = match stream.body() {
                StreamBody::Loaded(bytes) => StreamBody::Loaded(bytes),
                StreamBody::Deferred { .. } => StreamBody::Loaded(stream.raw_bytes()?),
            };
            Obj::Stream(Stream::from_parts(dict, body))
        }
        other => other.clone(),
    };
    Ok(copied)
}

fn copy_resolved_dict(dict: &Dict, chain: &mut MarkList, depth: usize) -> Result<Dict> {
    let mut entries = Vec::with_capacity(dict.len());
    for (key, value) in dict.iter() {
        entries.push((key, copy_resolved(&value, chain, depth + 1)?));
    }
    Ok(Dict::from_parts(Weak::new(), entries))
}
