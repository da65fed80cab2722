use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::header::{Header, container_bookkeeping};
use crate::model::object::check_ref_range;
use crate::model::{Dict, Obj, names};

/// A stream: a dictionary plus a byte payload.
///
/// The payload is either held in memory or deferred, in which case it is
/// fetched through the document's [`crate::StreamLoader`] on every access.
/// Dirty state and memos live on the dictionary.
#[derive(Clone)]
pub struct Stream(pub(crate) Rc<StreamCell>);

pub(crate) struct StreamCell {
    pub(crate) dict: Dict,
    pub(crate) body: RefCell<StreamBody>,
}

#[derive(Debug, Clone)]
pub(crate) enum StreamBody {
    Loaded(Rc<[u8]>),
    /// Bytes still stored at the object's origin in the source file.
    Deferred { num: u32, generation: u16 },
}

container_bookkeeping!(Stream);

impl Stream {
    /// Creates a stream holding `data`. The dictionary is used as is.
    pub fn new(dict: Dict, data: impl Into<Rc<[u8]>>) -> Self {
        Self::from_parts(dict, StreamBody::Loaded(data.into()))
    }

    /// Creates a stream whose bytes are loaded on demand from the source
    /// object `num gen`.
    pub fn deferred(dict: Dict, num: u32, generation: u32) -> Result<Self> {
        let (num, generation) = check_ref_range(num as u64, generation as u64)?;
        Ok(Self::from_parts(dict, StreamBody::Deferred { num, generation }))
    }

    pub(crate) fn from_parts(dict: Dict, body: StreamBody) -> Self {
        Stream(Rc::new(StreamCell {
            dict,
            body: RefCell::new(body),
        }))
    }

    pub(crate) fn header(&self) -> &Header {
        self.0.dict.header()
    }

    pub(crate) fn body(&self) -> StreamBody {
        self.0.body.borrow().clone()
    }

    /// The stream dictionary.
    pub fn dict(&self) -> Dict {
        self.0.dict.clone()
    }

    /// Returns true if the bytes are held in memory.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.0.body.borrow(), StreamBody::Loaded(_))
    }

    /// Returns the undecoded bytes.
    pub fn raw_bytes(&self) -> Result<Rc<[u8]>> {
        match self.body() {
            StreamBody::Loaded(bytes) => Ok(bytes),
            StreamBody::Deferred { num, generation } => {
                trace!(num, generation, "loading deferred stream");
                let loader = self
                    .document()
                    .and_then(|doc| doc.stream_loader())
                    .ok_or_else(|| unavailable(num, "no stream loader"))?;
                loader
                    .raw_bytes(num, generation)
                    .map(Rc::from)
                    .map_err(|err| unavailable(num, err))
            }
        }
    }

    /// Returns the bytes with the stream's filters undone.
    ///
    /// Unfiltered streams return their raw bytes; decoding itself is
    /// delegated to the document's stream loader.
    pub fn decoded_bytes(&self) -> Result<Rc<[u8]>> {
        let raw = self.raw_bytes()?;
        let dict = self.dict();
        let filtered = dict
            .get_abbrev(&names::FILTER, &names::F)
            .is_some_and(|filter| !filter.is_null());
        if !filtered {
            return Ok(raw);
        }
        let num = self.parent_num();
        let loader = self
            .document()
            .and_then(|doc| doc.stream_loader())
            .ok_or_else(|| unavailable(num, "no stream loader"))?;
        loader
            .decode(&dict, &raw)
            .map(Rc::from)
            .map_err(|err| unavailable(num, err))
    }

    /// Replaces the bytes and updates `/Length`.
    pub fn set_bytes(&self, data: impl Into<Rc<[u8]>>) -> Result<()> {
        let data: Rc<[u8]> = data.into();
        self.header().prepare_alteration()?;
        let len = data.len();
        let old = self.0.body.replace(StreamBody::Loaded(data));
        drop(old);
        self.0.dict.put(names::LENGTH, Obj::from(len))
    }
}

fn unavailable(num: u32, reason: impl std::fmt::Display) -> Error {
    Error::StreamUnavailable {
        num,
        reason: reason.to_string(),
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} stream", self.0.dict)
    }
}
