//! Binary encoding of object graphs.
//!
//! Used for journal fragments and document snapshots. Each object is a tag
//! byte followed by its payload:
//!
//! ```text
//! 0 null | 1 false | 2 true
//! 3 int      signed varint
//! 4 real     f32, little-endian
//! 5 name     length-prefixed bytes
//! 6 string   length-prefixed bytes
//! 7 ref      varint num, varint gen
//! 8 array    varint count, objects
//! 9 dict     varint count, (name bytes, object) pairs
//! 10 stream  dict payload, body tag (0 bytes | 1 deferred num gen)
//! ```

use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;

use crate::codec::primitives::{Reader, Writer};
use crate::document::{DocInner, Document};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_CONTAINER_LEN, MAX_DEPTH, MAX_GEN_NUMBER, MAX_OBJECT_NUMBER, MAX_STRING_LEN};
use crate::model::{Array, Dict, Indirect, NameTable, Obj, PdfString, Stream, StreamBody};

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_REAL: u8 = 4;
const TAG_NAME: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_INDIRECT: u8 = 7;
const TAG_ARRAY: u8 = 8;
const TAG_DICT: u8 = 9;
const TAG_STREAM: u8 = 10;

const BODY_LOADED: u8 = 0;
const BODY_DEFERRED: u8 = 1;

// =============================================================================
// DECODING
// =============================================================================

/// Where decoded objects get bound.
pub(crate) struct DecodeContext {
    /// Document that decoded references resolve through.
    refs: Weak<DocInner>,
    /// Document decoded containers are bound to; dangling for detached
    /// journal snapshots.
    containers: Weak<DocInner>,
    names: &'static NameTable,
}

impl DecodeContext {
    /// Containers and references both bound to `doc`.
    pub(crate) fn bound(doc: &Document) -> Self {
        DecodeContext {
            refs: doc.weak(),
            containers: doc.weak(),
            names: doc.names(),
        }
    }

    /// References bound to `doc`, containers left unbound.
    pub(crate) fn detached(doc: &Document) -> Self {
        DecodeContext {
            refs: doc.weak(),
            containers: Weak::new(),
            names: doc.names(),
        }
    }
}

/// Decodes one object, binding its containers and references to `doc`.
pub fn decode_object(input: &[u8], doc: &Document) -> Result<Obj, DecodeError> {
    let mut reader = Reader::new(input);
    let obj = read_object(&mut reader, &DecodeContext::bound(doc), 0)?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            context: "object",
            len: reader.remaining_len(),
        });
    }
    Ok(obj)
}

pub(crate) fn read_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext,
    depth: usize,
) -> Result<Obj, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::NestingTooDeep { max: MAX_DEPTH });
    }
    let tag = reader.read_byte("object tag")?;
    let obj = match tag {
        TAG_NULL => Obj::Null,
        TAG_FALSE => Obj::Bool(false),
        TAG_TRUE => Obj::Bool(true),
        TAG_INT => Obj::Int(reader.read_signed_varint("int")?),
        TAG_REAL => Obj::Real(reader.read_f32("real")?),
        TAG_NAME => Obj::Name(ctx.names.intern(reader.read_bytes_prefixed(MAX_STRING_LEN, "name")?)),
        TAG_STRING => Obj::String(PdfString::new(
            reader.read_bytes_prefixed(MAX_STRING_LEN, "string")?,
        )),
        TAG_INDIRECT => {
            let (num, generation) = read_ref(reader)?;
            Obj::Indirect(Indirect::bound(num, generation, ctx.refs.clone()))
        }
        TAG_ARRAY => {
            let count = reader.read_len(MAX_CONTAINER_LEN, "array")?;
            let mut items = Vec::with_capacity(count.min(reader.remaining_len()));
            for _ in 0..count {
                items.push(read_object(reader, ctx, depth + 1)?);
            }
            Obj::Array(Array::from_parts(ctx.containers.clone(), items))
        }
        TAG_DICT => Obj::Dict(read_dict(reader, ctx, depth)?),
        TAG_STREAM => {
            let dict = read_dict(reader, ctx, depth)?;
            let body = match reader.read_byte("stream body")? {
                BODY_LOADED => {
                    let bytes = reader.read_bytes_prefixed(MAX_STRING_LEN, "stream data")?;
                    StreamBody::Loaded(Rc::from(bytes))
                }
                BODY_DEFERRED => {
                    let (num, generation) = read_ref(reader)?;
                    StreamBody::Deferred { num, generation }
                }
                tag => return Err(DecodeError::InvalidTag { tag }),
            };
            Obj::Stream(Stream::from_parts(dict, body))
        }
        tag => return Err(DecodeError::InvalidTag { tag }),
    };
    Ok(obj)
}

fn read_dict(reader: &mut Reader<'_>, ctx: &DecodeContext, depth: usize) -> Result<Dict, DecodeError> {
    let count = reader.read_len(MAX_CONTAINER_LEN, "dict")?;
    let capacity = count.min(reader.remaining_len());
    let mut entries = Vec::with_capacity(capacity);
    let mut seen = FxHashSet::with_capacity_and_hasher(capacity, Default::default());
    for _ in 0..count {
        let key = ctx.names.intern(reader.read_bytes_prefixed(MAX_STRING_LEN, "dict key")?);
        if !seen.insert(key.clone()) {
            return Err(DecodeError::DuplicateKey {
                key: key.to_string(),
            });
        }
        let value = read_object(reader, ctx, depth + 1)?;
        entries.push((key, value));
    }
    Ok(Dict::from_parts(ctx.containers.clone(), entries))
}

/// Reads a range-checked object number and generation.
pub(crate) fn read_ref(reader: &mut Reader<'_>) -> Result<(u32, u16), DecodeError> {
    let num = reader.read_varint("object number")?;
    if num > MAX_OBJECT_NUMBER as u64 {
        return Err(DecodeError::ObjectNumberOutOfRange { num });
    }
    let generation = reader.read_varint("generation")?;
    if generation > MAX_GEN_NUMBER as u64 {
        return Err(DecodeError::GenerationOutOfRange { generation });
    }
    Ok((num as u32, generation as u16))
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes one object graph. References are written as references.
pub fn encode_object(obj: &Obj) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    write_object(&mut writer, obj, 0)?;
    Ok(writer.into_bytes())
}

pub(crate) fn write_object(writer: &mut Writer, obj: &Obj, depth: usize) -> Result<(), EncodeError> {
    if depth > MAX_DEPTH {
        return Err(EncodeError::TooDeep { max: MAX_DEPTH });
    }
    match obj {
        Obj::Null => writer.write_byte(TAG_NULL),
        Obj::Bool(false) => writer.write_byte(TAG_FALSE),
        Obj::Bool(true) => writer.write_byte(TAG_TRUE),
        Obj::Int(value) => {
            writer.write_byte(TAG_INT);
            writer.write_signed_varint(*value);
        }
        Obj::Real(value) => {
            writer.write_byte(TAG_REAL);
            writer.write_f32(*value);
        }
        Obj::Name(name) => {
            writer.write_byte(TAG_NAME);
            write_limited(writer, name.as_bytes(), "name")?;
        }
        Obj::String(string) => {
            writer.write_byte(TAG_STRING);
            write_limited(writer, string.as_bytes(), "string")?;
        }
        Obj::Indirect(reference) => {
            writer.write_byte(TAG_INDIRECT);
            writer.write_varint(reference.num() as u64);
            writer.write_varint(reference.generation() as u64);
        }
        Obj::Array(array) => {
            let items = array.to_vec();
            check_len(items.len(), "array")?;
            writer.write_byte(TAG_ARRAY);
            writer.write_varint(items.len() as u64);
            for item in &items {
                write_object(writer, item, depth + 1)?;
            }
        }
        Obj::Dict(dict) => {
            writer.write_byte(TAG_DICT);
            write_dict(writer, dict, depth)?;
        }
        Obj::Stream(stream) => {
            writer.write_byte(TAG_STREAM);
            write_dict(writer, &stream.dict(), depth)?;
            match stream.body() {
                StreamBody::Loaded(bytes) => {
                    writer.write_byte(BODY_LOADED);
                    write_limited(writer, &bytes, "stream data")?;
                }
                StreamBody::Deferred { num, generation } => {
                    writer.write_byte(BODY_DEFERRED);
                    writer.write_varint(num as u64);
                    writer.write_varint(generation as u64);
                }
            }
        }
    }
    Ok(())
}

fn write_dict(writer: &mut Writer, dict: &Dict, depth: usize) -> Result<(), EncodeError> {
    let entries: Vec<_> = dict.iter().collect();
    check_len(entries.len(), "dict")?;
    writer.write_varint(entries.len() as u64);
    for (key, value) in &entries {
        write_limited(writer, key.as_bytes(), "dict key")?;
        write_object(writer, value, depth + 1)?;
    }
    Ok(())
}

fn write_limited(writer: &mut Writer, bytes: &[u8], field: &'static str) -> Result<(), EncodeError> {
    if bytes.len() > MAX_STRING_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field,
            len: bytes.len(),
            max: MAX_STRING_LEN,
        });
    }
    writer.write_bytes_prefixed(bytes);
    Ok(())
}

fn check_len(len: usize, field: &'static str) -> Result<(), EncodeError> {
    if len > MAX_CONTAINER_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field,
            len,
            max: MAX_CONTAINER_LEN,
        });
    }
    Ok(())
}
