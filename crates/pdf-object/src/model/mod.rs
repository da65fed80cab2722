//! The object model.
//!
//! [`Obj`] values, the container handles [`Array`], [`Dict`] and
//! [`Stream`], interned [`Name`]s, and the algorithms that walk graphs of
//! them (copy, compare).

pub(crate) mod header;

mod array;
mod compare;
mod copy;
mod dict;
mod geometry;
mod name;
mod object;
mod stream;

pub use array::Array;
pub use compare::{Comparison, objects_equal};
pub use dict::Dict;
pub use geometry::{Matrix, Rect};
pub use header::MemoSlot;
pub use name::{Name, NameTable, names};
pub use object::{Indirect, Obj, ObjKind, PdfString};
pub use stream::Stream;

pub(crate) use object::check_ref_range;
pub(crate) use stream::StreamBody;
