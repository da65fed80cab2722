//! Structural comparison of object graphs.

use crate::guard::CycleList;
use crate::limits::MAX_DEPTH;
use crate::model::Obj;

/// How far a comparison looks through references and stream payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// References are equal when they name the same object and generation.
    Shallow,
    /// References are resolved on both sides before comparing.
    Resolve,
    /// Like [`Comparison::Resolve`], and stream bytes are compared too.
    Deep,
}

/// Compares two objects structurally.
///
/// Integers never equal reals, dictionaries compare entry by entry in
/// order, and streams are only ever equal under [`Comparison::Deep`]. When
/// both sides loop back to an object already on their own comparison chain
/// at the same point, the loops are taken as equal.
pub fn objects_equal(a: &Obj, b: &Obj, mode: Comparison) -> bool {
    equal(a, b, mode, None, None, 0)
}

fn equal(
    a: &Obj,
    b: &Obj,
    mode: Comparison,
    up_a: Option<&CycleList<'_>>,
    up_b: Option<&CycleList<'_>>,
    depth: usize,
) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    if mode == Comparison::Shallow || (!a.is_indirect() && !b.is_indirect()) {
        return equal_direct(a, b, mode, up_a, up_b, depth);
    }
    let (num_a, num_b) = (a.to_num(), b.to_num());
    match (
        CycleList::on_chain(up_a, num_a),
        CycleList::on_chain(up_b, num_b),
    ) {
        (true, true) => return true,
        (false, false) => {}
        _ => return false,
    }
    let frame_a = CycleList::push(up_a, num_a);
    let frame_b = CycleList::push(up_b, num_b);
    equal_direct(
        &a.resolve(),
        &b.resolve(),
        mode,
        Some(&frame_a),
        Some(&frame_b),
        depth,
    )
}

fn equal_direct(
    a: &Obj,
    b: &Obj,
    mode: Comparison,
    up_a: Option<&CycleList<'_>>,
    up_b: Option<&CycleList<'_>>,
    depth: usize,
) -> bool {
    match (a, b) {
        (Obj::Null, Obj::Null) => true,
        (Obj::Bool(x), Obj::Bool(y)) => x == y,
        (Obj::Int(x), Obj::Int(y)) => x == y,
        (Obj::Real(x), Obj::Real(y)) => x == y,
        (Obj::Name(x), Obj::Name(y)) => x == y,
        (Obj::String(x), Obj::String(y)) => x == y,
        (Obj::Indirect(x), Obj::Indirect(y)) => x == y,
        (Obj::Array(x), Obj::Array(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if x.len() != y.len() {
                return false;
            }
            x.iter()
                .zip(y.iter())
                .all(|(p, q)| equal(&p, &q, mode, up_a, up_b, depth + 1))
        }
        (Obj::Dict(x), Obj::Dict(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if x.len() != y.len() {
                return false;
            }
            x.iter().zip(y.iter()).all(|((kp, p), (kq, q))| {
                kp == kq && equal(&p, &q, mode, up_a, up_b, depth + 1)
            })
        }
        (Obj::Stream(x), Obj::Stream(y)) => {
            if mode != Comparison::Deep {
                return false;
            }
            if x.ptr_eq(y) {
                return true;
            }
            let dicts = equal_direct(
                &Obj::Dict(x.dict()),
                &Obj::Dict(y.dict()),
                mode,
                up_a,
                up_b,
                depth + 1,
            );
            dicts
                && match (x.raw_bytes(), y.raw_bytes()) {
                    (Ok(p), Ok(q)) => p == q,
                    _ => false,
                }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::model::{Array, Dict, Indirect, Stream, names};

    #[test]
    fn test_int_and_real_differ() {
        assert!(!objects_equal(&Obj::Int(1), &Obj::Real(1.0), Comparison::Deep));
        assert!(objects_equal(&Obj::Real(1.0), &Obj::Real(1.0), Comparison::Shallow));
    }

    #[test]
    fn test_dict_order_matters() {
        let a: Dict = [("A", Obj::Int(1)), ("B", Obj::Int(2))].into_iter().collect();
        let b: Dict = [("B", Obj::Int(2)), ("A", Obj::Int(1))].into_iter().collect();
        assert!(!objects_equal(&a.into(), &b.clone().into(), Comparison::Shallow));
        b.sort().unwrap();
        let a: Dict = [("A", Obj::Int(1)), ("B", Obj::Int(2))].into_iter().collect();
        assert!(objects_equal(&a.into(), &b.into(), Comparison::Shallow));
    }

    #[test]
    fn test_shallow_does_not_resolve() {
        let doc = Document::new();
        let x = doc.add_object(Obj::Int(5)).unwrap();
        let y = doc.add_object(Obj::Int(5)).unwrap();
        assert!(!objects_equal(&x.clone().into(), &y.clone().into(), Comparison::Shallow));
        assert!(objects_equal(&x.into(), &y.into(), Comparison::Resolve));
        let unbound = Indirect::new(1, 0).unwrap();
        assert!(objects_equal(
            &unbound.into(),
            &doc.new_indirect(1, 0).unwrap().into(),
            Comparison::Shallow
        ));
    }

    #[test]
    fn test_streams_only_equal_deep() {
        let a = Obj::Stream(Stream::new(Dict::new(), b"abc".to_vec()));
        let b = Obj::Stream(Stream::new(Dict::new(), b"abc".to_vec()));
        let c = Obj::Stream(Stream::new(Dict::new(), b"abd".to_vec()));
        assert!(!objects_equal(&a, &b, Comparison::Shallow));
        assert!(!objects_equal(&a, &b, Comparison::Resolve));
        assert!(objects_equal(&a, &b, Comparison::Deep));
        assert!(!objects_equal(&a, &c, Comparison::Deep));
        assert!(!objects_equal(&a, &Obj::Dict(Dict::new()), Comparison::Deep));
    }

    #[test]
    fn test_cyclic_graphs_compare_without_looping() {
        let doc = Document::new();
        let make_loop = || {
            let a = doc.new_dict();
            let a_ref = doc.add_object(a.clone()).unwrap();
            let b = doc.new_dict();
            b.put(names::NEXT, a_ref.clone()).unwrap();
            let b_ref = doc.add_object(b).unwrap();
            a.put(names::NEXT, b_ref).unwrap();
            Obj::Indirect(a_ref)
        };
        let first = make_loop();
        let second = make_loop();
        assert!(objects_equal(&first, &second, Comparison::Resolve));

        let array = Array::new();
        array.push(first.clone()).unwrap();
        assert!(!objects_equal(&first, &array.into(), Comparison::Resolve));
    }
}
