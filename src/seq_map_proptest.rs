#![cfg(test)]

// Property tests for SeqMap kept inside the crate so they do not require
// feature gates to access internal modules.
//
// Model: a Vec<(String, i32)> in sequence order. Every operation is applied
// to both the SeqMap and the model; after each step the full iteration
// order, length, and lookups must agree.

use crate::seq_map::{InsertError, SeqMap};
use proptest::prelude::*;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    PushFront(usize, i32),
    InsertAfter(usize, usize, i32),
    PopFront,
    RemoveKey(usize),
    Mutate(usize, i32),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{1,4}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::PushFront(i, v)),
            (idx.clone(), idx.clone(), any::<i32>())
                .prop_map(|(p, i, v)| Op::InsertAfter(p, i, v)),
            Just(Op::PopFront),
            idx.clone().prop_map(Op::RemoveKey),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            Just(Op::Clear),
        ];
        (
            Just(pool),
            proptest::collection::vec(op, 1..64),
        )
    })
}

fn check_agreement(m: &SeqMap<String, i32>, model: &[(String, i32)]) {
    assert_eq!(m.len(), model.len());
    let observed: Vec<(String, i32)> = m.iter().map(|(_, k, v)| (k.clone(), *v)).collect();
    assert_eq!(observed, model);
    for (k, v) in model {
        assert_eq!(m.get(k.as_str()), Some(v));
    }
}

proptest! {
    #[test]
    fn seq_map_matches_ordered_model((pool, ops) in arb_scenario()) {
        let mut m: SeqMap<String, i32> = SeqMap::new();
        let mut model: Vec<(String, i32)> = Vec::new();

        for op in ops {
            match op {
                Op::PushFront(i, v) => {
                    let key = pool[i].clone();
                    let dup = model.iter().any(|(k, _)| *k == key);
                    match m.push_front(key.clone(), v) {
                        Ok(_) => {
                            prop_assert!(!dup);
                            model.insert(0, (key, v));
                        }
                        Err(InsertError::DuplicateKey) => prop_assert!(dup),
                        Err(e) => prop_assert!(false, "unexpected error: {:?}", e),
                    }
                }
                Op::InsertAfter(p, i, v) => {
                    let prev = pool[p].clone();
                    let key = pool[i].clone();
                    let prev_pos = model.iter().position(|(k, _)| *k == prev);
                    let dup = model.iter().any(|(k, _)| *k == key);
                    match prev_pos {
                        None => prop_assert!(m.find(prev.as_str()).is_none()),
                        Some(pos) => {
                            let loc = m.find(prev.as_str()).unwrap();
                            match m.insert_after(loc, key.clone(), v) {
                                Ok(_) => {
                                    prop_assert!(!dup);
                                    model.insert(pos + 1, (key, v));
                                }
                                Err(InsertError::DuplicateKey) => prop_assert!(dup),
                                Err(e) => prop_assert!(false, "unexpected error: {:?}", e),
                            }
                        }
                    }
                }
                Op::PopFront => {
                    let expected = if model.is_empty() {
                        None
                    } else {
                        Some(model.remove(0))
                    };
                    prop_assert_eq!(m.pop_front(), expected);
                }
                Op::RemoveKey(i) => {
                    let key = pool[i].clone();
                    match model.iter().position(|(k, _)| *k == key) {
                        None => prop_assert!(m.find(key.as_str()).is_none()),
                        Some(pos) => {
                            let loc = m.find(key.as_str()).unwrap();
                            let removed = m.remove(loc);
                            prop_assert_eq!(removed, Some(model.remove(pos)));
                        }
                    }
                }
                Op::Mutate(i, d) => {
                    let key = pool[i].clone();
                    match model.iter_mut().find(|(k, _)| *k == key) {
                        None => prop_assert!(m.find(key.as_str()).is_none()),
                        Some((_, v)) => {
                            let loc = m.find(key.as_str()).unwrap();
                            *m.value_mut(loc).unwrap() = d;
                            *v = d;
                        }
                    }
                }
                Op::Clear => {
                    m.clear();
                    model.clear();
                }
            }
            check_agreement(&m, &model);
        }
    }
}
