//! Property Tests
//!
//! Random push/pop sequences, split over many transactions, against
//! in-memory models.

use crate::*;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Push(u8),
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)]
}

fn batches() -> impl Strategy<Value = Vec<Vec<Op>>> {
    proptest::collection::vec(proptest::collection::vec(op(), 0..12), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_stack_matches_vec(batches in batches()) {
        let stm = Stm::new();
        let handle = stm.atomically(|txn| TStack::<u8>::new().attach(txn)).unwrap();
        let mut model = Vec::new();

        for batch in batches {
            let popped = stm
                .atomically(|txn| {
                    let stack = TStack::<u8>::open(txn, handle)?;
                    let mut popped = Vec::new();
                    for op in &batch {
                        match op {
                            Op::Push(v) => stack.push(*v),
                            Op::Pop => popped.push(stack.try_pop(txn)?),
                        }
                    }
                    Ok(popped)
                })
                .unwrap();

            let mut expected = Vec::new();
            for op in &batch {
                match op {
                    Op::Push(v) => model.push(*v),
                    Op::Pop => expected.push(model.pop()),
                }
            }
            prop_assert_eq!(popped, expected);
        }

        let mut contents = stm
            .atomically(|txn| TStack::<u8>::open(txn, handle)?.to_vec(txn))
            .unwrap();
        contents.reverse();
        prop_assert_eq!(contents, model);
    }

    #[test]
    fn prop_queue_matches_vec_deque(batches in batches()) {
        let stm = Stm::new();
        let handle = stm.atomically(|txn| TQueue::<u8>::new().attach(txn)).unwrap();
        let mut model = VecDeque::new();

        for batch in batches {
            let popped = stm
                .atomically(|txn| {
                    let queue = TQueue::<u8>::open(txn, handle)?;
                    let mut popped = Vec::new();
                    for op in &batch {
                        match op {
                            Op::Push(v) => queue.push(*v)?,
                            Op::Pop => popped.push(queue.try_pop(txn)?),
                        }
                    }
                    Ok(popped)
                })
                .unwrap();

            let mut expected = Vec::new();
            for op in &batch {
                match op {
                    Op::Push(v) => model.push_back(*v),
                    Op::Pop => expected.push(model.pop_front()),
                }
            }
            prop_assert_eq!(popped, expected);
        }

        let len = stm
            .atomically(|txn| Ok(TQueue::<u8>::open(txn, handle)?.len()))
            .unwrap();
        prop_assert_eq!(len, model.len());
    }
}
