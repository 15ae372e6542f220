//! Property checks for the slot-table lifecycle.
//!
//! Random acquire/addref/release interleavings must keep the pool inside its
//! structural invariants: live slots never exceed the cap, every live slot
//! holds at least one reference, and failed operations never mutate state.

use frame_pool::{FrameHandle, FramePool};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Acquire,
    AddRef(usize),
    Release(usize),
    ReleaseUnknown(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Acquire),
        2 => (0usize..16).prop_map(Op::AddRef),
        3 => (0usize..16).prop_map(Op::Release),
        1 => (1_000i64..2_000).prop_map(Op::ReleaseUnknown),
    ]
}

/// Shadow model: per-handle expected ref counts.
struct Model {
    live: Vec<(FrameHandle, i32)>,
}

impl Model {
    fn pick(&self, seed: usize) -> Option<usize> {
        if self.live.is_empty() {
            None
        } else {
            Some(seed % self.live.len())
        }
    }
}

proptest! {
    #[test]
    fn random_lifecycle_keeps_invariants(cap in 1usize..6, ops in prop::collection::vec(op_strategy(), 1..120)) {
        let pool = FramePool::with_cap(cap);
        let mut model = Model { live: Vec::new() };

        for op in ops {
            match op {
                Op::Acquire => match pool.acquire() {
                    Ok(handle) => {
                        prop_assert!(handle.is_valid());
                        prop_assert!(
                            model.live.iter().all(|(h, _)| *h != handle),
                            "fresh handle must not collide with a live one"
                        );
                        model.live.push((handle, 1));
                    }
                    Err(_) => {
                        prop_assert_eq!(
                            model.live.len(),
                            cap,
                            "acquire may only fail when every slot is live"
                        );
                    }
                },
                Op::AddRef(seed) => {
                    if let Some(idx) = model.pick(seed) {
                        let (handle, count) = &mut model.live[idx];
                        *count += 1;
                        prop_assert_eq!(pool.addref(*handle), *count);
                    }
                }
                Op::Release(seed) => {
                    if let Some(idx) = model.pick(seed) {
                        let (handle, count) = model.live[idx];
                        prop_assert_eq!(pool.release(handle), count - 1);
                        if count == 1 {
                            model.live.remove(idx);
                        } else {
                            model.live[idx].1 = count - 1;
                        }
                    }
                }
                Op::ReleaseUnknown(raw) => {
                    let slots = pool.slot_count();
                    let live = pool.live_count();
                    prop_assert_eq!(pool.release(FrameHandle::from_raw(raw)), -1);
                    prop_assert_eq!(pool.slot_count(), slots, "unknown release must not mutate");
                    prop_assert_eq!(pool.live_count(), live, "unknown release must not mutate");
                }
            }

            prop_assert!(pool.live_count() <= cap, "live slots bounded by cap");
            prop_assert!(pool.slot_count() <= cap, "slot list bounded by cap");
            prop_assert_eq!(pool.live_count(), model.live.len());
        }

        // Drain everything; the slot list keeps its length but goes all-free.
        let slots = pool.slot_count();
        for (handle, count) in model.live.drain(..) {
            for expected in (0..count).rev() {
                prop_assert_eq!(pool.release(handle), expected);
            }
        }
        prop_assert_eq!(pool.live_count(), 0);
        prop_assert_eq!(pool.slot_count(), slots, "slots are retained, not dropped");
    }
}
