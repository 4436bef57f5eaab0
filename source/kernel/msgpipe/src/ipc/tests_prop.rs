// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the message pipe core
//! OWNERS: @kernel-ipc-team
//! NOTE: Tests only; no kernel logic. Drives MessagePipe and a plain model with the same ops.
//!
//! TEST_SCOPE:
//!   - read() outcome exactness: head message, ShouldWait or PeerClosed
//!   - Handle conservation: every handle is delivered or returned, never both, never neither
//!   - Waiter bits: READABLE iff queue non-empty, PEER_CLOSED iff peer destroyed
//!
//! TEST_SCENARIOS:
//!   - pipe_matches_model(): random write/read/destroy sequences agree with the model
//!   - handles_return_to_baseline(): live-handle count ends at the pre-test baseline

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use proptest::prelude::*;

use super::packet::MessagePacket;
use super::pipe::MessagePipe;
use super::{IpcError, Side};
use crate::cap::{Handle, KernelObject, ObjectKind, Rights};
use crate::wait::Signals;

struct Token;

impl KernelObject for Token {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Opaque
    }
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Write { side: Side, handles: usize },
    Read { side: Side },
    Destroy { side: Side },
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::A), Just(Side::B)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_side(), 0usize..4).prop_map(|(side, handles)| Op::Write { side, handles }),
        4 => arb_side().prop_map(|side| Op::Read { side }),
        1 => arb_side().prop_map(|side| Op::Destroy { side }),
    ]
}

#[derive(Default)]
struct Model {
    dead: [bool; 2],
    // (message id, handle count) queued for each side.
    queues: [VecDeque<(u32, usize)>; 2],
}

impl Model {
    fn queued_handles(&self) -> usize {
        self.queues.iter().flatten().map(|(_, handles)| handles).sum()
    }
}

fn run(ops: &[Op], root: &Handle, delivered: &mut Vec<Handle>) -> Result<(), TestCaseError> {
    let pipe = MessagePipe::new();
    let mut model = Model::default();
    let mut next_id = 0u32;

    for op in ops {
        match *op {
            Op::Write { side, handles } => {
                if model.dead[side.index()] {
                    continue;
                }
                let id = next_id;
                next_id += 1;
                let attached = (0..handles).map(|_| root.duplicate(Rights::READ).unwrap()).collect();
                let result = pipe.write(side, MessagePacket::new(id.to_le_bytes().to_vec(), attached));
                if model.dead[side.peer().index()] {
                    prop_assert_eq!(result, Err(IpcError::PeerClosed));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    model.queues[side.peer().index()].push_back((id, handles));
                }
            }
            Op::Read { side } => {
                if model.dead[side.index()] {
                    continue;
                }
                let result = pipe.read(side);
                match model.queues[side.index()].pop_front() {
                    Some((id, handles)) => {
                        let (payload, received) = result.unwrap().into_parts();
                        prop_assert_eq!(payload, id.to_le_bytes().to_vec());
                        prop_assert_eq!(received.len(), handles);
                        delivered.extend(received);
                    }
                    None if model.dead[side.peer().index()] => {
                        prop_assert_eq!(result.unwrap_err(), IpcError::PeerClosed);
                    }
                    None => {
                        prop_assert_eq!(result.unwrap_err(), IpcError::ShouldWait);
                    }
                }
            }
            Op::Destroy { side } => {
                pipe.on_endpoint_destroyed(side);
                if !model.dead[side.index()] {
                    model.dead[side.index()] = true;
                    model.queues[side.index()].clear();
                }
            }
        }

        prop_assert_eq!(root.live_handles(), 1 + model.queued_handles() + delivered.len());
        for side in Side::BOTH {
            let state = pipe.waiter(side).state();
            prop_assert_eq!(pipe.queued(side), model.queues[side.index()].len());
            prop_assert_eq!(
                state.satisfied.contains(Signals::READABLE),
                !model.queues[side.index()].is_empty()
            );
            prop_assert_eq!(
                state.satisfied.contains(Signals::PEER_CLOSED),
                model.dead[side.peer().index()]
            );
        }
    }

    drop(pipe);
    prop_assert_eq!(root.live_handles(), 1 + delivered.len());
    Ok(())
}

proptest! {
    #[test]
    fn pipe_matches_model(ops in proptest::collection::vec(arb_op(), 0..64)) {
        let root = Handle::new(Arc::new(Token), Rights::all());
        let mut delivered = Vec::new();
        run(&ops, &root, &mut delivered)?;
    }

    #[test]
    fn handles_return_to_baseline(ops in proptest::collection::vec(arb_op(), 0..64)) {
        let root = Handle::new(Arc::new(Token), Rights::all());
        let baseline = root.live_handles();
        let mut delivered = Vec::new();
        run(&ops, &root, &mut delivered)?;
        delivered.into_iter().for_each(Handle::close);
        prop_assert_eq!(root.live_handles(), baseline);
    }
}
