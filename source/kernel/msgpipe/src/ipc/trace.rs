// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Low-noise, bounded per-pipe IPC trace ring for triage
//! OWNERS: @kernel-ipc-team
//! STATUS: Experimental (recording gated by feature `ipc_trace_ring`)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Exercised by pipe unit tests
//!
//! This module is intentionally tiny:
//! - Records a fixed number of events inline in the pipe state (no heap on record).
//! - Written only while the pipe lock is held, so no atomics are needed.
//! - Emits nothing; callers pull a snapshot.

use alloc::vec::Vec;
use core::cmp::Reverse;

use crate::ipc::{IpcError, Side};

// Power-of-two ring size for cheap masking.
const RING_SIZE: usize = 64;
const RING_MASK: usize = RING_SIZE - 1;

/// Operation recorded in the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    /// `write` on the recorded side.
    Write,
    /// `read` on the recorded side.
    Read,
    /// Endpoint for the recorded side was destroyed.
    Close,
}

/// One recorded pipe operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    /// Monotonic sequence number (wraps).
    pub seq: u32,
    /// Event kind.
    pub kind: TraceKind,
    /// Side that issued the operation.
    pub side: Side,
    /// Result/status (0=ok, otherwise [`status_code`]).
    pub status: u8,
    /// Payload length for reads/writes, drained packet count for closes.
    pub len: u32,
    /// Handles carried by the packet (saturating).
    pub handles: u16,
}

/// Stable numeric code for an operation outcome.
pub fn status_code(err: Option<IpcError>) -> u8 {
    match err {
        None => 0,
        Some(IpcError::PeerClosed) => 1,
        Some(IpcError::ShouldWait) => 2,
        Some(IpcError::PayloadTooLarge { .. }) => 3,
        Some(IpcError::TooManyHandles { .. }) => 4,
        Some(IpcError::InvalidSide(_)) => 5,
    }
}

#[cfg_attr(not(feature = "ipc_trace_ring"), allow(dead_code))]
pub(crate) struct TraceRing {
    events: [Option<TraceEvent>; RING_SIZE],
    write_seq: u32,
}

#[cfg_attr(not(feature = "ipc_trace_ring"), allow(dead_code))]
impl TraceRing {
    pub(crate) const fn new() -> Self {
        Self { events: [None; RING_SIZE], write_seq: 0 }
    }

    pub(crate) fn record(
        &mut self,
        kind: TraceKind,
        side: Side,
        err: Option<IpcError>,
        len: usize,
        handles: usize,
    ) {
        let seq = self.write_seq;
        self.write_seq = seq.wrapping_add(1);
        self.events[seq as usize & RING_MASK] = Some(TraceEvent {
            seq,
            kind,
            side,
            status: status_code(err),
            len: u32::try_from(len).unwrap_or(u32::MAX),
            handles: u16::try_from(handles).unwrap_or(u16::MAX),
        });
    }

    /// Recorded events, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<TraceEvent> {
        let mut out: Vec<TraceEvent> = self.events.iter().flatten().copied().collect();
        out.sort_by_key(|event| Reverse(self.write_seq.wrapping_sub(event.seq)));
        out
    }
}
