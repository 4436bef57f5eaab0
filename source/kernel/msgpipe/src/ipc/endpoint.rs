// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Endpoint objects fronting a [`MessagePipe`].
//!
//! Each endpoint owns one reference to the shared pipe and tears its side
//! down exactly once, on drop. Endpoints are kernel objects themselves, so a
//! handle to one side can travel through another pipe.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::cap::{Handle, KernelObject, ObjectKind, Rights};
use crate::ipc::packet::{MessagePacket, PacketLimits};
use crate::ipc::pipe::{MessagePipe, Teardown};
use crate::ipc::{IpcError, Side};
use crate::wait::Waiter;

/// Creates a pipe and returns its two endpoints (side A first).
pub fn create_pipe(limits: PacketLimits) -> (PipeEndpoint, PipeEndpoint) {
    let pipe = Arc::new(MessagePipe::new());
    log::trace!(target: "ipc", "pipe created: max_payload={} max_handles={}", limits.max_payload_bytes, limits.max_handles);
    (
        PipeEndpoint { pipe: Arc::clone(&pipe), side: Side::A, limits },
        PipeEndpoint { pipe, side: Side::B, limits },
    )
}

/// Creates a pipe and wraps both endpoints in handles carrying `rights`.
pub fn create_pipe_handles(limits: PacketLimits, rights: Rights) -> (Handle, Handle) {
    let (a, b) = create_pipe(limits);
    (Handle::new(Arc::new(a), rights), Handle::new(Arc::new(b), rights))
}

/// One side of a message pipe.
pub struct PipeEndpoint {
    pipe: Arc<MessagePipe>,
    side: Side,
    limits: PacketLimits,
}

impl PipeEndpoint {
    /// Side of the pipe this endpoint fronts.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Limits applied by [`PipeEndpoint::write`].
    pub fn limits(&self) -> PacketLimits {
        self.limits
    }

    /// Sends `payload` and `handles` to the peer.
    ///
    /// The handles are consumed on every outcome: queued on success, closed
    /// on rejection or when the peer is gone.
    pub fn write(&self, payload: impl Into<Box<[u8]>>, handles: Vec<Handle>) -> Result<(), IpcError> {
        let packet = MessagePacket::with_limits(payload, handles, &self.limits)?;
        self.pipe.write(self.side, packet)
    }

    /// Sends an already built packet, bypassing the endpoint limits.
    pub fn write_packet(&self, packet: MessagePacket) -> Result<(), IpcError> {
        self.pipe.write(self.side, packet)
    }

    /// Takes the oldest message addressed to this side.
    pub fn read(&self) -> Result<MessagePacket, IpcError> {
        self.pipe.read(self.side)
    }

    /// Readiness object for this side.
    pub fn waiter(&self) -> &Waiter {
        self.pipe.waiter(self.side)
    }

    /// Shared pipe core, for diagnostics.
    pub fn pipe(&self) -> &Arc<MessagePipe> {
        &self.pipe
    }
}

impl KernelObject for PipeEndpoint {
    fn kind(&self) -> ObjectKind {
        ObjectKind::MessagePipe
    }

    fn waiter(&self) -> Option<&Waiter> {
        Some(PipeEndpoint::waiter(self))
    }
}

impl Drop for PipeEndpoint {
    fn drop(&mut self) {
        let side = self.side;
        match self.pipe.on_endpoint_destroyed(side) {
            Some(Teardown { packets, handles }) => log::debug!(
                target: "ipc",
                "pipe endpoint {side} closed: dropped {packets} undelivered packets, returned {handles} handles"
            ),
            None => log::warn!(target: "ipc", "pipe endpoint {side} closed twice; ignoring"),
        }
    }
}

impl core::fmt::Debug for PipeEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PipeEndpoint").field("side", &self.side).finish()
    }
}
