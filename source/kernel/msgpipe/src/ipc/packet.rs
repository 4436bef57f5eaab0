// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! One message in flight: payload bytes plus the handles it transfers.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

use crate::cap::Handle;
use crate::ipc::IpcError;

/// Per-message size limits applied before a packet enters a pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketLimits {
    /// Largest accepted payload, in bytes.
    pub max_payload_bytes: usize,
    /// Largest accepted number of attached handles.
    pub max_handles: usize,
}

impl PacketLimits {
    /// No limits; callers enforce their own policy.
    pub const UNBOUNDED: PacketLimits =
        PacketLimits { max_payload_bytes: usize::MAX, max_handles: usize::MAX };

    /// Checks a prospective message against the limits.
    pub fn check(&self, payload_len: usize, handle_count: usize) -> Result<(), IpcError> {
        if payload_len > self.max_payload_bytes {
            return Err(IpcError::PayloadTooLarge { len: payload_len, max: self.max_payload_bytes });
        }
        if handle_count > self.max_handles {
            return Err(IpcError::TooManyHandles { count: handle_count, max: self.max_handles });
        }
        Ok(())
    }
}

impl Default for PacketLimits {
    fn default() -> Self {
        Self { max_payload_bytes: 64 * 1024, max_handles: 64 }
    }
}

/// Message packet owned by exactly one party at a time: the writer, one pipe
/// queue, or the reader.
///
/// Payload and handle order are fixed at construction. A packet discarded
/// without [`MessagePacket::into_parts`] returns its handles on drop.
pub struct MessagePacket {
    payload: Box<[u8]>,
    handles: Vec<Handle>,
}

impl MessagePacket {
    /// Builds a packet without limit checks.
    pub fn new(payload: impl Into<Box<[u8]>>, handles: Vec<Handle>) -> Self {
        Self { payload: payload.into(), handles }
    }

    /// Builds a packet after checking `limits`. Rejected handles are closed.
    pub fn with_limits(
        payload: impl Into<Box<[u8]>>,
        handles: Vec<Handle>,
        limits: &PacketLimits,
    ) -> Result<Self, IpcError> {
        let payload = payload.into();
        match limits.check(payload.len(), handles.len()) {
            Ok(()) => Ok(Self::new(payload, handles)),
            Err(err) => {
                handles.into_iter().for_each(Handle::close);
                Err(err)
            }
        }
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Attached handles, in transfer order.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Closes every attached handle and returns how many were closed.
    ///
    /// Used on every path that discards an undelivered packet. A second call
    /// finds the list empty and closes nothing.
    pub fn return_handles(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.drain(..).for_each(Handle::close);
        count
    }

    /// Hands payload and handles to the reader.
    pub fn into_parts(mut self) -> (Vec<u8>, Vec<Handle>) {
        let payload = mem::take(&mut self.payload).into_vec();
        let handles = mem::take(&mut self.handles);
        (payload, handles)
    }
}

impl Drop for MessagePacket {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let returned = self.return_handles();
            log::trace!(target: "ipc", "packet dropped, returned {returned} handles");
        }
    }
}

impl core::fmt::Debug for MessagePacket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessagePacket")
            .field("len", &self.payload.len())
            .field("handles", &self.handles)
            .finish()
    }
}
