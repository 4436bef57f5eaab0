// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: Message pipe kernel object (two sides, byte payload + handle transfer)
//! OWNERS: @kernel-ipc-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! PUBLIC API: MessagePipe, MessagePacket, PipeEndpoint, create_pipe, Handle, Waiter, Signals
//! DEPENDS_ON: spin (pipe lock), bitflags (rights/signals), parking_lot (std waits)
//! INVARIANTS: One lock per pipe; FIFO per direction; every undelivered handle is returned exactly once
//!
//! Layering, leaves first:
//! - [`cap`]: opaque handles to reference-counted kernel objects.
//! - [`wait`]: per-side signal state and the observer hook used by blocking waits.
//! - [`ipc`]: packets, the shared pipe core and the endpoint objects fronting it.

extern crate alloc;

pub mod cap;
pub mod ipc;
pub mod wait;

pub use cap::{CapError, Handle, KernelObject, Koid, ObjectKind, Rights};
pub use ipc::endpoint::{create_pipe, PipeEndpoint};
pub use ipc::packet::{MessagePacket, PacketLimits};
pub use ipc::pipe::{MessagePipe, Teardown};
pub use ipc::{IpcError, Side};
pub use wait::{ObserverId, SignalState, Signals, WaitObserver, Waiter};
