// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Opaque capability references carried inside pipe messages
//! OWNERS: @kernel-cap-team
//! PUBLIC API: Handle, Rights, KernelObject, ObjectKind, Koid, CapError
//! DEPENDS_ON: wait::Waiter
//! INVARIANTS: Live-handle count decremented exactly once per handle; duplicates never gain rights
//!
//! A [`Handle`] is the unit of authority moved through a message pipe. Handles
//! to the same object share one counter so callers (and tests) can observe
//! that every transferred reference is either delivered or closed.

use alloc::sync::Arc;
use bitflags::bitflags;
use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

use crate::wait::Waiter;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    /// Rights associated with a capability handle.
    pub struct Rights: u32 {
        /// Holder may mint further handles to the same object.
        const DUPLICATE = 1 << 0;
        /// Holder may move the handle through a message pipe.
        const TRANSFER = 1 << 1;
        /// Holder may read from the object.
        const READ = 1 << 2;
        /// Holder may write to the object.
        const WRITE = 1 << 3;
        /// Holder may wait on the object's signals.
        const WAIT = 1 << 4;
    }
}

impl Rights {
    /// Rights minted for a freshly created pipe endpoint.
    pub const PIPE_DEFAULT: Rights = Rights::DUPLICATE
        .union(Rights::TRANSFER)
        .union(Rights::READ)
        .union(Rights::WRITE)
        .union(Rights::WAIT);
}

/// Kernel object identifier, unique for the lifetime of the system.
pub type Koid = u64;

static NEXT_KOID: AtomicU64 = AtomicU64::new(1);

fn alloc_koid() -> Koid {
    NEXT_KOID.fetch_add(1, Ordering::Relaxed)
}

/// Kind of kernel object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// One side of a message pipe.
    MessagePipe,
    /// Object whose type is not interpreted by the IPC core.
    Opaque,
}

/// Kernel object reachable through handles.
pub trait KernelObject: Send + Sync {
    /// Object kind reported to the handle layer.
    fn kind(&self) -> ObjectKind;

    /// Signal state exposed to blocking waits, if the object is waitable.
    fn waiter(&self) -> Option<&Waiter> {
        None
    }
}

/// Errors produced when manipulating handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapError {
    /// Insufficient rights for the requested operation.
    #[error("permission denied: holder has {held:?}, requested {requested:?}")]
    PermissionDenied {
        /// Rights carried by the source handle.
        held: Rights,
        /// Rights that were requested.
        requested: Rights,
    },
}

struct ObjectCell {
    koid: Koid,
    live: AtomicUsize,
    object: Arc<dyn KernelObject>,
}

/// Reference to a kernel object plus the rights granted through it.
///
/// Dropping a handle closes it. The object itself stays alive until every
/// handle (and any other owner of the `Arc`) is gone.
pub struct Handle {
    cell: Arc<ObjectCell>,
    rights: Rights,
}

impl Handle {
    /// Creates the first handle to `object`, assigning it a fresh [`Koid`].
    pub fn new(object: Arc<dyn KernelObject>, rights: Rights) -> Self {
        let cell = Arc::new(ObjectCell { koid: alloc_koid(), live: AtomicUsize::new(1), object });
        Self { cell, rights }
    }

    /// Identifier of the referenced object.
    pub fn koid(&self) -> Koid {
        self.cell.koid
    }

    /// Rights granted through this handle.
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Kind of the referenced object.
    pub fn kind(&self) -> ObjectKind {
        self.cell.object.kind()
    }

    /// Borrowed access to the referenced object.
    pub fn object(&self) -> &Arc<dyn KernelObject> {
        &self.cell.object
    }

    /// Number of handles currently open on the referenced object.
    pub fn live_handles(&self) -> usize {
        self.cell.live.load(Ordering::Acquire)
    }

    /// Mints another handle to the same object carrying `rights`.
    ///
    /// Requires [`Rights::DUPLICATE`] and never grants rights the source lacks.
    pub fn duplicate(&self, rights: Rights) -> Result<Handle, CapError> {
        if !self.rights.contains(Rights::DUPLICATE) || !self.rights.contains(rights) {
            return Err(CapError::PermissionDenied { held: self.rights, requested: rights });
        }
        self.cell.live.fetch_add(1, Ordering::AcqRel);
        Ok(Handle { cell: Arc::clone(&self.cell), rights })
    }

    /// Closes the handle, releasing its reference on the object.
    pub fn close(self) {
        log::trace!(target: "cap", "close koid={} remaining={}", self.koid(), self.live_handles() - 1);
        drop(self);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.cell.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("koid", &self.cell.koid)
            .field("kind", &self.kind())
            .field("rights", &self.rights.bits())
            .finish()
    }
}

static_assertions::assert_impl_all!(Handle: Send, Sync);


#[cfg(test)]
mod tests_prop;
