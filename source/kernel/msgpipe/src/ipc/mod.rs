// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel side message pipe primitives.
//!
//! A pipe has two sides. Each side owns the queue of packets written by the
//! other side, so `write(A, ..)` lands in `B`'s queue and becomes visible to
//! `read(B)` only.

use core::fmt;

use thiserror::Error;

pub mod endpoint;
pub mod packet;
pub mod pipe;
pub mod trace;

/// One of the two sides of a pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Side 0.
    A = 0,
    /// Side 1.
    B = 1,
}

impl Side {
    /// Both sides, in index order.
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    /// The opposite side.
    pub const fn peer(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Index into per-side arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for Side {
    type Error = IpcError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::A),
            1 => Ok(Side::B),
            _ => Err(IpcError::InvalidSide(value)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Error returned by pipe and endpoint operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IpcError {
    /// The opposite endpoint is gone; nothing more will be delivered.
    #[error("peer closed")]
    PeerClosed,
    /// Queue is empty but the peer is alive; wait for `READABLE` and retry.
    #[error("should wait")]
    ShouldWait,
    /// Payload exceeds the pipe's packet limits.
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Offered payload length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Too many handles attached to one message.
    #[error("{count} handles exceed limit of {max}")]
    TooManyHandles {
        /// Offered handle count.
        count: usize,
        /// Configured maximum.
        max: usize,
    },
    /// A raw side index outside `0..2`.
    #[error("invalid pipe side {0}")]
    InvalidSide(usize),
}

#[cfg(test)]
mod tests_prop;
