// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-object signal state consumed by blocking waits
//! OWNERS: @kernel-sync-team
//! PUBLIC API: Signals, SignalState, Waiter, WaitObserver, ObserverId
//! DEPENDS_ON: spin::Mutex (observer list), bitflags
//! INVARIANTS: State changes never block; observers are woken after the owning object drops its lock
//!
//! A [`Waiter`] holds two signal sets. `satisfied` is what is true right now.
//! `satisfiable` is what could still become true; a wait whose mask falls
//! entirely outside both sets can never complete and is reported as such.
//!
//! The owning object mutates state with [`Waiter::update`] while holding its
//! own lock and calls [`Waiter::notify`] once that lock is released. Waiting
//! itself lives outside this module (see `blocking` on host builds).

use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "std")]
pub mod blocking;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    /// Conditions a waiter can report.
    pub struct Signals: u32 {
        /// At least one message is queued for this side.
        const READABLE = 1 << 0;
        /// The peer is alive and accepts writes.
        const WRITABLE = 1 << 1;
        /// The peer endpoint is gone. Sticky.
        const PEER_CLOSED = 1 << 2;
    }
}

/// Snapshot of a waiter's signal sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SignalState {
    /// Signals that currently hold.
    pub satisfied: Signals,
    /// Signals that may still become true.
    pub satisfiable: Signals,
}

impl SignalState {
    /// State of a freshly created pipe side: writable, everything still possible.
    pub const PIPE_INITIAL: SignalState = SignalState {
        satisfied: Signals::WRITABLE,
        satisfiable: Signals::all(),
    };

    /// Returns `true` when some signal in `mask` holds.
    pub fn is_satisfied(&self, mask: Signals) -> bool {
        self.satisfied.intersects(mask)
    }

    /// Returns `true` when no signal in `mask` holds or can ever hold.
    pub fn is_unsatisfiable(&self, mask: Signals) -> bool {
        !(self.satisfied | self.satisfiable).intersects(mask)
    }

    const fn pack(self) -> u64 {
        (self.satisfied.bits() as u64) | ((self.satisfiable.bits() as u64) << 32)
    }

    const fn unpack(raw: u64) -> Self {
        Self {
            satisfied: Signals::from_bits_truncate(raw as u32),
            satisfiable: Signals::from_bits_truncate((raw >> 32) as u32),
        }
    }
}

/// Receives signal state changes from a [`Waiter`].
///
/// Called with the waiter's observer list locked: implementations must not
/// call back into the same waiter.
pub trait WaitObserver: Send + Sync {
    /// Invoked after the waiter's state changed.
    fn on_state_change(&self, state: SignalState);
}

/// Registration token returned by [`Waiter::add_observer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// Readiness object for one side of a kernel object.
pub struct Waiter {
    state: AtomicU64,
    observers: spin::Mutex<Vec<(ObserverId, Arc<dyn WaitObserver>)>>,
}

impl Waiter {
    /// Creates a waiter starting in `initial`.
    pub const fn new(initial: SignalState) -> Self {
        Self { state: AtomicU64::new(initial.pack()), observers: spin::Mutex::new(Vec::new()) }
    }

    /// Current signal state.
    pub fn state(&self) -> SignalState {
        SignalState::unpack(self.state.load(Ordering::Acquire))
    }

    /// Applies `set`/`clear` to the satisfied set and removes `unsatisfiable`
    /// from the satisfiable set. Returns whether the state changed.
    ///
    /// Does not wake observers; pair with [`Waiter::notify`].
    pub fn update(&self, set: Signals, clear: Signals, unsatisfiable: Signals) -> bool {
        let apply = |raw: u64| {
            let mut state = SignalState::unpack(raw);
            state.satisfied = state.satisfied.difference(clear).union(set);
            state.satisfiable = state.satisfiable.difference(unsatisfiable);
            state.pack()
        };
        let prev = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| Some(apply(raw)))
            .unwrap_or_else(|raw| raw);
        apply(prev) != prev
    }

    /// Sets `signals` and wakes observers if anything changed.
    pub fn signal(&self, signals: Signals) -> bool {
        let changed = self.update(signals, Signals::empty(), Signals::empty());
        if changed {
            self.notify();
        }
        changed
    }

    /// Clears `signals` and wakes observers if anything changed.
    pub fn clear(&self, signals: Signals) -> bool {
        let changed = self.update(Signals::empty(), signals, Signals::empty());
        if changed {
            self.notify();
        }
        changed
    }

    /// Pushes the current state to every registered observer.
    pub fn notify(&self) {
        let state = self.state();
        for (_, observer) in self.observers.lock().iter() {
            observer.on_state_change(state);
        }
    }

    /// Registers `observer` for future state changes.
    pub fn add_observer(&self, observer: Arc<dyn WaitObserver>) -> ObserverId {
        let id = ObserverId(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, observer));
        id
    }

    /// Unregisters a previously added observer. Returns `false` if unknown.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        match observers.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                observers.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl core::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Waiter").field("state", &self.state()).finish()
    }
}

static_assertions::assert_impl_all!(Waiter: Send, Sync);
