// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host blocking waits over one or more waiters
//!
//! OWNERS: @kernel-sync-team
//!
//! PUBLIC API:
//!   - wait_one()/wait_many(): block until an awaited signal is satisfied
//!   - struct WaitContext: reusable parking slot with a cancellation handle
//!   - struct Canceller: wakes a context's in-flight wait with WaitError::Cancelled
//!   - enum Wait: blocking / non-blocking / timeout behaviour
//!
//! ERROR CONDITIONS:
//!   - WaitError::TimedOut: deadline passed (immediately for Wait::NonBlocking or an empty item list)
//!   - WaitError::Unsatisfiable: no awaited signal can ever become true
//!   - WaitError::Cancelled: the context's canceller fired
//!
//! INVARIANTS:
//!   - Observers are registered before the first check; the wake flag is reset before every re-check
//!   - Waiting never mutates waiter signal state, only observer registration
//!
//! DEPENDENCIES:
//!   - parking_lot::{Mutex, Condvar}: parking primitive

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::{ObserverId, SignalState, Signals, WaitObserver, Waiter};

/// Behaviour of a blocking call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until the wait completes.
    Blocking,
    /// Check once and return immediately.
    NonBlocking,
    /// Block until either the wait completes or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    fn deadline(self) -> Option<Instant> {
        match self {
            Wait::Blocking => None,
            Wait::NonBlocking => Some(Instant::now()),
            // A deadline past the clock's range behaves like `Blocking`.
            Wait::Timeout(timeout) => Instant::now().checked_add(timeout),
        }
    }
}

/// Errors returned by blocking waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The deadline passed before any awaited signal was satisfied.
    #[error("wait timed out")]
    TimedOut,
    /// None of the awaited signals can become satisfied any more.
    #[error("awaited signals can never be satisfied: {0:?}")]
    Unsatisfiable(SignalState),
    /// The wait was cancelled through its [`Canceller`].
    #[error("wait cancelled")]
    Cancelled,
}

/// One object in a multi-object wait.
#[derive(Clone, Copy, Debug)]
pub struct WaitItem<'a> {
    /// Waiter to observe.
    pub waiter: &'a Waiter,
    /// Signals that complete the wait.
    pub mask: Signals,
}

#[derive(Default)]
struct Parker {
    woken: Mutex<bool>,
    cond: Condvar,
    cancelled: AtomicBool,
}

impl Parker {
    fn wake(&self) {
        *self.woken.lock() = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        *self.woken.lock() = false;
    }

    /// Parks until woken or `deadline`; returns `false` on timeout.
    fn park(&self, deadline: Option<Instant>) -> bool {
        let mut woken = self.woken.lock();
        while !*woken {
            match deadline {
                None => self.cond.wait(&mut woken),
                Some(at) => {
                    if self.cond.wait_until(&mut woken, at).timed_out() {
                        return *woken;
                    }
                }
            }
        }
        true
    }
}

impl WaitObserver for Parker {
    fn on_state_change(&self, _state: SignalState) {
        self.wake();
    }
}

/// Removes the parker from every waiter when the wait returns.
struct Registration<'a> {
    entries: Vec<(&'a Waiter, ObserverId)>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        for (waiter, id) in self.entries.drain(..) {
            waiter.remove_observer(id);
        }
    }
}

/// Cancels waits running on a [`WaitContext`].
#[derive(Clone)]
pub struct Canceller(Arc<Parker>);

impl Canceller {
    /// Wakes the current (or next) wait with [`WaitError::Cancelled`].
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.wake();
    }
}

/// Parking slot shared by consecutive waits of one thread.
pub struct WaitContext {
    parker: Arc<Parker>,
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitContext {
    /// Creates an idle context.
    pub fn new() -> Self {
        Self { parker: Arc::new(Parker::default()) }
    }

    /// Handle that cancels waits on this context from another thread.
    pub fn canceller(&self) -> Canceller {
        Canceller(Arc::clone(&self.parker))
    }

    /// Waits until some signal in `mask` is satisfied on `waiter`.
    pub fn wait_one(&self, waiter: &Waiter, mask: Signals, wait: Wait) -> Result<Signals, WaitError> {
        let mut observed = self.wait_many(&[WaitItem { waiter, mask }], wait)?;
        Ok(observed.pop().unwrap_or_default())
    }

    /// Waits until some item has a satisfied signal in its mask.
    ///
    /// Returns the satisfied set of every item, in input order. Fails with
    /// [`WaitError::Unsatisfiable`] (carrying the first item's state) only when
    /// every item is unsatisfiable. An empty `items` list has nothing that
    /// could wake it and fails with [`WaitError::TimedOut`] right away.
    pub fn wait_many(&self, items: &[WaitItem<'_>], wait: Wait) -> Result<Vec<Signals>, WaitError> {
        if items.is_empty() {
            return Err(WaitError::TimedOut);
        }
        let deadline = wait.deadline();
        let observer: Arc<dyn WaitObserver> = self.parker.clone();
        let _registration = Registration {
            entries: items
                .iter()
                .map(|item| (item.waiter, item.waiter.add_observer(Arc::clone(&observer))))
                .collect(),
        };

        loop {
            self.parker.reset();
            if self.parker.cancelled.swap(false, Ordering::AcqRel) {
                return Err(WaitError::Cancelled);
            }

            let states: Vec<SignalState> = items.iter().map(|item| item.waiter.state()).collect();
            if items.iter().zip(&states).any(|(item, state)| state.is_satisfied(item.mask)) {
                return Ok(states.iter().map(|state| state.satisfied).collect());
            }
            if items.iter().zip(&states).all(|(item, state)| state.is_unsatisfiable(item.mask)) {
                return Err(WaitError::Unsatisfiable(states[0]));
            }

            if let Some(at) = deadline {
                if Instant::now() >= at {
                    return Err(WaitError::TimedOut);
                }
            }
            // On timeout the loop re-checks once before reporting it.
            self.parker.park(deadline);
        }
    }
}

/// Waits on a single waiter with a throwaway context.
pub fn wait_one(waiter: &Waiter, mask: Signals, wait: Wait) -> Result<Signals, WaitError> {
    WaitContext::new().wait_one(waiter, mask, wait)
}

/// Waits on several waiters with a throwaway context.
pub fn wait_many(items: &[WaitItem<'_>], wait: Wait) -> Result<Vec<Signals>, WaitError> {
    WaitContext::new().wait_many(items, wait)
}
