//! Cooperative yield / cancel signalling
//!
//! Elements poll their gate at two points only: CANCEL at the top of every
//! outer RUN iteration, and YIELD right after each user `run` call returns.
//! The gate is the sole place a worker thread may block inside an element.

use super::types::RunState;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::watch;

/// Tri-state run signal shared between a running element and its controller
pub trait YieldGate: Send + Sync {
    fn state(&self) -> RunState;

    /// Set the signal from any thread; leaving YIELD releases waiters
    fn set_state(&self, state: RunState);

    /// Block the calling thread while the signal reads YIELD
    fn wait_while_yielded(&self);
}

/// Atomic state plus a condition variable
pub struct CondvarGate {
    state: AtomicU8,
    lock: Mutex<()>,
    released: Condvar,
}

impl CondvarGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Normal as u8),
            lock: Mutex::new(()),
            released: Condvar::new(),
        }
    }
}

impl Default for CondvarGate {
    fn default() -> Self {
        Self::new()
    }
}

impl YieldGate for CondvarGate {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(RunState::Normal)
    }

    fn set_state(&self, state: RunState) {
        {
            // Store under the lock so a waiter cannot miss the transition
            let _guard = self.lock.lock();
            self.state.store(state as u8, Ordering::Release);
        }
        if state != RunState::Yield {
            self.released.notify_all();
        }
    }

    fn wait_while_yielded(&self) {
        let mut guard = self.lock.lock();
        while self.state() == RunState::Yield {
            self.released.wait(&mut guard);
        }
    }
}

/// Message-passing gate built on a `tokio::sync::watch` channel.
///
/// Interchangeable with [`CondvarGate`]; async supervisors can also await
/// [`WatchGate::released`] instead of parking a thread.
pub struct WatchGate {
    tx: watch::Sender<RunState>,
}

impl WatchGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Normal);
        Self { tx }
    }

    /// Resolves once the signal is no longer YIELD
    pub async fn released(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| *state != RunState::Yield).await;
    }
}

impl Default for WatchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl YieldGate for WatchGate {
    fn state(&self) -> RunState {
        *self.tx.borrow()
    }

    fn set_state(&self, state: RunState) {
        self.tx.send_replace(state);
    }

    fn wait_while_yielded(&self) {
        futures::executor::block_on(self.released());
    }
}
