//! Single-slot admission for refresh cycles.
//!
//! At most one cycle runs at a time. Callers arriving while a cycle is in
//! flight queue up and are admitted one by one, oldest first, as each permit
//! is dropped. There is no timeout: a cycle that never finishes keeps every
//! queued caller waiting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct GateState {
    busy: bool,
    pending: VecDeque<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    state: Arc<Mutex<GateState>>,
}

/// Holding a permit means owning the slot. Dropping it admits the next
/// waiter.
#[derive(Debug)]
pub struct RefreshPermit {
    state: Arc<Mutex<GateState>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> RefreshPermit {
        let rx = {
            let mut state = lock(&self.state);
            if !state.busy {
                state.busy = true;
                return self.permit();
            }
            let (tx, rx) = oneshot::channel();
            state.pending.push_back(tx);
            tracing::debug!(pending = state.pending.len(), "refresh queued");
            rx
        };

        let mut waiter = Waiter {
            rx: Some(rx),
            state: &self.state,
        };
        if let Some(rx) = waiter.rx.as_mut() {
            // The sender is only dropped by `release`, which always sends
            // first, so an error here cannot happen while the gate is alive.
            let _ = rx.await;
        }
        waiter.rx = None;
        self.permit()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    /// Callers still waiting for the slot.
    pub fn pending(&self) -> usize {
        lock(&self.state)
            .pending
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn permit(&self) -> RefreshPermit {
        RefreshPermit {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        release(&self.state);
    }
}

/// Hand the slot to the oldest live waiter, or mark the gate idle.
fn release(state: &Mutex<GateState>) {
    let mut state = lock(state);
    while let Some(tx) = state.pending.pop_front() {
        if tx.send(()).is_ok() {
            return;
        }
    }
    state.busy = false;
}

fn lock(state: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cleans up after an `acquire` future that is dropped while queued.
struct Waiter<'a> {
    rx: Option<oneshot::Receiver<()>>,
    state: &'a Mutex<GateState>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        rx.close();
        // Handed the slot between the last poll and cancellation: pass it on.
        if rx.try_recv().is_ok() {
            release(self.state);
        }
    }
}
