//! RAM ledger - admission control for one invoker
//!
//! Tracks two counters under one monitor:
//! - `committed`: RAM held by running invocations
//! - `reserved`: RAM anticipated by dispatched but unfinished invocations, which
//!   policy managers read as the node's available capacity
//!
//! The pooled path blocks in [`RamLedger::admit`] until `max - committed` covers the
//! request. The synchronous path commits immediately through [`RamLedger::commit`] and
//! may over-subscribe until it releases; `used_ram()` is clamped so observers never
//! see more than `max_ram`. Every release wakes all waiters, which then re-check;
//! waiters are not served in FIFO order.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct RamState {
    committed: u64,
    reserved: u64,
}

/// RAM budget of one invoker
#[derive(Debug)]
pub struct RamLedger {
    max_ram: u64,
    state: Mutex<RamState>,
    capacity_freed: Condvar,
}

impl RamLedger {
    pub fn new(max_ram: u64) -> Self {
        Self {
            max_ram,
            state: Mutex::new(RamState::default()),
            capacity_freed: Condvar::new(),
        }
    }

    pub fn max_ram(&self) -> u64 {
        self.max_ram
    }

    pub fn used_ram(&self) -> u64 {
        self.state.lock().committed.min(self.max_ram)
    }

    /// Raw committed counter, which the synchronous path may push past `max_ram`
    #[cfg(test)]
    pub(crate) fn committed_ram(&self) -> u64 {
        self.state.lock().committed
    }

    pub fn reserved_ram(&self) -> u64 {
        self.state.lock().reserved
    }

    pub fn available_ram(&self) -> u64 {
        self.max_ram.saturating_sub(self.state.lock().reserved)
    }

    pub fn reserve(&self, ram: u64) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_add(ram).min(self.max_ram);
    }

    pub fn release_reservation(&self, ram: u64) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(ram);
    }

    /// Commit `ram` without waiting (synchronous invocations)
    pub fn commit(self: &Arc<Self>, ram: u64) -> RamPermit {
        let mut state = self.state.lock();
        state.committed = state.committed.saturating_add(ram);
        RamPermit {
            ledger: Arc::clone(self),
            ram,
        }
    }

    /// Block until `ram` fits in the budget, then commit it (pooled invocations).
    ///
    /// Callers must ensure `ram <= max_ram`, otherwise this never returns.
    pub fn admit(self: &Arc<Self>, ram: u64) -> RamPermit {
        let mut state = self.state.lock();
        while self.max_ram.saturating_sub(state.committed) < ram {
            debug!(
                ram = ram,
                committed = state.committed,
                max_ram = self.max_ram,
                "Waiting for RAM"
            );
            self.capacity_freed.wait(&mut state);
        }
        state.committed += ram;
        RamPermit {
            ledger: Arc::clone(self),
            ram,
        }
    }

    fn release(&self, ram: u64) {
        let mut state = self.state.lock();
        state.committed = state.committed.saturating_sub(ram);
        drop(state);
        self.capacity_freed.notify_all();
    }
}

/// Committed RAM, returned to the ledger on drop
#[derive(Debug)]
pub struct RamPermit {
    ledger: Arc<RamLedger>,
    ram: u64,
}

impl RamPermit {
    pub fn ram(&self) -> u64 {
        self.ram
    }
}

impl Drop for RamPermit {
    fn drop(&mut self) {
        self.ledger.release(self.ram);
    }
}
