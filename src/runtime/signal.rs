//! Shared signal used to park a caller until its response is ready
//!
//! The signal is a single cell holding `0` (no response yet) or `1`
//! (response ready). It carries no payload; the response itself travels on
//! the call channel. Waiting is a real thread block on a condition
//! variable, scoped to one context's single in-flight call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cell value while the caller should keep waiting.
pub const PENDING: u32 = 0;

/// Cell value once the response has been posted.
pub const READY: u32 = 1;

/// Single-cell wait/notify pair shared by one client and one context.
#[derive(Debug, Default)]
pub struct SharedSignal {
    cell: AtomicU32,
    lock: Mutex<()>,
    ready: Condvar,
}

impl SharedSignal {
    /// Create a signal in the pending state.
    pub fn new() -> Self {
        Self {
            cell: AtomicU32::new(PENDING),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        }
    }

    /// Current cell value.
    pub fn load(&self) -> u32 {
        self.cell.load(Ordering::Acquire)
    }

    /// Block the calling thread until the cell becomes [`READY`].
    ///
    /// There is no timeout. If nobody ever calls [`notify`](Self::notify),
    /// this never returns.
    pub fn wait(&self) {
        let mut guard = self.lock.lock();
        while self.cell.load(Ordering::Acquire) == PENDING {
            self.ready.wait(&mut guard);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if the signal was raised.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        while self.cell.load(Ordering::Acquire) == PENDING {
            if self.ready.wait_for(&mut guard, timeout).timed_out() {
                return self.cell.load(Ordering::Acquire) == READY;
            }
        }
        true
    }

    /// Set the cell to [`READY`] and wake one waiter.
    pub fn notify(&self) {
        let _guard = self.lock.lock();
        self.cell.store(READY, Ordering::Release);
        self.ready.notify_one();
    }

    /// Return the cell to [`PENDING`] after a response was consumed.
    pub fn reset(&self) {
        self.cell.store(PENDING, Ordering::Release);
    }
}
