//! Global busy flag driven by a reentrant request counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reentrant counter behind the single "system busy" flag.
///
/// Interceptors increment before a request starts and decrement after it
/// settles; [`BusyCounter::begin`] returns a guard whose drop performs the
/// decrement, so the flag cannot leak true across an early return or panic.
#[derive(Debug, Default)]
pub struct BusyCounter {
    count: AtomicUsize,
}

impl BusyCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one request in flight; the returned guard ends it on drop.
    #[must_use]
    pub fn begin(self: &Arc<Self>) -> BusyGuard {
        self.start();
        BusyGuard {
            counter: Arc::clone(self),
        }
    }

    pub fn start(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Saturating decrement; an unmatched stop never wraps below zero.
    pub fn stop(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(1))
            });
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// Drop guard pairing one `start` with exactly one `stop`.
#[derive(Debug)]
pub struct BusyGuard {
    counter: Arc<BusyCounter>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.counter.stop();
    }
}
