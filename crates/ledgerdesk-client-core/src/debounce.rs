//! Trailing-edge debounce for async functions.
//!
//! Each call restarts the quiet-period timer; when the timer finally fires,
//! the wrapped function runs once with the most recent call's arguments.
//! Superseded callers resolve to [`DebounceOutcome::Superseded`] instead of
//! hanging, so consumers can always distinguish "my call won" from "a later
//! call replaced mine".

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;

/// What an awaited debounced call resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome<T> {
    /// This call survived the quiet period and ran the wrapped function.
    Settled(T),
    /// A later call (or a cancel) replaced this one before the timer fired.
    Superseded,
}

impl<T> DebounceOutcome<T> {
    /// The settled value, if this call was the one that ran.
    pub fn settled(self) -> Option<T> {
        match self {
            Self::Settled(value) => Some(value),
            Self::Superseded => None,
        }
    }
}

/// Debounced wrapper around an async function.
///
/// `cancel` (and drop) invalidate any timer that has not fired yet; an
/// invocation already past its timer cannot be recalled, matching the
/// usual clear-the-timeout contract.
pub struct Debounced<A, T> {
    delay: Duration,
    run: Arc<dyn Fn(A) -> BoxFuture<'static, T> + Send + Sync>,
    generation: Arc<AtomicU64>,
}

impl<A, T> Debounced<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F, Fut>(delay: Duration, run: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            delay,
            run: Arc::new(move |args| Box::pin(run(args))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule an invocation with `args`, superseding any pending one.
    ///
    /// The returned future is detached from `self` and can be dropped
    /// freely; the underlying invocation still fires for the winning call.
    pub fn call(&self, args: A) -> impl Future<Output = DebounceOutcome<T>> + Send + 'static {
        let my_generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation = Arc::clone(&self.generation);
        let run = Arc::clone(&self.run);
        let delay = self.delay;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Only the most recent call at timer expiry gets to run.
            if generation.load(Ordering::Acquire) != my_generation {
                return;
            }
            let result = run(args).await;
            let _ = tx.send(result);
        });

        async move {
            match rx.await {
                Ok(value) => DebounceOutcome::Settled(value),
                Err(_) => DebounceOutcome::Superseded,
            }
        }
    }

    /// Invalidate any pending timer. Calls issued before the cancel will
    /// never invoke the wrapped function.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl<A, T> Drop for Debounced<A, T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl<A, T> std::fmt::Debug for Debounced<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debounced")
            .field("delay", &self.delay)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
