//! Small async concurrency helpers shared across components (spec.md §9
//! design notes: async-with/defer for teardown, a single shared lock per
//! critical section).

use std::future::Future;

use tokio::sync::Mutex;

/// Runs `fut` while holding `lock`, mirroring the source's `async_locked`
/// decorator: the lock is shared across every call site that passes the
/// same `Mutex`, so only one such call executes at a time.
pub async fn locked<T>(lock: &Mutex<()>, fut: impl Future<Output = T>) -> T {
    let _guard = lock.lock().await;
    fut.await
}

/// Runs `teardown` exactly once, when the guard is dropped — on a normal
/// return, an early `?`, or a panic unwind. Used to guarantee release of a
/// store handle or background task on every exit path (spec.md §9).
pub struct TeardownGuard<F: FnOnce()> {
    teardown: Option<F>,
}

impl<F: FnOnce()> TeardownGuard<F> {
    /// Construct a guard that runs `teardown` on drop.
    pub fn new(teardown: F) -> Self {
        Self {
            teardown: Some(teardown),
        }
    }
}

impl<F: FnOnce()> Drop for TeardownGuard<F> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}
