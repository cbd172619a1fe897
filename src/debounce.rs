//! Trailing-edge debounce for coalescing bursts of calls into one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delays `action` until calls stop arriving for `delay`, then runs it once
/// with the latest arguments.
///
/// Each pending run is a tokio task, so calls must happen inside a runtime.
/// Dropping the debouncer cancels a pending run.
pub struct Debouncer<T> {
    delay: Duration,
    action: Arc<dyn Fn(T) + Send + Sync>,
    pending: Arc<Mutex<Option<T>>>,
    timer: Option<JoinHandle<()>>,
}

fn lock<T>(slot: &Mutex<Option<T>>) -> MutexGuard<'_, Option<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            delay,
            action: Arc::new(action),
            pending: Arc::new(Mutex::new(None)),
            timer: None,
        }
    }

    /// Replace any pending run with one for `args`, `delay` from now.
    pub fn call(&mut self, args: T) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        *lock(&self.pending) = Some(args);

        let pending = Arc::clone(&self.pending);
        let action = Arc::clone(&self.action);
        let delay = self.delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Take under the lock and release it before running the action.
            let args = lock(&pending).take();
            if let Some(args) = args {
                action(args);
            }
        }));
    }

    /// Run a pending action now instead of waiting. No-op when nothing is pending.
    pub fn flush(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let args = lock(&self.pending).take();
        if let Some(args) = args {
            (self.action)(args);
        }
    }

    /// Drop a pending run without executing it.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        lock(&self.pending).take();
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
