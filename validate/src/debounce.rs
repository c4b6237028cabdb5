//! Keyed trailing-edge debouncing.
//!
//! Scheduling an action for a key replaces whatever was pending for that key;
//! only the last action scheduled before the delay elapses runs.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;

/// Default quiet period between the last edit and validation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

type TimerTable<K> = Arc<Mutex<HashMap<K, PendingTimer>>>;

fn lock<K>(table: &Mutex<HashMap<K, PendingTimer>>) -> MutexGuard<'_, HashMap<K, PendingTimer>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Debouncer<K> {
    timers: TimerTable<K>,
    next_generation: AtomicU64,
}

impl<K> Default for Debouncer<K> {
    fn default() -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless `key` is rescheduled or cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut timers = lock(&self.timers);
        if let Some(previous) = timers.remove(&key) {
            previous.handle.abort();
        }

        let table = Arc::clone(&self.timers);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = lock(&table);
                match timers.get(&task_key) {
                    Some(pending) if pending.generation == generation => {
                        timers.remove(&task_key);
                    }
                    // superseded between wake-up and lock
                    _ => return,
                }
            }
            action.await;
        });

        // the timer task cannot claim its entry before this insert releases the lock
        timers.insert(
            key,
            PendingTimer {
                generation,
                handle: task.abort_handle(),
            },
        );
    }

    /// Drop the pending action for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.timers).remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.timers).contains_key(key)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl<K> Debouncer<K> {
    /// Cancel every pending action.
    pub fn dispose_all(&self) {
        let mut timers = lock(&self.timers);
        for (_, pending) in timers.drain() {
            pending.handle.abort();
        }
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
