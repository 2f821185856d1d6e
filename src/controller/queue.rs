use super::config::{RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    /// Delivery order of keys that are dirty and not currently processing
    order: VecDeque<String>,
    /// Keys with a pending reconciliation marker, at most one per key
    dirty: HashSet<String>,
    /// Keys currently owned by a worker
    processing: HashSet<String>,
    /// Consecutive reconcile failures per key
    failures: HashMap<String, u32>,
    shut_down: bool,
}

/// Deduplicating, rate-limited FIFO of pod keys awaiting reconciliation
///
/// A key added while unprocessed is collapsed into the existing marker; a
/// key added while a worker holds it is remembered and redelivered once
/// after `done`. No key is ever handed to two workers at once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    wakeup: Arc<Notify>,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Mark a key dirty; no-op when it already carries a pending marker
    pub async fn add(&self, key: &str) {
        Self::mark_dirty(&self.state, &self.wakeup, key).await;
    }

    async fn mark_dirty(state: &Mutex<QueueState>, wakeup: &Notify, key: &str) {
        let mut state = state.lock().await;
        if state.shut_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        // A key a worker currently holds stays out of the delivery order;
        // done() requeues it
        if !state.processing.contains(key) {
            state.order.push_back(key.to_string());
            wakeup.notify_one();
        }
    }

    /// Wait for the next key, or `None` once the queue has shut down
    ///
    /// The returned key moves into the processing set and is not handed to
    /// any other worker until `done` is called for it.
    pub async fn get(&self) -> Option<String> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(key) = state.order.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    if !state.order.is_empty() {
                        // cascade so another blocked worker sees remaining work
                        self.wakeup.notify_one();
                    }
                    return Some(key);
                }
                if state.shut_down {
                    // cascade so every blocked get observes the shutdown
                    self.wakeup.notify_one();
                    return None;
                }
            }
            self.wakeup.notified().await;
        }
    }

    /// Release a key a worker finished with
    ///
    /// If the key was re-marked dirty while processing it becomes
    /// immediately eligible for redelivery.
    pub async fn done(&self, key: &str) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shut_down {
            state.order.push_back(key.to_string());
            self.wakeup.notify_one();
        }
    }

    /// Re-add a key after a failure, delayed by its cumulative backoff
    ///
    /// Increments the key's failure count; the delay doubles per failure up
    /// to the configured ceiling.
    pub async fn add_rate_limited(&self, key: &str) {
        let delay = {
            let mut state = self.state.lock().await;
            if state.shut_down {
                return;
            }
            let failures = state.failures.entry(key.to_string()).or_insert(0);
            *failures += 1;
            retry_delay(*failures)
        };
        debug!("⏳ retry scheduled: {key} in {delay:?}");

        let state = Arc::clone(&self.state);
        let wakeup = Arc::clone(&self.wakeup);
        let key = key.to_string();
        tokio::spawn(async move {
            sleep(delay).await;
            Self::mark_dirty(&state, &wakeup, &key).await;
        });
    }

    /// Clear a key's failure count (the success path)
    ///
    /// Does not remove a pending dirty marker.
    pub async fn forget(&self, key: &str) {
        self.state.lock().await.failures.remove(key);
    }

    /// Current failure count for a key
    pub async fn retries(&self, key: &str) -> u32 {
        self.state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Stop delivery: every current and future `get` returns `None`
    ///
    /// Keys already handed to workers are not dropped; they finish their
    /// in-flight reconcile and `done` normally.
    pub async fn shut_down(&self) {
        {
            let mut state = self.state.lock().await;
            state.shut_down = true;
        }
        self.wakeup.notify_one();
        self.wakeup.notify_waiters();
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.lock().await.shut_down
    }

    /// Number of keys awaiting delivery
    pub async fn queue_size(&self) -> usize {
        self.state.lock().await.order.len()
    }

    /// Number of keys currently owned by workers
    pub async fn processing_count(&self) -> usize {
        self.state.lock().await.processing.len()
    }
}

/// Exponential backoff for a key's nth consecutive failure, capped
fn retry_delay(failures: u32) -> Duration {
    let base = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let ceiling = Duration::from_secs(RETRY_MAX_DELAY_SECS);
    let exponent = failures.saturating_sub(1).min(32);
    base.saturating_mul(2_u32.saturating_pow(exponent)).min(ceiling)
}
