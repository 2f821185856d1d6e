use super::config::MAX_RECONCILE_ATTEMPTS;
use super::indexer::PodIndexer;
use super::queue::WorkQueue;
use crate::error::Result;
use crate::k8s::pods::PodSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The reconciliation action invoked for every dequeued key
///
/// Implementations must be idempotent: the loop only knows that something
/// changed for a key, not what, and the same observed state may be handed
/// over any number of times. An absent snapshot means the pod no longer
/// exists and the policy should clean up rather than fail.
#[async_trait]
pub trait ReconcilePolicy: Send + Sync {
    async fn reconcile(&self, key: &str, pod: Option<&PodSnapshot>) -> Result<()>;
}

/// Default policy: log the observed state and do nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPolicy;

#[async_trait]
impl ReconcilePolicy for LogPolicy {
    async fn reconcile(&self, key: &str, pod: Option<&PodSnapshot>) -> Result<()> {
        match pod {
            Some(snapshot) => info!("👀 observed {key}: phase {}", snapshot.phase),
            None => info!("🧹 {key} is gone, nothing left to track"),
        }
        Ok(())
    }
}

/// Run one reconcile worker until the queue shuts down
///
/// Each iteration re-reads the current state from the indexer rather than
/// trusting whatever event produced the key; a missing snapshot is the
/// deletion signal. Failed attempts are redelivered with backoff until the
/// attempt cap, then dropped with a terminal log.
pub async fn run_worker(
    id: usize,
    indexer: Arc<PodIndexer>,
    queue: Arc<WorkQueue>,
    policy: Arc<dyn ReconcilePolicy>,
) {
    info!("🚀 Worker {id} started");

    while let Some(key) = queue.get().await {
        let snapshot = indexer.get(&key).await;

        match policy.reconcile(&key, snapshot.as_ref()).await {
            Ok(()) => {
                if queue.retries(&key).await > 0 {
                    debug!("✅ reconciled {key} after retries");
                }
                queue.forget(&key).await;
            }
            Err(e) => {
                let attempts = queue.retries(&key).await + 1;
                if attempts < MAX_RECONCILE_ATTEMPTS {
                    warn!(
                        "🔄 reconcile failed for {key} (attempt {attempts}/{MAX_RECONCILE_ATTEMPTS}): {e}, retrying"
                    );
                    queue.add_rate_limited(&key).await;
                } else {
                    error!("💀 giving up on {key} after {attempts} attempts: {e}");
                    queue.forget(&key).await;
                }
            }
        }

        queue.done(&key).await;
    }

    info!("🛑 Worker {id} stopped");
}
