pub mod config;
pub mod indexer;
pub mod informer;
pub mod queue;
pub mod worker;

pub use indexer::PodIndexer;
pub use informer::{InformerHandle, PodInformer, Transition};
pub use queue::WorkQueue;
pub use worker::{LogPolicy, ReconcilePolicy};

use crate::k8s::pods::PodFilter;
use kube::Client;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Owns the indexer, queue and informer and runs the reconcile workers
///
/// Startup order guarantees no worker ever observes a partially warm
/// cache: workers are spawned only after the informer's initial list has
/// been fully applied to the indexer.
pub struct Controller {
    indexer: Arc<PodIndexer>,
    queue: Arc<WorkQueue>,
    policy: Arc<dyn ReconcilePolicy>,
    workers: usize,
}

impl Controller {
    #[must_use]
    pub fn new(policy: Arc<dyn ReconcilePolicy>, workers: usize) -> Self {
        Self {
            indexer: Arc::new(PodIndexer::new()),
            queue: Arc::new(WorkQueue::new()),
            policy,
            workers,
        }
    }

    #[must_use]
    pub fn indexer(&self) -> Arc<PodIndexer> {
        self.indexer.clone()
    }

    #[must_use]
    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// Start the informer and, once the cache has synced, the workers
    ///
    /// Returns a shutdown sender and a handle whose `drained` future
    /// resolves after the stream has stopped, the queue has closed and
    /// every worker has run its in-flight reconcile to completion.
    pub async fn start(
        self,
        client: Client,
        namespace: Option<String>,
        filter: PodFilter,
    ) -> (mpsc::Sender<()>, ControllerHandle) {
        let informer = PodInformer::new(
            client,
            namespace,
            filter,
            self.indexer.clone(),
            self.queue.clone(),
        );
        let mut synced_rx = informer.synced();
        let (informer_shutdown_tx, informer_handle) = informer.start();

        info!("⏳ waiting for initial cache sync");
        while !*synced_rx.borrow() {
            if synced_rx.changed().await.is_err() {
                warn!("⚠️  informer stopped before the cache synced");
                break;
            }
        }

        let mut worker_handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            worker_handles.push(tokio::spawn(worker::run_worker(
                id,
                self.indexer.clone(),
                self.queue.clone(),
                self.policy.clone(),
            )));
        }
        info!("🚀 Controller running with {} workers", self.workers);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let queue = self.queue.clone();
        let drain_handle = tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            info!("🛑 Controller shutting down");

            // Stop the stream first, close the queue, then let every task
            // finish its current step; nothing is interrupted mid-reconcile
            let _ = informer_shutdown_tx.send(()).await;
            queue.shut_down().await;
            informer_handle.drain().await;
            for handle in worker_handles {
                let _ = handle.await;
            }

            info!("🛑 Controller drained");
        });

        (shutdown_tx, ControllerHandle { drain_handle })
    }
}

/// Handle to a running controller's drain task
pub struct ControllerHandle {
    drain_handle: tokio::task::JoinHandle<()>,
}

impl ControllerHandle {
    /// Wait until shutdown has fully drained the informer and workers
    pub async fn drained(self) {
        let _ = self.drain_handle.await;
    }
}
