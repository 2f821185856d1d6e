/**
 * Pod list+watch informer
 *
 * Maintains the indexer as a faithful mirror of the filtered pod
 * collection and turns every observed change into a work queue key.
 * Watch and list results flow through a single transition channel so
 * per-pod ordering survives all the way into the indexer.
 */
use super::config::{
    INITIAL_BACKOFF_SECONDS, MAX_BACKOFF_SECONDS, MAX_WATCH_RESTARTS, RESTART_DELAY_SECONDS,
    TRANSITION_CHANNEL_CAPACITY,
};
use super::indexer::PodIndexer;
use super::queue::WorkQueue;
use crate::error::Result;
use crate::k8s::pods::{pod_key, PodFilter, PodSnapshot};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, WatchEvent};
use kube::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// One logical change observed on the stream
#[derive(Debug)]
pub enum Transition {
    Added(Box<Pod>),
    Modified(Box<Pod>),
    Deleted(Box<Pod>),
    /// Full state of the collection after a (re)list
    Relisted(Vec<Pod>),
}

/// Bridges the cluster's list+watch stream into indexer updates and queue
/// enqueues, tolerating stream restarts
pub struct PodInformer {
    client: Client,
    namespace: Option<String>,
    filter: PodFilter,
    indexer: Arc<PodIndexer>,
    queue: Arc<WorkQueue>,
    synced_tx: watch::Sender<bool>,
    synced_rx: watch::Receiver<bool>,
}

impl PodInformer {
    #[must_use]
    pub fn new(
        client: Client,
        namespace: Option<String>,
        filter: PodFilter,
        indexer: Arc<PodIndexer>,
        queue: Arc<WorkQueue>,
    ) -> Self {
        let (synced_tx, synced_rx) = watch::channel(false);
        Self {
            client,
            namespace,
            filter,
            indexer,
            queue,
            synced_tx,
            synced_rx,
        }
    }

    /// Receiver that flips to `true` once the initial list has been applied
    #[must_use]
    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced_rx.clone()
    }

    /// Start the watch stream and the transition dispatcher
    ///
    /// Returns a shutdown sender that stops the stream; the dispatcher
    /// drains behind it once the last transition has been applied.
    #[must_use]
    pub fn start(self) -> (mpsc::Sender<()>, InformerHandle) {
        let Self {
            client,
            namespace,
            filter,
            indexer,
            queue,
            synced_tx,
            synced_rx: _,
        } = self;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (transition_tx, transition_rx) = mpsc::channel(TRANSITION_CHANNEL_CAPACITY);

        let dispatcher_handle = tokio::spawn(Self::run_dispatcher(
            indexer,
            queue,
            transition_rx,
            synced_tx,
        ));
        let watch_handle =
            Self::start_watch_task(client, namespace, filter, transition_tx, shutdown_rx);

        info!("🔍 Watch stream started for pods");

        (
            shutdown_tx,
            InformerHandle {
                task_handles: vec![dispatcher_handle, watch_handle],
            },
        )
    }

    /// Apply transitions in channel order; exits when the watch task drops
    /// its sender
    async fn run_dispatcher(
        indexer: Arc<PodIndexer>,
        queue: Arc<WorkQueue>,
        mut transition_rx: mpsc::Receiver<Transition>,
        synced_tx: watch::Sender<bool>,
    ) {
        info!("📡 Transition dispatcher started");

        while let Some(transition) = transition_rx.recv().await {
            Self::apply_transition(&indexer, &queue, &synced_tx, transition).await;
        }

        info!("📡 Transition dispatcher shutting down");
    }

    async fn apply_transition(
        indexer: &PodIndexer,
        queue: &WorkQueue,
        synced_tx: &watch::Sender<bool>,
        transition: Transition,
    ) {
        match transition {
            Transition::Added(pod) => {
                let snapshot = PodSnapshot::from_pod(&pod);
                let key = snapshot.key.clone();
                // A replayed add is dropped by the version gate; the key is
                // still re-enqueued, redundant reconciliation is tolerated
                indexer.upsert(snapshot).await;
                info!("➕ add pod to queue: {key}");
                queue.add(&key).await;
            }
            Transition::Modified(pod) => {
                let snapshot = PodSnapshot::from_pod(&pod);
                let key = snapshot.key.clone();
                indexer.upsert(snapshot).await;
                debug!("📝 pod modified: {key}");
                queue.add(&key).await;
            }
            Transition::Deleted(pod) => {
                let key = pod_key(&pod);
                indexer.delete(&key).await;
                info!("🗑️  pod deleted: {key}");
                queue.add(&key).await;
            }
            Transition::Relisted(pods) => {
                Self::apply_relist(indexer, queue, pods).await;
                if !*synced_tx.borrow() {
                    info!("✅ cache synced ({} pods)", indexer.len().await);
                    let _ = synced_tx.send(true);
                }
            }
        }
    }

    /// Reconcile the indexer against a fresh full list
    ///
    /// Keys cached locally but absent from the fresh list were deleted
    /// while the stream was down; their deletes are synthesized before any
    /// refreshed state is dispatched.
    async fn apply_relist(indexer: &PodIndexer, queue: &WorkQueue, pods: Vec<Pod>) {
        let fresh: HashSet<String> = pods.iter().map(pod_key).collect();

        for key in indexer.keys().await {
            if !fresh.contains(&key) {
                indexer.delete(&key).await;
                info!("🗑️  pod deleted during resync: {key}");
                queue.add(&key).await;
            }
        }

        for pod in pods {
            let snapshot = PodSnapshot::from_pod(&pod);
            let key = snapshot.key.clone();
            indexer.upsert(snapshot).await;
            queue.add(&key).await;
        }
    }

    /// Run the list+watch loop, restarting with capped backoff on failure
    fn start_watch_task(
        client: Client,
        namespace: Option<String>,
        filter: PodFilter,
        transition_tx: mpsc::Sender<Transition>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("🔍 Starting pod watcher");

            let mut backoff_seconds = INITIAL_BACKOFF_SECONDS;
            let mut restart_count = 0;

            loop {
                if restart_count >= MAX_WATCH_RESTARTS {
                    error!(
                        "❌ Pod watcher exceeded maximum restart attempts ({}), stopping",
                        MAX_WATCH_RESTARTS
                    );
                    break;
                }
                if transition_tx.is_closed() {
                    break;
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("🔍 Pod watcher shutting down");
                        break;
                    }
                    result = Self::list_and_watch(
                        client.clone(),
                        namespace.clone(),
                        filter.clone(),
                        transition_tx.clone(),
                    ) => {
                        match result {
                            Ok(()) => {
                                debug!("🔍 Pod watch stream ended, relisting...");
                                backoff_seconds = INITIAL_BACKOFF_SECONDS;
                                restart_count = 0;
                            }
                            Err(e) => {
                                restart_count += 1;
                                error!(
                                    "❌ Pod watcher failed (attempt {}/{}): {}, restarting in {}s",
                                    restart_count, MAX_WATCH_RESTARTS, e, backoff_seconds
                                );
                                sleep(Duration::from_secs(backoff_seconds)).await;
                                backoff_seconds = (backoff_seconds * 2).min(MAX_BACKOFF_SECONDS);
                            }
                        }
                    }
                }

                sleep(Duration::from_secs(RESTART_DELAY_SECONDS)).await;
            }
        })
    }

    /// One full list followed by a watch session resuming from its version
    ///
    /// Every normal return leads the caller back to a relist, which is how
    /// missed events are reconciled after a disconnect.
    async fn list_and_watch(
        client: Client,
        namespace: Option<String>,
        filter: PodFilter,
        transition_tx: mpsc::Sender<Transition>,
    ) -> Result<()> {
        use futures::{pin_mut, TryStreamExt};

        let pods: Api<Pod> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };

        let list = pods.list(&filter.list_params()).await?;
        let resource_version = list
            .metadata
            .resource_version
            .clone()
            .unwrap_or_else(|| "0".to_string());
        debug!(
            "📋 listed {} pods at version {resource_version}",
            list.items.len()
        );
        if transition_tx
            .send(Transition::Relisted(list.items))
            .await
            .is_err()
        {
            return Ok(()); // dispatcher is gone, shutdown under way
        }

        let stream = pods.watch(&filter.watch_params(), &resource_version).await?;
        pin_mut!(stream);

        while let Some(event) = stream.try_next().await? {
            let transition = match event {
                WatchEvent::Added(pod) => Transition::Added(Box::new(pod)),
                WatchEvent::Modified(pod) => Transition::Modified(Box::new(pod)),
                WatchEvent::Deleted(pod) => Transition::Deleted(Box::new(pod)),
                WatchEvent::Error(e) => {
                    // Expired watch window (410 Gone) or other server-side
                    // failure; fall back to a relist rather than surfacing it
                    warn!("⚠️  watch error ({}): {}, relisting", e.code, e.message);
                    return Ok(());
                }
                _ => continue,
            };
            if transition_tx.send(transition).await.is_err() {
                return Ok(());
            }
        }

        Ok(())
    }
}

/// Handle to the informer's spawned tasks
pub struct InformerHandle {
    task_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl InformerHandle {
    /// Wait for the watch and dispatch tasks to finish draining
    pub async fn drain(self) {
        for handle in self.task_handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn make_pod(namespace: &str, name: &str, rv: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some(rv.to_string()),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    fn fixtures() -> (Arc<PodIndexer>, Arc<WorkQueue>, watch::Sender<bool>) {
        let (synced_tx, _synced_rx) = watch::channel(false);
        (
            Arc::new(PodIndexer::new()),
            Arc::new(WorkQueue::new()),
            synced_tx,
        )
    }

    #[tokio::test]
    async fn test_add_updates_indexer_and_enqueues() {
        let (indexer, queue, synced_tx) = fixtures();

        let pod = make_pod("default", "web-0", "1", "Pending");
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Added(Box::new(pod)),
        )
        .await;

        assert_eq!(indexer.get("default/web-0").await.unwrap().version, 1);
        assert_eq!(queue.get().await.as_deref(), Some("default/web-0"));
    }

    #[tokio::test]
    async fn test_replayed_add_is_idempotent_but_still_enqueues() {
        let (indexer, queue, synced_tx) = fixtures();

        let pod = make_pod("default", "web-0", "5", "Pending");
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Added(Box::new(pod.clone())),
        )
        .await;
        let key = queue.get().await.unwrap();
        queue.done(&key).await;

        // Replay of the same event after a reconnect: stale for the
        // indexer, but the key must still reconcile once more
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Added(Box::new(pod)),
        )
        .await;

        assert_eq!(indexer.get("default/web-0").await.unwrap().version, 5);
        assert_eq!(queue.get().await.as_deref(), Some("default/web-0"));
    }

    #[tokio::test]
    async fn test_delete_removes_and_enqueues() {
        let (indexer, queue, synced_tx) = fixtures();

        let pod = make_pod("default", "web-0", "1", "Pending");
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Added(Box::new(pod.clone())),
        )
        .await;
        let key = queue.get().await.unwrap();
        queue.done(&key).await;

        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Deleted(Box::new(pod)),
        )
        .await;

        assert!(indexer.get("default/web-0").await.is_none());
        assert_eq!(queue.get().await.as_deref(), Some("default/web-0"));
    }

    #[tokio::test]
    async fn test_relist_synthesizes_deletes_before_updates() {
        let (indexer, queue, synced_tx) = fixtures();

        // Two pods known before the stream drops
        for pod in [
            make_pod("default", "gone", "1", "Pending"),
            make_pod("default", "kept", "2", "Pending"),
        ] {
            PodInformer::apply_transition(
                &indexer,
                &queue,
                &synced_tx,
                Transition::Added(Box::new(pod)),
            )
            .await;
            let key = queue.get().await.unwrap();
            queue.done(&key).await;
        }

        // The fresh list no longer carries "gone"
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Relisted(vec![make_pod("default", "kept", "3", "Pending")]),
        )
        .await;

        assert!(indexer.get("default/gone").await.is_none());
        assert_eq!(indexer.get("default/kept").await.unwrap().version, 3);

        // The synthesized delete is dispatched ahead of the refresh
        assert_eq!(queue.get().await.as_deref(), Some("default/gone"));
        assert_eq!(queue.get().await.as_deref(), Some("default/kept"));
    }

    #[tokio::test]
    async fn test_first_relist_marks_cache_synced() {
        let (indexer, queue, _) = fixtures();
        let (synced_tx, synced_rx) = watch::channel(false);

        assert!(!*synced_rx.borrow());
        PodInformer::apply_transition(
            &indexer,
            &queue,
            &synced_tx,
            Transition::Relisted(vec![make_pod("default", "web-0", "1", "Pending")]),
        )
        .await;
        assert!(*synced_rx.borrow());
    }
}
