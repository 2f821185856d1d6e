use crate::controller::config::WATCH_TIMEOUT_SECONDS;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, WatchParams};
use std::collections::BTreeMap;

/// Selector describing which pods the controller tracks
///
/// Mirrors the server-side filtering the watch api supports: a label
/// predicate on the `app` label and a field predicate on the lifecycle
/// phase. Both are optional; an empty filter tracks everything.
#[derive(Debug, Clone, Default)]
pub struct PodFilter {
    /// Value the pods must carry in their `app` label
    pub app_label: Option<String>,
    /// Lifecycle phase the pods must be in, e.g. `Pending`
    pub phase: Option<String>,
}

impl PodFilter {
    #[must_use]
    pub fn label_selector(&self) -> Option<String> {
        self.app_label.as_ref().map(|value| format!("app={value}"))
    }

    #[must_use]
    pub fn field_selector(&self) -> Option<String> {
        self.phase.as_ref().map(|phase| format!("status.phase={phase}"))
    }

    #[must_use]
    pub fn list_params(&self) -> ListParams {
        let mut lp = ListParams::default();
        if let Some(labels) = self.label_selector() {
            lp = lp.labels(&labels);
        }
        if let Some(fields) = self.field_selector() {
            lp = lp.fields(&fields);
        }
        lp
    }

    #[must_use]
    pub fn watch_params(&self) -> WatchParams {
        let mut wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);
        if let Some(labels) = self.label_selector() {
            wp = wp.labels(&labels);
        }
        if let Some(fields) = self.field_selector() {
            wp = wp.fields(&fields);
        }
        wp
    }
}

/// Condensed last-observed state of a tracked pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSnapshot {
    pub key: String,
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub node: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub version: u64,
}

impl PodSnapshot {
    /// Condense a watched pod into the cached form
    #[must_use]
    pub fn from_pod(pod: &Pod) -> Self {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let node = pod.spec.as_ref().and_then(|spec| spec.node_name.clone());
        let labels = pod.metadata.labels.clone().unwrap_or_default();

        Self {
            key: format!("{namespace}/{name}"),
            name,
            namespace,
            phase,
            node,
            labels,
            version: pod_version(pod),
        }
    }
}

/// Identity key of a pod, stable across updates
#[must_use]
pub fn pod_key(pod: &Pod) -> String {
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
    format!("{namespace}/{name}")
}

/// Numeric version marker parsed from the pod resource version
///
/// Unparsable versions map to 0 so the indexer keeps the first-seen
/// snapshot instead of thrashing on every replay.
#[must_use]
pub fn pod_version(pod: &Pod) -> u64 {
    pod.metadata
        .resource_version
        .as_deref()
        .and_then(|rv| rv.parse().ok())
        .unwrap_or(0)
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

    #[test]
    fn test_pod_key_and_version() {
        let pod = make_pod("kube-system", "etcd-0", "42", "Running");
        assert_eq!(pod_key(&pod), "kube-system/etcd-0");
        assert_eq!(pod_version(&pod), 42);
    }

    #[test]
    fn test_unparsable_version_maps_to_zero() {
        let pod = make_pod("default", "web-0", "not-a-number", "Pending");
        assert_eq!(pod_version(&pod), 0);
    }

    #[test]
    fn test_snapshot_condensation() {
        let pod = make_pod("default", "web-0", "7", "Pending");
        let snapshot = PodSnapshot::from_pod(&pod);
        assert_eq!(snapshot.key, "default/web-0");
        assert_eq!(snapshot.phase, "Pending");
        assert_eq!(snapshot.version, 7);
        assert!(snapshot.node.is_none());
    }

    #[test]
    fn test_filter_selectors() {
        let filter = PodFilter {
            app_label: Some("zookeeper".to_string()),
            phase: Some("Pending".to_string()),
        };
        assert_eq!(filter.label_selector().as_deref(), Some("app=zookeeper"));
        assert_eq!(
            filter.field_selector().as_deref(),
            Some("status.phase=Pending")
        );

        let empty = PodFilter::default();
        assert!(empty.label_selector().is_none());
        assert!(empty.field_selector().is_none());
    }
}
