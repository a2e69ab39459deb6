use std::fmt;
use std::sync::Arc;

use kube::api::DynamicObject;
use serde_json::{Value, json};

use crate::error::Error;

/// Logical identity of one subscription target: a resource kind plus an
/// optional namespace. At most one live watch session exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    kind: String,
    namespace: Option<String>,
}

impl WatchKey {
    #[must_use]
    pub fn new(kind: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.to_lowercase(),
            namespace: namespace.map(str::to_owned),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}:{ns}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A change observed on one watched collection, fanned out to every
/// subscriber of its session in upstream arrival order.
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    Added(Arc<DynamicObject>),
    Modified(Arc<DynamicObject>),
    Deleted(Arc<DynamicObject>),
    /// Synthetic and informational; never mutates the cache and does not by
    /// itself close the subscription.
    Error(Arc<Error>),
}

impl ResourceEvent {
    /// The resource document carried by the event, if any.
    #[must_use]
    pub fn object(&self) -> Option<&DynamicObject> {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => Some(obj),
            Self::Error(_) => None,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Wire form used by per-connection bridges:
    /// `{"type": "ADDED", "resource": {...}}` or
    /// `{"type": "ERROR", "error": "..."}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Added(obj) => json!({"type": "ADDED", "resource": obj.as_ref()}),
            Self::Modified(obj) => json!({"type": "MODIFIED", "resource": obj.as_ref()}),
            Self::Deleted(obj) => json!({"type": "DELETED", "resource": obj.as_ref()}),
            Self::Error(err) => json!({"type": "ERROR", "error": err.to_string()}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> Arc<DynamicObject> {
        let value = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "default", "uid": "uid-1"},
        });
        Arc::new(serde_json::from_value(value).expect("valid object"))
    }

    #[test]
    fn test_watch_key_display_and_case() {
        let cluster_wide = WatchKey::new("Pods", None);
        assert_eq!(cluster_wide.kind(), "pods");
        assert_eq!(cluster_wide.to_string(), "pods");

        let namespaced = WatchKey::new("pods", Some("kube-system"));
        assert_eq!(namespaced.to_string(), "pods:kube-system");
        assert_ne!(cluster_wide, namespaced);
        assert_eq!(WatchKey::new("PODS", None), cluster_wide);
    }

    #[test]
    fn test_event_wire_form() {
        let added = ResourceEvent::Added(sample_object());
        let wire = added.to_json();
        assert_eq!(wire["type"], "ADDED");
        assert_eq!(wire["resource"]["metadata"]["name"], "web-0");

        let error = ResourceEvent::Error(Arc::new(Error::UnknownKind("gadgets".to_owned())));
        let wire = error.to_json();
        assert_eq!(wire["type"], "ERROR");
        assert!(wire["error"].as_str().expect("error string").contains("gadgets"));
        assert!(error.object().is_none());
    }
}
