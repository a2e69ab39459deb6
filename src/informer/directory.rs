//! Resource-kind discovery for the watch multiplexer.
//!
//! Resolves a logical kind name ("pods", "deployments.apps", a short name
//! like "deploy") to the upstream collection it lives in. The catalog is
//! built once from the cluster's discovery endpoints and shared by every
//! watch session; a kind the cluster does not expose is an expected
//! `Ok(None)` outcome, not an error.

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use kube::api::ApiResource;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upstream location of one discovered resource collection. Immutable once
/// discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResourceInfo {
    /// Plural collection name, e.g. "deployments"
    pub plural: String,
    /// Singular name, e.g. "deployment" (may be empty for some CRDs)
    pub singular: String,
    /// API group (empty string for core v1)
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind, e.g. "Deployment"
    pub kind: String,
    /// Whether the collection is namespace-scoped
    pub namespaced: bool,
}

impl ApiResourceInfo {
    /// Full group/version string, e.g. "v1" or "apps/v1".
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// kube dynamic-API descriptor for this collection.
    #[must_use]
    pub fn to_api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// Lookup table over everything discovery returned.
#[derive(Debug, Default)]
struct Catalog {
    by_key: HashMap<String, Arc<ApiResourceInfo>>,
}

impl Catalog {
    /// Register one discovered resource under all of its lookup keys.
    ///
    /// The compound "plural.group" key is unambiguous and always written;
    /// short keys (plural, kind, singular, short names) are first-writer-wins
    /// so core kinds are not shadowed by CRDs with colliding names.
    fn insert(&mut self, info: ApiResourceInfo, short_names: &[String]) {
        // Subresources like "pods/log" are not watchable collections
        if info.plural.contains('/') {
            return;
        }

        let info = Arc::new(info);
        let compound = if info.group.is_empty() {
            info.plural.to_lowercase()
        } else {
            format!("{}.{}", info.plural.to_lowercase(), info.group.to_lowercase())
        };
        self.by_key.insert(compound, info.clone());

        let mut short_keys = vec![info.plural.to_lowercase(), info.kind.to_lowercase()];
        if !info.singular.is_empty() {
            short_keys.push(info.singular.to_lowercase());
        }
        short_keys.extend(short_names.iter().map(|name| name.to_lowercase()));

        for key in short_keys {
            self.by_key.entry(key).or_insert_with(|| info.clone());
        }
    }

    fn get(&self, kind: &str) -> Option<Arc<ApiResourceInfo>> {
        self.by_key.get(&kind.to_lowercase()).cloned()
    }

    fn len(&self) -> usize {
        self.by_key.len()
    }
}

/// Resolves logical resource-kind names to their upstream collection via
/// one-time discovery.
pub struct ApiDirectory {
    client: Client,
    catalog: OnceCell<Arc<Catalog>>,
}

impl ApiDirectory {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    /// Case-insensitive lookup, running discovery on first use.
    ///
    /// Concurrent callers while discovery is in flight coalesce onto one
    /// attempt. A failed attempt is not cached: the next resolve retries
    /// discovery from scratch.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the whole discovery enumeration fails
    /// (network/auth). A kind the cluster does not expose is `Ok(None)`.
    pub async fn resolve(&self, kind: &str) -> Result<Option<Arc<ApiResourceInfo>>> {
        let catalog = self.catalog.get_or_try_init(|| self.discover()).await?;
        Ok(catalog.get(kind))
    }

    /// Build the catalog from the core API and every group's preferred
    /// version. A failure in one group/version is logged and skipped so it
    /// cannot abort the whole catalog.
    async fn discover(&self) -> Result<Arc<Catalog>> {
        let mut catalog = Catalog::default();

        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(Error::Discovery)?;
        for version in &core.versions {
            match self.client.list_core_api_resources(version).await {
                Ok(list) => absorb(&mut catalog, list, "", version),
                Err(err) => {
                    warn!(%version, "skipping core api version after discovery error: {err}");
                }
            }
        }

        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(Error::Discovery)?;
        for group in groups.groups {
            let Some(preferred) = group.preferred_version else {
                continue;
            };
            match self
                .client
                .list_api_group_resources(&preferred.group_version)
                .await
            {
                Ok(list) => absorb(&mut catalog, list, &group.name, &preferred.version),
                Err(err) => {
                    warn!(group = %group.name, "skipping api group after discovery error: {err}");
                }
            }
        }

        debug!(resources = catalog.len(), "api discovery complete");
        Ok(Arc::new(catalog))
    }
}

fn absorb(catalog: &mut Catalog, list: APIResourceList, group: &str, version: &str) {
    for resource in list.resources {
        let info = ApiResourceInfo {
            plural: resource.name,
            singular: resource.singular_name,
            group: group.to_owned(),
            version: version.to_owned(),
            kind: resource.kind,
            namespaced: resource.namespaced,
        };
        catalog.insert(info, resource.short_names.as_deref().unwrap_or(&[]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(plural: &str, group: &str, kind: &str) -> ApiResourceInfo {
        ApiResourceInfo {
            plural: plural.to_owned(),
            singular: kind.to_lowercase(),
            group: group.to_owned(),
            version: "v1".to_owned(),
            kind: kind.to_owned(),
            namespaced: true,
        }
    }

    #[test]
    fn test_catalog_keys() {
        let mut catalog = Catalog::default();
        catalog.insert(info("pods", "", "Pod"), &["po".to_owned()]);

        for key in ["pods", "pod", "Pod", "PODS", "po"] {
            let found = catalog.get(key).expect("resolvable");
            assert_eq!(found.kind, "Pod");
        }
        assert!(catalog.get("services").is_none());
    }

    #[test]
    fn test_catalog_first_writer_keeps_short_keys() {
        let mut catalog = Catalog::default();
        catalog.insert(info("deployments", "apps", "Deployment"), &[]);
        // a CRD with a colliding plural must not shadow the apps group
        catalog.insert(info("deployments", "example.io", "Deployment"), &[]);

        assert_eq!(catalog.get("deployments").expect("short key").group, "apps");
        assert_eq!(
            catalog.get("deployments.example.io").expect("compound key").group,
            "example.io"
        );
        assert_eq!(
            catalog.get("deployments.apps").expect("compound key").group,
            "apps"
        );
    }

    #[test]
    fn test_catalog_skips_subresources() {
        let mut catalog = Catalog::default();
        catalog.insert(info("pods/log", "", "Pod"), &[]);
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_api_resource_conversion() {
        let core = info("pods", "", "Pod");
        assert_eq!(core.api_version(), "v1");
        assert_eq!(core.to_api_resource().api_version, "v1");

        let grouped = info("deployments", "apps", "Deployment");
        assert_eq!(grouped.api_version(), "apps/v1");
        let ar = grouped.to_api_resource();
        assert_eq!(ar.group, "apps");
        assert_eq!(ar.plural, "deployments");
    }
}
