// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory reference-data cache owned by each backend instance.
//!
//! Domains, sites, endpoints, and the app config live here in every
//! backend, durable or not. The cache is an explicit per-instance
//! object, not a process-wide singleton; id derivation runs entirely
//! under the write lock so concurrent creates cannot mint duplicates.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use strata_core::{
    AppConfig, Domain, DomainUpdate, Endpoint, EndpointType, EndpointUpdate, InsertDomain,
    InsertEndpoint, Site, StrataError,
};
use strata_serving::ServingClient;

use crate::ids::derive_id;
use crate::seed;

#[derive(Default)]
struct Inner {
    domains: HashMap<String, Domain>,
    sites: HashMap<String, Site>,
    endpoints: HashMap<String, Endpoint>,
    config: AppConfig,
}

/// Reference-data cache shared by all storage backends.
pub struct ReferenceCache {
    inner: RwLock<Inner>,
}

impl ReferenceCache {
    /// An empty cache, for backends that load reference data from
    /// durable tables before deciding whether to seed.
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// A cache pre-populated with the default reference data.
    pub fn seeded() -> Self {
        let inner = Inner {
            domains: seed::default_domains()
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
            sites: seed::default_sites()
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
            endpoints: seed::default_endpoints()
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            config: AppConfig::default(),
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    // --- Domains ---

    pub async fn domains(&self) -> Vec<Domain> {
        let inner = self.inner.read().await;
        let mut domains: Vec<Domain> = inner.domains.values().cloned().collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        domains
    }

    pub async fn domain(&self, id: &str) -> Option<Domain> {
        self.inner.read().await.domains.get(id).cloned()
    }

    /// Derive an id from the insert's name and store the new domain.
    /// The derive-check-insert sequence runs under one write lock.
    pub async fn insert_domain(&self, insert: InsertDomain) -> Domain {
        let mut inner = self.inner.write().await;
        let id = derive_id(&insert.name, |candidate| {
            inner.domains.contains_key(candidate)
        });
        let domain = Domain {
            id: id.clone(),
            name: insert.name,
            description: insert.description,
            system_prompt: insert.system_prompt,
            icon: insert.icon,
        };
        inner.domains.insert(id, domain.clone());
        domain
    }

    pub async fn update_domain(&self, id: &str, updates: DomainUpdate) -> Option<Domain> {
        let mut inner = self.inner.write().await;
        let merged = inner.domains.get(id)?.merged(updates);
        inner.domains.insert(id.to_string(), merged.clone());
        Some(merged)
    }

    pub async fn remove_domain(&self, id: &str) -> bool {
        self.inner.write().await.domains.remove(id).is_some()
    }

    pub async fn set_domains(&self, domains: Vec<Domain>) {
        let mut inner = self.inner.write().await;
        inner.domains = domains.into_iter().map(|d| (d.id.clone(), d)).collect();
    }

    // --- Sites ---

    pub async fn sites(&self) -> Vec<Site> {
        let inner = self.inner.read().await;
        let mut sites: Vec<Site> = inner.sites.values().cloned().collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        sites
    }

    pub async fn site(&self, id: &str) -> Option<Site> {
        self.inner.read().await.sites.get(id).cloned()
    }

    pub async fn set_sites(&self, sites: Vec<Site>) {
        let mut inner = self.inner.write().await;
        inner.sites = sites.into_iter().map(|s| (s.id.clone(), s)).collect();
    }

    // --- Endpoints ---

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        let inner = self.inner.read().await;
        sorted_endpoints(inner.endpoints.values().cloned().collect())
    }

    /// Endpoints visible under a domain filter. Foundation endpoints
    /// are globally visible; unscoped endpoints always show; scoped
    /// endpoints show only for their own domain.
    pub async fn endpoints_visible(&self, domain_id: Option<&str>) -> Vec<Endpoint> {
        let inner = self.inner.read().await;
        let visible = inner
            .endpoints
            .values()
            .filter(|e| match domain_id {
                None => e.domain_id.is_none() || e.endpoint_type == EndpointType::Foundation,
                Some(filter) if filter.is_empty() || filter == "generic" => {
                    e.domain_id.is_none() || e.endpoint_type == EndpointType::Foundation
                }
                Some(filter) => {
                    e.domain_id.is_none()
                        || e.domain_id.as_deref() == Some(filter)
                        || e.endpoint_type == EndpointType::Foundation
                }
            })
            .cloned()
            .collect();
        sorted_endpoints(visible)
    }

    pub async fn endpoint(&self, id: &str) -> Option<Endpoint> {
        self.inner.read().await.endpoints.get(id).cloned()
    }

    pub async fn insert_endpoint(&self, insert: InsertEndpoint) -> Endpoint {
        let mut inner = self.inner.write().await;
        let id = derive_id(&insert.name, |candidate| {
            inner.endpoints.contains_key(candidate)
        });
        let endpoint = Endpoint {
            id: id.clone(),
            name: insert.name,
            description: insert.description,
            endpoint_type: insert.endpoint_type,
            is_default: insert.is_default,
            domain_id: insert.domain_id,
        };
        inner.endpoints.insert(id, endpoint.clone());
        endpoint
    }

    pub async fn update_endpoint(&self, id: &str, updates: EndpointUpdate) -> Option<Endpoint> {
        let mut inner = self.inner.write().await;
        let merged = inner.endpoints.get(id)?.merged(updates);
        inner.endpoints.insert(id.to_string(), merged.clone());
        Some(merged)
    }

    pub async fn remove_endpoint(&self, id: &str) -> bool {
        self.inner.write().await.endpoints.remove(id).is_some()
    }

    /// Atomically replace the whole endpoint set.
    pub async fn replace_endpoints(&self, endpoints: Vec<Endpoint>) {
        let mut inner = self.inner.write().await;
        inner.endpoints = endpoints.into_iter().map(|e| (e.id.clone(), e)).collect();
    }

    // --- App config ---

    pub async fn config(&self) -> AppConfig {
        self.inner.read().await.config.clone()
    }

    pub async fn set_config(&self, config: AppConfig) -> AppConfig {
        let mut inner = self.inner.write().await;
        inner.config = config.clone();
        config
    }
}

fn sorted_endpoints(mut endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.name.cmp(&b.name))
    });
    endpoints
}

/// Shared refresh body used by every backend: replace the cached
/// endpoint set only on a successful non-empty remote listing. A
/// failed or empty refresh keeps the existing set, so callers never
/// observe an emptied cache.
pub(crate) async fn refresh_endpoints(
    cache: &ReferenceCache,
    serving: &ServingClient,
) -> Result<Vec<Endpoint>, StrataError> {
    if !serving.is_configured() {
        debug!("workspace not configured, keeping cached endpoints");
        return Ok(cache.endpoints().await);
    }

    match serving.list_endpoints(None).await {
        Ok(endpoints) if !endpoints.is_empty() => {
            info!(count = endpoints.len(), "endpoints refreshed from workspace");
            cache.replace_endpoints(endpoints).await;
        }
        Ok(_) => {
            debug!("workspace returned no endpoints, keeping cached set");
        }
        Err(e) => {
            warn!(error = %e, "endpoint refresh failed, keeping cached set");
        }
    }

    Ok(cache.endpoints().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_domain(name: &str) -> InsertDomain {
        InsertDomain {
            name: name.to_string(),
            description: "d".into(),
            system_prompt: "p".into(),
            icon: None,
        }
    }

    #[tokio::test]
    async fn seeded_cache_contains_defaults() {
        let cache = ReferenceCache::seeded();
        assert_eq!(cache.domains().await.len(), 7);
        assert_eq!(cache.sites().await.len(), 12);
        assert_eq!(cache.endpoints().await.len(), 3);
        assert!(cache.domain("generic").await.is_some());
        assert!(cache.site("all-sites").await.is_some());
    }

    #[tokio::test]
    async fn colliding_domain_names_get_sequential_suffixes() {
        let cache = ReferenceCache::empty();
        let first = cache.insert_domain(insert_domain("Ops Desk")).await;
        let second = cache.insert_domain(insert_domain("Ops Desk")).await;
        let third = cache.insert_domain(insert_domain("Ops Desk")).await;
        assert_eq!(first.id, "ops-desk");
        assert_eq!(second.id, "ops-desk-1");
        assert_eq!(third.id, "ops-desk-2");
    }

    #[tokio::test]
    async fn endpoint_visibility_honors_domain_filter() {
        let cache = ReferenceCache::empty();
        cache
            .replace_endpoints(vec![
                Endpoint {
                    id: "llama-3-70b".into(),
                    name: "Llama 3 70B".into(),
                    description: "".into(),
                    endpoint_type: EndpointType::Foundation,
                    is_default: true,
                    domain_id: Some("finance".into()),
                },
                Endpoint {
                    id: "shared-model".into(),
                    name: "Shared Model".into(),
                    description: "".into(),
                    endpoint_type: EndpointType::Custom,
                    is_default: false,
                    domain_id: None,
                },
                Endpoint {
                    id: "ops-agent".into(),
                    name: "Ops Agent".into(),
                    description: "".into(),
                    endpoint_type: EndpointType::Agent,
                    is_default: false,
                    domain_id: Some("mining-ops".into()),
                },
            ])
            .await;

        // mining-ops sees the foundation endpoint (global), the
        // unscoped endpoint, and its own agent.
        let visible = cache.endpoints_visible(Some("mining-ops")).await;
        let ids: Vec<_> = visible.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"llama-3-70b"));
        assert!(ids.contains(&"shared-model"));
        assert!(ids.contains(&"ops-agent"));

        // finance does not see the mining-ops agent.
        let visible = cache.endpoints_visible(Some("finance")).await;
        assert!(visible.iter().all(|e| e.id != "ops-agent"));

        // generic and no-filter behave identically: scoped non-foundation
        // endpoints are hidden.
        for filter in [None, Some("generic")] {
            let visible = cache.endpoints_visible(filter).await;
            let ids: Vec<_> = visible.iter().map(|e| e.id.as_str()).collect();
            assert!(ids.contains(&"llama-3-70b"), "foundation always visible");
            assert!(ids.contains(&"shared-model"));
            assert!(!ids.contains(&"ops-agent"));
        }
    }

    #[tokio::test]
    async fn replace_endpoints_swaps_the_whole_set() {
        let cache = ReferenceCache::seeded();
        cache
            .replace_endpoints(vec![Endpoint {
                id: "live-1".into(),
                name: "Live 1".into(),
                description: "".into(),
                endpoint_type: EndpointType::Custom,
                is_default: true,
                domain_id: None,
            }])
            .await;
        let endpoints = cache.endpoints().await;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "live-1");
    }
}
