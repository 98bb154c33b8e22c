//! Concurrent fan-out across every active registry
use crate::registry::client::{ClientOptions, RegistryClient, RegistrySource};
use crate::registry::policy::PolicyFilter;
use crate::registry::types::{Registry, RegistrySearchResult, SearchRequest, Server, SortKey, SortOrder};
use crate::utils::errors::{McpError, McpResult};
use crate::utils::events::{EventBus, HubEvent};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A registry that did not contribute to a search
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryFailure {
    pub registry_id: String,
    pub error: String,
    pub timed_out: bool,
}

/// Per-registry outcome of one fan-out
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub results: Vec<RegistrySearchResult>,
    pub failures: Vec<RegistryFailure>,
}

impl ScanReport {
    pub fn failed_sources(&self) -> usize {
        self.failures.len()
    }

    pub fn total_servers(&self) -> usize {
        self.results.iter().map(|r| r.servers.len()).sum()
    }

    /// Drop servers the policy rejects from every result
    pub fn filter(&mut self, policy: &PolicyFilter) {
        for result in &mut self.results {
            let servers = std::mem::take(&mut result.servers);
            result.servers = policy.apply(servers);
        }
    }

    /// Flatten in registry-priority order, first occurrence of an id wins,
    /// then order by the request's sort key
    pub fn merged(&self, request: &SearchRequest) -> Vec<Server> {
        let mut seen = HashSet::new();
        let mut servers: Vec<Server> = self
            .results
            .iter()
            .flat_map(|r| r.servers.iter())
            .filter(|s| seen.insert(s.id.clone()))
            .cloned()
            .collect();

        let Some(key) = request.sort_by else {
            return servers;
        };
        if key == SortKey::Relevance {
            return servers;
        }
        servers.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Downloads => a.trust.downloads.cmp(&b.trust.downloads),
                SortKey::Stars => a.trust.stars.cmp(&b.trust.stars),
                SortKey::Updated => a.trust.last_updated.cmp(&b.trust.last_updated),
                SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortKey::Relevance => std::cmp::Ordering::Equal,
            };
            match request.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        servers
    }
}

pub struct RegistryScanner {
    /// Sorted by registry priority
    sources: Vec<Arc<dyn RegistrySource>>,
    timeout: Duration,
    events: EventBus,
    last_sync: DashMap<String, DateTime<Utc>>,
}

impl RegistryScanner {
    pub fn new(mut sources: Vec<Arc<dyn RegistrySource>>, timeout: Duration, events: EventBus) -> Self {
        sources.sort_by_key(|s| s.registry().priority);
        Self {
            sources,
            timeout,
            events,
            last_sync: DashMap::new(),
        }
    }

    /// One HTTP client per registry definition
    pub fn from_registries(
        registries: Vec<Registry>,
        options: &ClientOptions,
        events: EventBus,
    ) -> McpResult<Self> {
        let mut sources: Vec<Arc<dyn RegistrySource>> = Vec::with_capacity(registries.len());
        for registry in registries {
            sources.push(Arc::new(RegistryClient::new(registry, options, events.clone())?));
        }
        Ok(Self::new(sources, options.timeout, events))
    }

    /// Registry definitions with their last sync time
    pub fn registries(&self) -> Vec<Registry> {
        self.sources
            .iter()
            .map(|source| {
                let mut registry = source.registry().clone();
                if let Some(at) = self.last_sync.get(&registry.id) {
                    registry.last_sync = Some(*at);
                }
                registry
            })
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn search(&self, request: &SearchRequest, policy: &PolicyFilter) -> McpResult<ScanReport> {
        self.search_with_timeout(request, policy, self.timeout).await
    }

    /// Query every active registry concurrently, each bounded by `timeout`.
    ///
    /// Individual failures are reported in the [`ScanReport`]; the call only
    /// fails when every active registry failed.
    pub async fn search_with_timeout(
        &self,
        request: &SearchRequest,
        policy: &PolicyFilter,
        timeout: Duration,
    ) -> McpResult<ScanReport> {
        let active: Vec<&Arc<dyn RegistrySource>> =
            self.sources.iter().filter(|s| s.registry().active).collect();
        info!("Searching {} registries", active.len());

        let searches = active.iter().map(|source| async move {
            let registry_id = source.registry().id.clone();
            match tokio::time::timeout(timeout, source.search(request)).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(RegistryFailure {
                    registry_id,
                    error: e.to_string(),
                    timed_out: false,
                }),
                Err(_) => Err(RegistryFailure {
                    error: McpError::Timeout {
                        target: registry_id.clone(),
                        ms: timeout.as_millis() as u64,
                    }
                    .to_string(),
                    registry_id,
                    timed_out: true,
                }),
            }
        });

        let mut report = ScanReport::default();
        for outcome in join_all(searches).await {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(failure) => {
                    warn!(
                        "Registry '{}' failed: {}",
                        failure.registry_id, failure.error
                    );
                    self.events.publish(HubEvent::RegistryFailed {
                        registry_id: failure.registry_id.clone(),
                        error: failure.error.clone(),
                    });
                    report.failures.push(failure);
                }
            }
        }

        if !active.is_empty() && report.failures.len() == active.len() {
            return Err(McpError::AllRegistriesFailed(active.len()));
        }

        report.filter(policy);
        self.events.publish(HubEvent::SearchCompleted {
            registries: active.len(),
            servers: report.total_servers(),
            failed_sources: report.failed_sources(),
        });
        Ok(report)
    }

    /// Detail lookup against one registry
    pub async fn get_server(&self, registry_id: &str, server_id: &str) -> McpResult<Option<Server>> {
        let source = self
            .sources
            .iter()
            .find(|s| s.registry().id == registry_id)
            .ok_or_else(|| McpError::NotFound(format!("registry '{}'", registry_id)))?;

        match tokio::time::timeout(self.timeout, source.get_server(server_id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout {
                target: registry_id.to_string(),
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Forget every cached search
    pub fn clear_cache(&self) {
        for source in &self.sources {
            source.clear_cache();
        }
        info!("Cleared search caches for {} registries", self.sources.len());
    }

    /// Stamp every active registry as synced now
    pub fn mark_synced(&self) -> usize {
        let now = Utc::now();
        let mut count = 0;
        for source in self.sources.iter().filter(|s| s.registry().active) {
            self.last_sync.insert(source.registry().id.clone(), now);
            count += 1;
        }
        count
    }
}
