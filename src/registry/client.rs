//! Registry HTTP client for MCP server discovery
use crate::registry::cache::{SearchCache, DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES};
use crate::registry::rate_limit::{parse_rate_limit_headers, RateLimiter, FALLBACK_RATE_LIMIT};
use crate::registry::sources::{adapter_for, CatalogAdapter};
use crate::registry::types::{Registry, RegistrySearchResult, SearchRequest, Server};
use crate::utils::errors::{McpError, McpResult};
use crate::utils::events::{EventBus, HubEvent};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// A catalog the scanner can fan out to
#[async_trait]
pub trait RegistrySource: Send + Sync {
    fn registry(&self) -> &Registry;

    async fn search(&self, request: &SearchRequest) -> McpResult<RegistrySearchResult>;

    /// `Ok(None)` when the catalog does not know the id
    async fn get_server(&self, server_id: &str) -> McpResult<Option<Server>>;

    fn clear_cache(&self);
}

/// Knobs shared by every client built from configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry_count: u32,
    pub cache_ttl: Duration,
    pub max_cache_entries: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_count: 3,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_cache_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Talks to exactly one catalog and returns normalized [`Server`]s
pub struct RegistryClient {
    client: Client,
    registry: Registry,
    adapter: Box<dyn CatalogAdapter>,
    cache: SearchCache,
    limiter: RateLimiter,
    retry_count: u32,
    events: EventBus,
}

impl RegistryClient {
    pub fn new(registry: Registry, options: &ClientOptions, events: EventBus) -> McpResult<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;
        let declared = registry
            .api
            .as_ref()
            .and_then(|api| api.rate_limit)
            .unwrap_or(FALLBACK_RATE_LIMIT);

        Ok(Self {
            client,
            adapter: adapter_for(registry.kind),
            cache: SearchCache::new(options.cache_ttl, options.max_cache_entries),
            limiter: RateLimiter::new(registry.id.clone(), declared, events.clone()),
            retry_count: options.retry_count,
            registry,
            events,
        })
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn registry_error(&self, message: impl Into<String>) -> McpError {
        McpError::registry(&self.registry.id, message)
    }

    /// GET `path` under the base URL. `Ok(None)` on 404.
    async fn fetch(&self, path: &str, params: &[(String, String)]) -> McpResult<Option<String>> {
        let base = format!("{}{}", self.registry.base_url.trim_end_matches('/'), path);
        let parsed = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        let url =
            parsed.map_err(|e| self.registry_error(format!("invalid URL '{}': {}", base, e)))?;

        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            let mut request = self.client.get(url.clone());
            if let Some(api) = &self.registry.api {
                for (name, value) in &api.headers {
                    request = request.header(name, value);
                }
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if attempt < self.retry_count => {
                    attempt += 1;
                    warn!(
                        "Registry '{}' request failed (attempt {}/{}): {}",
                        self.registry.id, attempt, self.retry_count, e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    continue;
                }
                Err(e) => {
                    return Err(self.registry_error(format!("request failed: {}", e)));
                }
            };

            let now_epoch = chrono::Utc::now().timestamp().max(0) as u64;
            self.limiter
                .record(parse_rate_limit_headers(response.headers(), now_epoch))
                .await;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(self.registry_error(format!("returned HTTP {}", status)));
            }

            let body = response
                .text()
                .await
                .map_err(|e| self.registry_error(format!("failed to read body: {}", e)))?;
            return Ok(Some(body));
        }
    }
}

#[async_trait]
impl RegistrySource for RegistryClient {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn search(&self, request: &SearchRequest) -> McpResult<RegistrySearchResult> {
        let request = request.normalized();
        let key = SearchCache::cache_key(&self.registry.id, &request);

        if let Some(mut cached) = self.cache.get(&key) {
            debug!("Registry '{}' cache hit", self.registry.id);
            cached.cache_hit = true;
            self.events.publish(HubEvent::CacheHit {
                registry_id: self.registry.id.clone(),
            });
            return Ok(cached);
        }

        let started = Instant::now();
        let params = self.adapter.search_params(&request);
        let body = self
            .fetch(self.registry.search_endpoint(), &params)
            .await?
            .ok_or_else(|| self.registry_error("search endpoint not found"))?;
        let page = self.adapter.parse_search(&self.registry, &body)?;

        let fetched = page.servers.len();
        let servers: Vec<Server> = page
            .servers
            .into_iter()
            .filter(|server| request.matches(server))
            .collect();
        let total = page.total.unwrap_or(request.offset + fetched);
        let has_more = page
            .has_more
            .unwrap_or(request.offset + fetched < total);

        let result = RegistrySearchResult {
            registry_id: self.registry.id.clone(),
            servers,
            total,
            has_more,
            search_time_ms: started.elapsed().as_millis() as u64,
            cache_hit: false,
        };

        info!(
            "Registry '{}' returned {} of {} servers in {}ms",
            self.registry.id,
            result.servers.len(),
            result.total,
            result.search_time_ms
        );
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    async fn get_server(&self, server_id: &str) -> McpResult<Option<Server>> {
        let path = self
            .registry
            .detail_path(&self.adapter.encode_id(server_id));
        match self.fetch(&path, &[]).await? {
            Some(body) => Ok(Some(self.adapter.parse_detail(&self.registry, &body)?)),
            None => Ok(None),
        }
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
