//! Lifecycle manager
//!
//! The hub's single entry point. It owns the persisted [`HubConfig`] and is
//! its only writer: every mutation goes through [`LifecycleManager::update_and_persist`],
//! which serializes writers and replaces the document on disk wholesale.

use crate::config::store::ConfigStore;
use crate::config::types::{
    AutoInstallSettings, GlobalSettings, HealthStatus, HubConfig, ServerInstance, DEFAULT_PRIORITY,
};
use crate::core::decision::{self, RankedCandidate, Requirements, MAX_AUTO_INSTALL_CANDIDATES};
use crate::core::project::{self, ProjectContext};
use crate::core::usage::UsageStats;
use crate::installer::{HealthReport, Installer};
use crate::registry::client::ClientOptions;
use crate::registry::policy::PolicyFilter;
use crate::registry::scanner::{RegistryScanner, ScanReport};
use crate::registry::types::{Registry, SearchRequest, Server};
use crate::utils::errors::{McpError, McpResult};
use crate::utils::events::{EventBus, HubEvent};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// How often installed instances are polled
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Where an instance is in its install/uninstall lifecycle.
/// Health is tracked separately and never drives these transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    Installed { enabled: bool },
    Failed { reason: String },
    Uninstalling,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallFailure {
    pub server_id: String,
    pub error: String,
}

/// Outcome of one unattended batch
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub batch_id: Uuid,
    pub requirements: Requirements,
    /// Ranked candidates that were attempted, best first
    pub candidates: Vec<RankedCandidate>,
    pub installed: Vec<ServerInstance>,
    pub failures: Vec<InstallFailure>,
    /// Sources that failed during the candidate search
    pub failed_sources: usize,
}

pub struct LifecycleManager {
    store: ConfigStore,
    config: RwLock<HubConfig>,
    /// Serializes writers so saves land in mutation order
    write_lock: Mutex<()>,
    scanner: Arc<RegistryScanner>,
    installer: Arc<dyn Installer>,
    events: EventBus,
    /// Every server a search or detail lookup has returned; only these are installable
    known_servers: DashMap<String, Server>,
    usage: DashMap<String, UsageStats>,
    health_reports: DashMap<String, HealthReport>,
    /// Transient states; settled instances are read from `config`
    transitions: DashMap<String, LifecycleState>,
}

impl LifecycleManager {
    /// Load configuration from `store` and build a client for every built-in registry
    pub async fn new(store: ConfigStore, installer: Arc<dyn Installer>) -> McpResult<Self> {
        let config = store.load_or_default().await;
        let events = EventBus::new();
        let options = ClientOptions {
            timeout: Duration::from_millis(config.global_settings.timeout_ms),
            retry_count: config.global_settings.retry_count,
            cache_ttl: Duration::from_secs(config.registry_settings.cache_ttl_secs),
            max_cache_entries: config.registry_settings.max_cache_entries,
        };
        let scanner = RegistryScanner::from_registries(
            config.registry_settings.registries(),
            &options,
            events.clone(),
        )?;
        Ok(Self::with_scanner(store, config, Arc::new(scanner), installer, events))
    }

    /// Assemble from parts. `events` should be the bus `scanner` publishes to.
    pub fn with_scanner(
        store: ConfigStore,
        config: HubConfig,
        scanner: Arc<RegistryScanner>,
        installer: Arc<dyn Installer>,
        events: EventBus,
    ) -> Self {
        let usage = DashMap::new();
        for id in config.servers.keys() {
            usage.insert(id.clone(), UsageStats::new(id.clone()));
        }
        info!("Lifecycle manager ready with {} installed servers", config.servers.len());

        Self {
            store,
            config: RwLock::new(config),
            write_lock: Mutex::new(()),
            scanner,
            installer,
            events,
            known_servers: DashMap::new(),
            usage,
            health_reports: DashMap::new(),
            transitions: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Apply `mutate` to the configuration, then write the whole document.
    ///
    /// A failed save is logged and published but does not fail the mutation;
    /// the next successful save carries it.
    async fn update_and_persist<R>(
        &self,
        mutate: impl FnOnce(&mut HubConfig) -> McpResult<R>,
    ) -> McpResult<R> {
        let _writer = self.write_lock.lock().await;
        let (result, snapshot) = {
            let mut config = self.config.write();
            let result = mutate(&mut config)?;
            (result, config.clone())
        };

        if let Err(e) = self.store.save(&snapshot).await {
            error!("Failed to persist configuration: {}", e);
            self.events.publish(HubEvent::ConfigSaveFailed {
                error: e.to_string(),
            });
        }
        Ok(result)
    }

    // ---- discovery ----

    pub async fn search_servers(&self, request: &SearchRequest) -> McpResult<ScanReport> {
        self.search_servers_with_timeout(request, self.scanner.timeout())
            .await
    }

    /// Search every active registry, each bounded by `timeout`
    pub async fn search_servers_with_timeout(
        &self,
        request: &SearchRequest,
        timeout: Duration,
    ) -> McpResult<ScanReport> {
        let policy = self.policy();
        let mut report = self
            .scanner
            .search_with_timeout(request, &policy, timeout)
            .await?;
        // The scanner already filtered; the policy may have changed meanwhile.
        report.filter(&policy);

        for server in report.results.iter().flat_map(|r| r.servers.iter()) {
            self.known_servers.insert(server.id.clone(), server.clone());
        }
        debug!(
            "Search returned {} servers ({} sources failed)",
            report.total_servers(),
            report.failed_sources()
        );
        Ok(report)
    }

    pub async fn get_server_details(
        &self,
        registry_id: &str,
        server_id: &str,
    ) -> McpResult<Option<Server>> {
        let server = self.scanner.get_server(registry_id, server_id).await?;
        if let Some(server) = &server {
            self.known_servers.insert(server.id.clone(), server.clone());
        }
        Ok(server)
    }

    fn policy(&self) -> PolicyFilter {
        PolicyFilter::from_config(&self.config.read())
    }

    // ---- install / uninstall ----

    pub async fn install_server(
        &self,
        server: &Server,
        configuration: Option<BTreeMap<String, String>>,
        auto_install: bool,
    ) -> McpResult<ServerInstance> {
        let timeout = Duration::from_millis(self.config.read().global_settings.timeout_ms);
        self.install_server_with_timeout(server, configuration, auto_install, timeout)
            .await
    }

    /// Install and persist a new enabled instance. With `auto_install` the
    /// auto-install policy must allow `server` before anything runs.
    /// An id that is installed or mid-install is rejected; uninstall first.
    pub async fn install_server_with_timeout(
        &self,
        server: &Server,
        configuration: Option<BTreeMap<String, String>>,
        auto_install: bool,
        timeout: Duration,
    ) -> McpResult<ServerInstance> {
        if !self.known_servers.contains_key(&server.id) {
            return Err(McpError::NotFound(format!(
                "server '{}' was not returned by any registry",
                server.id
            )));
        }
        if self.config.read().servers.contains_key(&server.id) {
            return Err(McpError::AlreadyInstalled(server.id.clone()));
        }

        if auto_install {
            let settings = self.config.read().auto_install.clone();
            let confidence = decision::check_auto_install(server, &settings).map_err(|reason| {
                McpError::AutoInstallDisallowed {
                    server_id: server.id.clone(),
                    reason,
                }
            })?;
            debug!("Auto-install of {} allowed at confidence {:.2}", server.id, confidence);
        }

        if server.installation.is_empty() {
            return Err(McpError::Compatibility {
                server_id: server.id.clone(),
                reason: "no installation method declared".to_string(),
            });
        }
        let resolved = resolve_configuration(server, configuration.unwrap_or_default())?;

        match self.transitions.entry(server.id.clone()) {
            Entry::Occupied(state) if *state.get() == LifecycleState::Installing => {
                return Err(McpError::AlreadyInstalled(server.id.clone()));
            }
            Entry::Occupied(mut state) => {
                state.insert(LifecycleState::Installing);
            }
            Entry::Vacant(state) => {
                state.insert(LifecycleState::Installing);
            }
        }
        info!("Installing {} {} from {}", server.id, server.version, server.registry_id);
        self.events.publish(HubEvent::InstallStarted {
            server_id: server.id.clone(),
        });

        let outcome = match tokio::time::timeout(timeout, self.installer.install(server, &resolved)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(self.install_failed(server, e)),
            Err(_) => {
                let e = McpError::Timeout {
                    target: server.id.clone(),
                    ms: timeout.as_millis() as u64,
                };
                return Err(self.install_failed(server, e));
            }
        };

        for warning in &outcome.warnings {
            warn!("{}: {}", server.id, warning);
        }

        let instance = ServerInstance {
            id: server.id.clone(),
            name: server.name.clone(),
            registry_id: server.registry_id.clone(),
            enabled: true,
            configuration: outcome.resolved_configuration,
            auto_start: true,
            priority: DEFAULT_PRIORITY,
            installed_at: outcome.installed_at,
            version: outcome.installed_version,
            health_status: HealthStatus::Healthy,
            runtime: outcome.runtime,
        };

        let persisted = instance.clone();
        self.update_and_persist(move |config| {
            config.servers.insert(persisted.id.clone(), persisted);
            Ok(())
        })
        .await?;

        self.usage
            .entry(instance.id.clone())
            .or_insert_with(|| UsageStats::new(instance.id.clone()));
        self.transitions.remove(&instance.id);
        info!("Installed {} {}", instance.id, instance.version);
        self.events.publish(HubEvent::Installed {
            server_id: instance.id.clone(),
            version: instance.version.clone(),
        });
        Ok(instance)
    }

    fn install_failed(&self, server: &Server, e: McpError) -> McpError {
        warn!("Installation of {} failed: {}", server.id, e);
        self.transitions.insert(
            server.id.clone(),
            LifecycleState::Failed {
                reason: e.to_string(),
            },
        );
        self.events.publish(HubEvent::InstallFailed {
            server_id: server.id.clone(),
            reason: e.to_string(),
        });
        e
    }

    /// Tear down and forget an instance. Absent ids are not an error.
    pub async fn uninstall_server(&self, instance_id: &str) -> McpResult<()> {
        self.transitions
            .insert(instance_id.to_string(), LifecycleState::Uninstalling);

        if let Err(e) = self.installer.uninstall(instance_id).await {
            self.transitions.remove(instance_id);
            return Err(e);
        }

        let id = instance_id.to_string();
        let removed = self
            .update_and_persist(move |config| Ok(config.servers.remove(&id).is_some()))
            .await;
        self.usage.remove(instance_id);
        self.health_reports.remove(instance_id);
        self.transitions.remove(instance_id);
        let removed = removed?;

        if removed {
            info!("Uninstalled {}", instance_id);
        } else {
            debug!("{} was not installed", instance_id);
        }
        self.events.publish(HubEvent::Uninstalled {
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }

    // ---- metadata ----

    pub async fn enable_server(&self, instance_id: &str) -> McpResult<()> {
        self.set_enabled(instance_id, true).await
    }

    pub async fn disable_server(&self, instance_id: &str) -> McpResult<()> {
        self.set_enabled(instance_id, false).await
    }

    async fn set_enabled(&self, instance_id: &str, enabled: bool) -> McpResult<()> {
        self.update_and_persist(|config| {
            let instance = config
                .servers
                .get_mut(instance_id)
                .ok_or_else(|| McpError::NotFound(instance_id.to_string()))?;
            instance.enabled = enabled;
            Ok(())
        })
        .await?;
        info!("{} {}", if enabled { "Enabled" } else { "Disabled" }, instance_id);
        Ok(())
    }

    /// Replace an instance's configuration, checked against the server's
    /// contract when the server is known
    pub async fn update_server_configuration(
        &self,
        instance_id: &str,
        configuration: BTreeMap<String, String>,
    ) -> McpResult<()> {
        if !self.config.read().servers.contains_key(instance_id) {
            return Err(McpError::NotFound(instance_id.to_string()));
        }
        let server = self.known_servers.get(instance_id).map(|s| s.clone());
        let resolved = match server {
            Some(server) => resolve_configuration(&server, configuration)?,
            None => configuration,
        };

        self.update_and_persist(|config| {
            let instance = config
                .servers
                .get_mut(instance_id)
                .ok_or_else(|| McpError::NotFound(instance_id.to_string()))?;
            instance.configuration = resolved;
            Ok(())
        })
        .await
    }

    pub async fn update_auto_install_settings(&self, settings: AutoInstallSettings) -> McpResult<()> {
        settings
            .validate()
            .map_err(|e| McpError::Config(format!("invalid auto-install settings: {}", e)))?;
        self.update_and_persist(move |config| {
            config.auto_install = settings;
            Ok(())
        })
        .await
    }

    /// Timeout and retry changes apply to clients built after the next start
    pub async fn update_global_settings(&self, settings: GlobalSettings) -> McpResult<()> {
        settings
            .validate()
            .map_err(|e| McpError::Config(format!("invalid global settings: {}", e)))?;
        self.update_and_persist(move |config| {
            config.global_settings = settings;
            Ok(())
        })
        .await
    }

    // ---- unattended installation ----

    /// Infer what `context` needs, then try the best-ranked candidates one at
    /// a time, pausing `installDelayMs` between attempts
    pub async fn detect_and_install(&self, context: &ProjectContext) -> McpResult<DetectionReport> {
        let batch_id = Uuid::new_v4();
        let analysis = project::analyze(context);
        info!(
            "Batch {}: project '{}' looks like {:?}",
            batch_id, context.name, analysis.requirements.category
        );

        let report = self.search_servers(&analysis.search).await?;
        let installed_ids: Vec<String> = self.config.read().servers.keys().cloned().collect();
        let candidates: Vec<Server> = report
            .merged(&analysis.search)
            .into_iter()
            .filter(|s| !installed_ids.contains(&s.id))
            .collect();

        let mut ranked = decision::rank_candidates(candidates, &analysis.requirements);
        ranked.truncate(MAX_AUTO_INSTALL_CANDIDATES);

        let delay = Duration::from_millis(self.config.read().auto_install.install_delay_ms);
        let mut installed = Vec::new();
        let mut failures = Vec::new();
        for (attempt, candidate) in ranked.iter().enumerate() {
            if attempt > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.install_server(&candidate.server, None, true).await {
                Ok(instance) => installed.push(instance),
                Err(e) => {
                    debug!("Batch {}: skipped {}: {}", batch_id, candidate.server.id, e);
                    failures.push(InstallFailure {
                        server_id: candidate.server.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch {}: installed {} of {} candidates",
            batch_id,
            installed.len(),
            ranked.len()
        );
        Ok(DetectionReport {
            batch_id,
            requirements: analysis.requirements,
            candidates: ranked,
            installed,
            failures,
            failed_sources: report.failed_sources(),
        })
    }

    // ---- health & usage ----

    /// Poll every installed instance concurrently and store the results
    pub async fn check_all_health(&self) -> BTreeMap<String, HealthReport> {
        let instances = self.list_instances();
        if instances.is_empty() {
            return BTreeMap::new();
        }
        let timeout = self.scanner.timeout();

        let checks = instances.iter().map(|instance| async move {
            let report = match tokio::time::timeout(timeout, self.installer.health_check(instance)).await {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => HealthReport::unhealthy(e.to_string()),
                Err(_) => HealthReport::unhealthy(format!(
                    "health check timed out after {}ms",
                    timeout.as_millis()
                )),
            };
            (instance.id.clone(), report)
        });
        let reports: BTreeMap<String, HealthReport> = join_all(checks).await.into_iter().collect();

        let statuses: Vec<(String, HealthStatus)> = reports
            .iter()
            .map(|(id, report)| (id.clone(), report.status))
            .collect();
        let changes = self
            .update_and_persist(move |config| {
                let mut changes = Vec::new();
                for (id, status) in statuses {
                    // uninstalled while the check ran
                    let Some(instance) = config.servers.get_mut(&id) else {
                        continue;
                    };
                    let previous = instance.health_status;
                    instance.health_status = status;
                    if previous != status {
                        changes.push((id, previous, status));
                    }
                }
                Ok(changes)
            })
            .await
            .unwrap_or_default();

        for (id, previous, status) in changes {
            info!("{} health {} -> {}", id, previous, status);
            self.events.publish(HubEvent::HealthChanged {
                instance_id: id.clone(),
                status,
            });
            if status == HealthStatus::Unhealthy {
                let error = reports.get(&id).and_then(|r| r.error.clone());
                warn!("{} became unhealthy: {}", id, error.as_deref().unwrap_or("no detail"));
                self.events.publish(HubEvent::BecameUnhealthy {
                    instance_id: id,
                    error,
                });
            }
        }

        for (id, report) in &reports {
            if self.config.read().servers.contains_key(id) {
                self.health_reports.insert(id.clone(), report.clone());
            }
        }
        reports
    }

    pub fn record_server_usage(
        &self,
        instance_id: &str,
        tool_name: &str,
        response_time_ms: f64,
        success: bool,
    ) -> McpResult<()> {
        if !self.config.read().servers.contains_key(instance_id) {
            return Err(McpError::NotFound(instance_id.to_string()));
        }
        self.usage
            .entry(instance_id.to_string())
            .or_insert_with(|| UsageStats::new(instance_id))
            .record(tool_name, response_time_ms, success);
        Ok(())
    }

    // ---- registries ----

    /// Drop every cached search and stamp active registries as synced.
    /// Servers seen only in earlier searches must be found again before
    /// they can be installed.
    pub fn sync_registries(&self) -> usize {
        self.scanner.clear_cache();
        {
            let config = self.config.read();
            self.known_servers
                .retain(|id, _| config.servers.contains_key(id));
        }
        let synced = self.scanner.mark_synced();
        info!("Synced {} registries", synced);
        self.events
            .publish(HubEvent::RegistriesSynced { registries: synced });
        synced
    }

    pub fn registries(&self) -> Vec<Registry> {
        self.scanner.registries()
    }

    // ---- reads ----

    pub fn lifecycle_state(&self, instance_id: &str) -> LifecycleState {
        if let Some(state) = self.transitions.get(instance_id) {
            return state.clone();
        }
        match self.config.read().servers.get(instance_id) {
            Some(instance) => LifecycleState::Installed {
                enabled: instance.enabled,
            },
            None => LifecycleState::Uninstalled,
        }
    }

    pub fn list_instances(&self) -> Vec<ServerInstance> {
        self.config.read().servers.values().cloned().collect()
    }

    pub fn get_instance(&self, instance_id: &str) -> Option<ServerInstance> {
        self.config.read().servers.get(instance_id).cloned()
    }

    pub fn usage_stats(&self, instance_id: &str) -> Option<UsageStats> {
        self.usage.get(instance_id).map(|s| s.clone())
    }

    pub fn health_report(&self, instance_id: &str) -> Option<HealthReport> {
        self.health_reports.get(instance_id).map(|r| r.clone())
    }

    pub fn config_snapshot(&self) -> HubConfig {
        self.config.read().clone()
    }

    // ---- background ----

    /// Run health checks every `interval`, plus registry sync when
    /// `registrySettings.autoSync` is set, until `shutdown` fires
    pub fn spawn_monitor(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let (auto_sync, sync_every) = {
            let config = manager.config.read();
            (
                config.registry_settings.auto_sync,
                Duration::from_secs(config.registry_settings.sync_interval_secs),
            )
        };

        tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let mut health = tokio::time::interval_at(start + interval, interval);
            let mut sync = tokio::time::interval_at(start + sync_every, sync_every);
            info!(
                "Health monitor started (every {}s, auto-sync {})",
                interval.as_secs(),
                auto_sync
            );

            loop {
                tokio::select! {
                    _ = health.tick() => {
                        let reports = manager.check_all_health().await;
                        debug!("Health check covered {} instances", reports.len());
                    }
                    _ = sync.tick(), if auto_sync => {
                        manager.sync_registries();
                    }
                    _ = shutdown.recv() => {
                        info!("Health monitor stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Caller values over per-variable defaults, checked against the contract
pub fn resolve_configuration(
    server: &Server,
    provided: BTreeMap<String, String>,
) -> McpResult<BTreeMap<String, String>> {
    let invalid = |reason: String| McpError::InvalidConfiguration {
        server_id: server.id.clone(),
        reason,
    };

    let mut resolved = BTreeMap::new();
    for variable in server.configuration.variables() {
        if let Some(default) = &variable.default {
            resolved.insert(variable.name.clone(), default.clone());
        }
    }
    resolved.extend(provided);

    for variable in &server.configuration.required {
        match resolved.get(&variable.name) {
            Some(value) if !value.is_empty() => {}
            _ => return Err(invalid(format!("missing required variable {}", variable.name))),
        }
    }

    for variable in server.configuration.variables() {
        let Some(value) = resolved.get(&variable.name) else {
            continue;
        };
        for rule in &variable.validation {
            if let Some(problem) = rule.check(value) {
                return Err(invalid(format!("{} {}", variable.name, problem)));
            }
        }
    }
    Ok(resolved)
}
