use crate::registry::types::{
    Registry, ServerCategory, TransportKind, GITHUB_REGISTRY_ID, NPM_REGISTRY_ID,
    OFFICIAL_REGISTRY_ID,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub const DEFAULT_PRIORITY: u32 = 50;

/// Persisted hub state. Every section defaults, so a partial file on disk is
/// merged over the defaults when loaded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    pub servers: BTreeMap<String, ServerInstance>,
    #[validate(nested)]
    pub global_settings: GlobalSettings,
    #[validate(nested)]
    pub registry_settings: RegistrySettings,
    #[validate(nested)]
    pub auto_install: AutoInstallSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Local record of one installed server
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstance {
    /// Same as the id of the server it was installed from
    pub id: String,
    pub name: String,
    pub registry_id: String,
    pub enabled: bool,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub installed_at: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub health_status: HealthStatus,
    /// Runtime binary chosen at install time; health checks re-resolve it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    Strict,
    #[default]
    Standard,
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalSettings {
    pub default_transport: TransportKind,
    /// Per-registry search and per-install deadline
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub log_level: String,
    pub security_mode: SecurityMode,
    pub auto_update: bool,
    pub telemetry: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_transport: TransportKind::Stdio,
            timeout_ms: 30_000,
            retry_count: 3,
            log_level: "info".to_string(),
            security_mode: SecurityMode::Standard,
            auto_update: false,
            telemetry: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistrySettings {
    pub enabled_registries: Vec<String>,
    #[validate(range(min = 1))]
    pub sync_interval_secs: u64,
    pub auto_sync: bool,
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,
    #[validate(range(min = 1))]
    pub max_cache_entries: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            enabled_registries: vec![
                OFFICIAL_REGISTRY_ID.to_string(),
                GITHUB_REGISTRY_ID.to_string(),
                NPM_REGISTRY_ID.to_string(),
            ],
            sync_interval_secs: 3600,
            auto_sync: false,
            cache_ttl_secs: 15 * 60,
            max_cache_entries: 500,
        }
    }
}

impl RegistrySettings {
    /// Built-in registries with `active` set from `enabled_registries`
    pub fn registries(&self) -> Vec<Registry> {
        Registry::builtin()
            .into_iter()
            .map(|mut registry| {
                registry.active = self.enabled_registries.contains(&registry.id);
                registry
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoInstallSettings {
    pub enabled: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
    /// Front-ends may skip their confirmation prompt when set
    pub auto_confirm: bool,
    pub require_verification: bool,
    pub allowed_categories: Vec<ServerCategory>,
    pub blocked_servers: Vec<String>,
    /// Pause between consecutive unattended installs
    pub install_delay_ms: u64,
}

impl Default for AutoInstallSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            confidence_threshold: 0.8,
            auto_confirm: false,
            require_verification: true,
            allowed_categories: vec![
                ServerCategory::Development,
                ServerCategory::Testing,
                ServerCategory::Database,
                ServerCategory::FileSystem,
            ],
            blocked_servers: Vec::new(),
            install_delay_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_merges_over_defaults() {
        let json = r#"{
            "globalSettings": {"securityMode": "strict"},
            "autoInstall": {"enabled": true, "confidenceThreshold": 0.9}
        }"#;
        let config: HubConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.global_settings.security_mode, SecurityMode::Strict);
        assert_eq!(config.global_settings.timeout_ms, 30_000);
        assert!(config.auto_install.enabled);
        assert_eq!(config.auto_install.confidence_threshold, 0.9);
        assert!(config.auto_install.require_verification);
        assert_eq!(config.registry_settings.enabled_registries.len(), 3);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_registry_active_flags() {
        let settings = RegistrySettings {
            enabled_registries: vec!["npm".to_string()],
            ..RegistrySettings::default()
        };
        let active: Vec<_> = settings
            .registries()
            .into_iter()
            .filter(|r| r.active)
            .map(|r| r.id)
            .collect();
        assert_eq!(active, vec!["npm"]);
    }

    #[test]
    fn test_threshold_range_validated() {
        let mut config = HubConfig::default();
        assert!(config.validate().is_ok());
        config.auto_install.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
