//! Installation boundary
//!
//! The hub decides *what* to install; an [`Installer`] decides *how*.

pub mod command;

use crate::config::types::{HealthStatus, ServerInstance};
use crate::registry::types::Server;
use crate::utils::errors::McpResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub use command::CommandInstaller;

/// Successful install report
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub installed_at: DateTime<Utc>,
    pub installed_version: String,
    pub resolved_configuration: BTreeMap<String, String>,
    /// Binary the instance runs under, persisted with the instance
    pub runtime: Option<String>,
    pub warnings: Vec<String>,
}

/// Result of probing one installed instance
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub last_check: DateTime<Utc>,
    pub uptime_secs: Option<u64>,
    pub error: Option<String>,
}

impl HealthReport {
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms: 0,
            last_check: Utc::now(),
            uptime_secs: None,
            error: Some(error.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `server` with an already-resolved configuration
    async fn install(
        &self,
        server: &Server,
        configuration: &BTreeMap<String, String>,
    ) -> McpResult<InstallOutcome>;

    /// Tear down an instance. Succeeds when nothing is installed under `instance_id`.
    async fn uninstall(&self, instance_id: &str) -> McpResult<()>;

    async fn health_check(&self, instance: &ServerInstance) -> McpResult<HealthReport>;
}
