//! Installer that prepares servers with local commands
use crate::config::types::{HealthStatus, ServerInstance};
use crate::installer::{HealthReport, InstallOutcome, Installer};
use crate::registry::types::{InstallMethodKind, InstallationMethod, Server};
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct InstalledRecord {
    method: InstallationMethod,
    installed: Instant,
}

/// Picks the first installation method whose runtime is on `PATH`, runs its
/// optional install step, and remembers the choice for health checks.
/// Instances installed by an earlier process are checked through their
/// persisted `runtime`.
#[derive(Debug, Default)]
pub struct CommandInstaller {
    installed: DashMap<String, InstalledRecord>,
}

impl CommandInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn select_method<'a>(&self, server: &'a Server) -> McpResult<&'a InstallationMethod> {
        server
            .installation
            .iter()
            .find(|method| which::which(&method.command).is_ok())
            .ok_or_else(|| {
                let commands: Vec<&str> = server
                    .installation
                    .iter()
                    .map(|m| m.command.as_str())
                    .collect();
                McpError::Compatibility {
                    server_id: server.id.clone(),
                    reason: if commands.is_empty() {
                        "no installation method declared".to_string()
                    } else {
                        format!("none of [{}] found on PATH", commands.join(", "))
                    },
                }
            })
    }

    async fn run_install_step(
        &self,
        server: &Server,
        method: &InstallationMethod,
        configuration: &BTreeMap<String, String>,
    ) -> McpResult<()> {
        let Some(install_command) = &method.install_command else {
            return Ok(());
        };

        let parts = shell_words::split(install_command).map_err(|e| {
            McpError::install(&server.id, format!("invalid install command: {}", e))
        })?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| McpError::install(&server.id, "empty install command"))?;

        info!("Running install command for {}: {}", server.id, install_command);
        let output = tokio::process::Command::new(program)
            .args(args)
            .envs(&method.env)
            .envs(configuration)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| McpError::install(&server.id, format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(McpError::install(
                &server.id,
                format!("install command exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Installer for CommandInstaller {
    async fn install(
        &self,
        server: &Server,
        configuration: &BTreeMap<String, String>,
    ) -> McpResult<InstallOutcome> {
        let method = self.select_method(server)?;
        debug!("Selected {:?} method '{}' for {}", method.kind, method.command, server.id);

        self.run_install_step(server, method, configuration).await?;

        let mut warnings = Vec::new();
        if method.kind == InstallMethodKind::Custom {
            warnings.push(format!(
                "'{}' uses a custom installation method; review it before enabling",
                server.id
            ));
        }

        self.installed.insert(
            server.id.clone(),
            InstalledRecord {
                method: method.clone(),
                installed: Instant::now(),
            },
        );

        Ok(InstallOutcome {
            installed_at: Utc::now(),
            installed_version: server.version.clone(),
            resolved_configuration: configuration.clone(),
            runtime: Some(method.command.clone()),
            warnings,
        })
    }

    async fn uninstall(&self, instance_id: &str) -> McpResult<()> {
        if self.installed.remove(instance_id).is_none() {
            debug!("{} was not installed by this installer", instance_id);
        }
        Ok(())
    }

    async fn health_check(&self, instance: &ServerInstance) -> McpResult<HealthReport> {
        let started = Instant::now();
        let record = self.installed.get(&instance.id).map(|r| r.clone());
        let (runtime, uptime_secs) = match (record, &instance.runtime) {
            (Some(record), _) => (record.method.command, Some(record.installed.elapsed().as_secs())),
            (None, Some(runtime)) => (
                runtime.clone(),
                u64::try_from((Utc::now() - instance.installed_at).num_seconds()).ok(),
            ),
            (None, None) => {
                return Ok(HealthReport {
                    status: HealthStatus::Unknown,
                    response_time_ms: 0,
                    last_check: Utc::now(),
                    uptime_secs: None,
                    error: Some("no installation record".to_string()),
                })
            }
        };

        match which::which(&runtime) {
            Ok(_) => Ok(HealthReport {
                status: HealthStatus::Healthy,
                response_time_ms: started.elapsed().as_millis() as u64,
                last_check: Utc::now(),
                uptime_secs,
                error: None,
            }),
            Err(e) => {
                warn!("{} runtime '{}' is gone: {}", instance.id, runtime, e);
                Ok(HealthReport::unhealthy(format!(
                    "runtime '{}' not found: {}",
                    runtime, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::DEFAULT_PRIORITY;
    use crate::registry::types::{Capabilities, RegistryTier, TrustMetadata};

    fn server(methods: Vec<InstallationMethod>) -> Server {
        Server {
            id: "demo".to_string(),
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: String::new(),
            keywords: Vec::new(),
            category: Default::default(),
            capabilities: Capabilities::tools_only(),
            transports: Vec::new(),
            installation: methods,
            configuration: Default::default(),
            trust: TrustMetadata::default(),
            repository: None,
            registry_id: "npm".to_string(),
            registry_tier: RegistryTier::Community,
        }
    }

    fn method(command: &str, install_command: Option<&str>) -> InstallationMethod {
        InstallationMethod {
            kind: InstallMethodKind::Runtime,
            command: command.to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            install_command: install_command.map(str::to_string),
        }
    }

    fn instance() -> ServerInstance {
        ServerInstance {
            id: "demo".to_string(),
            name: "demo".to_string(),
            registry_id: "npm".to_string(),
            enabled: true,
            configuration: BTreeMap::new(),
            auto_start: true,
            priority: DEFAULT_PRIORITY,
            installed_at: Utc::now(),
            version: "1.0.0".to_string(),
            health_status: HealthStatus::Unknown,
            runtime: None,
        }
    }

    #[tokio::test]
    async fn test_missing_runtime_is_compatibility_error() {
        let installer = CommandInstaller::new();
        let err = installer
            .install(&server(vec![method("mcp-hub-no-such-binary", None)]), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "COMPATIBILITY_ERROR");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_health_uninstall() {
        let installer = CommandInstaller::new();
        let config = BTreeMap::from([("TOKEN".to_string(), "x".to_string())]);
        let outcome = installer
            .install(&server(vec![method("sh", Some("sh -c 'test \"$TOKEN\" = x'"))]), &config)
            .await
            .unwrap();
        assert_eq!(outcome.installed_version, "1.0.0");
        assert_eq!(outcome.runtime.as_deref(), Some("sh"));
        assert_eq!(outcome.resolved_configuration, config);

        let report = installer.health_check(&instance()).await.unwrap();
        assert_eq!(report.status, HealthStatus::Healthy);

        installer.uninstall("demo").await.unwrap();
        installer.uninstall("demo").await.unwrap();
        let report = installer.health_check(&instance()).await.unwrap();
        assert_eq!(report.status, HealthStatus::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_install_step() {
        let installer = CommandInstaller::new();
        let err = installer
            .install(&server(vec![method("sh", Some("false"))]), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INSTALL_ERROR");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_persisted_runtime_is_checked_by_a_fresh_installer() {
        let mut persisted = instance();
        persisted.runtime = Some("sh".to_string());

        let report = CommandInstaller::new().health_check(&persisted).await.unwrap();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.uptime_secs.is_some());

        persisted.runtime = Some("mcp-hub-no-such-binary".to_string());
        let report = CommandInstaller::new().health_check(&persisted).await.unwrap();
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandoned_install_step_is_killed() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("installed");
        let install = format!("sh -c 'sleep 1; touch {}'", marker.display());

        let installer = CommandInstaller::new();
        let server = server(vec![method("sh", Some(&install))]);
        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            installer.install(&server, &BTreeMap::new()),
        )
        .await;
        assert!(attempt.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
        assert!(!marker.exists());
        let report = installer.health_check(&instance()).await.unwrap();
        assert_eq!(report.status, HealthStatus::Unknown);
    }
}
