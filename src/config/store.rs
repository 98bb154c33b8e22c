use crate::config::types::HubConfig;
use crate::config::validation::ConfigValidator;
use crate::utils::errors::{McpError, McpResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension; JSON unless it says YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Reads and writes the hub's single configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    format: ConfigFormat,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string());
        let format = ConfigFormat::from_path(&expanded);
        Self {
            path: expanded,
            format,
        }
    }

    /// `~/.config/mcp-hub/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("mcp-hub")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Parse the document on disk
    pub async fn try_load(&self) -> McpResult<Option<HubConfig>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| McpError::Config(format!("Failed to read config: {}", e)))?;
        self.parse(&content).map(Some)
    }

    /// Load, falling back to defaults when the file is missing or unreadable.
    /// Sections that fail validation are reset to their defaults.
    pub async fn load_or_default(&self) -> HubConfig {
        match self.try_load().await {
            Ok(Some(mut config)) => {
                for problem in ConfigValidator::new().repair(&mut config) {
                    warn!(
                        "Invalid config value in {} ({}), using defaults for that section",
                        self.path.display(),
                        problem
                    );
                }
                info!(
                    "Loaded config from {} ({} installed servers)",
                    self.path.display(),
                    config.servers.len()
                );
                config
            }
            Ok(None) => {
                debug!("No config at {}, using defaults", self.path.display());
                HubConfig::default()
            }
            Err(e) => {
                warn!("Failed to load config from {}, using defaults: {}", self.path.display(), e);
                HubConfig::default()
            }
        }
    }

    fn parse(&self, content: &str) -> McpResult<HubConfig> {
        match self.format {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| McpError::Config(format!("Failed to parse JSON config: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| McpError::Config(format!("Failed to parse YAML config: {}", e))),
        }
    }

    /// Replace the whole document. Writes a sibling temp file and renames it
    /// over the target so readers never see a partial file.
    pub async fn save(&self, config: &HubConfig) -> McpResult<()> {
        let content = match self.format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| McpError::Config(format!("Failed to write config: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| McpError::Config(format!("Failed to replace config: {}", e)))?;

        debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SecurityMode;
    use tempfile::TempDir;

    #[test]
    fn test_config_format_detection() {
        let cases = vec![
            ("config.json", ConfigFormat::Json),
            ("config.yaml", ConfigFormat::Yaml),
            ("config.yml", ConfigFormat::Yaml),
            ("config", ConfigFormat::Json),
        ];
        for (path, expected) in cases {
            assert_eq!(ConfigFormat::from_path(Path::new(path)), expected, "Failed for: {}", path);
        }
    }

    #[tokio::test]
    async fn test_yaml_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path().join("hub.yaml"));

        let mut config = HubConfig::default();
        config.global_settings.security_mode = SecurityMode::Strict;
        store.save(&config).await.unwrap();

        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(content.contains("securityMode: strict"));
        assert_eq!(store.try_load().await.unwrap(), Some(config));
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_degrade_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path().join("nested/config.json"));
        assert_eq!(store.load_or_default().await, HubConfig::default());

        store.save(&HubConfig::default()).await.unwrap();
        tokio::fs::write(store.path(), "{ not json").await.unwrap();
        assert!(store.try_load().await.is_err());
        assert_eq!(store.load_or_default().await, HubConfig::default());
    }
}
