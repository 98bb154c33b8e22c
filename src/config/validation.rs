//! Configuration validation using JSON Schema

use crate::config::types::{AutoInstallSettings, GlobalSettings, HubConfig, RegistrySettings};
use crate::registry::types::Registry;
use schemars::schema_for;
use serde_json::Value;
use std::collections::HashSet;
use validator::Validate;

/// Validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Configuration validator
pub struct ConfigValidator {
    schema: Value,
}

impl ConfigValidator {
    /// Create a new validator with the generated schema
    pub fn new() -> Self {
        let schema = schema_for!(HubConfig);
        Self {
            schema: serde_json::to_value(&schema).unwrap_or_default(),
        }
    }

    /// Get the JSON Schema for the configuration
    pub fn get_schema(&self) -> &Value {
        &self.schema
    }

    /// Export the schema to a JSON string
    pub fn export_schema(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    pub fn validate(&self, config: &HubConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(validation_errors) = config.validate() {
            for (section, kind) in validation_errors.errors() {
                errors.push(ValidationError {
                    path: section.to_string(),
                    message: format!("{:?}", kind),
                });
            }
        }

        self.validate_registries(config, &mut errors);
        self.validate_instances(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset every section that fails validation to its defaults, drop
    /// unknown registry ids and inconsistent instances. Returns the problems
    /// that were found; empty when `config` was already valid.
    pub fn repair(&self, config: &mut HubConfig) -> Vec<ValidationError> {
        let errors = match self.validate(config) {
            Ok(()) => return Vec::new(),
            Err(errors) => errors,
        };

        if config.global_settings.validate().is_err() {
            config.global_settings = GlobalSettings::default();
        }
        if config.registry_settings.validate().is_err() {
            config.registry_settings = RegistrySettings::default();
        }
        if config.auto_install.validate().is_err() {
            config.auto_install = AutoInstallSettings::default();
        }

        let known: HashSet<String> = Registry::builtin().into_iter().map(|r| r.id).collect();
        config
            .registry_settings
            .enabled_registries
            .retain(|id| known.contains(id));
        config
            .servers
            .retain(|key, instance| key == &instance.id && !instance.version.is_empty());

        errors
    }

    fn validate_registries(&self, config: &HubConfig, errors: &mut Vec<ValidationError>) {
        let known: HashSet<String> = Registry::builtin().into_iter().map(|r| r.id).collect();
        for (idx, id) in config.registry_settings.enabled_registries.iter().enumerate() {
            if !known.contains(id) {
                errors.push(ValidationError {
                    path: format!("registrySettings.enabledRegistries[{}]", idx),
                    message: format!("Unknown registry: {}", id),
                });
            }
        }
    }

    fn validate_instances(&self, config: &HubConfig, errors: &mut Vec<ValidationError>) {
        for (key, instance) in &config.servers {
            if key != &instance.id {
                errors.push(ValidationError {
                    path: format!("servers.{}.id", key),
                    message: format!("Instance id '{}' does not match its key", instance.id),
                });
            }
            if instance.version.is_empty() {
                errors.push(ValidationError {
                    path: format!("servers.{}.version", key),
                    message: "Installed version cannot be empty".to_string(),
                });
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::new().validate(&HubConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_each_problem() {
        let mut config = HubConfig::default();
        config.auto_install.confidence_threshold = -0.1;
        config.registry_settings.enabled_registries.push("smithery".to_string());

        let errors = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.path == "auto_install"));
        assert!(errors
            .iter()
            .any(|e| e.message == "Unknown registry: smithery"));
    }

    #[test]
    fn test_repair_resets_only_offending_sections() {
        let mut config = HubConfig::default();
        config.auto_install.confidence_threshold = 5.0;
        config.auto_install.enabled = true;
        config.global_settings.retry_count = 7;
        config.registry_settings.enabled_registries =
            vec!["npm".to_string(), "smithery".to_string()];

        let errors = ConfigValidator::new().repair(&mut config);
        assert_eq!(errors.len(), 2);

        assert_eq!(config.auto_install, AutoInstallSettings::default());
        assert_eq!(config.global_settings.retry_count, 7);
        assert_eq!(config.registry_settings.enabled_registries, vec!["npm".to_string()]);
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert!(ConfigValidator::new().repair(&mut config).is_empty());
    }

    #[test]
    fn test_schema_export() {
        let validator = ConfigValidator::new();
        assert!(validator.export_schema().contains("autoInstall"));
    }
}
