//! Result filtering by block-list, category allow-list and security mode
use crate::config::types::{HubConfig, SecurityMode};
use crate::registry::types::{Server, ServerCategory};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    blocked: HashSet<String>,
    /// Only set while auto-install is enabled
    allowed_categories: Option<HashSet<ServerCategory>>,
    require_verified: bool,
}

impl PolicyFilter {
    pub fn from_config(config: &HubConfig) -> Self {
        let auto = &config.auto_install;
        Self {
            blocked: auto.blocked_servers.iter().cloned().collect(),
            allowed_categories: auto
                .enabled
                .then(|| auto.allowed_categories.iter().copied().collect()),
            require_verified: config.global_settings.security_mode == SecurityMode::Strict,
        }
    }

    /// Lets everything through
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn allows(&self, server: &Server) -> bool {
        if self.blocked.contains(&server.id) {
            return false;
        }
        if let Some(allowed) = &self.allowed_categories {
            if !allowed.contains(&server.category) {
                return false;
            }
        }
        !self.require_verified || server.is_verified()
    }

    pub fn apply(&self, servers: Vec<Server>) -> Vec<Server> {
        servers.into_iter().filter(|s| self.allows(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{Capabilities, RegistryTier, TrustMetadata};

    fn server(id: &str, category: ServerCategory, verified: bool) -> Server {
        Server {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: String::new(),
            keywords: Vec::new(),
            category,
            capabilities: Capabilities::tools_only(),
            transports: Vec::new(),
            installation: Vec::new(),
            configuration: Default::default(),
            trust: TrustMetadata {
                verified,
                ..TrustMetadata::default()
            },
            repository: None,
            registry_id: "npm".to_string(),
            registry_tier: RegistryTier::Community,
        }
    }

    #[test]
    fn test_block_list_always_applies() {
        let mut config = HubConfig::default();
        config.auto_install.blocked_servers = vec!["bad".to_string()];
        let filter = PolicyFilter::from_config(&config);

        assert!(!filter.allows(&server("bad", ServerCategory::Testing, true)));
        assert!(filter.allows(&server("good", ServerCategory::Testing, false)));
    }

    #[test]
    fn test_allow_list_only_when_auto_install_enabled() {
        let mut config = HubConfig::default();
        config.auto_install.allowed_categories = vec![ServerCategory::Testing];
        let web = server("web", ServerCategory::Web, true);

        config.auto_install.enabled = false;
        assert!(PolicyFilter::from_config(&config).allows(&web));

        config.auto_install.enabled = true;
        assert!(!PolicyFilter::from_config(&config).allows(&web));
    }

    #[test]
    fn test_strict_mode_requires_verified() {
        let mut config = HubConfig::default();
        config.global_settings.security_mode = SecurityMode::Strict;
        let filtered = PolicyFilter::from_config(&config).apply(vec![
            server("a", ServerCategory::Testing, true),
            server("b", ServerCategory::Testing, false),
        ]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a");
    }
}
