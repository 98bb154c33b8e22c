use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry '{registry_id}' failed: {message}")]
    Registry { registry_id: String, message: String },

    #[error("all {0} registries failed")]
    AllRegistriesFailed(usize),

    #[error("'{target}' timed out after {ms}ms")]
    Timeout { target: String, ms: u64 },

    #[error("installation of '{server_id}' failed: {reason}")]
    Install { server_id: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("'{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("auto-install of '{server_id}' is not allowed: {reason}")]
    AutoInstallDisallowed { server_id: String, reason: String },

    #[error("'{server_id}' is not compatible with this machine: {reason}")]
    Compatibility { server_id: String, reason: String },

    #[error("invalid configuration for '{server_id}': {reason}")]
    InvalidConfiguration { server_id: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl McpError {
    pub fn registry(registry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registry {
            registry_id: registry_id.into(),
            message: message.into(),
        }
    }

    pub fn install(server_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Install {
            server_id: server_id.into(),
            reason: reason.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Registry { .. } => "REGISTRY_ERROR",
            Self::AllRegistriesFailed(_) => "ALL_REGISTRIES_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Install { .. } => "INSTALL_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyInstalled(_) => "ALREADY_INSTALLED",
            Self::AutoInstallDisallowed { .. } => "AUTO_INSTALL_DISALLOWED",
            Self::Compatibility { .. } => "COMPATIBILITY_ERROR",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::Http(_) => "HTTP_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
        }
    }

    /// Whether repeating the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AutoInstallDisallowed { .. }
                | Self::NotFound(_)
                | Self::AlreadyInstalled(_)
                | Self::Compatibility { .. }
                | Self::InvalidConfiguration { .. }
        )
    }
}

pub type McpResult<T> = Result<T, McpError>;
