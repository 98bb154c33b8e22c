//! Tracing subscriber setup

use crate::utils::errors::{McpError, McpResult};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `level`.
///
/// `level` accepts anything `EnvFilter` does (`info`, `mcp_hub=debug,warn`, ...).
/// `RUST_LOG` wins over `level` when set. Fails if a global subscriber is already
/// installed or the directive does not parse.
pub fn init_tracing(level: &str, json: bool) -> McpResult<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(level),
    }
    .map_err(|e| McpError::Config(format!("Invalid log level '{}': {}", level, e)))?;

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| McpError::Config(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_config_error() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let err = init_tracing("mcp_hub=notalevel", false).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
