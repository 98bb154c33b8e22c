use mcp_hub::utils::errors::McpError;

#[test]
fn test_error_codes() {
    assert_eq!(McpError::NotFound("x".to_string()).error_code(), "NOT_FOUND");
    assert_eq!(
        McpError::registry("github", "boom").error_code(),
        "REGISTRY_ERROR"
    );
    assert_eq!(
        McpError::AutoInstallDisallowed {
            server_id: "x".to_string(),
            reason: "disabled".to_string(),
        }
        .error_code(),
        "AUTO_INSTALL_DISALLOWED"
    );
    assert_eq!(McpError::AllRegistriesFailed(3).error_code(), "ALL_REGISTRIES_FAILED");
    assert_eq!(
        McpError::AlreadyInstalled("x".to_string()).error_code(),
        "ALREADY_INSTALLED"
    );
}

#[test]
fn test_retryable_classification() {
    assert!(McpError::registry("npm", "503").is_retryable());
    assert!(McpError::Timeout {
        target: "npm".to_string(),
        ms: 100
    }
    .is_retryable());
    assert!(!McpError::NotFound("x".to_string()).is_retryable());
    assert!(!McpError::Compatibility {
        server_id: "x".to_string(),
        reason: "docker missing".to_string(),
    }
    .is_retryable());
}

#[test]
fn test_messages_name_the_source() {
    let err = McpError::install("pg-mcp", "exit status 1");
    assert_eq!(err.to_string(), "installation of 'pg-mcp' failed: exit status 1");
}
