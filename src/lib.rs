//! MCP hub: discover servers across registries, score them, install them and
//! keep track of their health and usage.

pub mod config;
pub mod core;
pub mod installer;
pub mod registry;
pub mod utils;

pub use config::HubConfig;
pub use crate::core::LifecycleManager;
pub use utils::{McpError, McpResult};
