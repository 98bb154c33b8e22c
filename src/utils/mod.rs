pub mod errors;
pub mod events;
pub mod logging;
pub mod shutdown;

pub use errors::{McpError, McpResult};
pub use events::{EventBus, HubEvent};
pub use logging::init_tracing;
pub use shutdown::ShutdownCoordinator;
