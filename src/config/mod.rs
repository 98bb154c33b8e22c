pub mod store;
pub mod types;
pub mod validation;

pub use store::{ConfigFormat, ConfigStore};
pub use types::*;
pub use validation::ConfigValidator;
