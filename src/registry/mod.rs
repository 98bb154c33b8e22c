pub mod cache;
pub mod category;
pub mod client;
pub mod policy;
pub mod rate_limit;
pub mod scanner;
pub mod sources;
pub mod types;

pub use cache::SearchCache;
pub use client::{ClientOptions, RegistryClient, RegistrySource};
pub use policy::PolicyFilter;
pub use rate_limit::{RateLimitState, RateLimitUpdate, RateLimiter};
pub use scanner::{RegistryFailure, RegistryScanner, ScanReport};
pub use types::{Registry, RegistrySearchResult, SearchRequest, Server, ServerCategory};
