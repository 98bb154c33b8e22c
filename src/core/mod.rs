pub mod decision;
pub mod manager;
pub mod project;
pub mod usage;

pub use decision::{RankedCandidate, Requirements};
pub use manager::{DetectionReport, InstallFailure, LifecycleManager, LifecycleState};
pub use project::{ProjectAnalysis, ProjectContext};
pub use usage::{ToolUsage, UsageStats};
