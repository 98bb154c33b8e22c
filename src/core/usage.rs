//! Per-instance invocation statistics
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsage {
    pub name: String,
    pub usage_count: u64,
    pub average_execution_time_ms: f64,
    /// Fraction of successful calls, in [0, 1]
    pub success_rate: f64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub instance_id: String,
    pub total_invocations: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub average_response_time_ms: f64,
    pub error_count: u64,
    /// Most used first
    pub tools: Vec<ToolUsage>,
}

impl UsageStats {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            total_invocations: 0,
            last_used: None,
            average_response_time_ms: 0.0,
            error_count: 0,
            tools: Vec::new(),
        }
    }

    /// Fold one invocation into the running means
    pub fn record(&mut self, tool_name: &str, response_time_ms: f64, success: bool) {
        let now = Utc::now();

        self.total_invocations += 1;
        self.average_response_time_ms +=
            (response_time_ms - self.average_response_time_ms) / self.total_invocations as f64;
        if !success {
            self.error_count += 1;
        }
        self.last_used = Some(now);

        let outcome = if success { 1.0 } else { 0.0 };
        match self.tools.iter_mut().find(|t| t.name == tool_name) {
            Some(tool) => {
                tool.usage_count += 1;
                let n = tool.usage_count as f64;
                tool.average_execution_time_ms +=
                    (response_time_ms - tool.average_execution_time_ms) / n;
                tool.success_rate += (outcome - tool.success_rate) / n;
                tool.last_used = now;
            }
            None => self.tools.push(ToolUsage {
                name: tool_name.to_string(),
                usage_count: 1,
                average_execution_time_ms: response_time_ms,
                success_rate: outcome,
                last_used: now,
            }),
        }

        // stable, so equally used tools keep first-seen order
        self.tools.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    }

    pub fn tool(&self, name: &str) -> Option<&ToolUsage> {
        self.tools.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_means() {
        let mut stats = UsageStats::new("db");
        stats.record("query", 100.0, true);
        stats.record("query", 300.0, false);

        let tool = stats.tool("query").unwrap();
        assert_eq!(tool.usage_count, 2);
        assert_eq!(tool.average_execution_time_ms, 200.0);
        assert_eq!(tool.success_rate, 0.5);

        assert_eq!(stats.total_invocations, 2);
        assert_eq!(stats.average_response_time_ms, 200.0);
        assert_eq!(stats.error_count, 1);
        assert!(stats.last_used.is_some());
    }

    #[test]
    fn test_tools_sorted_by_usage() {
        let mut stats = UsageStats::new("db");
        stats.record("schema", 10.0, true);
        stats.record("query", 10.0, true);
        stats.record("query", 10.0, true);
        stats.record("export", 10.0, true);

        let names: Vec<&str> = stats.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["query", "schema", "export"]);
    }
}
