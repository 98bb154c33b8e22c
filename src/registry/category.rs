//! Category inference for catalogs without structured categories

use crate::registry::types::ServerCategory;

/// Ordered keyword table. The first rule with a matching word wins.
const CATEGORY_RULES: &[(ServerCategory, &[&str])] = &[
    (
        ServerCategory::Testing,
        &["test", "testing", "tests", "jest", "playwright", "selenium", "e2e"],
    ),
    (
        ServerCategory::Database,
        &[
            "database", "db", "sql", "postgres", "postgresql", "mysql", "sqlite", "mongodb",
            "redis", "supabase",
        ],
    ),
    (
        ServerCategory::FileSystem,
        &["filesystem", "file", "files", "fs", "directory"],
    ),
    (
        ServerCategory::Development,
        &["git", "github", "gitlab", "code", "ide", "debug", "lint", "compiler"],
    ),
    (
        ServerCategory::Web,
        &["web", "browser", "http", "scrape", "scraping", "fetch", "puppeteer", "crawl"],
    ),
    (
        ServerCategory::Ai,
        &["ai", "llm", "openai", "embedding", "embeddings", "rag", "vector", "ml"],
    ),
    (
        ServerCategory::Cloud,
        &["aws", "gcp", "azure", "cloud", "docker", "kubernetes", "k8s", "terraform"],
    ),
    (
        ServerCategory::Communication,
        &["slack", "email", "discord", "telegram", "chat", "sms"],
    ),
    (
        ServerCategory::Productivity,
        &["notion", "calendar", "todo", "jira", "linear", "notes", "obsidian"],
    ),
    (
        ServerCategory::Security,
        &["security", "auth", "vault", "secrets", "oauth", "vulnerability"],
    ),
    (
        ServerCategory::Monitoring,
        &["monitor", "monitoring", "logs", "metrics", "sentry", "grafana", "observability"],
    ),
    (
        ServerCategory::DataAnalysis,
        &["data", "analytics", "csv", "pandas", "spreadsheet", "excel", "bigquery"],
    ),
];

/// Infer a category from free text (keywords, topics, description).
///
/// Text is split into lowercase words so `db` matches "db-tools" but not "dbus".
pub fn infer_category<'a>(texts: impl IntoIterator<Item = &'a str>) -> ServerCategory {
    let words: Vec<String> = texts
        .into_iter()
        .flat_map(|text| {
            text.split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(|w| w.to_ascii_lowercase())
                .collect::<Vec<_>>()
        })
        .collect();

    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| words.iter().any(|w| keywords.contains(&w.as_str())))
        .map(|(category, _)| *category)
        .unwrap_or(ServerCategory::Other)
}
