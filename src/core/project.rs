//! Infers what kind of servers a project needs from cheap signals
use crate::core::decision::Requirements;
use crate::registry::types::{Capability, SearchRequest, ServerCategory, DEFAULT_SEARCH_LIMIT};
use serde::{Deserialize, Serialize};

/// Lightweight project description supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectContext {
    pub name: String,
    /// Package names from the project's manifest(s)
    pub dependencies: Vec<String>,
    /// Extensions seen in the tree, with or without the leading dot
    pub file_extensions: Vec<String>,
    pub description: Option<String>,
}

struct ProjectRule {
    category: ServerCategory,
    capabilities: &'static [Capability],
    /// Exact names, or prefixes when ending in '/'
    dependencies: &'static [&'static str],
    extensions: &'static [&'static str],
}

impl ProjectRule {
    fn hits(&self, dependencies: &[String], extensions: &[String]) -> usize {
        let dependency_hits = dependencies
            .iter()
            .filter(|dep| {
                self.dependencies.iter().any(|signal| {
                    if signal.ends_with('/') {
                        dep.starts_with(signal)
                    } else {
                        dep.as_str() == *signal
                    }
                })
            })
            .count();
        let extension_hits = extensions
            .iter()
            .filter(|ext| self.extensions.contains(&ext.as_str()))
            .count();
        dependency_hits + extension_hits
    }
}

/// Earlier rules win ties
const PROJECT_RULES: &[ProjectRule] = &[
    ProjectRule {
        category: ServerCategory::Testing,
        capabilities: &[Capability::Tools],
        dependencies: &[
            "jest", "mocha", "vitest", "pytest", "playwright", "cypress", "@playwright/",
            "@testing-library/",
        ],
        extensions: &[],
    },
    ProjectRule {
        category: ServerCategory::Database,
        capabilities: &[Capability::Tools, Capability::Resources],
        dependencies: &[
            "pg", "mysql", "mysql2", "sqlite3", "better-sqlite3", "mongodb", "mongoose", "prisma",
            "@prisma/", "sqlalchemy", "psycopg2", "redis", "diesel", "sqlx",
        ],
        extensions: &["sql", "db", "sqlite"],
    },
    ProjectRule {
        category: ServerCategory::DataAnalysis,
        capabilities: &[Capability::Tools, Capability::Resources],
        dependencies: &["pandas", "numpy", "polars", "scipy", "jupyter", "matplotlib"],
        extensions: &["ipynb", "csv", "parquet"],
    },
    ProjectRule {
        category: ServerCategory::Ai,
        capabilities: &[Capability::Tools, Capability::Prompts],
        dependencies: &[
            "openai", "@anthropic-ai/", "anthropic", "langchain", "@langchain/", "transformers",
            "torch",
        ],
        extensions: &[],
    },
    ProjectRule {
        category: ServerCategory::Cloud,
        capabilities: &[Capability::Tools],
        dependencies: &["aws-sdk", "@aws-sdk/", "boto3", "@google-cloud/", "@azure/"],
        extensions: &["tf", "tfvars"],
    },
    ProjectRule {
        category: ServerCategory::Web,
        capabilities: &[Capability::Tools],
        dependencies: &[
            "react", "vue", "next", "svelte", "express", "fastify", "axios", "flask", "fastapi",
            "django",
        ],
        extensions: &["html", "css", "jsx", "tsx", "vue"],
    },
    ProjectRule {
        category: ServerCategory::Development,
        capabilities: &[Capability::Tools],
        dependencies: &["typescript", "eslint", "prettier", "webpack", "vite"],
        extensions: &["rs", "ts", "js", "py", "go", "java"],
    },
    ProjectRule {
        category: ServerCategory::FileSystem,
        capabilities: &[Capability::Tools, Capability::Resources],
        dependencies: &["fs-extra", "glob", "chokidar"],
        extensions: &["md", "txt"],
    },
];

/// Inferred requirements plus the catalog query that finds candidates for them
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectAnalysis {
    pub requirements: Requirements,
    pub search: SearchRequest,
}

/// Pick the rule with the most matching signals
pub fn analyze(context: &ProjectContext) -> ProjectAnalysis {
    let dependencies: Vec<String> = context
        .dependencies
        .iter()
        .map(|d| d.trim().to_lowercase())
        .collect();
    let extensions: Vec<String> = context
        .file_extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .collect();

    let mut best: Option<(&ProjectRule, usize)> = None;
    for rule in PROJECT_RULES {
        let hits = rule.hits(&dependencies, &extensions);
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((rule, hits));
        }
    }

    match best {
        Some((rule, _)) => ProjectAnalysis {
            requirements: Requirements {
                category: Some(rule.category),
                capabilities: rule.capabilities.to_vec(),
            },
            search: SearchRequest {
                query: Some(rule.category.keyword().to_string()),
                limit: DEFAULT_SEARCH_LIMIT,
                ..SearchRequest::default()
            },
        },
        None => ProjectAnalysis {
            requirements: Requirements {
                category: None,
                capabilities: vec![Capability::Tools],
            },
            search: SearchRequest {
                query: context
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty()),
                limit: DEFAULT_SEARCH_LIMIT,
                ..SearchRequest::default()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(deps: &[&str], exts: &[&str]) -> ProjectContext {
        ProjectContext {
            name: "demo".to_string(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            file_extensions: exts.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    #[test]
    fn test_database_project() {
        let analysis = analyze(&context(&["pg", "@prisma/client", "express"], &[".sql", ".ts"]));
        assert_eq!(analysis.requirements.category, Some(ServerCategory::Database));
        assert_eq!(
            analysis.requirements.capabilities,
            vec![Capability::Tools, Capability::Resources]
        );
        assert_eq!(analysis.search.query.as_deref(), Some("database"));
    }

    #[test]
    fn test_tie_goes_to_earlier_rule() {
        // one testing signal, one web signal
        let analysis = analyze(&context(&["jest", "react"], &[]));
        assert_eq!(analysis.requirements.category, Some(ServerCategory::Testing));
    }

    #[test]
    fn test_no_signals_defaults_to_tools() {
        let mut ctx = context(&["left-pad"], &["xyz"]);
        ctx.description = Some("weather dashboard".to_string());
        let analysis = analyze(&ctx);
        assert_eq!(analysis.requirements.category, None);
        assert_eq!(analysis.requirements.capabilities, vec![Capability::Tools]);
        assert_eq!(analysis.search.query.as_deref(), Some("weather dashboard"));
    }
}
