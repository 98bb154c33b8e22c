//! GitHub repository search
use crate::registry::category::infer_category;
use crate::registry::sources::{CatalogAdapter, ParsedPage};
use crate::registry::types::{
    Capabilities, ConfigurationContract, InstallMethodKind, InstallationMethod, Registry,
    SearchRequest, Server, SortKey, SortOrder, TransportKind, TrustMetadata,
};
use crate::utils::errors::{McpError, McpResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Organisation whose repositories count as verified
const REFERENCE_OWNER: &str = "modelcontextprotocol";

/// Repositories matching any of these are treated as MCP servers
const MCP_TERMS: &[&str] = &["mcp", "mcp-server", "model-context-protocol"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    items: Vec<GithubRepo>,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    full_name: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

pub struct GithubAdapter;

impl CatalogAdapter for GithubAdapter {
    fn search_params(&self, request: &SearchRequest) -> Vec<(String, String)> {
        let query = format!(
            "{} {} in:name,description,topics",
            request.search_text(),
            MCP_TERMS.join(" OR ")
        );
        let mut params = vec![
            ("q".to_string(), query),
            ("per_page".to_string(), request.limit.to_string()),
            (
                "page".to_string(),
                (request.offset / request.limit.max(1) + 1).to_string(),
            ),
        ];

        let sort = match request.sort_by {
            Some(SortKey::Stars) | Some(SortKey::Downloads) => Some("stars"),
            Some(SortKey::Updated) => Some("updated"),
            _ => None,
        };
        if let Some(sort) = sort {
            params.push(("sort".to_string(), sort.to_string()));
            let order = match request.sort_order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            params.push(("order".to_string(), order.to_string()));
        }
        params
    }

    fn parse_search(&self, registry: &Registry, body: &str) -> McpResult<ParsedPage> {
        let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("GitHub search response parse error: {}", e))
        })?;

        let servers = parsed
            .items
            .into_iter()
            .filter(|repo| !repo.archived)
            .map(|repo| to_server(repo, registry))
            .collect();

        Ok(ParsedPage {
            servers,
            total: Some(parsed.total_count),
            has_more: None,
        })
    }

    fn parse_detail(&self, registry: &Registry, body: &str) -> McpResult<Server> {
        let repo: GithubRepo = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("GitHub repository parse error: {}", e))
        })?;
        Ok(to_server(repo, registry))
    }
}

fn to_server(repo: GithubRepo, registry: &Registry) -> Server {
    let description = repo.description.unwrap_or_default();
    let category = infer_category(
        repo.topics
            .iter()
            .map(String::as_str)
            .chain([repo.name.as_str(), description.as_str()]),
    );
    let author = repo.owner.map(|o| o.login);
    let verified = author.as_deref() == Some(REFERENCE_OWNER);

    let clone_url = repo
        .clone_url
        .or_else(|| repo.html_url.clone())
        .unwrap_or_else(|| format!("https://github.com/{}.git", repo.full_name));

    Server {
        id: repo.full_name,
        name: repo.name,
        version: "latest".to_string(),
        author,
        description,
        keywords: repo.topics,
        category,
        capabilities: Capabilities::tools_only(),
        transports: vec![TransportKind::Stdio],
        installation: vec![InstallationMethod {
            kind: InstallMethodKind::Custom,
            command: "git".to_string(),
            args: vec!["clone".to_string(), "--depth".to_string(), "1".to_string(), clone_url],
            env: BTreeMap::new(),
            install_command: None,
        }],
        configuration: ConfigurationContract::default(),
        trust: TrustMetadata {
            stars: repo.stargazers_count,
            verified,
            last_updated: repo.updated_at,
            ..TrustMetadata::default()
        },
        repository: repo.html_url,
        registry_id: registry.id.clone(),
        registry_tier: registry.tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{ServerCategory, GITHUB_REGISTRY_ID};

    fn registry() -> Registry {
        Registry::builtin()
            .into_iter()
            .find(|r| r.id == GITHUB_REGISTRY_ID)
            .unwrap()
    }

    #[test]
    fn test_search_params_union_query_and_paging() {
        let request = SearchRequest {
            query: Some("jest".to_string()),
            limit: 10,
            offset: 20,
            sort_by: Some(SortKey::Stars),
            ..SearchRequest::default()
        };
        let params = GithubAdapter.search_params(&request);

        assert_eq!(
            params[0].1,
            "jest mcp OR mcp-server OR model-context-protocol in:name,description,topics"
        );
        assert!(params.contains(&("page".to_string(), "3".to_string())));
        assert!(params.contains(&("sort".to_string(), "stars".to_string())));
        assert!(params.contains(&("order".to_string(), "desc".to_string())));
    }

    #[test]
    fn test_parse_search_skips_archived() {
        let body = r#"{
            "total_count": 2,
            "items": [
                {
                    "full_name": "modelcontextprotocol/servers",
                    "name": "servers",
                    "description": "Reference servers",
                    "topics": ["mcp", "testing"],
                    "stargazers_count": 5000,
                    "updated_at": "2024-05-01T10:00:00Z",
                    "html_url": "https://github.com/modelcontextprotocol/servers",
                    "owner": {"login": "modelcontextprotocol"}
                },
                {
                    "full_name": "someone/old",
                    "name": "old",
                    "archived": true
                }
            ]
        }"#;

        let page = GithubAdapter.parse_search(&registry(), body).unwrap();
        assert_eq!(page.total, Some(2));
        assert_eq!(page.servers.len(), 1);

        let server = &page.servers[0];
        assert_eq!(server.id, "modelcontextprotocol/servers");
        assert_eq!(server.category, ServerCategory::Testing);
        assert_eq!(server.trust.stars, 5000);
        assert!(server.is_verified());
        assert_eq!(
            server.installation[0].args.last().unwrap(),
            "https://github.com/modelcontextprotocol/servers"
        );
    }
}
