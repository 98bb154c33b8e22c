//! npm registry search
use crate::registry::category::infer_category;
use crate::registry::sources::{CatalogAdapter, ParsedPage};
use crate::registry::types::{
    Capabilities, ConfigurationContract, InstallMethodKind, InstallationMethod, Registry,
    SearchRequest, Server, TransportKind, TrustMetadata,
};
use crate::utils::errors::{McpError, McpResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Scope whose packages count as verified
const REFERENCE_SCOPE: &str = "@modelcontextprotocol/";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: NpmPackage,
    #[serde(default)]
    score: Option<NpmScore>,
    #[serde(default)]
    downloads: Option<NpmDownloads>,
}

#[derive(Debug, Deserialize)]
struct NpmPackage {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NpmScore {
    #[serde(default)]
    detail: Option<ScoreDetail>,
}

#[derive(Debug, Deserialize)]
struct ScoreDetail {
    #[serde(default)]
    quality: Option<f64>,
    #[serde(default)]
    popularity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NpmDownloads {
    #[serde(default)]
    monthly: u64,
}

/// `GET /{name}` packument, reduced to what we read
#[derive(Debug, Deserialize)]
struct Packument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    keywords: Vec<String>,
    /// Either "Name <mail>" or `{ "name": ... }`
    #[serde(default)]
    author: Option<Value>,
    #[serde(default)]
    repository: Option<Value>,
    #[serde(default)]
    time: HashMap<String, Value>,
}

pub struct NpmAdapter;

impl CatalogAdapter for NpmAdapter {
    fn search_params(&self, request: &SearchRequest) -> Vec<(String, String)> {
        vec![
            (
                "text".to_string(),
                format!("{} keywords:mcp", request.search_text()),
            ),
            ("size".to_string(), request.limit.to_string()),
            ("from".to_string(), request.offset.to_string()),
        ]
    }

    fn parse_search(&self, registry: &Registry, body: &str) -> McpResult<ParsedPage> {
        let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("npm search response parse error: {}", e))
        })?;

        let servers = parsed
            .objects
            .into_iter()
            .map(|object| to_server(object, registry))
            .collect();

        Ok(ParsedPage {
            servers,
            total: parsed.total,
            has_more: None,
        })
    }

    fn parse_detail(&self, registry: &Registry, body: &str) -> McpResult<Server> {
        let doc: Packument = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("npm package parse error: {}", e))
        })?;
        Ok(packument_to_server(doc, registry))
    }

    fn encode_id(&self, server_id: &str) -> String {
        // Scoped names keep the '@' but escape the slash.
        server_id.replace('/', "%2F")
    }
}

fn npx_method(name: &str, version: Option<&str>) -> InstallationMethod {
    let spec = match version {
        Some(version) => format!("{}@{}", name, version),
        None => name.to_string(),
    };
    InstallationMethod {
        kind: InstallMethodKind::PackageManager,
        command: "npx".to_string(),
        args: vec!["-y".to_string(), spec],
        env: BTreeMap::new(),
        install_command: None,
    }
}

fn to_server(object: SearchObject, registry: &Registry) -> Server {
    let package = object.package;
    let description = package.description.unwrap_or_default();
    let category = infer_category(
        package
            .keywords
            .iter()
            .map(String::as_str)
            .chain([package.name.as_str(), description.as_str()]),
    );
    let detail = object.score.and_then(|s| s.detail);
    let version = package.version.unwrap_or_else(|| "latest".to_string());

    Server {
        id: package.name.clone(),
        installation: vec![npx_method(&package.name, Some(version.as_str()))],
        trust: TrustMetadata {
            downloads: object.downloads.map(|d| d.monthly).unwrap_or(0),
            verified: package.name.starts_with(REFERENCE_SCOPE),
            performance_score: detail.as_ref().and_then(|d| d.quality),
            community_score: detail.as_ref().and_then(|d| d.popularity),
            last_updated: package.date,
            ..TrustMetadata::default()
        },
        name: package.name,
        version,
        author: package.publisher.map(|p| p.username),
        description,
        keywords: package.keywords,
        category,
        capabilities: Capabilities::tools_only(),
        transports: vec![TransportKind::Stdio],
        configuration: ConfigurationContract::default(),
        repository: package.links.and_then(|l| l.repository),
        registry_id: registry.id.clone(),
        registry_tier: registry.tier,
    }
}

fn packument_to_server(doc: Packument, registry: &Registry) -> Server {
    let description = doc.description.unwrap_or_default();
    let category = infer_category(
        doc.keywords
            .iter()
            .map(String::as_str)
            .chain([doc.name.as_str(), description.as_str()]),
    );
    let version = doc
        .dist_tags
        .get("latest")
        .cloned()
        .unwrap_or_else(|| "latest".to_string());
    let author = doc.author.and_then(|a| match a {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("name").and_then(|n| n.as_str()).map(str::to_string),
        _ => None,
    });
    let repository = doc.repository.and_then(|r| match r {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("url").and_then(|u| u.as_str()).map(str::to_string),
        _ => None,
    });
    let last_updated = doc
        .time
        .get("modified")
        .and_then(|t| t.as_str())
        .and_then(|t| t.parse::<DateTime<Utc>>().ok());

    Server {
        id: doc.name.clone(),
        installation: vec![npx_method(&doc.name, Some(version.as_str()))],
        trust: TrustMetadata {
            verified: doc.name.starts_with(REFERENCE_SCOPE),
            last_updated,
            ..TrustMetadata::default()
        },
        name: doc.name,
        version,
        author,
        description,
        keywords: doc.keywords,
        category,
        capabilities: Capabilities::tools_only(),
        transports: vec![TransportKind::Stdio],
        configuration: ConfigurationContract::default(),
        repository,
        registry_id: registry.id.clone(),
        registry_tier: registry.tier,
    }
}
