//! registry.modelcontextprotocol.io
use crate::registry::category::infer_category;
use crate::registry::sources::{CatalogAdapter, ParsedPage};
use crate::registry::types::{
    Capabilities, ConfigurationContract, EnvVarSpec, InstallMethodKind, InstallationMethod,
    Registry, SearchRequest, Server, TransportKind, TrustMetadata,
};
use crate::utils::errors::{McpError, McpResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    servers: Vec<OfficialEntry>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default, alias = "nextCursor")]
    next_cursor: Option<String>,
}

/// Newer responses wrap each server as `{ "server": {...} }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OfficialEntry {
    Wrapped { server: OfficialServer },
    Bare(OfficialServer),
}

impl OfficialEntry {
    fn into_inner(self) -> OfficialServer {
        match self {
            OfficialEntry::Wrapped { server } => server,
            OfficialEntry::Bare(server) => server,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OfficialServer {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, alias = "versionDetail")]
    version_detail: Option<VersionDetail>,
    #[serde(default)]
    repository: Option<Repository>,
    #[serde(default)]
    packages: Vec<Package>,
    #[serde(default)]
    remotes: Vec<Remote>,
}

#[derive(Debug, Deserialize)]
struct VersionDetail {
    #[serde(default)]
    version: Option<String>,
    #[serde(default, alias = "releaseDate")]
    release_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(alias = "registryName", alias = "registry_type", alias = "registryType")]
    registry_name: String,
    #[serde(alias = "identifier")]
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, alias = "environmentVariables")]
    environment_variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentVariable {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "isRequired")]
    is_required: bool,
    #[serde(default, alias = "isSecret")]
    is_secret: bool,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Remote {
    #[serde(alias = "transportType", alias = "type")]
    transport_type: String,
}

pub struct OfficialAdapter;

impl CatalogAdapter for OfficialAdapter {
    fn search_params(&self, request: &SearchRequest) -> Vec<(String, String)> {
        vec![
            ("search".to_string(), request.search_text()),
            ("limit".to_string(), request.limit.to_string()),
        ]
    }

    fn parse_search(&self, registry: &Registry, body: &str) -> McpResult<ParsedPage> {
        let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("search response parse error: {}", e))
        })?;

        let servers: Vec<Server> = parsed
            .servers
            .into_iter()
            .map(|entry| to_server(entry.into_inner(), registry))
            .collect();

        let (total, has_more) = match parsed.metadata {
            Some(meta) => (meta.count, Some(meta.next_cursor.is_some())),
            None => (None, None),
        };
        Ok(ParsedPage {
            servers,
            total,
            has_more,
        })
    }

    fn parse_detail(&self, registry: &Registry, body: &str) -> McpResult<Server> {
        let entry: OfficialEntry = serde_json::from_str(body).map_err(|e| {
            McpError::registry(&registry.id, format!("detail response parse error: {}", e))
        })?;
        Ok(to_server(entry.into_inner(), registry))
    }
}

fn to_server(dto: OfficialServer, registry: &Registry) -> Server {
    let mut installation = Vec::new();
    let mut configuration = ConfigurationContract::default();
    let mut transports = Vec::new();

    for package in &dto.packages {
        installation.push(package_method(package));
        for var in &package.environment_variables {
            let spec = EnvVarSpec {
                name: var.name.clone(),
                description: var.description.clone(),
                sensitive: var.is_secret,
                default: var.default.clone(),
                validation: Vec::new(),
            };
            if var.is_required {
                configuration.required.push(spec);
            } else {
                configuration.optional.push(spec);
            }
        }
    }
    if !dto.packages.is_empty() {
        transports.push(TransportKind::Stdio);
    }
    for remote in &dto.remotes {
        if let Ok(kind) = remote.transport_type.parse::<TransportKind>() {
            if !transports.contains(&kind) {
                transports.push(kind);
            }
        }
    }

    let description = dto.description.unwrap_or_default();
    let category = infer_category([dto.name.as_str(), description.as_str()]);
    let version = dto
        .version
        .or_else(|| dto.version_detail.as_ref().and_then(|v| v.version.clone()))
        .unwrap_or_else(|| "latest".to_string());
    // Reverse-DNS names: "io.github.owner/server"
    let author = dto
        .name
        .split_once('/')
        .map(|(namespace, _)| namespace.rsplit('.').next().unwrap_or(namespace).to_string());

    Server {
        id: dto.id.unwrap_or_else(|| dto.name.clone()),
        name: dto.name,
        version,
        author,
        description,
        keywords: Vec::new(),
        category,
        capabilities: Capabilities::tools_only(),
        transports,
        installation,
        configuration,
        trust: TrustMetadata {
            verified: true,
            last_updated: dto.version_detail.and_then(|v| v.release_date),
            ..TrustMetadata::default()
        },
        repository: dto.repository.and_then(|r| r.url),
        registry_id: registry.id.clone(),
        registry_tier: registry.tier,
    }
}

fn package_method(package: &Package) -> InstallationMethod {
    let spec = match &package.version {
        Some(version) => format!("{}@{}", package.name, version),
        None => package.name.clone(),
    };
    let (kind, command, args) = match package.registry_name.to_lowercase().as_str() {
        "npm" => (
            InstallMethodKind::PackageManager,
            "npx",
            vec!["-y".to_string(), spec],
        ),
        "pypi" => (InstallMethodKind::PackageManager, "uvx", vec![package.name.clone()]),
        "docker" | "oci" => (
            InstallMethodKind::Container,
            "docker",
            vec!["run".to_string(), "-i".to_string(), "--rm".to_string(), package.name.clone()],
        ),
        _ => (InstallMethodKind::Custom, package.name.as_str(), Vec::new()),
    };

    InstallationMethod {
        kind,
        command: command.to_string(),
        args,
        env: BTreeMap::new(),
        install_command: None,
    }
}
