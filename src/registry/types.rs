//! Registry types for MCP server metadata
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Domain category a server belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServerCategory {
    Database,
    Testing,
    Development,
    FileSystem,
    Web,
    Ai,
    Cloud,
    Communication,
    Productivity,
    Security,
    Monitoring,
    DataAnalysis,
    Other,
}

impl ServerCategory {
    /// Search keyword used when querying catalogs for this category
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Testing => "testing",
            Self::Development => "development",
            Self::FileSystem => "filesystem",
            Self::Web => "web",
            Self::Ai => "ai",
            Self::Cloud => "cloud",
            Self::Communication => "communication",
            Self::Productivity => "productivity",
            Self::Security => "security",
            Self::Monitoring => "monitoring",
            Self::DataAnalysis => "data",
            Self::Other => "mcp",
        }
    }
}

impl Default for ServerCategory {
    fn default() -> Self {
        ServerCategory::Other
    }
}

/// Protocol feature a server can declare
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Tools,
    Resources,
    Prompts,
    Sampling,
    Logging,
    Completion,
}

/// Declared capability flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Capabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
    pub sampling: bool,
    pub logging: bool,
    pub completion: bool,
}

impl Capabilities {
    /// Tools only, the common case for catalogs that declare nothing
    pub fn tools_only() -> Self {
        Self {
            tools: true,
            ..Self::default()
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Tools => self.tools,
            Capability::Resources => self.resources,
            Capability::Prompts => self.prompts,
            Capability::Sampling => self.sampling,
            Capability::Logging => self.logging,
            Capability::Completion => self.completion,
        }
    }

    pub fn set(&mut self, capability: Capability) {
        match capability {
            Capability::Tools => self.tools = true,
            Capability::Resources => self.resources = true,
            Capability::Prompts => self.prompts = true,
            Capability::Sampling => self.sampling = true,
            Capability::Logging => self.logging = true,
            Capability::Completion => self.completion = true,
        }
    }
}

/// Transport mechanism
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Stdio,
    Sse,
    Websocket,
    StreamableHttp,
}

impl Default for TransportKind {
    fn default() -> Self {
        TransportKind::Stdio
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "sse" => Ok(TransportKind::Sse),
            "ws" | "websocket" => Ok(TransportKind::Websocket),
            "streamable" | "streamable-http" | "streamable_http" | "http" => {
                Ok(TransportKind::StreamableHttp)
            }
            _ => Err(format!("Unknown transport type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMethodKind {
    /// `npx`, `uvx` and friends
    PackageManager,
    Container,
    /// Interpreter invoked directly (`python -m`, `node`)
    Runtime,
    Binary,
    Custom,
}

/// One way of getting a server running locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallationMethod {
    pub kind: InstallMethodKind,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Optional one-off step run before the server is first started
    #[serde(default)]
    pub install_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", content = "value", rename_all = "camelCase")]
pub enum ValidationRule {
    NonEmpty,
    MinLength(usize),
    MaxLength(usize),
    OneOf(Vec<String>),
    Url,
    Numeric,
}

impl ValidationRule {
    /// Returns a description of the violation, if any
    pub fn check(&self, value: &str) -> Option<String> {
        match self {
            Self::NonEmpty if value.trim().is_empty() => Some("must not be empty".to_string()),
            Self::MinLength(min) if value.chars().count() < *min => {
                Some(format!("must be at least {} characters", min))
            }
            Self::MaxLength(max) if value.chars().count() > *max => {
                Some(format!("must be at most {} characters", max))
            }
            Self::OneOf(allowed) if !allowed.iter().any(|a| a == value) => {
                Some(format!("must be one of {}", allowed.join(", ")))
            }
            Self::Url if url::Url::parse(value).is_err() => Some("must be a valid URL".to_string()),
            Self::Numeric if value.parse::<f64>().is_err() => Some("must be numeric".to_string()),
            _ => None,
        }
    }
}

/// Environment variable the server reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub validation: Vec<ValidationRule>,
}

impl EnvVarSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            sensitive: false,
            default: None,
            validation: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExampleConfiguration {
    pub name: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// What a server needs to be configured with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigurationContract {
    pub required: Vec<EnvVarSpec>,
    pub optional: Vec<EnvVarSpec>,
    pub examples: Vec<ExampleConfiguration>,
}

impl ConfigurationContract {
    pub fn variables(&self) -> impl Iterator<Item = &EnvVarSpec> {
        self.required.iter().chain(self.optional.iter())
    }
}

/// Community and trust signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TrustMetadata {
    pub downloads: u64,
    pub stars: u64,
    pub verified: bool,
    pub security_score: Option<f64>,
    pub performance_score: Option<f64>,
    pub community_score: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// An installable server as advertised by one catalog
///
/// Produced fresh by every catalog query and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: ServerCategory,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub transports: Vec<TransportKind>,
    #[serde(default)]
    pub installation: Vec<InstallationMethod>,
    #[serde(default)]
    pub configuration: ConfigurationContract,
    #[serde(default)]
    pub trust: TrustMetadata,
    #[serde(default)]
    pub repository: Option<String>,
    /// Registry that advertised this server
    pub registry_id: String,
    #[serde(default)]
    pub registry_tier: RegistryTier,
}

impl Server {
    pub fn is_verified(&self) -> bool {
        self.trust.verified
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RegistryTier {
    Official,
    Community,
    Enterprise,
    Private,
}

impl Default for RegistryTier {
    fn default() -> Self {
        RegistryTier::Community
    }
}

impl RegistryTier {
    pub fn is_trusted(&self) -> bool {
        matches!(self, RegistryTier::Official | RegistryTier::Enterprise)
    }
}

/// Native wire format of a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Official,
    Github,
    Npm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredRateLimit {
    pub requests: u32,
    pub window_secs: u64,
}

/// How to talk to a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryApi {
    /// Path appended to the base URL for searches
    pub search_endpoint: String,
    /// Path template for detail lookups, `{id}` is substituted
    pub detail_endpoint: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub rate_limit: Option<DeclaredRateLimit>,
}

/// One catalog source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub kind: CatalogKind,
    pub tier: RegistryTier,
    /// Lower values are queried and merged first
    pub priority: u32,
    pub active: bool,
    #[serde(default)]
    pub api: Option<RegistryApi>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

pub const OFFICIAL_REGISTRY_ID: &str = "official";
pub const GITHUB_REGISTRY_ID: &str = "github";
pub const NPM_REGISTRY_ID: &str = "npm";

impl Registry {
    /// The three catalogs the hub knows out of the box
    pub fn builtin() -> Vec<Registry> {
        let user_agent = format!("mcp-hub/{}", env!("CARGO_PKG_VERSION"));
        vec![
            Registry {
                id: OFFICIAL_REGISTRY_ID.to_string(),
                name: "Official MCP Registry".to_string(),
                base_url: "https://registry.modelcontextprotocol.io".to_string(),
                kind: CatalogKind::Official,
                tier: RegistryTier::Official,
                priority: 1,
                active: true,
                api: Some(RegistryApi {
                    search_endpoint: "/v0/servers".to_string(),
                    detail_endpoint: "/v0/servers/{id}".to_string(),
                    headers: BTreeMap::from([(
                        "Accept".to_string(),
                        "application/json".to_string(),
                    )]),
                    rate_limit: Some(DeclaredRateLimit {
                        requests: 60,
                        window_secs: 60,
                    }),
                }),
                last_sync: None,
            },
            Registry {
                id: GITHUB_REGISTRY_ID.to_string(),
                name: "GitHub".to_string(),
                base_url: "https://api.github.com".to_string(),
                kind: CatalogKind::Github,
                tier: RegistryTier::Community,
                priority: 2,
                active: true,
                api: Some(RegistryApi {
                    search_endpoint: "/search/repositories".to_string(),
                    detail_endpoint: "/repos/{id}".to_string(),
                    headers: BTreeMap::from([
                        (
                            "Accept".to_string(),
                            "application/vnd.github+json".to_string(),
                        ),
                        ("User-Agent".to_string(), user_agent.clone()),
                    ]),
                    rate_limit: Some(DeclaredRateLimit {
                        requests: 10,
                        window_secs: 60,
                    }),
                }),
                last_sync: None,
            },
            Registry {
                id: NPM_REGISTRY_ID.to_string(),
                name: "npm".to_string(),
                base_url: "https://registry.npmjs.org".to_string(),
                kind: CatalogKind::Npm,
                tier: RegistryTier::Community,
                priority: 3,
                active: true,
                api: Some(RegistryApi {
                    search_endpoint: "/-/v1/search".to_string(),
                    detail_endpoint: "/{id}".to_string(),
                    headers: BTreeMap::from([("User-Agent".to_string(), user_agent)]),
                    rate_limit: Some(DeclaredRateLimit {
                        requests: 100,
                        window_secs: 60,
                    }),
                }),
                last_sync: None,
            },
        ]
    }

    pub fn search_endpoint(&self) -> &str {
        self.api
            .as_ref()
            .map(|api| api.search_endpoint.as_str())
            .unwrap_or("")
    }

    pub fn detail_path(&self, server_id: &str) -> String {
        let template = self
            .api
            .as_ref()
            .map(|api| api.detail_endpoint.as_str())
            .unwrap_or("/{id}");
        template.replace("{id}", server_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Relevance,
    Downloads,
    Stars,
    Updated,
    Name,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Caller-facing search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub category: Option<ServerCategory>,
    pub capabilities: Vec<Capability>,
    pub transports: Vec<TransportKind>,
    pub verified_only: bool,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: Option<SortKey>,
    pub sort_order: SortOrder,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            capabilities: Vec::new(),
            transports: Vec::new(),
            verified_only: false,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl SearchRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Canonical form: trimmed lowercase query, sorted de-duplicated lists,
    /// clamped limit. Structurally equal requests normalize identically.
    pub fn normalized(&self) -> SearchRequest {
        let query = self
            .query
            .as_deref()
            .map(|q| q.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .filter(|q| !q.is_empty());

        let mut capabilities = self.capabilities.clone();
        capabilities.sort();
        capabilities.dedup();

        let mut transports = self.transports.clone();
        transports.sort();
        transports.dedup();

        SearchRequest {
            query,
            category: self.category,
            capabilities,
            transports,
            verified_only: self.verified_only,
            limit: self.limit.clamp(1, MAX_SEARCH_LIMIT),
            offset: self.offset,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }

    /// Text sent to catalogs: the query, else the category keyword, else "mcp"
    pub fn search_text(&self) -> String {
        self.query
            .clone()
            .or_else(|| self.category.map(|c| c.keyword().to_string()))
            .unwrap_or_else(|| "mcp".to_string())
    }

    /// Filters catalogs cannot apply server-side
    pub fn matches(&self, server: &Server) -> bool {
        if let Some(category) = self.category {
            if server.category != category {
                return false;
            }
        }
        if self.verified_only && !server.is_verified() {
            return false;
        }
        if !self
            .capabilities
            .iter()
            .all(|c| server.capabilities.supports(*c))
        {
            return false;
        }
        if !self.transports.is_empty()
            && !self.transports.iter().any(|t| server.transports.contains(t))
        {
            return false;
        }
        true
    }
}

/// One registry's answer to a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySearchResult {
    pub registry_id: String,
    pub servers: Vec<Server>,
    pub total: usize,
    pub has_more: bool,
    pub search_time_ms: u64,
    pub cache_hit: bool,
}
