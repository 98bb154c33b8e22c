//! Catalog-specific wire formats
//!
//! Each catalog gets a transfer struct matching its JSON and one pure mapping
//! function into [`Server`]. Schema drift stays inside that catalog's module.

pub mod github;
pub mod npm;
pub mod official;

use crate::registry::types::{CatalogKind, Registry, SearchRequest, Server};
use crate::utils::errors::McpResult;

/// One page of a catalog's search response, already mapped
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub servers: Vec<Server>,
    /// Total hits reported by the catalog, if it reports one
    pub total: Option<usize>,
    pub has_more: Option<bool>,
}

pub trait CatalogAdapter: Send + Sync {
    /// Query-string parameters for a search
    fn search_params(&self, request: &SearchRequest) -> Vec<(String, String)>;

    fn parse_search(&self, registry: &Registry, body: &str) -> McpResult<ParsedPage>;

    fn parse_detail(&self, registry: &Registry, body: &str) -> McpResult<Server>;

    /// Server id as it appears in the detail path
    fn encode_id(&self, server_id: &str) -> String {
        server_id.to_string()
    }
}

pub fn adapter_for(kind: CatalogKind) -> Box<dyn CatalogAdapter> {
    match kind {
        CatalogKind::Official => Box::new(official::OfficialAdapter),
        CatalogKind::Github => Box::new(github::GithubAdapter),
        CatalogKind::Npm => Box::new(npm::NpmAdapter),
    }
}
