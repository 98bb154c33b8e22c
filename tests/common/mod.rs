#![allow(dead_code)]

use mcp_hub::registry::types::{Registry, GITHUB_REGISTRY_ID, NPM_REGISTRY_ID, OFFICIAL_REGISTRY_ID};
use serde_json::{json, Value};

fn builtin(id: &str, base_url: &str) -> Registry {
    let mut registry = Registry::builtin()
        .into_iter()
        .find(|r| r.id == id)
        .expect("builtin registry");
    registry.base_url = base_url.to_string();
    registry
}

pub fn npm_registry(base_url: &str) -> Registry {
    builtin(NPM_REGISTRY_ID, base_url)
}

pub fn github_registry(base_url: &str) -> Registry {
    builtin(GITHUB_REGISTRY_ID, base_url)
}

pub fn official_registry(base_url: &str) -> Registry {
    builtin(OFFICIAL_REGISTRY_ID, base_url)
}

/// One entry of an npm `/-/v1/search` response
pub fn npm_object(name: &str, keywords: &[&str], monthly_downloads: u64) -> Value {
    json!({
        "package": {
            "name": name,
            "version": "1.0.0",
            "description": format!("{} server", name),
            "keywords": keywords,
            "publisher": {"username": "someone"}
        },
        "downloads": {"monthly": monthly_downloads}
    })
}

pub fn npm_search_body(objects: Vec<Value>) -> Value {
    let total = objects.len();
    json!({ "objects": objects, "total": total })
}

pub fn github_search_body(full_names: &[&str]) -> Value {
    let items: Vec<Value> = full_names
        .iter()
        .map(|full_name| {
            let (owner, name) = full_name.split_once('/').unwrap_or(("someone", full_name));
            json!({
                "full_name": full_name,
                "name": name,
                "description": "MCP server for testing",
                "topics": ["mcp", "testing"],
                "stargazers_count": 250,
                "html_url": format!("https://github.com/{}", full_name),
                "owner": {"login": owner}
            })
        })
        .collect();
    json!({ "total_count": items.len(), "items": items })
}
