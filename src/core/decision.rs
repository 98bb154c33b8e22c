//! Confidence scoring and candidate ranking for unattended installs
//!
//! All weights are fixed heuristics. Scores only ever add up and are clamped
//! at [`MAX_SCORE`].

use crate::config::types::AutoInstallSettings;
use crate::registry::types::{Capability, Server, ServerCategory};
use std::cmp::Ordering;

pub const BASE_CONFIDENCE: f64 = 0.5;
pub const VERIFIED_BONUS: f64 = 0.3;
pub const POPULARITY_BONUS: f64 = 0.1;
pub const DOWNLOADS_BONUS: f64 = 0.1;
pub const TRUSTED_TIER_BONUS: f64 = 0.1;
pub const MAX_SCORE: f64 = 1.0;
/// Tolerance when comparing summed scores against a threshold
const SCORE_EPSILON: f64 = 1e-9;

/// Stars above this count earn [`POPULARITY_BONUS`]
pub const STAR_THRESHOLD: u64 = 100;
/// Downloads above this count earn [`DOWNLOADS_BONUS`]
pub const DOWNLOAD_THRESHOLD: u64 = 1_000;

pub const RANK_CAPABILITY_WEIGHT: f64 = 0.4;
pub const RANK_CATEGORY_WEIGHT: f64 = 0.2;
pub const RANK_POPULARITY_WEIGHT: f64 = 0.2;
pub const RANK_VERIFIED_WEIGHT: f64 = 0.2;
/// Stars at which the ranking popularity term saturates
pub const RANK_POPULARITY_SCALE: f64 = 1_000.0;

/// Only this many ranked candidates are attempted per batch
pub const MAX_AUTO_INSTALL_CANDIDATES: usize = 5;

/// What a project appears to need
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirements {
    pub category: Option<ServerCategory>,
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub server: Server,
    pub score: f64,
}

/// How safe `server` looks for unattended installation, in [0, 1]
pub fn confidence_score(server: &Server) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if server.is_verified() {
        score += VERIFIED_BONUS;
    }
    if server.trust.stars > STAR_THRESHOLD {
        score += POPULARITY_BONUS;
    }
    if server.trust.downloads > DOWNLOAD_THRESHOLD {
        score += DOWNLOADS_BONUS;
    }
    if server.registry_tier.is_trusted() {
        score += TRUSTED_TIER_BONUS;
    }
    score.min(MAX_SCORE)
}

/// `Ok(confidence)` when every auto-install condition holds, otherwise the
/// first failing condition
pub fn check_auto_install(server: &Server, settings: &AutoInstallSettings) -> Result<f64, String> {
    if !settings.enabled {
        return Err("auto-install is disabled".to_string());
    }
    if settings.blocked_servers.iter().any(|id| id == &server.id) {
        return Err("server is block-listed".to_string());
    }
    if !settings.allowed_categories.contains(&server.category) {
        return Err(format!("category {:?} is not allowed", server.category));
    }
    if settings.require_verification && !server.is_verified() {
        return Err("server is not verified".to_string());
    }
    let confidence = confidence_score(server);
    if confidence + SCORE_EPSILON < settings.confidence_threshold {
        return Err(format!(
            "confidence {:.2} is below threshold {:.2}",
            confidence, settings.confidence_threshold
        ));
    }
    Ok(confidence)
}

pub fn is_auto_install_allowed(server: &Server, settings: &AutoInstallSettings) -> bool {
    check_auto_install(server, settings).is_ok()
}

/// Fit of `server` to `requirements`, in [0, 1]
pub fn candidate_score(server: &Server, requirements: &Requirements) -> f64 {
    let capability_fraction = if requirements.capabilities.is_empty() {
        0.0
    } else {
        let declared = requirements
            .capabilities
            .iter()
            .filter(|c| server.capabilities.supports(**c))
            .count();
        declared as f64 / requirements.capabilities.len() as f64
    };

    let category_match = match requirements.category {
        Some(category) if category == server.category => 1.0,
        _ => 0.0,
    };

    let popularity = (server.trust.stars as f64 / RANK_POPULARITY_SCALE).min(1.0);
    let verified = if server.is_verified() { 1.0 } else { 0.0 };

    let score = RANK_CAPABILITY_WEIGHT * capability_fraction
        + RANK_CATEGORY_WEIGHT * category_match
        + RANK_POPULARITY_WEIGHT * popularity
        + RANK_VERIFIED_WEIGHT * verified;
    score.min(MAX_SCORE)
}

/// Best fit first. Equal scores fall back to server id so the order is stable
/// across runs.
pub fn rank_candidates(servers: Vec<Server>, requirements: &Requirements) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = servers
        .into_iter()
        .map(|server| RankedCandidate {
            score: candidate_score(&server, requirements),
            server,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.server.id.cmp(&b.server.id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{Capabilities, RegistryTier, TrustMetadata};

    fn server(id: &str, verified: bool, stars: u64, downloads: u64) -> Server {
        Server {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: String::new(),
            keywords: Vec::new(),
            category: ServerCategory::Testing,
            capabilities: Capabilities::tools_only(),
            transports: Vec::new(),
            installation: Vec::new(),
            configuration: Default::default(),
            trust: TrustMetadata {
                verified,
                stars,
                downloads,
                ..TrustMetadata::default()
            },
            repository: None,
            registry_id: "github".to_string(),
            registry_tier: RegistryTier::Community,
        }
    }

    fn enabled_settings(threshold: f64) -> AutoInstallSettings {
        AutoInstallSettings {
            enabled: true,
            confidence_threshold: threshold,
            ..AutoInstallSettings::default()
        }
    }

    #[test]
    fn test_confidence_components() {
        assert_eq!(confidence_score(&server("a", false, 0, 0)), 0.5);
        assert!((confidence_score(&server("a", true, 0, 0)) - 0.8).abs() < 1e-9);
        assert!((confidence_score(&server("a", true, 101, 0)) - 0.9).abs() < 1e-9);
        // thresholds are exclusive
        assert!((confidence_score(&server("a", true, 100, 1_000)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut s = server("a", true, 5_000, 50_000);
        s.registry_tier = RegistryTier::Official;
        assert_eq!(confidence_score(&s), 1.0);
    }

    #[test]
    fn test_confidence_is_monotonic() {
        for (stars, downloads) in [(0, 0), (150, 0), (0, 2_000), (150, 2_000)] {
            for tier in [RegistryTier::Community, RegistryTier::Official] {
                let mut plain = server("a", false, stars, downloads);
                plain.registry_tier = tier;
                let mut verified = plain.clone();
                verified.trust.verified = true;
                let mut popular = plain.clone();
                popular.trust.stars = stars + 1_000;

                let base = confidence_score(&plain);
                assert!(confidence_score(&verified) >= base);
                assert!(confidence_score(&popular) >= base);
                assert!((0.0..=1.0).contains(&confidence_score(&verified)));
            }
        }
    }

    #[test]
    fn test_below_threshold_is_rejected() {
        let err = check_auto_install(&server("a", true, 0, 0), &enabled_settings(0.9)).unwrap_err();
        assert!(err.contains("below threshold"));
        let confidence = check_auto_install(&server("a", true, 0, 0), &enabled_settings(0.8)).unwrap();
        assert!((confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_every_condition_required() {
        let good = server("a", true, 500, 5_000);
        assert!(is_auto_install_allowed(&good, &enabled_settings(0.8)));

        assert!(!is_auto_install_allowed(&good, &AutoInstallSettings::default()));

        let mut blocked = enabled_settings(0.8);
        blocked.blocked_servers = vec!["a".to_string()];
        assert!(!is_auto_install_allowed(&good, &blocked));

        let mut web = good.clone();
        web.category = ServerCategory::Web;
        assert!(!is_auto_install_allowed(&web, &enabled_settings(0.8)));

        let unverified = server("a", false, 500, 5_000);
        assert!(!is_auto_install_allowed(&unverified, &enabled_settings(0.5)));
        let mut relaxed = enabled_settings(0.5);
        relaxed.require_verification = false;
        assert!(is_auto_install_allowed(&unverified, &relaxed));
    }

    #[test]
    fn test_candidate_score_weights() {
        let requirements = Requirements {
            category: Some(ServerCategory::Testing),
            capabilities: vec![Capability::Tools, Capability::Resources],
        };
        // half the capabilities, category match, 500 stars, verified
        let score = candidate_score(&server("a", true, 500, 0), &requirements);
        assert!((score - (0.2 + 0.2 + 0.1 + 0.2)).abs() < 1e-9);

        let none = Requirements::default();
        assert_eq!(candidate_score(&server("b", false, 0, 0), &none), 0.0);
    }

    #[test]
    fn test_ranking_is_descending_and_deterministic() {
        let requirements = Requirements {
            category: Some(ServerCategory::Testing),
            capabilities: vec![Capability::Tools],
        };
        let servers = vec![
            server("c", false, 10, 0),
            server("a", true, 2_000, 0),
            server("b", false, 10, 0),
            server("d", true, 300, 0),
        ];

        let first = rank_candidates(servers.clone(), &requirements);
        let second = rank_candidates(servers.into_iter().rev().collect(), &requirements);

        let ids: Vec<&str> = first.iter().map(|c| c.server.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "b", "c"]);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
