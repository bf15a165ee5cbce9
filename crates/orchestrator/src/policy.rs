//! Access policy: which backends a subscription tier may use.

use std::collections::BTreeMap;

use helix_config::AccessConfig;
use helix_core::Tier;

/// Maps a caller's tier to the ordered backend names it may use.
///
/// Implementations must be pure: the same tier always yields the same list.
pub trait AccessPolicy: Send + Sync {
    fn allowed_backends(&self, tier: Option<Tier>) -> Vec<String>;
}

/// Static per-tier grant table.
#[derive(Debug, Clone, Default)]
pub struct TierPolicy {
    grants: BTreeMap<Tier, Vec<String>>,
}

impl TierPolicy {
    /// Build from explicit grants. Duplicate names within a grant are
    /// dropped, keeping the first occurrence.
    pub fn new(grants: impl IntoIterator<Item = (Tier, Vec<String>)>) -> Self {
        let grants = grants
            .into_iter()
            .map(|(tier, names)| {
                let mut unique: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !unique.contains(&name) {
                        unique.push(name);
                    }
                }
                (tier, unique)
            })
            .collect();
        Self { grants }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            Tier::ALL
                .iter()
                .map(|&tier| (tier, config.allowed(tier).to_vec())),
        )
    }

    /// The tier whose grant is used when the caller's tier is unknown: the
    /// smallest non-empty grant, lower tiers winning ties.
    pub fn restrictive_tier(&self) -> Option<Tier> {
        self.grants
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .min_by_key(|(tier, names)| (names.len(), **tier))
            .map(|(tier, _)| *tier)
    }
}

impl AccessPolicy for TierPolicy {
    fn allowed_backends(&self, tier: Option<Tier>) -> Vec<String> {
        let Some(tier) = tier.or_else(|| self.restrictive_tier()) else {
            return Vec::new();
        };
        self.grants.get(&tier).cloned().unwrap_or_default()
    }
}
