//! Process-wide extension state.
//!
//! A single `ExtensionState` instance is owned by the background process and
//! mutated only through the messaging bridge. Every mutation is persisted
//! before the header rule set is refreshed.

use serde::{Deserialize, Serialize};

/// Mutable process-wide state: the global enabled flag and the set of
/// user-added custom sites.
///
/// Custom sites are bare domain strings. Insertion order is preserved for
/// display purposes; uniqueness is enforced on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionState {
    /// Whether bypassing is active. Defaults to true.
    pub enabled: bool,
    /// User-added domains, always resolved with the generic method.
    #[serde(default)]
    pub custom_sites: Vec<String>,
}

impl Default for ExtensionState {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_sites: Vec::new(),
        }
    }
}

impl ExtensionState {
    /// Creates the default state (enabled, no custom sites).
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the enabled flag and returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Adds a custom site. Returns false if the domain was already present
    /// or empty after normalization.
    pub fn add_custom_site(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        if domain.is_empty() || self.custom_sites.contains(&domain) {
            return false;
        }
        self.custom_sites.push(domain);
        true
    }

    /// Removes a custom site. Returns true if it was present.
    pub fn remove_custom_site(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        let before = self.custom_sites.len();
        self.custom_sites.retain(|d| d != &domain);
        self.custom_sites.len() != before
    }

    /// Bulk-applies a settings object. Recognized keys are `enabled` (bool)
    /// and `customSites` (array of strings); unknown keys are ignored.
    ///
    /// Returns true if anything changed.
    pub fn apply_settings(&mut self, settings: &serde_json::Value) -> bool {
        let mut changed = false;

        if let Some(enabled) = settings.get("enabled").and_then(|v| v.as_bool()) {
            if self.enabled != enabled {
                self.enabled = enabled;
                changed = true;
            }
        }

        if let Some(sites) = settings.get("customSites").and_then(|v| v.as_array()) {
            let mut replacement = Vec::new();
            for site in sites.iter().filter_map(|v| v.as_str()) {
                let site = normalize_domain(site);
                if !site.is_empty() && !replacement.contains(&site) {
                    replacement.push(site);
                }
            }
            if self.custom_sites != replacement {
                self.custom_sites = replacement;
                changed = true;
            }
        }

        changed
    }
}

/// Lowercases and trims a domain string.
fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}
