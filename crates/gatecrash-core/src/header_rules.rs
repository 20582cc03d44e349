//! Header rewrite engine.
//!
//! Translates registry plus custom-site state into a rule set applied by the
//! host network layer before a request leaves the process. The rule set is
//! disposable: it is always recomputed in full from the current configuration
//! and installed with a remove-all-then-add-all replacement, never a partial
//! diff, so no stale rule outlives a configuration change.
//!
//! Hosts that only expose an imperative per-request hook use
//! [`rewrite_headers`] instead; both modes derive their edits from
//! [`header_edits`], so they produce the same header set for the same
//! configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HostError, Result};
use crate::site_registry::{SiteConfig, SiteRegistry, GOOGLEBOT_USER_AGENT, GOOGLE_REFERER};
use crate::state::ExtensionState;

// =============================================================================
// Rule Types
// =============================================================================

/// First rule id assigned to built-in sites.
pub const BUILTIN_RULE_ID_BASE: u32 = 1;

/// First rule id assigned to custom sites. Disjoint high range so custom
/// rules never collide with built-in ids.
pub const CUSTOM_RULE_ID_BASE: u32 = 1000;

/// Tracking headers dropped from every rewritten request.
pub const STRIPPED_HEADERS: &[&str] = &["X-Forwarded-For", "X-Real-Ip"];

/// Header edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderOp {
    /// Set the header to a value, replacing any existing one.
    Set,
    /// Remove the header.
    Remove,
}

/// One header modification within a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEdit {
    /// Header name.
    pub name: String,
    /// Operation to apply.
    pub op: HeaderOp,
    /// Value for `Set` operations; `None` for `Remove`.
    pub value: Option<String>,
}

impl HeaderEdit {
    /// Creates a set edit.
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: HeaderOp::Set,
            value: Some(value.into()),
        }
    }

    /// Creates a remove edit.
    pub fn remove(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: HeaderOp::Remove,
            value: None,
        }
    }
}

/// A single header-rewrite directive for the host network layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    /// Unique, monotonically assigned id.
    pub id: u32,
    /// Host URL filter, e.g. `*://*.nytimes.com/*`.
    pub url_pattern: String,
    /// Ordered header edits applied to matching requests.
    pub edits: Vec<HeaderEdit>,
}

/// Builds the URL pattern covering a domain fragment and its subdomains.
pub fn url_pattern(fragment: &str) -> String {
    format!("*://*.{}/*", fragment)
}

// =============================================================================
// Rule Derivation
// =============================================================================

/// Returns the header edits for a site configuration.
///
/// One edit per explicit override; a site with no overrides receives the
/// default pair (crawler User-Agent plus search-engine Referer) so every
/// registered site gets baseline treatment.
pub fn header_edits(config: &SiteConfig) -> Vec<HeaderEdit> {
    let mut edits = Vec::new();
    if let Some(user_agent) = &config.user_agent {
        edits.push(HeaderEdit::set("User-Agent", user_agent.clone()));
    }
    if let Some(referer) = &config.referer {
        edits.push(HeaderEdit::set("Referer", referer.clone()));
    }
    if edits.is_empty() {
        edits = default_edits();
    }
    edits
}

/// The default edit pair applied to sites without explicit overrides and to
/// every custom site.
pub fn default_edits() -> Vec<HeaderEdit> {
    vec![
        HeaderEdit::set("User-Agent", GOOGLEBOT_USER_AGENT),
        HeaderEdit::set("Referer", GOOGLE_REFERER),
    ]
}

/// Derives the full rule set from the registry and the custom sites.
///
/// Pure and deterministic: identical inputs yield identical rules, ids
/// included. One rule is emitted per header edit, matching the host's
/// one-directive-per-rule table shape.
pub fn build_rules(registry: &SiteRegistry, custom_sites: &[String]) -> Vec<HeaderRule> {
    let mut rules = Vec::new();

    let mut next_id = BUILTIN_RULE_ID_BASE;
    for site in registry.sites() {
        let pattern = url_pattern(&site.domain_fragment);
        for edit in header_edits(site) {
            rules.push(HeaderRule {
                id: next_id,
                url_pattern: pattern.clone(),
                edits: vec![edit],
            });
            next_id += 1;
        }
    }

    let mut next_id = CUSTOM_RULE_ID_BASE;
    for domain in custom_sites {
        let pattern = url_pattern(domain);
        for edit in default_edits() {
            rules.push(HeaderRule {
                id: next_id,
                url_pattern: pattern.clone(),
                edits: vec![edit],
            });
            next_id += 1;
        }
    }

    rules
}

/// Rewrites an outgoing request's headers for a matched site (procedural
/// interception mode).
///
/// Drops tracking headers, then applies the same edits the declarative rule
/// table would install for this configuration.
pub fn rewrite_headers(
    config: &SiteConfig,
    headers: &[(String, String)],
) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| {
            !STRIPPED_HEADERS
                .iter()
                .any(|stripped| stripped.eq_ignore_ascii_case(name))
        })
        .cloned()
        .collect();

    for edit in header_edits(config) {
        out.retain(|(name, _)| !name.eq_ignore_ascii_case(&edit.name));
        if edit.op == HeaderOp::Set {
            out.push((edit.name, edit.value.unwrap_or_default()));
        }
    }

    out
}

// =============================================================================
// Rule Host
// =============================================================================

/// Host-side dynamic rule table.
///
/// `replace` must be atomic: either the whole removal plus addition applies,
/// or the table is left exactly as it was.
pub trait RuleHost {
    /// Atomically removes the given rule ids and adds the given rules.
    fn replace(&mut self, remove_ids: &[u32], add: &[HeaderRule]) -> Result<()>;

    /// Returns the ids of all currently installed rules.
    fn rule_ids(&self) -> Vec<u32>;
}

/// Default quota for the in-memory rule table.
pub const DEFAULT_RULE_QUOTA: usize = 5000;

/// In-memory [`RuleHost`] used by the daemon and by tests.
#[derive(Debug)]
pub struct MemoryRuleHost {
    rules: BTreeMap<u32, HeaderRule>,
    quota: usize,
}

impl Default for MemoryRuleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuleHost {
    /// Creates an empty table with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_RULE_QUOTA)
    }

    /// Creates an empty table with a specific quota.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            rules: BTreeMap::new(),
            quota,
        }
    }

    /// Returns the installed rules in id order.
    pub fn rules(&self) -> Vec<HeaderRule> {
        self.rules.values().cloned().collect()
    }

    /// Returns the rules whose pattern covers the given fragment.
    pub fn rules_for_fragment(&self, fragment: &str) -> Vec<HeaderRule> {
        let pattern = url_pattern(fragment);
        self.rules
            .values()
            .filter(|rule| rule.url_pattern == pattern)
            .cloned()
            .collect()
    }
}

impl RuleHost for MemoryRuleHost {
    fn replace(&mut self, remove_ids: &[u32], add: &[HeaderRule]) -> Result<()> {
        // Validate everything before touching the table.
        for rule in add {
            if rule.url_pattern.trim().is_empty() {
                return Err(HostError::InvalidPattern(rule.url_pattern.clone()));
            }
        }
        let remaining = self
            .rules
            .keys()
            .filter(|id| !remove_ids.contains(id))
            .count();
        if remaining + add.len() > self.quota {
            return Err(HostError::QuotaExceeded(self.quota));
        }

        for id in remove_ids {
            self.rules.remove(id);
        }
        for rule in add {
            self.rules.insert(rule.id, rule.clone());
        }
        Ok(())
    }

    fn rule_ids(&self) -> Vec<u32> {
        self.rules.keys().copied().collect()
    }
}

// =============================================================================
// Header Rule Engine
// =============================================================================

/// Keeps the host rule table consistent with the current configuration.
///
/// Single-writer: one engine instance owns the install path. On a host
/// rejection the previous rule set stays in place, both in the host (by the
/// `replace` atomicity contract) and in the engine's own record.
#[derive(Debug, Default)]
pub struct HeaderRuleEngine {
    installed: Vec<HeaderRule>,
}

impl HeaderRuleEngine {
    /// Creates an engine with no rules installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire active rule set.
    pub fn install<H: RuleHost>(&mut self, host: &mut H, rules: Vec<HeaderRule>) -> Result<()> {
        let remove_ids = host.rule_ids();
        match host.replace(&remove_ids, &rules) {
            Ok(()) => {
                debug!(count = rules.len(), "installed header rule set");
                self.installed = rules;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "host rejected rule update, keeping previous rule set");
                Err(err)
            }
        }
    }

    /// Recomputes and installs the rule set for the current state.
    ///
    /// Must be re-invoked after every mutation to `custom_sites` or
    /// `enabled`. A disabled extension installs the empty set.
    pub fn refresh<H: RuleHost>(
        &mut self,
        host: &mut H,
        registry: &SiteRegistry,
        state: &ExtensionState,
    ) -> Result<()> {
        let rules = if state.enabled {
            build_rules(registry, &state.custom_sites)
        } else {
            Vec::new()
        };
        self.install(host, rules)
    }

    /// Returns the last successfully installed rule set.
    pub fn installed(&self) -> &[HeaderRule] {
        &self.installed
    }
}

// =============================================================================
// Tests
// =============================================================================
