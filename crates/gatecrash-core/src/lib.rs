//! Gatecrash Core - site registry, header rewriting, and cookie sweeping.
//!
//! This crate holds the background-process half of the bypass engine:
//!
//! - A static registry mapping domain fragments to bypass configurations
//! - A header rewrite engine deriving a disposable rule set from the
//!   registry plus user-added custom sites
//! - A cookie sweeper that purges host and domain cookies for a site
//! - The process-wide extension state mutated only via the messaging bridge
//!
//! The host environment (rule table, cookie store) is reached through traits
//! so the engine stays testable without a browser attached.

pub mod cookies;
pub mod error;
pub mod header_rules;
pub mod site_registry;
pub mod state;

pub use cookies::{Cookie, CookieStore, MemoryCookieStore};
pub use error::{HostError, Result};
pub use header_rules::{
    build_rules, rewrite_headers, HeaderEdit, HeaderOp, HeaderRule, HeaderRuleEngine,
    MemoryRuleHost, RuleHost,
};
pub use site_registry::{
    bundled_sites, fallback_lookup, generic_config, BypassMethod, ResolvedSite, SiteConfig,
    SiteRegistry, GOOGLEBOT_USER_AGENT, GOOGLE_REFERER,
};
pub use state::ExtensionState;
