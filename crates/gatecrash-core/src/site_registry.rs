//! Static site registry.
//!
//! Maps a domain fragment to a bypass configuration: which method to use,
//! which selectors mark the paywall UI, and which selectors mark the gated
//! article body. Lookup is "hostname contains fragment" on the lowercased
//! hostname; the first matching entry wins, so more specific fragments must
//! appear before shorter overlapping ones.
//!
//! Custom sites added at runtime carry no per-site configuration and always
//! resolve to the generic method with the heuristic selector set.

use serde::{Deserialize, Serialize};

// =============================================================================
// Bypass Method
// =============================================================================

/// Primary bypass strategy for a registered site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassMethod {
    /// Storage reset plus non-destructive hide/unhide.
    #[default]
    Generic,
    /// Spoof a search crawler User-Agent; page side only resets counters.
    Googlebot,
    /// Clear cookies and local/session storage, then retry.
    Cookies,
    /// Spoof a search-engine Referer; page side only resets counters.
    Referer,
    /// Aggressive element removal and script blocking.
    Adblock,
}

impl BypassMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassMethod::Generic => "generic",
            BypassMethod::Googlebot => "googlebot",
            BypassMethod::Cookies => "cookies",
            BypassMethod::Referer => "referer",
            BypassMethod::Adblock => "adblock",
        }
    }

    /// Parses a method from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" => Some(BypassMethod::Generic),
            "googlebot" => Some(BypassMethod::Googlebot),
            "cookies" => Some(BypassMethod::Cookies),
            "referer" => Some(BypassMethod::Referer),
            "adblock" => Some(BypassMethod::Adblock),
            _ => None,
        }
    }
}

impl std::fmt::Display for BypassMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Site Configuration
// =============================================================================

/// Spoofed crawler User-Agent installed for crawler-whitelisting sites.
pub const GOOGLEBOT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Search-engine Referer installed for referer-gated sites.
pub const GOOGLE_REFERER: &str = "https://www.google.com/";

/// Immutable bypass configuration for one registered domain fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Substring matched against the lowercased page hostname. Unique key.
    pub domain_fragment: String,
    /// Primary bypass strategy.
    pub method: BypassMethod,
    /// Selectors for elements considered part of the paywall UI.
    pub paywall_selectors: Vec<String>,
    /// Selectors for the gated content to reveal.
    pub article_selectors: Vec<String>,
    /// Whether the sweep should clear this site's cookies.
    pub clear_cookies: bool,
    /// Explicit User-Agent override, if any.
    pub user_agent: Option<String>,
    /// Explicit Referer override, if any.
    pub referer: Option<String>,
}

impl SiteConfig {
    /// Creates a generic configuration with no selectors or overrides.
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            domain_fragment: fragment.into(),
            method: BypassMethod::Generic,
            paywall_selectors: Vec::new(),
            article_selectors: Vec::new(),
            clear_cookies: true,
            user_agent: None,
            referer: None,
        }
    }

    /// Creates a crawler-spoofing configuration.
    pub fn googlebot(fragment: impl Into<String>) -> Self {
        Self::new(fragment)
            .with_method(BypassMethod::Googlebot)
            .with_user_agent(GOOGLEBOT_USER_AGENT)
    }

    /// Sets the bypass method.
    pub fn with_method(mut self, method: BypassMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the paywall selectors.
    pub fn with_paywall_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paywall_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the article selectors.
    pub fn with_article_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.article_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the User-Agent override.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the Referer override.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets whether cookies are cleared for this site.
    pub fn with_clear_cookies(mut self, clear: bool) -> Self {
        self.clear_cookies = clear;
        self
    }

    /// Checks if a hostname matches this configuration's fragment.
    ///
    /// The port is stripped and the comparison is case-insensitive.
    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.split(':').next().unwrap_or(hostname).to_lowercase();
        hostname.contains(&self.domain_fragment)
    }
}

// =============================================================================
// Bundled Sites
// =============================================================================

/// Returns the bundled site configurations.
///
/// Order matters: lookup is first-match-wins, so overlapping fragments must
/// keep the more specific one earlier.
pub fn bundled_sites() -> Vec<SiteConfig> {
    vec![
        // Major US news
        SiteConfig::googlebot("nytimes.com")
            .with_paywall_selectors([
                ".subscriptions-banner",
                ".expanded-dock",
                ".bottom-of-article",
                ".css-1s5me5j",
            ])
            .with_article_selectors([".StoryBodyCompanionColumn", ".ArticleBody"]),
        SiteConfig::googlebot("wsj.com")
            .with_paywall_selectors([".snippet-promotion", ".wsj-snippet-login"])
            .with_article_selectors([".article-content", ".article-body"]),
        SiteConfig::googlebot("washingtonpost.com")
            .with_paywall_selectors([".paywall", ".subscribe-slug"])
            .with_article_selectors([".article-body"]),
        SiteConfig::new("bloomberg.com")
            .with_method(BypassMethod::Referer)
            .with_referer(GOOGLE_REFERER)
            .with_paywall_selectors([".paywall", ".fence-body"])
            .with_article_selectors([".body-content"]),
        SiteConfig::googlebot("economist.com")
            .with_paywall_selectors([".subscription-required", ".paywall"])
            .with_article_selectors([".article__body-text"]),
        // UK news
        SiteConfig::googlebot("ft.com")
            .with_paywall_selectors([".subscription-prompt", ".barrier-body"])
            .with_article_selectors([".article__content-body"]),
        SiteConfig::googlebot("telegraph.co.uk")
            .with_paywall_selectors([".premium-paywall", ".paywall-prompt"])
            .with_article_selectors([".article-body-text"]),
        SiteConfig::new("independent.co.uk")
            .with_method(BypassMethod::Adblock)
            .with_paywall_selectors([".paywall", ".subscription-banner"])
            .with_article_selectors([".article-body"]),
        // Tech and business
        SiteConfig::googlebot("medium.com")
            .with_paywall_selectors([".paywall", ".memberPaywallInlineContent"])
            .with_article_selectors([".postArticle-content"]),
        SiteConfig::googlebot("wired.com")
            .with_paywall_selectors([".paywall-bar", ".paywall"])
            .with_article_selectors([".article__chunks"]),
        SiteConfig::googlebot("newyorker.com")
            .with_paywall_selectors([".paywall", ".subscription-bar"])
            .with_article_selectors([".SplitScreenContentHeaderPadding"]),
        SiteConfig::googlebot("theatlantic.com")
            .with_paywall_selectors([".c-article-gated-paywall", ".paywall"])
            .with_article_selectors([".c-article-body"]),
        SiteConfig::new("substack.com")
            .with_method(BypassMethod::Cookies)
            .with_paywall_selectors([".paywall-bar", ".paywall-full-content"]),
        // French news
        SiteConfig::googlebot("lemonde.fr")
            .with_paywall_selectors([".paywall", ".article__status-premium"])
            .with_article_selectors([".article__content"]),
        SiteConfig::googlebot("lefigaro.fr")
            .with_paywall_selectors([".paywall", ".fig-premium-paywall"])
            .with_article_selectors([".fig-content-body"]),
        // German news
        SiteConfig::new("bild.de")
            .with_method(BypassMethod::Cookies)
            .with_paywall_selectors([".paywall-overlay", ".vjs-modal-dialog"])
            .with_article_selectors([".txt"]),
        SiteConfig::googlebot("zeit.de")
            .with_paywall_selectors([".gate", ".paywall"])
            .with_article_selectors([".paragraph"]),
    ]
}

/// Well-known paywalled fragments used when the full registry is
/// unavailable to the page controller. Resolved with [`generic_config`].
pub const FALLBACK_FRAGMENTS: &[&str] = &[
    "nytimes.com",
    "wsj.com",
    "washingtonpost.com",
    "economist.com",
    "ft.com",
    "bloomberg.com",
    "reuters.com",
    "medium.com",
    "telegraph.co.uk",
    "wired.com",
    "newyorker.com",
    "theatlantic.com",
];

/// Heuristic paywall selectors applied to sites without a bundled entry.
pub const GENERIC_PAYWALL_SELECTORS: &[&str] = &[
    r#"[class*="paywall"]"#,
    r#"[id*="paywall"]"#,
    r#"[class*="subscription"]"#,
    r#"[class*="premium"]"#,
];

/// Heuristic article selectors applied to sites without a bundled entry.
pub const GENERIC_ARTICLE_SELECTORS: &[&str] = &[
    "article",
    ".article",
    r#"[class*="content"]"#,
    r#"[class*="body"]"#,
];

/// Builds the generic configuration used for custom and fallback sites.
pub fn generic_config(fragment: impl Into<String>) -> SiteConfig {
    SiteConfig::new(fragment)
        .with_paywall_selectors(GENERIC_PAYWALL_SELECTORS.iter().copied())
        .with_article_selectors(GENERIC_ARTICLE_SELECTORS.iter().copied())
}

// =============================================================================
// Site Registry
// =============================================================================

/// A resolved site: the matched fragment plus its effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSite {
    /// The fragment that matched the hostname.
    pub fragment: String,
    /// The effective bypass configuration.
    pub config: SiteConfig,
    /// True if the match came from a user-added custom site.
    pub custom: bool,
}

/// Immutable registry of bundled site configurations.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SiteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Creates a registry loaded with the bundled sites.
    pub fn with_defaults() -> Self {
        Self {
            sites: bundled_sites(),
        }
    }

    /// Creates a registry from explicit configurations. Registry order is
    /// lookup order.
    pub fn from_sites(sites: Vec<SiteConfig>) -> Self {
        Self { sites }
    }

    /// Returns the first entry whose fragment is a substring of the
    /// lowercased hostname, else `None`.
    pub fn lookup(&self, hostname: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.matches(hostname))
    }

    /// Returns true if the hostname matches any registered site.
    pub fn is_known(&self, hostname: &str) -> bool {
        self.lookup(hostname).is_some()
    }

    /// Resolves a hostname against the registry first, then the custom
    /// sites. Custom sites always receive the generic configuration.
    pub fn resolve(&self, hostname: &str, custom_sites: &[String]) -> Option<ResolvedSite> {
        if let Some(config) = self.lookup(hostname) {
            return Some(ResolvedSite {
                fragment: config.domain_fragment.clone(),
                config: config.clone(),
                custom: false,
            });
        }

        let hostname = hostname.split(':').next().unwrap_or(hostname).to_lowercase();
        custom_sites
            .iter()
            .find(|d| hostname.contains(d.as_str()))
            .map(|d| ResolvedSite {
                fragment: d.clone(),
                config: generic_config(d.clone()),
                custom: true,
            })
    }

    /// Returns all registered configurations in lookup order.
    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    /// Validates a user-supplied domain string.
    pub fn validate_domain(domain: &str) -> Result<(), String> {
        if domain.trim().is_empty() {
            return Err("Domain cannot be empty".to_string());
        }
        if domain.contains("://") {
            return Err("Domain should not include a scheme".to_string());
        }
        if domain.contains('/') {
            return Err("Domain should not include a path".to_string());
        }
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err("Domain contains invalid characters".to_string());
        }
        if !domain.contains('.') {
            return Err("Domain must include a TLD (e.g. .com)".to_string());
        }
        Ok(())
    }
}

/// Resolves a hostname against the fallback fragment list.
pub fn fallback_lookup(hostname: &str) -> Option<ResolvedSite> {
    let hostname = hostname.split(':').next().unwrap_or(hostname).to_lowercase();
    FALLBACK_FRAGMENTS
        .iter()
        .find(|fragment| hostname.contains(**fragment))
        .map(|fragment| ResolvedSite {
            fragment: (*fragment).to_string(),
            config: generic_config(*fragment),
            custom: false,
        })
}

// =============================================================================
// Tests
// =============================================================================
