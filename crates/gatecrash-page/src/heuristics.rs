//! Detection heuristics.
//!
//! Numeric and string constants used to classify elements as paywall-like,
//! article-like, or tracking scripts. Kept in one tunable struct rather
//! than scattered literals so they can be adjusted and unit-tested
//! independently of the state machine.

use std::time::Duration;

use regex::RegexSet;

/// Class/id keywords marking an element as paywall-like.
pub const DEFAULT_PAYWALL_KEYWORDS: &[&str] = &[
    "paywall",
    "subscription",
    "premium",
    "subscriber-only",
    "modal",
    "overlay",
];

/// Known vendor paywall selectors (TinyPass/Piano and friends).
pub const DEFAULT_VENDOR_SELECTORS: &[&str] =
    &[".tp-modal", ".tp-backdrop", r#"[data-testid*="paywall"]"#];

/// URL patterns of metering and paywall scripts, matched case-insensitively.
pub const DEFAULT_SCRIPT_PATTERNS: &[&str] = &[
    "(?i)paywall",
    "(?i)subscription",
    "(?i)meter",
    "(?i)premium",
    r"(?i)piano\.io",
    "(?i)tinypass",
];

/// Class names that commonly hide gated content.
pub const DEFAULT_HIDING_CLASSES: &[&str] = &["hidden", "hide", "blur", "fade"];

/// Class names that lock scrolling on the root or body element.
pub const DEFAULT_SCROLL_LOCK_CLASSES: &[&str] = &["no-scroll", "scroll-lock", "modal-open"];

/// Local-persistence counter keys reset to zero on every pass.
pub const DEFAULT_COUNTER_KEYS: &[&str] = &["articleCount", "visitCount", "freeArticlesRead"];

/// Local-persistence flag keys removed on every pass.
pub const DEFAULT_FLAG_KEYS: &[&str] = &["paywall", "subscription"];

/// Tunable detection thresholds and keyword sets.
#[derive(Debug, Clone)]
pub struct Heuristics {
    /// Keywords searched in class and id attributes.
    pub paywall_keywords: Vec<String>,
    /// Vendor-specific selectors probed alongside the keyword selectors.
    pub vendor_selectors: Vec<String>,
    /// Minimum (width, height) before a keyword-matched element is treated
    /// as a paywall overlay rather than small UI chrome.
    pub min_overlay_size: (f64, f64),
    /// Minimum text length before a hidden element is treated as likely
    /// article body.
    pub min_article_text_len: usize,
    /// Class names stripped when revealing content.
    pub hiding_classes: Vec<String>,
    /// Class names stripped from root/body to restore scrolling.
    pub scroll_lock_classes: Vec<String>,
    /// Counter keys set to "0" in local persistence.
    pub counter_keys: Vec<String>,
    /// Flag keys removed from local persistence.
    pub flag_keys: Vec<String>,
    /// Attempt ceiling for the bypass loop.
    pub max_attempts: u32,
    /// Delay before the post-pass re-check.
    pub recheck_delay: Duration,
    /// Shorter delay for mutation-triggered re-checks.
    pub mutation_recheck_delay: Duration,
    /// Compiled tracking-script URL patterns.
    script_patterns: RegexSet,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            paywall_keywords: to_strings(DEFAULT_PAYWALL_KEYWORDS),
            vendor_selectors: to_strings(DEFAULT_VENDOR_SELECTORS),
            min_overlay_size: (200.0, 100.0),
            min_article_text_len: 100,
            hiding_classes: to_strings(DEFAULT_HIDING_CLASSES),
            scroll_lock_classes: to_strings(DEFAULT_SCROLL_LOCK_CLASSES),
            counter_keys: to_strings(DEFAULT_COUNTER_KEYS),
            flag_keys: to_strings(DEFAULT_FLAG_KEYS),
            max_attempts: 3,
            recheck_delay: Duration::from_millis(2000),
            mutation_recheck_delay: Duration::from_millis(500),
            script_patterns: RegexSet::new(DEFAULT_SCRIPT_PATTERNS)
                .expect("default script patterns are valid"),
        }
    }
}

impl Heuristics {
    /// Creates the default heuristics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tracking-script patterns.
    pub fn with_script_patterns(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        self.script_patterns = RegexSet::new(patterns)?;
        Ok(self)
    }

    /// Sets the attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the probe selectors derived from the keyword list plus the
    /// vendor selectors, in a stable order.
    pub fn probe_selectors(&self) -> Vec<String> {
        let mut selectors = Vec::new();
        for keyword in &self.paywall_keywords {
            selectors.push(format!(r#"[class*="{}"]"#, keyword));
            selectors.push(format!(r#"[id*="{}"]"#, keyword));
        }
        selectors.extend(self.vendor_selectors.iter().cloned());
        selectors
    }

    /// Returns true if a script URL matches a metering/paywall pattern.
    pub fn is_tracking_script(&self, src: &str) -> bool {
        self.script_patterns.is_match(src)
    }

    /// Returns true if a class or id attribute contains a paywall keyword.
    pub fn is_paywall_like(&self, class_attr: &str, id_attr: &str) -> bool {
        let class_attr = class_attr.to_lowercase();
        let id_attr = id_attr.to_lowercase();
        self.paywall_keywords
            .iter()
            .any(|kw| class_attr.contains(kw.as_str()) || id_attr.contains(kw.as_str()))
    }

    /// Returns true if an element's bounding box is large enough to be a
    /// paywall overlay.
    pub fn exceeds_overlay_size(&self, size: (f64, f64)) -> bool {
        size.0 > self.min_overlay_size.0 && size.1 > self.min_overlay_size.1
    }

    /// Returns true if a hidden element's text is long enough to be likely
    /// article body.
    pub fn is_likely_article(&self, text_len: usize) -> bool {
        text_len > self.min_article_text_len
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
