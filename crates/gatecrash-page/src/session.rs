//! Per-page bypass state machine.
//!
//! A `BypassSession` is created once per page load. The host drives it:
//! `begin` on load, `on_recheck` when a scheduled delay fires, and
//! `on_mutation` when the document changes. The session never sleeps or
//! spawns; it only returns a `Schedule` telling the host what to arm next.

use std::time::Duration;

use tracing::{debug, warn};

use gatecrash_core::site_registry::{fallback_lookup, BypassMethod, ResolvedSite, SiteRegistry};

use crate::dom::{BackgroundPort, ClientState, PageDocument, PageNode};
use crate::heuristics::Heuristics;

// ====== Phases ======

/// Lifecycle of a bypass session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created but not started, or started on a page with no matching site.
    Idle,
    /// Checking enablement and resolving the site.
    Probing,
    /// Running a bypass pass.
    Bypassing,
    /// Waiting between passes, watching for re-inserted paywalls.
    Observing,
    /// Attempt ceiling reached. Terminal.
    Exhausted,
}

/// What the host should arm after a session call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Call `on_recheck` after this delay.
    Recheck(Duration),
}

// ====== Session ======

/// State machine for bypassing a single page.
pub struct BypassSession<P: BackgroundPort> {
    hostname: String,
    phase: Phase,
    attempts: u32,
    site: Option<ResolvedSite>,
    heuristics: Heuristics,
    port: P,
}

impl<P: BackgroundPort> BypassSession<P> {
    pub fn new(hostname: impl Into<String>, port: P) -> Self {
        Self::with_heuristics(hostname, port, Heuristics::default())
    }

    pub fn with_heuristics(hostname: impl Into<String>, port: P, heuristics: Heuristics) -> Self {
        let hostname: String = hostname.into();
        Self {
            hostname: hostname.to_lowercase(),
            phase: Phase::Idle,
            attempts: 0,
            site: None,
            heuristics,
            port,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn site(&self) -> Option<&ResolvedSite> {
        self.site.as_ref()
    }

    /// Starts the session: checks enablement, resolves the site, and if it
    /// matches runs the first pass.
    ///
    /// When no registry is supplied the bundled fallback fragment list is
    /// consulted instead. A dead background channel counts as enabled.
    pub fn begin<D, C>(
        &mut self,
        doc: &D,
        registry: Option<&SiteRegistry>,
        client: &mut C,
    ) -> Option<Schedule>
    where
        D: PageDocument,
        C: ClientState,
    {
        self.phase = Phase::Probing;

        let enabled = match self.port.get_status() {
            Ok(enabled) => enabled,
            Err(err) => {
                debug!(error = %err, "status check failed, assuming enabled");
                true
            }
        };
        if !enabled {
            self.phase = Phase::Idle;
            return None;
        }

        self.site = match registry {
            Some(registry) => {
                let custom = self.port.custom_sites().unwrap_or_default();
                registry.resolve(&self.hostname, &custom)
            }
            None => fallback_lookup(&self.hostname),
        };
        if self.site.is_none() {
            debug!(hostname = %self.hostname, "no matching site, staying idle");
            self.phase = Phase::Idle;
            return None;
        }

        self.run_pass(doc, client);
        self.phase = Phase::Observing;
        Some(Schedule::Recheck(self.heuristics.recheck_delay))
    }

    /// Called when a scheduled re-check fires. Runs another pass if the
    /// paywall is still visible and attempts remain.
    pub fn on_recheck<D, C>(&mut self, doc: &D, client: &mut C) -> Option<Schedule>
    where
        D: PageDocument,
        C: ClientState,
    {
        if self.phase != Phase::Observing {
            return None;
        }
        if !self.paywall_visible(doc) {
            debug!(hostname = %self.hostname, "paywall cleared");
            return None;
        }
        if self.attempts >= self.heuristics.max_attempts {
            self.phase = Phase::Exhausted;
            warn!(
                hostname = %self.hostname,
                attempts = self.attempts,
                "attempt ceiling reached, giving up"
            );
            return None;
        }

        self.run_pass(doc, client);
        if self.attempts >= self.heuristics.max_attempts {
            self.phase = Phase::Exhausted;
            return None;
        }
        self.phase = Phase::Observing;
        Some(Schedule::Recheck(self.heuristics.recheck_delay))
    }

    /// Called when the document mutates. Schedules a short re-check if the
    /// added element looks paywall-like and the session can still act.
    pub fn on_mutation(&mut self, class_attr: &str, id_attr: &str) -> Option<Schedule> {
        if self.phase != Phase::Observing {
            return None;
        }
        if self.attempts >= self.heuristics.max_attempts {
            return None;
        }
        if !self.heuristics.is_paywall_like(class_attr, id_attr) {
            return None;
        }
        Some(Schedule::Recheck(self.heuristics.mutation_recheck_delay))
    }

    // ====== Pass internals ======

    fn run_pass<D, C>(&mut self, doc: &D, client: &mut C)
    where
        D: PageDocument,
        C: ClientState,
    {
        let site = match self.site.clone() {
            Some(site) => site,
            None => return,
        };
        self.phase = Phase::Bypassing;
        self.attempts += 1;
        debug!(
            hostname = %self.hostname,
            fragment = %site.fragment,
            method = %site.config.method,
            attempt = self.attempts,
            "running bypass pass"
        );

        match site.config.method {
            BypassMethod::Cookies => {
                if let Err(err) = self.port.clear_cookies(&self.hostname) {
                    warn!(error = %err, "cookie sweep request failed");
                }
                self.spoof_client_state(client);
                self.remove_paywall_elements(doc, &site, false);
            }
            BypassMethod::Adblock => {
                self.spoof_client_state(client);
                self.remove_paywall_elements(doc, &site, true);
            }
            // Googlebot and referer sites are handled at the header layer;
            // the page pass only resets metering state.
            BypassMethod::Googlebot | BypassMethod::Referer => {
                self.spoof_client_state(client);
            }
            BypassMethod::Generic => {
                self.spoof_client_state(client);
                self.remove_paywall_elements(doc, &site, false);
            }
        }

        if !matches!(
            site.config.method,
            BypassMethod::Googlebot | BypassMethod::Referer
        ) {
            self.reveal_content(doc, &site);
            self.unlock_scrolling(doc);
            self.strip_tracking_scripts(doc);
        }
    }

    /// Hides configured paywall elements, then probes the heuristic
    /// selectors, hiding anything big enough to be an overlay. When
    /// `aggressive` is set matched elements are detached instead of hidden.
    fn remove_paywall_elements<D: PageDocument>(
        &self,
        doc: &D,
        site: &ResolvedSite,
        aggressive: bool,
    ) {
        for selector in &site.config.paywall_selectors {
            match doc.select(selector) {
                Ok(nodes) => {
                    for node in nodes {
                        if aggressive {
                            node.detach();
                        } else {
                            node.hide();
                        }
                    }
                }
                Err(err) => warn!(selector = %selector, error = %err, "paywall selector failed"),
            }
        }

        for selector in self.heuristics.probe_selectors() {
            let nodes = match doc.select(&selector) {
                Ok(nodes) => nodes,
                Err(err) => {
                    warn!(selector = %selector, error = %err, "probe selector failed");
                    continue;
                }
            };
            for node in nodes {
                if self.heuristics.exceeds_overlay_size(node.size()) {
                    if aggressive {
                        node.detach();
                    } else {
                        node.hide();
                    }
                }
            }
        }
    }

    /// Reveals configured article containers and any inline-hidden element
    /// with enough text to be article body, and strips hiding classes.
    fn reveal_content<D: PageDocument>(&self, doc: &D, site: &ResolvedSite) {
        for selector in &site.config.article_selectors {
            match doc.select(selector) {
                Ok(nodes) => {
                    for node in nodes {
                        node.reveal();
                        for class in &self.heuristics.hiding_classes {
                            node.remove_class(class);
                        }
                    }
                }
                Err(err) => warn!(selector = %selector, error = %err, "article selector failed"),
            }
        }

        for node in doc.inline_hidden() {
            if self.heuristics.is_likely_article(node.text_len()) {
                node.reveal();
                for class in &self.heuristics.hiding_classes {
                    node.remove_class(class);
                }
            }
        }
    }

    fn unlock_scrolling<D: PageDocument>(&self, doc: &D) {
        for class in &self.heuristics.scroll_lock_classes {
            doc.root().remove_class(class);
            if let Some(body) = doc.body() {
                body.remove_class(class);
            }
        }
    }

    fn strip_tracking_scripts<D: PageDocument>(&self, doc: &D) {
        for (node, src) in doc.scripts() {
            if self.heuristics.is_tracking_script(&src) {
                debug!(src = %src, "removing tracking script");
                node.detach();
            }
        }
    }

    /// Resets metering counters and removes paywall flags. Persistence
    /// failures are logged and swallowed; spoofing is best-effort.
    fn spoof_client_state<C: ClientState>(&self, client: &mut C) {
        for key in &self.heuristics.counter_keys {
            if let Err(err) = client.set(key, "0") {
                debug!(key = %key, error = %err, "counter reset failed");
            }
        }
        for key in &self.heuristics.flag_keys {
            if let Err(err) = client.remove(key) {
                debug!(key = %key, error = %err, "flag removal failed");
            }
        }
    }

    /// True if any configured paywall selector matches a visible element.
    /// Selector errors count as not-visible.
    fn paywall_visible<D: PageDocument>(&self, doc: &D) -> bool {
        let site = match &self.site {
            Some(site) => site,
            None => return false,
        };
        let mut selectors: Vec<String> = site.config.paywall_selectors.clone();
        if selectors.is_empty() {
            selectors = self.heuristics.probe_selectors();
        }
        for selector in &selectors {
            if let Ok(nodes) = doc.select(selector) {
                if nodes.iter().any(|n| n.is_visible()) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_dom::{FakeClientState, FakeDocument, FakePort};
    use gatecrash_core::site_registry::SiteConfig;

    fn registry() -> SiteRegistry {
        SiteRegistry::with_defaults()
    }

    fn cookie_registry() -> SiteRegistry {
        SiteRegistry::from_sites(vec![SiteConfig::new("chronicle.test")
            .with_method(BypassMethod::Cookies)
            .with_paywall_selectors([".gate"])
            .with_clear_cookies(true)])
    }

    // ====== begin ======

    #[test]
    fn begin_on_unknown_host_stays_idle() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("example.org", FakePort::enabled());
        let schedule = session.begin(&doc, Some(&registry()), &mut client);
        assert_eq!(schedule, None);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.attempts(), 0);
    }

    #[test]
    fn begin_when_disabled_stays_idle() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("www.nytimes.com", FakePort::disabled());
        assert_eq!(session.begin(&doc, Some(&registry()), &mut client), None);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn begin_on_known_host_runs_pass_and_observes() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("www.nytimes.com", FakePort::enabled());
        let schedule = session.begin(&doc, Some(&registry()), &mut client);
        assert_eq!(
            schedule,
            Some(Schedule::Recheck(Duration::from_millis(2000)))
        );
        assert_eq!(session.phase(), Phase::Observing);
        assert_eq!(session.attempts(), 1);
        // metering counters reset even on header-based sites
        assert_eq!(client.get("articleCount"), Some("0".to_string()));
        assert!(!client.contains("paywall"));
    }

    #[test]
    fn begin_with_dead_channel_assumes_enabled() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("www.nytimes.com", FakePort::broken());
        let schedule = session.begin(&doc, Some(&registry()), &mut client);
        assert!(schedule.is_some());
        assert_eq!(session.phase(), Phase::Observing);
    }

    #[test]
    fn begin_without_registry_uses_fallback_fragments() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("www.nytimes.com", FakePort::enabled());
        let schedule = session.begin(&doc, None, &mut client);
        assert!(schedule.is_some());
        assert!(session.site().is_some());
    }

    #[test]
    fn begin_resolves_custom_site() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let port = FakePort::enabled().with_custom_sites(&["myblog.example"]);
        let mut session = BypassSession::new("news.myblog.example", port);
        let schedule = session.begin(&doc, Some(&registry()), &mut client);
        assert!(schedule.is_some());
        assert!(session.site().unwrap().custom);
    }

    // ====== pass behavior ======

    #[test]
    fn generic_pass_hides_paywall_and_reveals_article() {
        let doc = FakeDocument::new();
        let overlay = doc.add_node(
            &[r#"[class*="paywall"]"#],
            |n| n.class("paywall-overlay").size(900.0, 700.0),
        );
        let article = doc.add_node(&[], |n| n.inline_hidden().text_len(4000).class("hidden"));
        let mut client = FakeClientState::new();

        let registry = SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);

        assert!(overlay.hidden());
        assert!(!overlay.detached());
        assert!(article.revealed());
        assert!(!article.has_class("hidden"));
    }

    #[test]
    fn small_keyword_elements_survive() {
        let doc = FakeDocument::new();
        let badge = doc.add_node(
            &[r#"[class*="premium"]"#],
            |n| n.class("premium-badge").size(24.0, 24.0),
        );
        let mut client = FakeClientState::new();
        let registry =
            SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(!badge.hidden());
        assert!(!badge.detached());
    }

    #[test]
    fn short_hidden_elements_stay_hidden() {
        let doc = FakeDocument::new();
        let stub = doc.add_node(&[], |n| n.inline_hidden().text_len(40));
        let mut client = FakeClientState::new();
        let registry =
            SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(!stub.revealed());
    }

    #[test]
    fn adblock_pass_detaches_instead_of_hiding() {
        let doc = FakeDocument::new();
        let overlay = doc.add_node(&[".gate"], |n| n.class("gate").size(900.0, 700.0));
        let mut client = FakeClientState::new();
        let registry = SiteRegistry::from_sites(vec![SiteConfig::new("blocked.test")
            .with_method(BypassMethod::Adblock)
            .with_paywall_selectors([".gate"])]);
        let mut session = BypassSession::new("blocked.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(overlay.detached());
    }

    #[test]
    fn cookie_pass_requests_sweep() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let port = FakePort::enabled();
        let mut session = BypassSession::new("www.chronicle.test", port);
        session.begin(&doc, Some(&cookie_registry()), &mut client);
        assert_eq!(
            session.port.cookie_sweeps(),
            vec!["www.chronicle.test".to_string()]
        );
    }

    #[test]
    fn cookie_pass_also_hides_configured_paywall() {
        let doc = FakeDocument::new();
        let wall = doc.add_node(&[".gate"], |n| n.class("gate").size(900.0, 700.0));
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("www.chronicle.test", FakePort::enabled());
        session.begin(&doc, Some(&cookie_registry()), &mut client);
        assert!(wall.hidden());
        assert!(!wall.detached()); // cookies sites hide, never detach
    }

    #[test]
    fn configured_selector_hides_regardless_of_size() {
        let doc = FakeDocument::new();
        let gate = doc.add_node(&["#meter-wall"], |n| n.id("meter-wall").size(10.0, 10.0));
        let mut client = FakeClientState::new();
        let registry = SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")
            .with_paywall_selectors(["#meter-wall"])]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(gate.hidden());
    }

    #[test]
    fn tracking_scripts_are_detached() {
        let doc = FakeDocument::new();
        let tracker = doc.add_script("https://cdn.tinypass.com/api/tinypass.min.js");
        let app = doc.add_script("https://example.com/app.js");
        let mut client = FakeClientState::new();
        let registry =
            SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(tracker.detached());
        assert!(!app.detached());
    }

    #[test]
    fn scroll_lock_classes_are_cleared() {
        let doc = FakeDocument::new();
        doc.root_handle().add_class("no-scroll");
        doc.body_handle().add_class("modal-open");
        let mut client = FakeClientState::new();
        let registry =
            SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        session.begin(&doc, Some(&registry), &mut client);
        assert!(!doc.root_handle().has_class("no-scroll"));
        assert!(!doc.body_handle().has_class("modal-open"));
    }

    #[test]
    fn storage_failures_do_not_abort_pass() {
        let doc = FakeDocument::new();
        let overlay = doc.add_node(
            &[r#"[class*="paywall"]"#],
            |n| n.class("paywall").size(900.0, 700.0),
        );
        let mut client = FakeClientState::broken();
        let registry =
            SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        let schedule = session.begin(&doc, Some(&registry), &mut client);
        assert!(schedule.is_some());
        assert!(overlay.hidden());
    }

    #[test]
    fn invalid_selector_does_not_abort_pass() {
        let doc = FakeDocument::new();
        let overlay = doc.add_node(
            &[r#"[class*="paywall"]"#],
            |n| n.class("paywall").size(900.0, 700.0),
        );
        let mut client = FakeClientState::new();
        let registry = SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")
            .with_paywall_selectors(["((bad"])]);
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        doc.reject_selector("((bad");
        let schedule = session.begin(&doc, Some(&registry), &mut client);
        assert!(schedule.is_some());
        assert!(overlay.hidden());
    }

    // ====== recheck loop ======

    fn observing_session(
        doc: &FakeDocument,
        client: &mut FakeClientState,
        registry: &SiteRegistry,
    ) -> BypassSession<FakePort> {
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        let schedule = session.begin(doc, Some(registry), client);
        assert!(schedule.is_some());
        session
    }

    fn persistent_registry() -> SiteRegistry {
        SiteRegistry::from_sites(vec![SiteConfig::new("gated.test")
            .with_paywall_selectors([".wall"])])
    }

    #[test]
    fn recheck_with_cleared_paywall_stops_quietly() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let registry = persistent_registry();
        let mut session = observing_session(&doc, &mut client, &registry);
        // nothing matches .wall, so the paywall reads as cleared
        assert_eq!(session.on_recheck(&doc, &mut client), None);
        assert_eq!(session.phase(), Phase::Observing);
        assert_eq!(session.attempts(), 1);
    }

    #[test]
    fn recheck_with_visible_paywall_retries_until_exhausted() {
        let doc = FakeDocument::new();
        // A wall that reappears no matter what: select always returns a
        // visible node.
        doc.add_persistent_node(&[".wall"], |n| n.class("wall").size(900.0, 700.0));
        let mut client = FakeClientState::new();
        let registry = persistent_registry();
        let mut session = observing_session(&doc, &mut client, &registry);

        let schedule = session.on_recheck(&doc, &mut client);
        assert_eq!(
            schedule,
            Some(Schedule::Recheck(Duration::from_millis(2000)))
        );
        assert_eq!(session.attempts(), 2);

        // third pass hits the ceiling
        assert_eq!(session.on_recheck(&doc, &mut client), None);
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.phase(), Phase::Exhausted);

        // terminal: further calls are no-ops
        assert_eq!(session.on_recheck(&doc, &mut client), None);
        assert_eq!(session.attempts(), 3);
    }

    #[test]
    fn recheck_before_begin_is_a_noop() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let mut session = BypassSession::new("gated.test", FakePort::enabled());
        assert_eq!(session.on_recheck(&doc, &mut client), None);
        assert_eq!(session.phase(), Phase::Idle);
    }

    // ====== mutation watch ======

    #[test]
    fn paywall_like_mutation_schedules_short_recheck() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let registry = persistent_registry();
        let mut session = observing_session(&doc, &mut client, &registry);
        let schedule = session.on_mutation("late-paywall-banner", "");
        assert_eq!(schedule, Some(Schedule::Recheck(Duration::from_millis(500))));
    }

    #[test]
    fn unrelated_mutation_is_ignored() {
        let doc = FakeDocument::new();
        let mut client = FakeClientState::new();
        let registry = persistent_registry();
        let mut session = observing_session(&doc, &mut client, &registry);
        assert_eq!(session.on_mutation("comment-box", "comments"), None);
    }

    #[test]
    fn mutations_after_exhaustion_are_ignored() {
        let doc = FakeDocument::new();
        doc.add_persistent_node(&[".wall"], |n| n.class("wall").size(900.0, 700.0));
        let mut client = FakeClientState::new();
        let registry = persistent_registry();
        let mut session = observing_session(&doc, &mut client, &registry);
        session.on_recheck(&doc, &mut client);
        session.on_recheck(&doc, &mut client);
        assert_eq!(session.phase(), Phase::Exhausted);
        assert_eq!(session.on_mutation("paywall-overlay", ""), None);
    }

    #[test]
    fn mutations_on_idle_session_are_ignored() {
        let mut session = BypassSession::new("example.org", FakePort::enabled());
        assert_eq!(session.on_mutation("paywall-overlay", ""), None);
    }
}
