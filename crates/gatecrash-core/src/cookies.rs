//! Cookie sweeper.
//!
//! Deletes every cookie stored for a domain so a metered site starts from a
//! clean slate on the next load. Host cookies and domain cookies live under
//! different keys, so a leading-dot domain is swept under both forms.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// A cookie as reported by the host cookie store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Stored domain, possibly with a leading dot for domain cookies.
    pub domain: String,
    /// Cookie path.
    pub path: String,
    /// Whether the cookie is restricted to secure transports.
    pub secure: bool,
}

impl Cookie {
    /// Creates a cookie record.
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
        secure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            path: path.into(),
            secure,
        }
    }

    /// Reconstructs the canonical URL used to address this cookie for
    /// deletion: scheme from the secure flag, host from the stored domain,
    /// path from the cookie path.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.domain, self.path)
    }
}

/// Host cookie store: enumerate by domain, delete by canonical URL + name.
pub trait CookieStore {
    /// Returns all cookies whose stored domain equals the given domain.
    fn cookies(&self, domain: &str) -> Result<Vec<Cookie>>;

    /// Deletes one cookie addressed by canonical URL and name.
    fn remove(&mut self, url: &str, name: &str) -> Result<()>;
}

/// Deletes all cookies for a domain and returns the count actually removed.
///
/// A leading-dot domain is additionally swept under its dot-stripped form.
/// Per-cookie deletion errors are logged and skipped; the sweep never fails
/// as a whole.
pub fn clear(store: &mut dyn CookieStore, domain: &str) -> usize {
    let mut removed = clear_exact(store, domain);
    if let Some(stripped) = domain.strip_prefix('.') {
        removed += clear_exact(store, stripped);
    }
    debug!(domain, removed, "cookie sweep complete");
    removed
}

/// Sweeps one exact domain form.
fn clear_exact(store: &mut dyn CookieStore, domain: &str) -> usize {
    let cookies = match store.cookies(domain) {
        Ok(cookies) => cookies,
        Err(err) => {
            warn!(domain, error = %err, "could not enumerate cookies");
            return 0;
        }
    };

    let mut removed = 0;
    for cookie in cookies {
        match store.remove(&cookie.url(), &cookie.name) {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(domain, cookie = %cookie.name, error = %err, "cookie deletion failed");
            }
        }
    }
    removed
}

/// In-memory [`CookieStore`] used by the daemon and by tests.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Vec<Cookie>,
}

impl MemoryCookieStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cookie to the store.
    pub fn add(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    /// Returns the number of stored cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookies(&self, domain: &str) -> Result<Vec<Cookie>> {
        Ok(self
            .cookies
            .iter()
            .filter(|c| c.domain == domain)
            .cloned()
            .collect())
    }

    fn remove(&mut self, url: &str, name: &str) -> Result<()> {
        self.cookies.retain(|c| !(c.url() == url && c.name == name));
        Ok(())
    }
}
