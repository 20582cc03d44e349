//! Error types for host-facing operations.

use thiserror::Error;

/// Errors reported by the host environment (rule table, cookie store).
///
/// None of these are fatal: callers log and leave the previous state in
/// place rather than aborting.
#[derive(Debug, Error)]
pub enum HostError {
    /// A rule URL pattern was rejected by the host.
    #[error("invalid rule pattern: {0}")]
    InvalidPattern(String),

    /// The host's dynamic rule quota would be exceeded.
    #[error("rule quota exceeded (limit {0})")]
    QuotaExceeded(usize),

    /// The cookie store could not be read or written.
    #[error("cookie store error: {0}")]
    CookieStore(String),

    /// The host rejected the operation for another reason.
    #[error("host rejected operation: {0}")]
    Rejected(String),
}

/// Result type for host-facing operations.
pub type Result<T> = std::result::Result<T, HostError>;
