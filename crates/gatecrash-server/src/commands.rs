//! Wire format of the messaging bridge.
//!
//! Commands arrive as JSON objects whose `action` field selects the
//! variant; the remaining fields are the variant's payload. Unknown or
//! malformed actions are rejected at the dispatch layer with a fixed
//! error body, never a deserialization panic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request on the messaging bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Reads the enabled flag.
    GetStatus,
    /// Flips the enabled flag.
    Toggle,
    /// Sweeps cookies for a domain.
    ClearCookies { domain: String },
    /// Adds a user-defined site.
    AddCustomSite { domain: String },
    /// Removes a user-defined site.
    RemoveCustomSite { domain: String },
    /// Lists the user-defined sites.
    GetCustomSites,
    /// Applies a partial settings object.
    UpdateSettings { settings: Value },
}

impl Command {
    /// Parses a raw JSON message, `None` when the action is unknown or
    /// the payload is malformed.
    pub fn parse(raw: Value) -> Option<Self> {
        serde_json::from_value(raw).ok()
    }
}

/// Response to `getStatus` and `toggle`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub enabled: bool,
}

/// Generic acknowledgement for mutating commands.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

/// Response to `clearCookies`.
#[derive(Debug, Serialize)]
pub struct ClearCookiesResponse {
    pub success: bool,
    pub cleared: usize,
}

/// Response to `getCustomSites`.
#[derive(Debug, Serialize)]
pub struct SitesResponse {
    pub sites: Vec<String>,
}
