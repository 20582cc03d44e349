//! Host abstraction for the page environment.
//!
//! The bypass session never touches a real document. Everything it needs
//! (selector queries, element mutation, client-side persistence, the
//! background channel) goes through these traits, so the state machine is
//! fully testable against in-memory fakes.

use thiserror::Error;

/// Errors surfaced by a page host.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("node is detached")]
    Detached,
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("background channel unavailable: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, PageError>;

// ====== Document ======

/// Read access to a page document.
pub trait PageDocument {
    type Node: PageNode;

    /// Runs a selector query. Invalid selectors are reported as errors,
    /// never panics.
    fn select(&self, selector: &str) -> Result<Vec<Self::Node>>;

    /// Elements hidden via inline style (display none, visibility hidden
    /// or zeroed opacity).
    fn inline_hidden(&self) -> Vec<Self::Node>;

    /// All script elements with a source URL, paired with that URL.
    fn scripts(&self) -> Vec<(Self::Node, String)>;

    /// The document root element.
    fn root(&self) -> Self::Node;

    /// The body element, if present.
    fn body(&self) -> Option<Self::Node>;
}

/// A handle to a single element.
pub trait PageNode {
    /// Removes the element from the document.
    fn detach(&self);

    /// Hides the element without removing it.
    fn hide(&self);

    /// Forces the element visible, clearing inline hiding styles.
    fn reveal(&self);

    /// Removes a single class name if present.
    fn remove_class(&self, class: &str);

    /// Bounding-box size as (width, height).
    fn size(&self) -> (f64, f64);

    /// Total length of the element's text content.
    fn text_len(&self) -> usize;

    /// Whether the element currently renders.
    fn is_visible(&self) -> bool;

    /// The raw class attribute, empty when absent.
    fn class_attr(&self) -> String;

    /// The raw id attribute, empty when absent.
    fn id_attr(&self) -> String;
}

// ====== Client persistence ======

/// Client-side key/value persistence scoped to the page origin.
pub trait ClientState {
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

// ====== Background channel ======

/// The session's one-way view of the background process.
pub trait BackgroundPort {
    /// Asks whether bypassing is enabled. Channel failures are treated by
    /// callers as enabled, so a dead background never blocks a bypass.
    fn get_status(&self) -> Result<bool>;

    /// The user's custom site list.
    fn custom_sites(&self) -> Result<Vec<String>>;

    /// Requests a cookie sweep for the given hostname.
    fn clear_cookies(&self, hostname: &str) -> Result<()>;
}
