//! Page-side bypass engine.
//!
//! Implements the per-page state machine that detects paywalls, hides or
//! removes them, reveals gated content, and re-checks after the page
//! mutates. The page environment (document, origin storage, background
//! channel) is abstracted behind the traits in [`dom`], so the whole
//! engine runs against in-memory fakes in tests.

pub mod dom;
pub mod heuristics;
pub mod session;

#[cfg(test)]
mod test_dom;

pub use dom::{BackgroundPort, ClientState, PageDocument, PageError, PageNode};
pub use heuristics::Heuristics;
pub use session::{BypassSession, Phase, Schedule};
