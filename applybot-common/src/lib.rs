//! Common types and utilities shared across applybot crates.
//!
//! This crate defines the shared error type, a handful of behavior enums, and
//! the observability helpers used throughout the workspace. It is kept small so
//! every crate can depend on it without pulling in the browser stack.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`BotError`] and [`Result`]: Shared error handling
//! - [`StealthLevel`]: How aggressively the browser hides automation signals
//!
//! # Examples
//!
//! ```rust
//! use applybot_common::{BotError, StealthLevel};
//!
//! let level: StealthLevel = Default::default();
//! assert!(matches!(level, StealthLevel::Balanced));
//!
//! let err = BotError::SessionLost("chrome exited".into());
//! assert!(err.is_fatal());
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// Error types used across the applybot workspace.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    /// A driver (browser, WebDriver transport) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The browser session is gone; nothing further can be navigated.
    #[error("Browser session lost: {0}")]
    SessionLost(String),
}

impl BotError {
    /// Whether the error should end the whole run rather than a single step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::SessionLost(_))
    }
}

/// Convenient alias for results that use [`BotError`].
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_lost_session_is_fatal() {
        assert!(BotError::SessionLost("gone".into()).is_fatal());
        assert!(!BotError::from(anyhow::anyhow!("element not interactable")).is_fatal());
        assert!(!BotError::Config("bad template".into()).is_fatal());
    }
}
