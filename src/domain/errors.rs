//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("EIA API error: {0}")]
    Eia(String),

    /// The refresh step (built-in or external command) failed.
    #[error("Refresh failed: {0}")]
    Refresh(String),

    /// A version-control command exited non-zero or could not be spawned.
    #[error("git {command} failed: {message}")]
    Vcs { command: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
