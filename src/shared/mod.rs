//! Cross-cutting helpers: configuration, rate limiting, formatting.

pub mod config;
pub mod format;
pub mod rate_limit;
