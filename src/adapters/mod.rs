//! Infrastructure adapters. Implement outbound ports.
//!
//! Market data HTTP clients, filesystem, SQLite, git, external tools, terminal UI.
//! Map errors to DomainError.

pub mod market;
pub mod persistence;
pub mod tools;
pub mod ui;
pub mod vcs;
