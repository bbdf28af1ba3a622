//! Inbound port. UI (adapter) calls into the application.

use crate::domain::DomainError;

/// Input port: interactive UI invokes application use cases.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the main menu until the user exits.
    async fn run(&self) -> Result<(), DomainError>;
}
