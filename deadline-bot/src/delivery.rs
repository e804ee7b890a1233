//! Outbound notification delivery.

use async_trait::async_trait;

/// Sends a text message to a user.
///
/// Failures are returned to the caller, which logs them; nothing is retried.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), String>;
}
