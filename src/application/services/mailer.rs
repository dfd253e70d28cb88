use async_trait::async_trait;

use crate::domain::models::OutboundEmail;

/// Outbound mail transport collaborator; returns a delivery id on success.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> anyhow::Result<String>;
}
