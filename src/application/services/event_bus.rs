use async_trait::async_trait;

use crate::domain::events::{AppointmentEvent, EventKind};

/// Best-effort pub/sub transport. Publish returns the number of receivers
/// that accepted the message; it guarantees neither that a receiver existed
/// nor that the message survives a broker restart.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, kind: EventKind, event: &AppointmentEvent) -> anyhow::Result<u32>;
}
