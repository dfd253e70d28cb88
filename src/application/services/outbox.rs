use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::services::event_bus::EventBus;
use crate::domain::{
    events::{AppointmentEvent, EventKind},
    models::BackoffPolicy,
};

// An entry still unpublished after this many attempts is dropped with an
// error log so it cannot block the entries behind it.
const MAX_PUBLISH_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub kind: EventKind,
    pub event: AppointmentEvent,
}

/// Decouples event publication from the originating business operation:
/// `submit` succeeds even while the broker is down, and the relay task
/// publishes each entry with bounded retry.
#[derive(Clone)]
pub struct EventOutbox {
    tx: mpsc::UnboundedSender<OutboxEntry>,
}

impl EventOutbox {
    pub fn start(bus: Arc<dyn EventBus>, retry: BackoffPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = tokio::spawn(relay_loop(rx, bus, retry));
        (Self { tx }, relay)
    }

    pub fn submit(&self, kind: EventKind, event: AppointmentEvent) -> anyhow::Result<()> {
        self.tx
            .send(OutboxEntry { kind, event })
            .map_err(|_| anyhow::anyhow!("outbox relay is not running"))
    }
}

async fn relay_loop(
    mut rx: mpsc::UnboundedReceiver<OutboxEntry>,
    bus: Arc<dyn EventBus>,
    retry: BackoffPolicy,
) {
    while let Some(entry) = rx.recv().await {
        let channel = entry.kind.channel();
        let mut attempt = 1u32;
        loop {
            match bus.publish(entry.kind, &entry.event).await {
                Ok(receivers) => {
                    tracing::info!(channel, event_id = entry.event.id, receivers, "event published");
                    break;
                }
                Err(err) if attempt >= MAX_PUBLISH_ATTEMPTS => {
                    tracing::error!(
                        channel,
                        event_id = entry.event.id,
                        attempts = attempt,
                        error = %err,
                        "dropping event, publish attempts exhausted"
                    );
                    break;
                }
                Err(err) => {
                    let delay = retry.delay(attempt);
                    tracing::warn!(
                        channel,
                        event_id = entry.event.id,
                        attempt,
                        error = %err,
                        "publish failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
