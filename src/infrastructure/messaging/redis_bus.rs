use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{
    application::{
        handlers::scheduler::NotificationScheduler,
        services::{broadcast_hub::BroadcastHub, event_bus::EventBus},
    },
    domain::{
        errors::NotifyError,
        events::{AppointmentEvent, EventKind},
    },
};

/// Redis pub/sub publisher. Uses its own connection so a slow consumer
/// never blocks producers; PUBLISH returns how many subscribers received
/// the message.
pub struct RedisEventBus {
    client: redis::Client,
    conn: Mutex<Option<redis::aio::Connection>>,
}

impl RedisEventBus {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, kind: EventKind, event: &AppointmentEvent) -> anyhow::Result<u32> {
        let payload = serde_json::to_string(event)?;
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self
                .client
                .get_async_connection()
                .await
                .map_err(|err| NotifyError::Transport(err.to_string()))?,
        };

        match redis::cmd("PUBLISH")
            .arg(kind.channel())
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
        {
            Ok(receivers) => {
                *guard = Some(conn);
                Ok(receivers as u32)
            }
            // drop the connection; the next publish reconnects
            Err(err) => Err(NotifyError::Transport(err.to_string()).into()),
        }
    }
}

/// Subscribes to the fixed channel set on a dedicated connection and feeds
/// each message to the scheduler and the broadcast hub. A failing handler
/// never stops consumption of subsequent messages.
pub struct EventSubscriber {
    client: redis::Client,
}

impl EventSubscriber {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn spawn(
        self,
        scheduler: Arc<NotificationScheduler>,
        hub: Arc<BroadcastHub>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.run(&scheduler, &hub).await {
                    tracing::error!(error = %err, "subscriber connection lost, reconnecting");
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    }

    async fn run(
        &self,
        scheduler: &Arc<NotificationScheduler>,
        hub: &Arc<BroadcastHub>,
    ) -> anyhow::Result<()> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        for kind in EventKind::ALL {
            pubsub
                .subscribe(kind.channel())
                .await
                .map_err(|err| NotifyError::Transport(err.to_string()))?;
        }
        tracing::info!("subscribed to appointment event channels");

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let channel = message.get_channel_name().to_string();
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(channel = %channel, error = %err, "dropping unreadable message");
                    continue;
                }
            };
            handle_message(&channel, &payload, scheduler, hub).await;
        }
        anyhow::bail!("pubsub stream ended")
    }
}

async fn handle_message(
    channel: &str,
    payload: &str,
    scheduler: &Arc<NotificationScheduler>,
    hub: &Arc<BroadcastHub>,
) {
    let Some(kind) = EventKind::from_channel(channel) else {
        tracing::warn!(channel, "message on unrecognized channel");
        return;
    };
    let event = match AppointmentEvent::from_json(payload) {
        Ok(event) => event,
        Err(err) => {
            // malformed events are dropped, not retried
            tracing::warn!(channel, error = %err, "dropping malformed event");
            return;
        }
    };

    if let Err(err) = scheduler.handle(kind, &event).await {
        tracing::error!(channel, event_id = event.id, error = %err, "event handler failed");
    }
    if let Ok(data) = serde_json::to_value(&event) {
        hub.broadcast(channel, data).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::application::services::job_queue::JobQueue;
    use crate::domain::models::{BackoffPolicy, ReminderPolicy};
    use crate::infrastructure::queue::in_memory::InMemoryJobQueue;

    fn pipeline() -> (
        Arc<NotificationScheduler>,
        Arc<InMemoryJobQueue>,
        Arc<BroadcastHub>,
    ) {
        let queue = Arc::new(InMemoryJobQueue::new(
            "reminders",
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(100)),
            50,
        ));
        let scheduler = Arc::new(NotificationScheduler::new(
            queue.clone() as Arc<dyn JobQueue>,
            ReminderPolicy::hours(24),
            3,
        ));
        let hub = BroadcastHub::new(Duration::from_secs(30));
        (scheduler, queue, hub)
    }

    fn valid_payload(id: i64) -> String {
        let date = (Utc::now() + ChronoDuration::hours(25)).to_rfc3339();
        format!(r#"{{"id":{id},"userId":7,"appointmentDate":"{date}","email":"a@b.com"}}"#)
    }

    #[tokio::test]
    async fn malformed_message_does_not_stop_subsequent_processing() {
        let (scheduler, queue, hub) = pipeline();
        let (_, mut rx) = hub.open_client().await;
        assert_eq!(rx.recv().await.unwrap().event, "connected");

        handle_message("appointment.created", "{ not json", &scheduler, &hub).await;
        handle_message("appointment.nonsense", &valid_payload(42), &scheduler, &hub).await;
        assert!(queue.find("immediate:42").await.unwrap().is_none());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        handle_message("appointment.created", &valid_payload(42), &scheduler, &hub).await;
        assert!(queue.find("immediate:42").await.unwrap().is_some());
        assert!(queue.find("reminder:42:24h").await.unwrap().is_some());
        assert_eq!(rx.recv().await.unwrap().event, "appointment.created");
    }

    #[tokio::test]
    async fn cancellation_message_withdraws_pending_jobs() {
        let (scheduler, queue, hub) = pipeline();

        handle_message("appointment.created", &valid_payload(42), &scheduler, &hub).await;
        assert!(queue.find("reminder:42:24h").await.unwrap().is_some());

        handle_message("appointment.cancelled", &valid_payload(42), &scheduler, &hub).await;
        assert!(queue.find("immediate:42").await.unwrap().is_none());
        assert!(queue.find("reminder:42:24h").await.unwrap().is_none());
    }
}
