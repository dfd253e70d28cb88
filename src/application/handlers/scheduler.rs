use std::sync::Arc;

use chrono::Utc;

use crate::{
    application::services::job_queue::{EnqueueJob, JobQueue},
    domain::{
        events::{AppointmentEvent, EventKind},
        models::{Job, JobKind, ReminderPolicy},
    },
};

/// Explicit handler outcome so callers and tests assert on values instead
/// of log output.
#[derive(Debug)]
pub enum ScheduleOutcome {
    Scheduled {
        immediate: Job,
        reminder: Option<Job>,
    },
    CancellationApplied {
        removed: usize,
    },
    Skipped {
        reason: String,
    },
    Ignored,
}

/// Converts inbound appointment events into queue jobs. Idempotency under
/// event redelivery comes from dedup-key uniqueness in the queue, not from
/// any bookkeeping here.
pub struct NotificationScheduler {
    queue: Arc<dyn JobQueue>,
    policy: ReminderPolicy,
    max_attempts: u32,
}

impl NotificationScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, policy: ReminderPolicy, max_attempts: u32) -> Self {
        Self {
            queue,
            policy,
            max_attempts,
        }
    }

    pub fn immediate_key(event_id: i64) -> String {
        format!("immediate:{event_id}")
    }

    pub fn reminder_key(&self, event_id: i64) -> String {
        format!("reminder:{}:{}", event_id, self.policy.key_suffix())
    }

    pub async fn handle(
        &self,
        kind: EventKind,
        event: &AppointmentEvent,
    ) -> anyhow::Result<ScheduleOutcome> {
        match kind {
            EventKind::AppointmentCreated => self.handle_created(event).await,
            EventKind::AppointmentCancelled => self.handle_cancelled(event).await,
            EventKind::AppointmentUpdated => Ok(ScheduleOutcome::Ignored),
        }
    }

    async fn handle_created(&self, event: &AppointmentEvent) -> anyhow::Result<ScheduleOutcome> {
        if event.email.is_none() {
            tracing::warn!(event_id = event.id, "creation event carries no email, nothing to schedule");
            return Ok(ScheduleOutcome::Skipped {
                reason: "event has no recipient email".to_string(),
            });
        }

        let immediate = self
            .queue
            .enqueue(EnqueueJob {
                kind: JobKind::Immediate,
                dedup_key: Self::immediate_key(event.id),
                payload: event.clone(),
                scheduled_for: Utc::now(),
                max_attempts: self.max_attempts,
            })
            .await?;

        let fire_time = self.policy.fire_time(event.appointment_date);
        if fire_time <= Utc::now() {
            // never schedule a reminder that is already due or past
            tracing::warn!(
                event_id = event.id,
                fire_time = %fire_time.to_rfc3339(),
                "reminder fire time is not in the future, skipping reminder"
            );
            return Ok(ScheduleOutcome::Scheduled {
                immediate,
                reminder: None,
            });
        }

        let reminder = self
            .queue
            .enqueue(EnqueueJob {
                kind: JobKind::Reminder,
                dedup_key: self.reminder_key(event.id),
                payload: event.clone(),
                scheduled_for: fire_time,
                max_attempts: self.max_attempts,
            })
            .await?;

        tracing::info!(
            event_id = event.id,
            reminder_at = %fire_time.to_rfc3339(),
            "notification jobs scheduled"
        );
        Ok(ScheduleOutcome::Scheduled {
            immediate,
            reminder: Some(reminder),
        })
    }

    async fn handle_cancelled(&self, event: &AppointmentEvent) -> anyhow::Result<ScheduleOutcome> {
        let mut removed = 0;
        if self.queue.remove(&Self::immediate_key(event.id)).await? {
            removed += 1;
        }
        if self.queue.remove(&self.reminder_key(event.id)).await? {
            removed += 1;
        }
        tracing::info!(event_id = event.id, removed, "cancellation applied to pending jobs");
        Ok(ScheduleOutcome::CancellationApplied { removed })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;
    use crate::domain::models::BackoffPolicy;
    use crate::infrastructure::queue::in_memory::InMemoryJobQueue;

    fn scheduler_with_queue() -> (NotificationScheduler, Arc<InMemoryJobQueue>) {
        let queue = Arc::new(InMemoryJobQueue::new(
            "reminders",
            BackoffPolicy::new(StdDuration::from_millis(10), StdDuration::from_millis(100)),
            50,
        ));
        let scheduler =
            NotificationScheduler::new(queue.clone(), ReminderPolicy::hours(24), 3);
        (scheduler, queue)
    }

    fn event(id: i64, appointment_in: Duration) -> AppointmentEvent {
        AppointmentEvent {
            id,
            user_id: 7,
            appointment_date: Utc::now() + appointment_in,
            email: Some("a@b.com".to_string()),
            service_id: Some(3),
            service_name: Some("Passport renewal".to_string()),
        }
    }

    #[tokio::test]
    async fn schedules_immediate_and_reminder_jobs() {
        let (scheduler, queue) = scheduler_with_queue();
        let event = event(42, Duration::hours(25));

        let outcome = scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();

        let ScheduleOutcome::Scheduled { immediate, reminder } = outcome else {
            panic!("expected jobs to be scheduled");
        };
        assert_eq!(immediate.dedup_key, "immediate:42");
        assert!((Utc::now() - immediate.scheduled_for).num_seconds() < 2);

        let reminder = reminder.expect("reminder scheduled");
        assert_eq!(reminder.dedup_key, "reminder:42:24h");
        assert_eq!(
            reminder.scheduled_for,
            ReminderPolicy::hours(24).fire_time(event.appointment_date)
        );

        assert!(queue.find("immediate:42").await.unwrap().is_some());
        assert!(queue.find("reminder:42:24h").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate_jobs() {
        let (scheduler, _queue) = scheduler_with_queue();
        let event = event(42, Duration::hours(25));

        let first = scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();
        let second = scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();

        let (ScheduleOutcome::Scheduled { immediate: a, reminder: ra },
             ScheduleOutcome::Scheduled { immediate: b, reminder: rb }) = (first, second)
        else {
            panic!("expected jobs to be scheduled twice");
        };
        assert_eq!(a.id, b.id);
        assert_eq!(ra.unwrap().id, rb.unwrap().id);
    }

    #[tokio::test]
    async fn past_reminder_is_not_scheduled() {
        let (scheduler, queue) = scheduler_with_queue();
        // appointment in one hour, lead time 24h: fire time is in the past
        let event = event(42, Duration::hours(1));

        let outcome = scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();

        let ScheduleOutcome::Scheduled { reminder, .. } = outcome else {
            panic!("expected immediate job to be scheduled");
        };
        assert!(reminder.is_none());
        assert!(queue.find("reminder:42:24h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancellation_removes_pending_jobs() {
        let (scheduler, queue) = scheduler_with_queue();
        let event = event(42, Duration::hours(25));
        scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();

        let outcome = scheduler
            .handle(EventKind::AppointmentCancelled, &event)
            .await
            .unwrap();

        let ScheduleOutcome::CancellationApplied { removed } = outcome else {
            panic!("expected cancellation outcome");
        };
        assert_eq!(removed, 2);
        assert!(queue.find("immediate:42").await.unwrap().is_none());
        assert!(queue.find("reminder:42:24h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn event_without_email_schedules_nothing() {
        let (scheduler, queue) = scheduler_with_queue();
        let mut event = event(42, Duration::hours(25));
        event.email = None;

        let outcome = scheduler
            .handle(EventKind::AppointmentCreated, &event)
            .await
            .unwrap();

        assert!(matches!(outcome, ScheduleOutcome::Skipped { .. }));
        assert!(queue.find("immediate:42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updated_events_are_ignored() {
        let (scheduler, _queue) = scheduler_with_queue();
        let event = event(42, Duration::hours(25));
        let outcome = scheduler
            .handle(EventKind::AppointmentUpdated, &event)
            .await
            .unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Ignored));
    }
}
