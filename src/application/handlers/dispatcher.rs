use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    application::services::{job_queue::JobQueue, mailer::MailTransport},
    domain::{
        errors::NotifyError,
        models::{Job, JobKind, JobState, OutboundEmail},
    },
};

/// Bounded-concurrency consumer of the job queue: a fixed pool of workers,
/// each pulling one due job at a time, rendering the message and handing it
/// to the mail transport. Execution is at-least-once.
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    mailer: Arc<dyn MailTransport>,
    workers: usize,
    from_address: String,
}

impl JobDispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        mailer: Arc<dyn MailTransport>,
        workers: usize,
        from_address: String,
    ) -> Self {
        Self {
            queue,
            mailer,
            workers,
            from_address,
        }
    }

    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|worker| {
                let queue = self.queue.clone();
                let mailer = self.mailer.clone();
                let from = self.from_address.clone();
                tokio::spawn(worker_loop(worker, queue, mailer, from))
            })
            .collect()
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<dyn JobQueue>,
    mailer: Arc<dyn MailTransport>,
    from: String,
) {
    loop {
        let job = match queue.dequeue().await {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(worker, error = %err, "dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let email = match render_email(&job, &from) {
            Ok(email) => email,
            Err(err) => {
                record_failure(&queue, &job, err.to_string()).await;
                continue;
            }
        };

        match mailer.send(&email).await {
            Ok(delivery_id) => {
                tracing::info!(
                    worker,
                    job_id = %job.id,
                    job_kind = job.kind.as_str(),
                    delivery_id = %delivery_id,
                    "notification delivered"
                );
                if let Err(err) = queue.complete(job.id).await {
                    tracing::error!(worker, job_id = %job.id, error = %err, "failed to mark job completed");
                }
            }
            Err(err) => record_failure(&queue, &job, err.to_string()).await,
        }
    }
}

async fn record_failure(queue: &Arc<dyn JobQueue>, job: &Job, error: String) {
    match queue.fail(job.id, error.clone()).await {
        Ok(JobState::Failed) => {
            tracing::error!(
                job_id = %job.id,
                job_kind = job.kind.as_str(),
                attempts = job.attempts,
                error = %error,
                "job failed terminally"
            );
        }
        Ok(_) => {
            tracing::warn!(
                job_id = %job.id,
                attempt = job.attempts,
                error = %error,
                "delivery failed, retry scheduled"
            );
        }
        Err(err) => {
            tracing::error!(job_id = %job.id, error = %err, "failed to record job failure");
        }
    }
}

/// Renders the outbound message for a due job, with wording differentiated
/// by job kind.
pub fn render_email(job: &Job, from: &str) -> anyhow::Result<OutboundEmail> {
    let event = &job.payload;
    let to = event
        .email
        .clone()
        .ok_or_else(|| NotifyError::Validation("event has no recipient email".to_string()))?;
    let service = event.service_name.as_deref().unwrap_or("your appointment");
    let date = event.appointment_date.format("%Y-%m-%d %H:%M UTC");

    let (subject, text) = match job.kind {
        JobKind::Immediate => (
            format!("Appointment request #{} received", event.id),
            format!(
                "We received your request for {service} on {date}. \
                 You will be notified once it has been reviewed."
            ),
        ),
        JobKind::Reminder => (
            format!("Reminder: {service} on {date}"),
            format!(
                "This is a reminder for appointment request #{}: \
                 {service} is scheduled for {date}.",
                event.id
            ),
        ),
    };

    Ok(OutboundEmail {
        from: from.to_string(),
        to,
        html: format!("<p>{text}</p>"),
        subject,
        text,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    use super::*;
    use crate::application::services::job_queue::{EnqueueJob, JobLifecycle};
    use crate::domain::{events::AppointmentEvent, models::BackoffPolicy};
    use crate::infrastructure::queue::in_memory::InMemoryJobQueue;

    struct MockMailer {
        failures: AtomicU32,
        sent: Mutex<Vec<OutboundEmail>>,
    }

    impl MockMailer {
        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(times),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MailTransport for MockMailer {
        async fn send(&self, email: &OutboundEmail) -> anyhow::Result<String> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(NotifyError::Delivery("smtp relay refused".to_string()).into());
            }
            self.sent.lock().await.push(email.clone());
            Ok("delivery-1".to_string())
        }
    }

    fn event(id: i64) -> AppointmentEvent {
        AppointmentEvent {
            id,
            user_id: 7,
            appointment_date: Utc::now() + ChronoDuration::hours(25),
            email: Some("a@b.com".to_string()),
            service_id: Some(3),
            service_name: Some("Passport renewal".to_string()),
        }
    }

    fn job(kind: JobKind) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            queue: "reminders".to_string(),
            kind,
            dedup_key: "immediate:42".to_string(),
            payload: event(42),
            scheduled_for: Utc::now(),
            attempts: 0,
            max_attempts: 3,
            state: JobState::Waiting,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn confirmation_and_reminder_wording_differ() {
        let confirmation = render_email(&job(JobKind::Immediate), "noreply@example.org").unwrap();
        assert_eq!(confirmation.subject, "Appointment request #42 received");
        assert!(confirmation.text.contains("Passport renewal"));
        assert_eq!(confirmation.to, "a@b.com");

        let reminder = render_email(&job(JobKind::Reminder), "noreply@example.org").unwrap();
        assert!(reminder.subject.starts_with("Reminder: Passport renewal"));
        assert!(reminder.text.contains("#42"));
    }

    #[tokio::test]
    async fn retries_with_backoff_until_success() {
        let queue = Arc::new(InMemoryJobQueue::new(
            "reminders",
            BackoffPolicy::new(Duration::from_millis(30), Duration::from_secs(1)),
            50,
        ));
        let mailer = MockMailer::failing(2);
        let dispatcher = JobDispatcher::new(
            queue.clone(),
            mailer.clone(),
            1,
            "noreply@example.org".to_string(),
        );
        let mut lifecycle = queue.lifecycle();
        let started = Instant::now();

        queue
            .enqueue(EnqueueJob {
                kind: JobKind::Immediate,
                dedup_key: "immediate:42".to_string(),
                payload: event(42),
                scheduled_for: Utc::now(),
                max_attempts: 3,
            })
            .await
            .unwrap();
        let _workers = dispatcher.spawn();

        let signal = timeout(Duration::from_secs(2), lifecycle.recv())
            .await
            .expect("job never finished")
            .unwrap();
        assert!(matches!(signal, JobLifecycle::Completed { .. }));

        // two failed attempts with 30ms and 60ms backoff before the third
        assert!(started.elapsed() >= Duration::from_millis(90));
        let job = queue.find("immediate:42").await.unwrap().unwrap();
        assert_eq!(job.attempts, 3);
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(mailer.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_fail_terminally() {
        let queue = Arc::new(InMemoryJobQueue::new(
            "reminders",
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(50)),
            50,
        ));
        let mailer = MockMailer::failing(10);
        let dispatcher = JobDispatcher::new(
            queue.clone(),
            mailer.clone(),
            1,
            "noreply@example.org".to_string(),
        );
        let mut lifecycle = queue.lifecycle();

        queue
            .enqueue(EnqueueJob {
                kind: JobKind::Reminder,
                dedup_key: "reminder:42:24h".to_string(),
                payload: event(42),
                scheduled_for: Utc::now(),
                max_attempts: 3,
            })
            .await
            .unwrap();
        let _workers = dispatcher.spawn();

        let signal = timeout(Duration::from_secs(2), lifecycle.recv())
            .await
            .expect("job never finished")
            .unwrap();
        let JobLifecycle::Failed { error, .. } = signal else {
            panic!("expected terminal failure");
        };
        assert!(error.contains("smtp relay refused"));

        let job = queue.find("reminder:42:24h").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
        assert!(mailer.sent.lock().await.is_empty());
    }
}
