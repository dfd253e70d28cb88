use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{
    events::AppointmentEvent,
    models::{Job, JobKind, JobState},
};

#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub kind: JobKind,
    pub dedup_key: String,
    pub payload: AppointmentEvent,
    /// Absolute fire time. The queue must never start the job before this,
    /// and tracks it as a wall-clock timestamp so a restart with pending
    /// jobs does not postpone them.
    pub scheduled_for: DateTime<Utc>,
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub enum JobLifecycle {
    Completed { job_id: Uuid },
    Failed { job_id: Uuid, error: String },
}

/// Delayed job queue contract: idempotent enqueue keyed by `dedup_key`,
/// not-before-`scheduled_for` delivery, retry with backoff up to
/// `max_attempts`, and completed/failed lifecycle signals.
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    /// No-op when `dedup_key` already exists: returns the existing job.
    async fn enqueue(&self, request: EnqueueJob) -> anyhow::Result<Job>;

    /// Removes a pending job by its dedup key. Returns false when no
    /// pending job carries that key (already running, terminal, or absent).
    async fn remove(&self, dedup_key: &str) -> anyhow::Result<bool>;

    /// Waits for the next due job and marks it active.
    async fn dequeue(&self) -> anyhow::Result<Job>;

    async fn complete(&self, job_id: Uuid) -> anyhow::Result<()>;

    /// Records a failed attempt. Requeues with backoff until attempts are
    /// exhausted, then marks the job terminally failed. Returns the
    /// resulting state.
    async fn fail(&self, job_id: Uuid, error: String) -> anyhow::Result<JobState>;

    async fn find(&self, dedup_key: &str) -> anyhow::Result<Option<Job>>;

    fn lifecycle(&self) -> broadcast::Receiver<JobLifecycle>;
}
