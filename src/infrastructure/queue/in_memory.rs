use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, broadcast};
use uuid::Uuid;

use crate::{
    application::services::job_queue::{EnqueueJob, JobLifecycle, JobQueue},
    domain::models::{BackoffPolicy, Job, JobState},
};

struct Inner {
    jobs: HashMap<Uuid, Job>,
    by_key: HashMap<String, Uuid>,
    terminal: VecDeque<Uuid>,
}

/// Single-process delayed job queue. Fire times are absolute wall-clock
/// timestamps compared against `Utc::now()` on every wait, never a relative
/// sleep captured at enqueue time.
pub struct InMemoryJobQueue {
    name: String,
    backoff: BackoffPolicy,
    history_limit: usize,
    inner: Mutex<Inner>,
    wakeup: Notify,
    lifecycle_tx: broadcast::Sender<JobLifecycle>,
}

enum Scan {
    Due(Job),
    NextIn(Duration),
    Idle,
}

impl InMemoryJobQueue {
    pub fn new(name: &str, backoff: BackoffPolicy, history_limit: usize) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(64);
        Self {
            name: name.to_string(),
            backoff,
            history_limit,
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                by_key: HashMap::new(),
                terminal: VecDeque::new(),
            }),
            wakeup: Notify::new(),
            lifecycle_tx,
        }
    }

    fn scan(inner: &mut Inner) -> Scan {
        let now = Utc::now();
        let next = inner
            .jobs
            .values()
            .filter(|job| matches!(job.state, JobState::Waiting | JobState::Delayed))
            .min_by_key(|job| job.scheduled_for)
            .map(|job| (job.id, job.scheduled_for));

        match next {
            Some((id, scheduled_for)) if scheduled_for <= now => {
                match inner.jobs.get_mut(&id) {
                    Some(job) => {
                        job.attempts += 1;
                        job.state = JobState::Active;
                        Scan::Due(job.clone())
                    }
                    None => Scan::Idle,
                }
            }
            Some((_, scheduled_for)) => {
                let wait = (scheduled_for - now).to_std().unwrap_or(Duration::ZERO);
                Scan::NextIn(wait)
            }
            None => Scan::Idle,
        }
    }

    /// Moves a job into the bounded terminal history, evicting the oldest
    /// entries past the limit.
    fn retire(&self, inner: &mut Inner, job_id: Uuid) {
        inner.terminal.push_back(job_id);
        while inner.terminal.len() > self.history_limit {
            if let Some(evicted) = inner.terminal.pop_front() {
                if let Some(job) = inner.jobs.remove(&evicted) {
                    inner.by_key.remove(&job.dedup_key);
                }
            }
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, request: EnqueueJob) -> anyhow::Result<Job> {
        let mut inner = self.inner.lock().await;
        if let Some(id) = inner.by_key.get(&request.dedup_key) {
            if let Some(existing) = inner.jobs.get(id) {
                return Ok(existing.clone());
            }
        }

        let now = Utc::now();
        let state = if request.scheduled_for <= now {
            JobState::Waiting
        } else {
            JobState::Delayed
        };
        let job = Job {
            id: Uuid::new_v4(),
            queue: self.name.clone(),
            kind: request.kind,
            dedup_key: request.dedup_key,
            payload: request.payload,
            scheduled_for: request.scheduled_for,
            attempts: 0,
            max_attempts: request.max_attempts,
            state,
            last_error: None,
            created_at: now,
        };
        inner.by_key.insert(job.dedup_key.clone(), job.id);
        inner.jobs.insert(job.id, job.clone());
        drop(inner);

        self.wakeup.notify_waiters();
        Ok(job)
    }

    async fn remove(&self, dedup_key: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(id) = inner.by_key.get(dedup_key).copied() else {
            return Ok(false);
        };
        let pending = inner
            .jobs
            .get(&id)
            .is_some_and(|job| matches!(job.state, JobState::Waiting | JobState::Delayed));
        if !pending {
            return Ok(false);
        }
        inner.jobs.remove(&id);
        inner.by_key.remove(dedup_key);
        Ok(true)
    }

    async fn dequeue(&self) -> anyhow::Result<Job> {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            // capture wakeups that race with the scan below
            notified.as_mut().enable();

            let scan = {
                let mut inner = self.inner.lock().await;
                Self::scan(&mut inner)
            };
            match scan {
                Scan::Due(job) => return Ok(job),
                Scan::NextIn(wait) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Scan::Idle => notified.await,
            }
        }
    }

    async fn complete(&self, job_id: Uuid) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            anyhow::bail!("unknown job {job_id}");
        };
        job.state = JobState::Completed;
        self.retire(&mut inner, job_id);
        drop(inner);

        let _ = self.lifecycle_tx.send(JobLifecycle::Completed { job_id });
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: String) -> anyhow::Result<JobState> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            anyhow::bail!("unknown job {job_id}");
        };
        job.last_error = Some(error.clone());

        if job.attempts >= job.max_attempts {
            job.state = JobState::Failed;
            self.retire(&mut inner, job_id);
            drop(inner);
            let _ = self.lifecycle_tx.send(JobLifecycle::Failed { job_id, error });
            return Ok(JobState::Failed);
        }

        let delay = self.backoff.delay(job.attempts);
        job.scheduled_for = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        job.state = JobState::Delayed;
        let state = job.state;
        drop(inner);

        self.wakeup.notify_waiters();
        Ok(state)
    }

    async fn find(&self, dedup_key: &str) -> anyhow::Result<Option<Job>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_key
            .get(dedup_key)
            .and_then(|id| inner.jobs.get(id))
            .cloned())
    }

    fn lifecycle(&self) -> broadcast::Receiver<JobLifecycle> {
        self.lifecycle_tx.subscribe()
    }
}
