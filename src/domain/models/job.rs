use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::events::AppointmentEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Immediate,
    Reminder,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Immediate => "immediate",
            JobKind::Reminder => "reminder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

/// Retry spacing after a failed attempt: base doubling per attempt, capped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay to apply after `attempt` (1-based) has failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.cap)
    }
}

/// A unit of notification work owned by the queue. `dedup_key` is unique
/// within a queue: enqueuing the same key again is a no-op returning the
/// existing job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub queue: String,
    pub kind: JobKind,
    pub dedup_key: String,
    pub payload: AppointmentEvent,
    pub scheduled_for: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub state: JobState,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(600));
        assert_eq!(policy.delay(1), Duration::from_secs(30));
        assert_eq!(policy.delay(2), Duration::from_secs(60));
        assert_eq!(policy.delay(3), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(100));
        assert_eq!(policy.delay(3), Duration::from_secs(100));
        assert_eq!(policy.delay(20), Duration::from_secs(100));
    }
}
