use chrono::{DateTime, Duration, Utc};

/// A single configured lead time subtracted from the appointment date to
/// produce the reminder fire time.
#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
    lead: Duration,
}

impl ReminderPolicy {
    pub fn hours(hours: i64) -> Self {
        Self {
            lead: Duration::hours(hours),
        }
    }

    pub fn fire_time(&self, appointment_date: DateTime<Utc>) -> DateTime<Utc> {
        appointment_date - self.lead
    }

    /// Suffix baked into reminder dedup keys, e.g. "24h".
    pub fn key_suffix(&self) -> String {
        format!("{}h", self.lead.num_hours())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_time_subtracts_lead() {
        let policy = ReminderPolicy::hours(24);
        let appointment = "2025-01-10T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let expected = "2025-01-09T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(policy.fire_time(appointment), expected);
    }

    #[test]
    fn key_suffix_reflects_lead() {
        assert_eq!(ReminderPolicy::hours(24).key_suffix(), "24h");
        assert_eq!(ReminderPolicy::hours(48).key_suffix(), "48h");
    }
}
