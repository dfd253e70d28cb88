use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::NotifyError;

/// The fixed set of recognized event types; one broker channel per kind,
/// named exactly after the event type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::AppointmentCreated,
        EventKind::AppointmentUpdated,
        EventKind::AppointmentCancelled,
    ];

    pub fn channel(&self) -> &'static str {
        match self {
            EventKind::AppointmentCreated => "appointment.created",
            EventKind::AppointmentUpdated => "appointment.updated",
            EventKind::AppointmentCancelled => "appointment.cancelled",
        }
    }

    pub fn from_channel(channel: &str) -> Option<EventKind> {
        Self::ALL.into_iter().find(|kind| kind.channel() == channel)
    }
}

/// A fact about an appointment, in transit only; `(kind, id)` is the
/// natural identity that dedup keys are derived from downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEvent {
    pub id: i64,
    pub user_id: i64,
    pub appointment_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl AppointmentEvent {
    /// Parses a broker payload. An unparseable body or an invalid
    /// `appointmentDate` rejects the event as malformed.
    pub fn from_json(payload: &str) -> Result<AppointmentEvent, NotifyError> {
        serde_json::from_str(payload).map_err(|err| NotifyError::Validation(err.to_string()))
    }
}
