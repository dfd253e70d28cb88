use chrono::{DateTime, Utc};

use crate::{
    application::services::outbox::EventOutbox,
    domain::{
        errors::NotifyError,
        events::{AppointmentEvent, EventKind},
    },
};

pub struct PublishEventRequest {
    pub kind: EventKind,
    pub id: i64,
    pub user_id: i64,
    pub appointment_date: String,
    pub email: Option<String>,
    pub service_id: Option<i64>,
    pub service_name: Option<String>,
}

/// Entry point for the originating collaborator: validates the event and
/// hands it to the outbox. The caller's operation never fails on a down
/// broker.
pub struct PublishEventUseCase {
    outbox: EventOutbox,
}

impl PublishEventUseCase {
    pub fn new(outbox: EventOutbox) -> Self {
        Self { outbox }
    }

    pub fn execute(&self, request: PublishEventRequest) -> anyhow::Result<AppointmentEvent> {
        let appointment_date = request
            .appointment_date
            .parse::<DateTime<Utc>>()
            .map_err(|err| NotifyError::Validation(format!("appointmentDate: {err}")))?;

        let event = AppointmentEvent {
            id: request.id,
            user_id: request.user_id,
            appointment_date,
            email: request.email,
            service_id: request.service_id,
            service_name: request.service_name,
        };

        self.outbox.submit(request.kind, event.clone())?;
        Ok(event)
    }
}
