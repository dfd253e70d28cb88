use poem_openapi::Enum;

use crate::domain::events::EventKind;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventKindDto {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
}

impl From<EventKindDto> for EventKind {
    fn from(kind: EventKindDto) -> Self {
        match kind {
            EventKindDto::AppointmentCreated => EventKind::AppointmentCreated,
            EventKindDto::AppointmentUpdated => EventKind::AppointmentUpdated,
            EventKindDto::AppointmentCancelled => EventKind::AppointmentCancelled,
        }
    }
}
