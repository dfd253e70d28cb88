use poem_openapi::Object;

use crate::presentation::models::EventKindDto;

#[derive(Object, Debug)]
pub struct PublishEventRequestDto {
    pub event_type: EventKindDto,
    pub id: i64,
    pub user_id: i64,
    /// ISO-8601 timestamp of the appointment.
    #[oai(validator(min_length = 1))]
    pub appointment_date: String,
    pub email: Option<String>,
    pub service_id: Option<i64>,
    pub service_name: Option<String>,
}
