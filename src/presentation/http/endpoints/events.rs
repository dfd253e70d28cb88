use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::{
    application::usecases::publish_event::PublishEventRequest,
    domain::errors::NotifyError,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::map_stats,
        requests::PublishEventRequestDto,
        responses::{BroadcastStatsDto, PublishAcceptedDto},
    },
};

#[derive(Clone)]
pub struct EventsEndpoints {
    state: Arc<ApiState>,
}

impl EventsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl EventsEndpoints {
    /// Ingress for the originating collaborator: the event is accepted into
    /// the outbox and published to the broker by the relay.
    #[oai(
        path = "/events/publish",
        method = "post",
        tag = EndpointsTags::Events,
    )]
    pub async fn publish_event(
        &self,
        request: Json<PublishEventRequestDto>,
    ) -> PoemResult<Json<PublishAcceptedDto>> {
        let event = self
            .state
            .publish_event_usecase
            .execute(PublishEventRequest {
                kind: request.event_type.into(),
                id: request.id,
                user_id: request.user_id,
                appointment_date: request.appointment_date.clone(),
                email: request.email.clone(),
                service_id: request.service_id,
                service_name: request.service_name.clone(),
            })
            .map_err(|err| match err.downcast_ref::<NotifyError>() {
                Some(NotifyError::Validation(_)) => bad_request(err),
                _ => internal_error(err),
            })?;

        Ok(Json(PublishAcceptedDto {
            accepted: true,
            event_id: event.id,
        }))
    }

    #[oai(
        path = "/events/stats",
        method = "get",
        tag = EndpointsTags::Events,
    )]
    pub async fn stats(&self) -> PoemResult<Json<BroadcastStatsDto>> {
        let stats = self.state.hub.stats().await;
        Ok(Json(map_stats(&stats)))
    }
}

fn internal_error(err: anyhow::Error) -> poem::Error {
    poem::Error::from_string(
        err.to_string(),
        poem::http::StatusCode::INTERNAL_SERVER_ERROR,
    )
}

fn bad_request(err: anyhow::Error) -> poem::Error {
    poem::Error::from_string(err.to_string(), poem::http::StatusCode::BAD_REQUEST)
}
