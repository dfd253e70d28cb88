use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::{
    services::broadcast_hub::BroadcastHub, usecases::publish_event::PublishEventUseCase,
};

#[derive(Clone)]
pub struct ApiState {
    pub publish_event_usecase: Arc<PublishEventUseCase>,
    pub hub: Arc<BroadcastHub>,
}

pub struct Endpoints;

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Events,
}
