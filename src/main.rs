use std::io::Error;
use std::sync::Arc;
use std::time::Duration;

use poem::{EndpointExt, Route, Server, get, listener::TcpListener};
use poem_openapi::OpenApiService;
use tokio::main;

use crate::{
    application::{
        handlers::{dispatcher::JobDispatcher, scheduler::NotificationScheduler},
        services::{broadcast_hub::BroadcastHub, job_queue::JobQueue, outbox::EventOutbox},
        usecases::publish_event::PublishEventUseCase,
    },
    config::Config,
    domain::models::{BackoffPolicy, ReminderPolicy},
    infrastructure::{
        mail::http_api::HttpMailer,
        messaging::redis_bus::{EventSubscriber, RedisEventBus},
        queue::in_memory::InMemoryJobQueue,
    },
    presentation::http::{
        endpoints::{
            events::EventsEndpoints,
            root::{ApiState, Endpoints},
        },
        sse,
    },
};

mod application;
mod config;
mod domain;
mod infrastructure;
mod presentation;

#[main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::try_parse().map_err(Error::other)?;
    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);

    let redis = redis::Client::open(config.redis_url.as_str()).map_err(Error::other)?;
    let backoff = BackoffPolicy::new(
        Duration::from_millis(config.backoff_base_ms),
        Duration::from_millis(config.backoff_cap_ms),
    );

    let bus = Arc::new(RedisEventBus::new(redis.clone()));
    let (outbox, _relay) = EventOutbox::start(bus, backoff);

    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new(
        &config.queue_name,
        backoff,
        config.job_history_limit,
    ));
    let scheduler = Arc::new(NotificationScheduler::new(
        queue.clone(),
        ReminderPolicy::hours(config.reminder_lead_hours),
        config.max_attempts,
    ));
    let hub = BroadcastHub::new(Duration::from_secs(config.heartbeat_secs));
    let _subscriber = EventSubscriber::new(redis).spawn(scheduler, hub.clone());

    let mailer = Arc::new(HttpMailer::new(config.mail_api_url.clone()));
    let dispatcher = JobDispatcher::new(
        queue,
        mailer,
        config.dispatcher_workers,
        config.mail_from.clone(),
    );
    let _workers = dispatcher.spawn();

    let state = Arc::new(ApiState {
        publish_event_usecase: Arc::new(PublishEventUseCase::new(outbox)),
        hub: hub.clone(),
    });

    tracing::info!("Starting server at {}", server_url);

    let api_service = OpenApiService::new(
        (Endpoints, EventsEndpoints::new(state)),
        "Appointment Notifications API",
        "0.1.0",
    )
    .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new()
        .nest("/api", api_service)
        .at("/events/stream", get(sse::event_stream))
        .nest("/", ui)
        .data(hub);

    Server::new(TcpListener::bind(format!("localhost:{}", config.port)))
        .run(app)
        .await
}
