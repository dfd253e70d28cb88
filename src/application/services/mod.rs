pub mod broadcast_hub;
pub mod event_bus;
pub mod job_queue;
pub mod mailer;
pub mod outbox;
