pub mod publish_event;
