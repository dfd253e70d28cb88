pub mod dispatcher;
pub mod scheduler;
