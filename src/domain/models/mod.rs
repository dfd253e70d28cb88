pub mod email;
pub mod job;
pub mod reminder;

pub use email::OutboundEmail;
pub use job::{BackoffPolicy, Job, JobKind, JobState};
pub use reminder::ReminderPolicy;
