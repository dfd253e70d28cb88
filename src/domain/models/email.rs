use serde::Serialize;

/// Constructed fresh per job execution, handed to the mail transport,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}
