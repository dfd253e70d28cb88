use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("broker unreachable: {0}")]
    Transport(String),
    #[error("malformed event: {0}")]
    Validation(String),
    #[error("mail delivery failed: {0}")]
    Delivery(String),
    #[error("client connection lost: {0}")]
    Connection(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
