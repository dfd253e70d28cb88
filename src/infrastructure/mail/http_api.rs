use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    application::services::mailer::MailTransport,
    domain::{errors::NotifyError, models::OutboundEmail},
};

/// Mail transport speaking to an HTTP mail API: posts the message as JSON
/// and expects a delivery id back.
pub struct HttpMailer {
    http: Client,
    endpoint: String,
}

impl HttpMailer {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: Client::builder()
                .user_agent("notifications/mailer")
                .build()
                .expect("failed to build mail client"),
            endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeliveryResponse {
    id: String,
}

#[async_trait]
impl MailTransport for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> anyhow::Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(email)
            .send()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        if !response.status().is_success() {
            return Err(
                NotifyError::Delivery(format!("mail api returned {}", response.status())).into(),
            );
        }

        let payload: DeliveryResponse = response
            .json()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;
        Ok(payload.id)
    }
}
