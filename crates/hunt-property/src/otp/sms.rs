use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::SmsConfig;

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("sms transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sms gateway answered with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Outbound text message delivery.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError>;
}

/// Bulk-SMS style HTTP API taking everything as query parameters.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        let number = phone.trim().trim_start_matches('+');
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("apikey", self.config.api_key.as_str()),
                ("sender", self.config.sender_id.as_str()),
                ("numbers", number),
                ("message", message),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SmsError::Rejected(status));
        }
        info!(phone = %phone, "sms dispatched");
        Ok(())
    }
}

/// Used when no gateway is configured; the message only reaches the logs.
#[derive(Debug, Default)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        debug!(phone = %phone, message = %message, "sms gateway not configured");
        Ok(())
    }
}
