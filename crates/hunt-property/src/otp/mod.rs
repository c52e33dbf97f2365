//! Phone verification codes.

pub mod sms;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::store::StoreError;

pub use sms::{HttpSmsGateway, LogSmsGateway, SmsError, SmsGateway};
pub use store::{MemoryOtpStore, MirroredOtpStore, MongoOtpStore, OtpRecord, OtpStore};

pub const MAX_ATTEMPTS: u32 = 5;

/// Six digits, never starting with zero.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn verification_message(code: &str) -> String {
    format!("Your Hunt Property verification code is {code}")
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    sms: Arc<dyn SmsGateway>,
    ttl: Duration,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, sms: Arc<dyn SmsGateway>, ttl_minutes: i64) -> Self {
        Self {
            store,
            sms,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// In-memory store and log-only delivery.
    pub fn in_memory(ttl_minutes: i64) -> Self {
        Self::new(
            Arc::new(MemoryOtpStore::default()),
            Arc::new(LogSmsGateway),
            ttl_minutes,
        )
    }

    /// Issue a fresh code, replacing any outstanding one, and try to deliver it.
    pub async fn request(&self, phone: &str) -> Result<String, StoreError> {
        self.request_at(phone, Utc::now()).await
    }

    pub async fn request_at(&self, phone: &str, now: DateTime<Utc>) -> Result<String, StoreError> {
        let code = generate_code();
        self.store
            .save(OtpRecord {
                phone_number: phone.to_string(),
                code: code.clone(),
                expires_at: now + self.ttl,
                verified: false,
                attempts: 0,
                created_at: now,
            })
            .await?;
        debug!(phone = %phone, code = %code, "otp issued");

        if let Err(err) = self.sms.send(phone, &verification_message(&code)).await {
            warn!(phone = %phone, error = %err, "failed to deliver otp");
        }
        Ok(code)
    }

    pub async fn verify(&self, phone: &str, code: &str) -> Result<bool, StoreError> {
        self.verify_at(phone, code, Utc::now()).await
    }

    /// Every check counts as an attempt, including the successful one.
    pub async fn verify_at(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.store.load(phone).await? else {
            return Ok(false);
        };
        if record.is_expired(now) || record.attempts >= MAX_ATTEMPTS {
            self.store.remove(phone).await?;
            return Ok(false);
        }

        record.attempts += 1;
        let matched = record.code == code.trim();
        if matched {
            record.verified = true;
        }
        self.store.save(record).await?;
        Ok(matched)
    }

    pub async fn is_verified(&self, phone: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        Ok(self
            .store
            .load(phone)
            .await?
            .is_some_and(|record| record.verified && !record.is_expired(now)))
    }

    pub async fn clear(&self, phone: &str) -> Result<(), StoreError> {
        self.store.remove(phone).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsGateway for RecordingGateway {
        async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
            self.sent.lock().push((phone.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct DownGateway;

    #[async_trait]
    impl SmsGateway for DownGateway {
        async fn send(&self, _phone: &str, _message: &str) -> Result<(), SmsError> {
            Err(SmsError::Rejected(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        }
    }

    const PHONE: &str = "+919876543210";

    #[test]
    fn codes_are_six_digits_without_leading_zero() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[tokio::test]
    async fn request_sends_message_and_verify_accepts_code() {
        let gateway = Arc::new(RecordingGateway::default());
        let service = OtpService::new(Arc::new(MemoryOtpStore::default()), gateway.clone(), 10);

        let code = service.request(PHONE).await.expect("issued");
        let sent = gateway.sent.lock().clone();
        assert_eq!(sent, vec![(PHONE.to_string(), verification_message(&code))]);

        assert!(!service.is_verified(PHONE).await.expect("lookup"));
        assert!(service.verify(PHONE, &code).await.expect("verify"));
        assert!(service.is_verified(PHONE).await.expect("lookup"));

        service.clear(PHONE).await.expect("clear");
        assert!(!service.is_verified(PHONE).await.expect("lookup"));
    }

    #[tokio::test]
    async fn delivery_failure_still_issues_code() {
        let service = OtpService::new(
            Arc::new(MemoryOtpStore::default()),
            Arc::new(DownGateway),
            10,
        );
        let code = service.request(PHONE).await.expect("issued despite gateway");
        assert!(service.verify(PHONE, &code).await.expect("verify"));
    }

    #[tokio::test]
    async fn correct_code_is_rejected_after_five_attempts() {
        let service = OtpService::in_memory(10);
        let code = service.request(PHONE).await.expect("issued");
        let wrong = if code == "999999" { "100000" } else { "999999" };

        for _ in 0..MAX_ATTEMPTS {
            assert!(!service.verify(PHONE, wrong).await.expect("verify"));
        }
        assert!(!service.verify(PHONE, &code).await.expect("verify"));
        // The exhausted record is gone entirely.
        assert!(!service.verify(PHONE, &code).await.expect("verify"));
    }

    #[tokio::test]
    async fn correct_code_is_rejected_after_expiry() {
        let service = OtpService::in_memory(10);
        let issued_at = Utc::now();
        let code = service.request_at(PHONE, issued_at).await.expect("issued");

        let later = issued_at + Duration::minutes(11);
        assert!(!service.verify_at(PHONE, &code, later).await.expect("verify"));
        assert!(!service.verify_at(PHONE, &code, issued_at).await.expect("record removed"));
    }

    #[tokio::test]
    async fn unknown_phone_never_verifies() {
        let service = OtpService::in_memory(10);
        assert!(!service.verify(PHONE, "123456").await.expect("verify"));
    }
}
