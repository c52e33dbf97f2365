use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::StoreError;

/// Outstanding code for one phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub phone_number: String,
    #[serde(rename = "otp")]
    pub code: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Keyed by phone number; `save` replaces any previous record.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn load(&self, phone: &str) -> Result<Option<OtpRecord>, StoreError>;
    async fn save(&self, record: OtpRecord) -> Result<(), StoreError>;
    async fn remove(&self, phone: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<String, OtpRecord>>,
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn load(&self, phone: &str) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self.records.lock().get(phone).cloned())
    }

    async fn save(&self, record: OtpRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .insert(record.phone_number.clone(), record);
        Ok(())
    }

    async fn remove(&self, phone: &str) -> Result<(), StoreError> {
        self.records.lock().remove(phone);
        Ok(())
    }
}

/// `otps` collection; expiry is also enforced by the TTL index on `expires_at`.
pub struct MongoOtpStore {
    collection: Collection<OtpRecord>,
}

impl MongoOtpStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection("otps"),
        }
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn load(&self, phone: &str) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self
            .collection
            .find_one(doc! { "phone_number": phone }, None)
            .await?)
    }

    async fn save(&self, record: OtpRecord) -> Result<(), StoreError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(
                doc! { "phone_number": &record.phone_number },
                &record,
                options,
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, phone: &str) -> Result<(), StoreError> {
        self.collection
            .delete_one(doc! { "phone_number": phone }, None)
            .await?;
        Ok(())
    }
}

/// Writes to both stores and reads the primary first. Only fallback failures are fatal.
pub struct MirroredOtpStore {
    primary: Arc<dyn OtpStore>,
    fallback: Arc<dyn OtpStore>,
}

impl MirroredOtpStore {
    pub fn new(primary: Arc<dyn OtpStore>, fallback: Arc<dyn OtpStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl OtpStore for MirroredOtpStore {
    async fn load(&self, phone: &str) -> Result<Option<OtpRecord>, StoreError> {
        match self.primary.load(phone).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => self.fallback.load(phone).await,
            Err(err) => {
                warn!(error = %err, "primary otp store unavailable, reading fallback");
                self.fallback.load(phone).await
            }
        }
    }

    async fn save(&self, record: OtpRecord) -> Result<(), StoreError> {
        self.fallback.save(record.clone()).await?;
        if let Err(err) = self.primary.save(record).await {
            warn!(error = %err, "failed to persist otp to primary store");
        }
        Ok(())
    }

    async fn remove(&self, phone: &str) -> Result<(), StoreError> {
        self.fallback.remove(phone).await?;
        if let Err(err) = self.primary.remove(phone).await {
            warn!(error = %err, "failed to remove otp from primary store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(phone: &str, code: &str) -> OtpRecord {
        let now = Utc::now();
        OtpRecord {
            phone_number: phone.to_string(),
            code: code.to_string(),
            expires_at: now + Duration::minutes(10),
            verified: false,
            attempts: 0,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn save_replaces_previous_code() {
        let store = MemoryOtpStore::default();
        store.save(record("+919000000001", "111111")).await.expect("save");
        store.save(record("+919000000001", "222222")).await.expect("save");
        let loaded = store.load("+919000000001").await.expect("load").expect("present");
        assert_eq!(loaded.code, "222222");
    }

    #[tokio::test]
    async fn mirrored_store_reads_fallback_when_primary_misses() {
        let primary = Arc::new(MemoryOtpStore::default());
        let fallback = Arc::new(MemoryOtpStore::default());
        let mirrored = MirroredOtpStore::new(primary.clone(), fallback.clone());

        fallback.save(record("+919000000002", "333333")).await.expect("save");
        let loaded = mirrored.load("+919000000002").await.expect("load");
        assert_eq!(loaded.map(|r| r.code).as_deref(), Some("333333"));

        mirrored.save(record("+919000000003", "444444")).await.expect("save");
        assert!(primary.load("+919000000003").await.expect("load").is_some());
        assert!(fallback.load("+919000000003").await.expect("load").is_some());

        mirrored.remove("+919000000003").await.expect("remove");
        assert!(mirrored.load("+919000000003").await.expect("load").is_none());
    }

    #[test]
    fn code_is_stored_under_otp_key() {
        let doc = mongodb::bson::to_document(&record("+919000000004", "555555")).expect("encodes");
        assert_eq!(doc.get_str("otp").expect("otp field"), "555555");
        assert!(doc.get_datetime("expires_at").is_ok());
    }
}
