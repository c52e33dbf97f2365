use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::info;

use super::{Record, Repository, StoreError, Window};
use crate::config::DatabaseConfig;

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed collection.
pub struct MongoStore<T: Record> {
    collection: Collection<T>,
}

impl<T: Record> Clone for MongoStore<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<T: Record> MongoStore<T> {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection::<T>(T::COLLECTION),
        }
    }

    pub(crate) fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    fn sort_document() -> Document {
        let mut sort = Document::new();
        sort.insert(T::SORT_FIELD, -1);
        sort.insert("_id", -1);
        sort
    }
}

/// Open the client and verify the deployment answers a ping.
pub async fn connect(config: &DatabaseConfig, url: &str) -> Result<(Client, Database), StoreError> {
    let mut options = ClientOptions::parse(url).await?;
    options.app_name = Some("hunt-property-api".to_string());
    options.server_selection_timeout = Some(Duration::from_secs(30));
    options.connect_timeout = Some(Duration::from_secs(30));
    options.retry_writes = Some(true);
    options.retry_reads = Some(true);

    let client = Client::with_options(options)?;
    let database = client.database(&config.name);
    database.run_command(doc! { "ping": 1 }, None).await?;
    info!(database = %config.name, "connected to MongoDB");

    Ok((client, database))
}

fn index(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

/// Create the indexes queries rely on: geo/text search, filters, uniqueness and OTP expiry.
pub async fn ensure_indexes(database: &Database) -> Result<(), StoreError> {
    let properties = database.collection::<Document>("properties");
    properties
        .create_indexes(
            [
                index(doc! { "location.geo": "2dsphere" }),
                index(doc! { "title": "text", "description": "text" }),
                index(doc! { "transaction_type": 1, "price": 1 }),
                index(doc! { "bedrooms": 1, "bathrooms": 1 }),
                index(doc! { "owner_id": 1 }),
                index(doc! { "posted_at": -1 }),
            ],
            None,
        )
        .await?;

    let users = database.collection::<Document>("users");
    users
        .create_indexes(
            [
                unique_index(doc! { "email": 1 }),
                unique_index(doc! { "phone": 1 }),
            ],
            None,
        )
        .await?;

    for (name, fields) in [
        ("reviews", &["property_id", "user_id"][..]),
        ("inquiries", &["property_id", "user_id"][..]),
        ("transactions", &["property_id", "buyer_id", "seller_id"][..]),
        ("notifications", &["user_id"][..]),
        ("orders", &["user_id"][..]),
        ("requirements", &["user_id"][..]),
        ("home_loan_applications", &["user_id"][..]),
        ("property_cost_calculations", &["user_id"][..]),
    ] {
        let collection = database.collection::<Document>(name);
        let mut models: Vec<IndexModel> = fields
            .iter()
            .map(|field| {
                let mut keys = Document::new();
                keys.insert(*field, 1);
                index(keys)
            })
            .collect();
        models.push(index(doc! { "created_at": -1 }));
        collection.create_indexes(models, None).await?;
    }

    let favorites = database.collection::<Document>("favorites");
    favorites
        .create_indexes(
            [
                unique_index(doc! { "user_id": 1, "property_id": 1 }),
                index(doc! { "user_id": 1 }),
            ],
            None,
        )
        .await?;

    let otps = database.collection::<Document>("otps");
    otps.create_indexes(
        [
            unique_index(doc! { "phone_number": 1 }),
            IndexModel::builder()
                .keys(doc! { "expires_at": 1 })
                .options(
                    IndexOptions::builder()
                        .expire_after(Duration::from_secs(0))
                        .build(),
                )
                .build(),
        ],
        None,
    )
    .await?;

    info!("MongoDB indexes ensured");
    Ok(())
}

/// Maps E11000 write failures onto [`StoreError::Duplicate`].
pub(crate) fn classify(err: mongodb::error::Error) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            StoreError::Duplicate {
                field: duplicate_field(&write.message),
            }
        }
        _ => StoreError::Database(err),
    }
}

fn duplicate_field(message: &str) -> String {
    message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(|index| index.trim_end_matches("_1").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl<T: Record> Repository<T> for MongoStore<T> {
    async fn insert(&self, record: T) -> Result<T, StoreError> {
        let id = record.id();
        self.collection
            .insert_one(&record, None)
            .await
            .map_err(classify)?;
        let stored = self.collection.find_one(doc! { "_id": id }, None).await?;
        Ok(stored.unwrap_or(record))
    }

    async fn get(&self, id: ObjectId) -> Result<Option<T>, StoreError> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find(&self, filter: &T::Filter, window: Window) -> Result<Vec<T>, StoreError> {
        let options = FindOptions::builder()
            .sort(Self::sort_document())
            .skip(window.offset)
            .limit(window.limit.map(|limit| limit as i64))
            .build();
        let cursor = self
            .collection
            .find(T::filter_document(filter), options)
            .await?;
        let records: Vec<T> = cursor.try_collect().await?;
        Ok(records)
    }

    async fn count(&self, filter: &T::Filter) -> Result<u64, StoreError> {
        Ok(self
            .collection
            .count_documents(T::filter_document(filter), None)
            .await?)
    }

    async fn update(&self, id: ObjectId, patch: &T::Patch) -> Result<Option<T>, StoreError> {
        let set = T::patch_document(patch)?;
        if !set.is_empty() {
            let result = self
                .collection
                .update_one(doc! { "_id": id }, doc! { "$set": set }, None)
                .await
                .map_err(classify)?;
            if result.matched_count == 0 {
                return Ok(None);
            }
        }
        self.get(id).await
    }

    async fn update_many(&self, filter: &T::Filter, patch: &T::Patch) -> Result<u64, StoreError> {
        let set = T::patch_document(patch)?;
        if set.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .update_many(T::filter_document(filter), doc! { "$set": set }, None)
            .await
            .map_err(classify)?;
        Ok(result.modified_count)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, filter: &T::Filter) -> Result<u64, StoreError> {
        let result = self
            .collection
            .delete_many(T::filter_document(filter), None)
            .await?;
        Ok(result.deleted_count)
    }
}
