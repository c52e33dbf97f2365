use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{set, TransactionType};
use crate::store::{bson_datetime, optional_datetime, Record, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A sale or rental deal between two users on one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub property_id: ObjectId,
    pub buyer_id: ObjectId,
    pub seller_id: ObjectId,
    pub transaction_type: TransactionType,
    pub amount: f64,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn view(&self) -> TransactionView {
        TransactionView {
            id: self.id.to_hex(),
            property_id: self.property_id.to_hex(),
            buyer_id: self.buyer_id.to_hex(),
            seller_id: self.seller_id.to_hex(),
            transaction_type: self.transaction_type,
            amount: self.amount,
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(rename = "_id")]
    pub id: String,
    pub property_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTransaction {
    pub property_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub transaction_type: TransactionType,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    #[serde(default)]
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    #[serde(skip)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.status == Some(TransactionStatus::Completed) {
            self.completed_at = Some(now);
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub property_id: Option<ObjectId>,
    pub buyer_id: Option<ObjectId>,
    pub seller_id: Option<ObjectId>,
    pub status: Option<TransactionStatus>,
}

impl Record for Transaction {
    const COLLECTION: &'static str = "transactions";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = TransactionFilter;
    type Patch = TransactionPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &TransactionFilter) -> bool {
        filter
            .property_id
            .map_or(true, |property| self.property_id == property)
            && filter.buyer_id.map_or(true, |buyer| self.buyer_id == buyer)
            && filter.seller_id.map_or(true, |seller| self.seller_id == seller)
            && filter.status.map_or(true, |status| self.status == status)
    }

    fn filter_document(filter: &TransactionFilter) -> Document {
        let mut query = Document::new();
        if let Some(property) = filter.property_id {
            query.insert("property_id", property);
        }
        if let Some(buyer) = filter.buyer_id {
            query.insert("buyer_id", buyer);
        }
        if let Some(seller) = filter.seller_id {
            query.insert("seller_id", seller);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        query
    }

    fn apply(&mut self, patch: &TransactionPatch) {
        set(&mut self.status, &patch.status);
        set(&mut self.amount, &patch.amount);
        if patch.completed_at.is_some() {
            self.completed_at = patch.completed_at;
        }
    }

    fn patch_document(patch: &TransactionPatch) -> Result<Document, StoreError> {
        let mut fields = bson::to_document(patch)?;
        if let Some(at) = patch.completed_at {
            fields.insert("completed_at", bson_datetime(at));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_a_deal_sets_completed_at() {
        let now = Utc::now();
        let patch = TransactionPatch {
            status: Some(TransactionStatus::Completed),
            ..TransactionPatch::default()
        }
        .stamped(now);
        assert_eq!(patch.completed_at, Some(now));

        let amount_only = TransactionPatch {
            amount: Some(10.0),
            ..TransactionPatch::default()
        }
        .stamped(now);
        assert_eq!(amount_only.completed_at, None);
    }

    #[test]
    fn status_defaults_to_pending() {
        let raw = format!(
            r#"{{"property_id": "{0}", "buyer_id": "{0}", "seller_id": "{0}", "transaction_type": "sale", "amount": 10}}"#,
            ObjectId::new()
        );
        let created: NewTransaction = serde_json::from_str(&raw).expect("parses");
        assert_eq!(created.status, TransactionStatus::Pending);
    }
}
