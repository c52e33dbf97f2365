use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::set;
use crate::store::{bson_datetime, optional_datetime, Record, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPreference {
    Phone,
    Email,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    #[default]
    Pending,
    Responded,
    Closed,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::Pending => "pending",
            InquiryStatus::Responded => "responded",
            InquiryStatus::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "responded" => Some(Self::Responded),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub property_id: ObjectId,
    pub user_id: ObjectId,
    pub message: String,
    pub contact_preference: ContactPreference,
    #[serde(default)]
    pub status: InquiryStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime", skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Inquiry {
    pub fn view(&self) -> InquiryView {
        InquiryView {
            id: self.id.to_hex(),
            property_id: self.property_id.to_hex(),
            user_id: self.user_id.to_hex(),
            message: self.message.clone(),
            contact_preference: self.contact_preference,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            responded_at: self.responded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InquiryView {
    #[serde(rename = "_id")]
    pub id: String,
    pub property_id: String,
    pub user_id: String,
    pub message: String,
    pub contact_preference: ContactPreference,
    pub status: InquiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInquiry {
    pub property_id: String,
    pub user_id: String,
    #[validate(length(min = 1))]
    pub message: String,
    pub contact_preference: ContactPreference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct InquiryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_preference: Option<ContactPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InquiryStatus>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl InquiryPatch {
    /// Adds the server-side timestamps; moving to `responded` records when it happened.
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.updated_at = Some(now);
        if self.status == Some(InquiryStatus::Responded) {
            self.responded_at = Some(now);
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InquiryFilter {
    pub property_id: Option<ObjectId>,
    pub user_id: Option<ObjectId>,
    pub status: Option<InquiryStatus>,
}

impl Record for Inquiry {
    const COLLECTION: &'static str = "inquiries";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = InquiryFilter;
    type Patch = InquiryPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &InquiryFilter) -> bool {
        filter
            .property_id
            .map_or(true, |property| self.property_id == property)
            && filter.user_id.map_or(true, |user| self.user_id == user)
            && filter.status.map_or(true, |status| self.status == status)
    }

    fn filter_document(filter: &InquiryFilter) -> Document {
        let mut query = Document::new();
        if let Some(property) = filter.property_id {
            query.insert("property_id", property);
        }
        if let Some(user) = filter.user_id {
            query.insert("user_id", user);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        query
    }

    fn apply(&mut self, patch: &InquiryPatch) {
        set(&mut self.message, &patch.message);
        set(&mut self.contact_preference, &patch.contact_preference);
        set(&mut self.status, &patch.status);
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
        if patch.responded_at.is_some() {
            self.responded_at = patch.responded_at;
        }
    }

    fn patch_document(patch: &InquiryPatch) -> Result<Document, StoreError> {
        let mut fields = bson::to_document(patch)?;
        if let Some(at) = patch.updated_at {
            fields.insert("updated_at", bson_datetime(at));
        }
        if let Some(at) = patch.responded_at {
            fields.insert("responded_at", bson_datetime(at));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responding_records_timestamp() {
        let now = Utc::now();
        let patch = InquiryPatch {
            status: Some(InquiryStatus::Responded),
            ..InquiryPatch::default()
        }
        .stamped(now);
        assert_eq!(patch.responded_at, Some(now));

        let closing = InquiryPatch {
            status: Some(InquiryStatus::Closed),
            ..InquiryPatch::default()
        }
        .stamped(now);
        assert_eq!(closing.responded_at, None);
        assert_eq!(closing.updated_at, Some(now));
    }

    #[test]
    fn rejects_unknown_contact_preference() {
        let raw = r#"{"property_id": "a", "user_id": "b", "message": "hi", "contact_preference": "fax"}"#;
        assert!(serde_json::from_str::<NewInquiry>(raw).is_err());
    }
}
