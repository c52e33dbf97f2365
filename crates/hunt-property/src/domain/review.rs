use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::set;
use crate::store::{bson_datetime, optional_datetime, Record, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub property_id: ObjectId,
    pub user_id: ObjectId,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn view(&self) -> ReviewView {
        ReviewView {
            id: self.id.to_hex(),
            property_id: self.property_id.to_hex(),
            user_id: self.user_id.to_hex(),
            rating: self.rating,
            comment: self.comment.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(rename = "_id")]
    pub id: String,
    pub property_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewReview {
    pub property_id: String,
    pub user_id: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReviewPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReviewPatch {
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.updated_at = Some(now);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFilter {
    pub property_id: Option<ObjectId>,
    pub user_id: Option<ObjectId>,
}

impl Record for Review {
    const COLLECTION: &'static str = "reviews";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = ReviewFilter;
    type Patch = ReviewPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &ReviewFilter) -> bool {
        filter
            .property_id
            .map_or(true, |property| self.property_id == property)
            && filter.user_id.map_or(true, |user| self.user_id == user)
    }

    fn filter_document(filter: &ReviewFilter) -> Document {
        let mut query = Document::new();
        if let Some(property) = filter.property_id {
            query.insert("property_id", property);
        }
        if let Some(user) = filter.user_id {
            query.insert("user_id", user);
        }
        query
    }

    fn apply(&mut self, patch: &ReviewPatch) {
        set(&mut self.rating, &patch.rating);
        set(&mut self.comment, &patch.comment);
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
    }

    fn patch_document(patch: &ReviewPatch) -> Result<Document, StoreError> {
        let mut fields = bson::to_document(patch)?;
        if let Some(at) = patch.updated_at {
            fields.insert("updated_at", bson_datetime(at));
        }
        Ok(fields)
    }
}

/// Aggregate rating for one listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub property_id: String,
    pub total_reviews: u64,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, u64>,
}

impl ReviewSummary {
    pub fn from_reviews(property_id: ObjectId, reviews: &[Review]) -> Self {
        let mut distribution: BTreeMap<u8, u64> = (1..=5).map(|star| (star, 0)).collect();
        let mut sum = 0u64;
        for review in reviews {
            *distribution.entry(review.rating).or_default() += 1;
            sum += u64::from(review.rating);
        }

        let total = reviews.len() as u64;
        let average_rating = if total == 0 {
            0.0
        } else {
            ((sum as f64 / total as f64) * 10.0).round() / 10.0
        };

        Self {
            property_id: property_id.to_hex(),
            total_reviews: total,
            average_rating,
            rating_distribution: distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8) -> Review {
        Review {
            id: ObjectId::new(),
            property_id: ObjectId::new(),
            user_id: ObjectId::new(),
            rating,
            comment: "ok".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn summary_rounds_average_to_one_decimal() {
        let property = ObjectId::new();
        let summary = ReviewSummary::from_reviews(property, &[review(5), review(4), review(4)]);
        assert_eq!(summary.total_reviews, 3);
        assert_eq!(summary.average_rating, 4.3);
        assert_eq!(summary.rating_distribution[&4], 2);
        assert_eq!(summary.rating_distribution[&1], 0);
    }

    #[test]
    fn rating_must_be_between_one_and_five() {
        let bad = NewReview {
            property_id: ObjectId::new().to_hex(),
            user_id: ObjectId::new().to_hex(),
            rating: 6,
            comment: String::new(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn stamped_patch_writes_updated_at() {
        let patch = ReviewPatch {
            comment: Some("better".to_string()),
            ..ReviewPatch::default()
        }
        .stamped(Utc::now());
        let fields = Review::patch_document(&patch).expect("encodes");
        assert!(fields.contains_key("comment"));
        assert!(fields.contains_key("updated_at"));
        assert!(!fields.contains_key("rating"));
    }
}
