use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use super::NoPatch;
use crate::store::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub property_id: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(user_id: ObjectId, property_id: ObjectId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            property_id,
            created_at,
        }
    }

    pub fn view(&self) -> FavoriteView {
        FavoriteView {
            id: self.id.to_hex(),
            user_id: self.user_id.to_hex(),
            property_id: self.property_id.to_hex(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub property_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFavorite {
    pub user_id: String,
    pub property_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoriteFilter {
    pub user_id: Option<ObjectId>,
    pub property_id: Option<ObjectId>,
}

impl FavoriteFilter {
    pub fn for_user(user_id: ObjectId) -> Self {
        Self {
            user_id: Some(user_id),
            property_id: None,
        }
    }

    pub fn pair(user_id: ObjectId, property_id: ObjectId) -> Self {
        Self {
            user_id: Some(user_id),
            property_id: Some(property_id),
        }
    }
}

impl Record for Favorite {
    const COLLECTION: &'static str = "favorites";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = FavoriteFilter;
    type Patch = NoPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &FavoriteFilter) -> bool {
        filter.user_id.map_or(true, |user| self.user_id == user)
            && filter
                .property_id
                .map_or(true, |property| self.property_id == property)
    }

    fn filter_document(filter: &FavoriteFilter) -> Document {
        let mut query = Document::new();
        if let Some(user) = filter.user_id {
            query.insert("user_id", user);
        }
        if let Some(property) = filter.property_id {
            query.insert("property_id", property);
        }
        query
    }

    fn apply(&mut self, _patch: &NoPatch) {}

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "user_id_1_property_id",
            format!("{}:{}", self.user_id, self.property_id),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Repository, StoreError};

    #[tokio::test]
    async fn rejects_second_favorite_for_same_pair() {
        let store = MemoryStore::<Favorite>::default();
        let (user, property) = (ObjectId::new(), ObjectId::new());
        store
            .insert(Favorite::new(user, property, Utc::now()))
            .await
            .expect("first favorite");
        let err = store
            .insert(Favorite::new(user, property, Utc::now()))
            .await
            .expect_err("duplicate pair");
        assert!(matches!(err, StoreError::Duplicate { .. }));

        store
            .insert(Favorite::new(user, ObjectId::new(), Utc::now()))
            .await
            .expect("other property is fine");
        assert_eq!(store.count(&FavoriteFilter::for_user(user)).await.expect("count"), 2);
    }
}
