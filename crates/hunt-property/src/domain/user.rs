use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

use super::set;
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Buyer,
    Owner,
    Agent,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Buyer => "buyer",
            UserType::Owner => "owner",
            UserType::Agent => "agent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buyer" => Some(Self::Buyer),
            "owner" => Some(Self::Owner),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// SHA-256 hex digest stored in place of the raw password.
pub fn hash_password(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub user_type: UserType,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_plan_id: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.to_hex(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            user_type: self.user_type,
            subscription_plan_id: self.subscription_plan_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public profile; the password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub user_type: UserType,
    pub subscription_plan_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
    pub user_type: UserType,
    #[validate(length(min = 1))]
    pub password: String,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: ObjectId::new(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            user_type: self.user_type,
            password: hash_password(&self.password),
            subscription_plan_id: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    /// Set by the order flow, never from a request body.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub subscription_plan_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub user_type: Option<UserType>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserFilter {
    pub fn by_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = UserFilter;
    type Patch = UserPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        filter.user_type.map_or(true, |kind| self.user_type == kind)
            && filter.email.as_ref().map_or(true, |email| &self.email == email)
            && filter.phone.as_ref().map_or(true, |phone| &self.phone == phone)
    }

    fn filter_document(filter: &UserFilter) -> Document {
        let mut query = Document::new();
        if let Some(kind) = filter.user_type {
            query.insert("user_type", kind.as_str());
        }
        if let Some(email) = &filter.email {
            query.insert("email", email.as_str());
        }
        if let Some(phone) = &filter.phone {
            query.insert("phone", phone.as_str());
        }
        query
    }

    fn apply(&mut self, patch: &UserPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.email, &patch.email);
        set(&mut self.phone, &patch.phone);
        set(&mut self.user_type, &patch.user_type);
        if let Some(plan) = &patch.subscription_plan_id {
            self.subscription_plan_id = Some(plan.clone());
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone()), ("phone", self.phone.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_passwords_as_sha256_hex() {
        assert_eq!(
            hash_password("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn view_omits_password() {
        let user = NewUser {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+919000000001".to_string(),
            user_type: UserType::Owner,
            password: "secret".to_string(),
        }
        .into_user(Utc::now());
        let json = serde_json::to_value(user.view()).expect("serializes");
        assert!(json.get("password").is_none());
        assert_eq!(json["user_type"], "owner");
    }

    #[test]
    fn clients_cannot_set_subscription_plan() {
        let patch: UserPatch =
            serde_json::from_str(r#"{"subscription_plan_id": "gold"}"#).expect("parses");
        assert!(patch.subscription_plan_id.is_none());
        assert!(super::super::is_empty_patch(&patch));
    }
}
