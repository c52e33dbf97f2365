use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{double_option, set, set_nullable};
use crate::store::Record;

/// Drives the tabs on the notification screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Inquiry,
    Favorite,
    PriceAlert,
    Review,
    Transaction,
    Order,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Inquiry => "inquiry",
            NotificationKind::Favorite => "favorite",
            NotificationKind::PriceAlert => "price_alert",
            NotificationKind::Review => "review",
            NotificationKind::Transaction => "transaction",
            NotificationKind::Order => "order",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inquiry" => Some(Self::Inquiry),
            "favorite" => Some(Self::Favorite),
            "price_alert" => Some(Self::PriceAlert),
            "review" => Some(Self::Review),
            "transaction" => Some(Self::Transaction),
            "order" => Some(Self::Order),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: ObjectId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            read: false,
            action_url: None,
            created_at,
        }
    }

    pub fn with_action(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id.to_hex(),
            user_id: self.user_id.to_hex(),
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            read: self.read,
            action_url: self.action_url.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[validate(length(min = 1))]
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NotificationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub action_url: Option<Option<String>>,
}

impl NotificationPatch {
    pub fn mark_read() -> Self {
        Self {
            read: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub user_id: Option<ObjectId>,
    pub read: Option<bool>,
    pub kind: Option<NotificationKind>,
}

impl NotificationFilter {
    pub fn unread(user_id: ObjectId) -> Self {
        Self {
            user_id: Some(user_id),
            read: Some(false),
            kind: None,
        }
    }
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = NotificationFilter;
    type Patch = NotificationPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &NotificationFilter) -> bool {
        filter.user_id.map_or(true, |user| self.user_id == user)
            && filter.read.map_or(true, |read| self.read == read)
            && filter.kind.map_or(true, |kind| self.kind == kind)
    }

    fn filter_document(filter: &NotificationFilter) -> Document {
        let mut query = Document::new();
        if let Some(user) = filter.user_id {
            query.insert("user_id", user);
        }
        if let Some(read) = filter.read {
            query.insert("read", read);
        }
        if let Some(kind) = filter.kind {
            query.insert("type", kind.as_str());
        }
        query
    }

    fn apply(&mut self, patch: &NotificationPatch) {
        set(&mut self.read, &patch.read);
        set(&mut self.title, &patch.title);
        set(&mut self.body, &patch.body);
        set_nullable(&mut self.action_url, &patch.action_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Repository};

    #[tokio::test]
    async fn mark_all_read_only_touches_unread_for_user() {
        let store = MemoryStore::<Notification>::default();
        let (user, other) = (ObjectId::new(), ObjectId::new());
        for owner in [user, user, other] {
            store
                .insert(Notification::new(
                    owner,
                    NotificationKind::System,
                    "Welcome",
                    "Thanks for joining",
                    Utc::now(),
                ))
                .await
                .expect("insert");
        }

        let modified = store
            .update_many(&NotificationFilter::unread(user), &NotificationPatch::mark_read())
            .await
            .expect("update");
        assert_eq!(modified, 2);
        assert_eq!(
            store.count(&NotificationFilter::unread(other)).await.expect("count"),
            1
        );
    }

    #[test]
    fn kind_serializes_under_type_key() {
        let note = Notification::new(
            ObjectId::new(),
            NotificationKind::PriceAlert,
            "Price drop",
            "A saved home got cheaper",
            Utc::now(),
        );
        let json = serde_json::to_value(note.view()).expect("serializes");
        assert_eq!(json["type"], "price_alert");
        assert_eq!(json["read"], false);
    }
}
