use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{double_option, set, set_nullable};
use crate::store::{bson_datetime, optional_datetime, Record, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Success,
    Invalid,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Invalid => "invalid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "invalid" => Some(Self::Invalid),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Subscription plan purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub status: OrderStatus,
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Last nine hex characters of a fresh object id.
pub fn generate_order_number() -> String {
    let hex = ObjectId::new().to_hex();
    hex[hex.len() - 9..].to_string()
}

/// Card title on the order history screen, e.g. `Owner-Gold -3500 / 114107135`.
pub fn order_title(plan_name: &str, amount: f64, order_number: &str) -> String {
    let suffix: String = {
        let chars: Vec<char> = order_number.chars().collect();
        chars[chars.len().saturating_sub(9)..].iter().collect()
    };
    let amount = if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount}")
    };
    format!("Owner-{plan_name} -{amount} / {suffix}")
}

impl Order {
    pub fn view(&self) -> OrderView {
        OrderView {
            id: self.id.to_hex(),
            user_id: self.user_id.to_hex(),
            title: order_title(&self.plan_name, self.amount, &self.order_number),
            plan_id: self.plan_id.clone(),
            plan_name: self.plan_name.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status,
            order_number: self.order_number.clone(),
            payment_reference: self.payment_reference.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub order_number: String,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOrder {
    pub user_id: String,
    #[validate(length(min = 1))]
    pub plan_id: String,
    #[validate(length(min = 1))]
    pub plan_name: String,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

impl NewOrder {
    pub fn into_order(self, user_id: ObjectId, now: DateTime<Utc>) -> Order {
        Order {
            id: ObjectId::new(),
            user_id,
            plan_id: self.plan_id,
            plan_name: self.plan_name,
            amount: self.amount,
            currency: self.currency.unwrap_or_else(|| "INR".to_string()),
            status: self.status,
            order_number: self
                .order_number
                .filter(|number| !number.trim().is_empty())
                .unwrap_or_else(generate_order_number),
            payment_reference: self.payment_reference,
            created_at: now,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<Option<String>>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.updated_at = Some(now);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub user_id: Option<ObjectId>,
    pub status: Option<OrderStatus>,
}

impl Record for Order {
    const COLLECTION: &'static str = "orders";
    const SORT_FIELD: &'static str = "created_at";

    type Filter = OrderFilter;
    type Patch = OrderPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &OrderFilter) -> bool {
        filter.user_id.map_or(true, |user| self.user_id == user)
            && filter.status.map_or(true, |status| self.status == status)
    }

    fn filter_document(filter: &OrderFilter) -> Document {
        let mut query = Document::new();
        if let Some(user) = filter.user_id {
            query.insert("user_id", user);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        query
    }

    fn apply(&mut self, patch: &OrderPatch) {
        set(&mut self.status, &patch.status);
        set_nullable(&mut self.payment_reference, &patch.payment_reference);
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
    }

    fn patch_document(patch: &OrderPatch) -> Result<Document, StoreError> {
        let mut fields = bson::to_document(patch)?;
        if let Some(at) = patch.updated_at {
            fields.insert("updated_at", bson_datetime(at));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_whole_amounts_and_last_nine_characters() {
        assert_eq!(
            order_title("Gold", 3500.0, "114107135936"),
            "Owner-Gold -3500 / 107135936"
        );
        assert_eq!(order_title("Bronze", 99.5, "abc"), "Owner-Bronze -99.5 / abc");
    }

    #[test]
    fn missing_order_number_is_generated() {
        let order = NewOrder {
            user_id: String::new(),
            plan_id: "gold".to_string(),
            plan_name: "Gold".to_string(),
            amount: 3500.0,
            currency: None,
            status: OrderStatus::Pending,
            order_number: None,
            payment_reference: None,
        }
        .into_order(ObjectId::new(), Utc::now());
        assert_eq!(order.order_number.len(), 9);
        assert_eq!(order.currency, "INR");
        assert!(order.view().title.ends_with(&order.order_number));
    }
}
