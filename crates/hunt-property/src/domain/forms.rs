//! Submit-once forms: Post Your Requirement, home loan applications and
//! property cost estimates.

use std::fmt;

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::Validate;

use super::{NoPatch, TransactionType};
use crate::store::Record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Submitted,
}

/// Forms are listed per submitting user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitterFilter {
    pub user_id: Option<ObjectId>,
}

impl SubmitterFilter {
    pub fn for_user(user_id: ObjectId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    fn matches(&self, submitter: Option<ObjectId>) -> bool {
        self.user_id.map_or(true, |user| submitter == Some(user))
    }

    fn to_document(&self) -> Document {
        let mut query = Document::new();
        if let Some(user) = self.user_id {
            query.insert("user_id", user);
        }
        query
    }
}

/// Anonymous submissions are allowed; an unparseable user id is stored as absent.
pub fn optional_submitter(raw: Option<&str>) -> Option<ObjectId> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| ObjectId::parse_str(raw).ok())
}

macro_rules! submitted_record {
    ($record:ty, $collection:literal) => {
        impl Record for $record {
            const COLLECTION: &'static str = $collection;
            const SORT_FIELD: &'static str = "created_at";

            type Filter = SubmitterFilter;
            type Patch = NoPatch;

            fn id(&self) -> ObjectId {
                self.id
            }

            fn sort_key(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn matches(&self, filter: &SubmitterFilter) -> bool {
                filter.matches(self.user_id)
            }

            fn filter_document(filter: &SubmitterFilter) -> Document {
                filter.to_document()
            }

            fn apply(&mut self, _patch: &NoPatch) {}
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub user_id: Option<ObjectId>,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_subtype: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

submitted_record!(Requirement, "requirements");

impl Requirement {
    pub fn view(&self) -> RequirementView {
        RequirementView {
            id: self.id.to_hex(),
            user_id: self.user_id.map(|user| user.to_hex()),
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            transaction_type: self.transaction_type,
            property_category: self.property_category.clone(),
            property_subtype: self.property_subtype.clone(),
            city: self.city.clone(),
            locality: self.locality.clone(),
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            bedrooms: self.bedrooms,
            notes: self.notes.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub transaction_type: TransactionType,
    pub property_category: Option<String>,
    pub property_subtype: Option<String>,
    pub city: String,
    pub locality: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub bedrooms: Option<u32>,
    pub notes: Option<String>,
    pub status: FormStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_budget"))]
pub struct NewRequirement {
    #[serde(default)]
    pub user_id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub property_category: Option<String>,
    #[serde(default)]
    pub property_subtype: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub budget_min: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn validate_budget(form: &NewRequirement) -> Result<(), validator::ValidationError> {
    match (form.budget_min, form.budget_max) {
        (Some(min), Some(max)) if max < min => {
            Err(validator::ValidationError::new("budget_max_below_min"))
        }
        _ => Ok(()),
    }
}

impl NewRequirement {
    pub fn into_record(self, now: DateTime<Utc>) -> Requirement {
        Requirement {
            id: ObjectId::new(),
            user_id: optional_submitter(self.user_id.as_deref()),
            name: self.name,
            phone: self.phone,
            email: self.email,
            transaction_type: self.transaction_type,
            property_category: self.property_category,
            property_subtype: self.property_subtype,
            city: self.city,
            locality: self.locality,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            bedrooms: self.bedrooms,
            notes: self.notes,
            status: FormStatus::Submitted,
            created_at: now,
        }
    }
}

/// Loan products offered on the Apply Loan form. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanType {
    Home,
    Commercial,
    Residential,
}

impl LoanType {
    pub fn label(&self) -> &'static str {
        match self {
            LoanType::Home => "Home Loan",
            LoanType::Commercial => "Commercial Loan",
            LoanType::Residential => "Residential Loan",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "home loan" => Some(Self::Home),
            "commercial loan" => Some(Self::Commercial),
            "residential loan" => Some(Self::Residential),
            _ => None,
        }
    }
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for LoanType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for LoanType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        LoanType::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(
                "loan_type must be one of: Home Loan, Commercial Loan, Residential Loan",
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLoanApplication {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub user_id: Option<ObjectId>,
    pub loan_type: LoanType,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

submitted_record!(HomeLoanApplication, "home_loan_applications");

impl HomeLoanApplication {
    pub fn view(&self) -> HomeLoanView {
        HomeLoanView {
            id: self.id.to_hex(),
            user_id: self.user_id.map(|user| user.to_hex()),
            loan_type: self.loan_type,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            loan_amount: self.loan_amount,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeLoanView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: Option<String>,
    pub loan_type: LoanType,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub loan_amount: Option<f64>,
    pub status: FormStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewHomeLoanApplication {
    #[serde(default)]
    pub user_id: Option<String>,
    pub loan_type: LoanType,
    #[validate(length(min = 1))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub loan_amount: Option<f64>,
}

impl NewHomeLoanApplication {
    pub fn into_record(self, now: DateTime<Utc>) -> HomeLoanApplication {
        HomeLoanApplication {
            id: ObjectId::new(),
            user_id: optional_submitter(self.user_id.as_deref()),
            loan_type: self.loan_type,
            full_name: self.full_name.trim().to_string(),
            email: self.email,
            phone: self.phone,
            address: self.address,
            loan_amount: self.loan_amount,
            status: FormStatus::Submitted,
            created_at: now,
        }
    }
}

/// One line of an annexure: `price` per unit times `units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CostRow {
    pub item: String,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub units: f64,
}

fn row_sum(rows: &[CostRow]) -> f64 {
    rows.iter().map(|row| row.price * row.units).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCostCalculation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub user_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default)]
    pub annexure_i: Vec<CostRow>,
    #[serde(default)]
    pub annexure_ii: Vec<CostRow>,
    #[serde(default)]
    pub annexure_iii: Vec<CostRow>,
    pub grand_total: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

submitted_record!(PropertyCostCalculation, "property_cost_calculations");

impl PropertyCostCalculation {
    pub fn view(&self) -> PropertyCostView {
        PropertyCostView {
            id: self.id.to_hex(),
            user_id: self.user_id.map(|user| user.to_hex()),
            property_name: self.property_name.clone(),
            city: self.city.clone(),
            annexure_i: self.annexure_i.clone(),
            annexure_ii: self.annexure_ii.clone(),
            annexure_iii: self.annexure_iii.clone(),
            grand_total: self.grand_total,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyCostView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: Option<String>,
    pub property_name: Option<String>,
    pub city: Option<String>,
    pub annexure_i: Vec<CostRow>,
    pub annexure_ii: Vec<CostRow>,
    pub annexure_iii: Vec<CostRow>,
    pub grand_total: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPropertyCostCalculation {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub annexure_i: Vec<CostRow>,
    #[serde(default)]
    #[validate(nested)]
    pub annexure_ii: Vec<CostRow>,
    #[serde(default)]
    #[validate(nested)]
    pub annexure_iii: Vec<CostRow>,
}

impl NewPropertyCostCalculation {
    pub fn grand_total(&self) -> f64 {
        row_sum(&self.annexure_i) + row_sum(&self.annexure_ii) + row_sum(&self.annexure_iii)
    }

    pub fn into_record(self, now: DateTime<Utc>) -> PropertyCostCalculation {
        let grand_total = self.grand_total();
        PropertyCostCalculation {
            id: ObjectId::new(),
            user_id: optional_submitter(self.user_id.as_deref()),
            property_name: self.property_name,
            city: self.city,
            annexure_i: self.annexure_i,
            annexure_ii: self.annexure_ii,
            annexure_iii: self.annexure_iii,
            grand_total,
            created_at: now,
        }
    }
}
