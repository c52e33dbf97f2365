//! Collection records, request payloads and response views.
//!
//! Records are the stored shape (object ids, BSON timestamps). Views are what the HTTP
//! surface returns: ids rendered as hex strings, timestamps as RFC 3339.

pub mod facets;
pub mod favorite;
pub mod finance;
pub mod forms;
pub mod inquiry;
pub mod notification;
pub mod order;
pub mod plans;
pub mod property;
pub mod review;
pub mod transaction;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};

/// Whether a listing (or a deal on it) is a sale or a rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Rent,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Rent => "rent",
        }
    }

    /// Case-insensitive parse used for query-string input.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sale" => Some(Self::Sale),
            "rent" => Some(Self::Rent),
            _ => None,
        }
    }
}

/// Patch type for collections whose documents are never edited after insert.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoPatch {}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// True when the patch mentions no client-settable field.
pub fn is_empty_patch<P: Serialize>(patch: &P) -> bool {
    match serde_json::to_value(patch) {
        Ok(serde_json::Value::Object(fields)) => fields.is_empty(),
        _ => false,
    }
}

/// Overwrites `target` when the patch carries a value.
pub(crate) fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Overwrites or clears a nullable `target` when the patch mentions it.
pub(crate) fn set_nullable<T: Clone>(target: &mut Option<T>, value: &Option<Option<T>>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct NotePatch {
        #[serde(default, deserialize_with = "double_option")]
        note: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_missing_from_null() {
        let missing: NotePatch = serde_json::from_str("{}").expect("parses");
        let null: NotePatch = serde_json::from_str(r#"{"note": null}"#).expect("parses");
        let value: NotePatch = serde_json::from_str(r#"{"note": "hi"}"#).expect("parses");
        assert_eq!(missing.note, None);
        assert_eq!(null.note, Some(None));
        assert_eq!(value.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn parses_transaction_type_case_insensitively() {
        assert_eq!(TransactionType::parse(" SALE "), Some(TransactionType::Sale));
        assert_eq!(TransactionType::parse("Rent"), Some(TransactionType::Rent));
        assert_eq!(TransactionType::parse("lease"), None);
    }
}
