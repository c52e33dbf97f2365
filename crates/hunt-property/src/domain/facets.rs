//! Filter-screen facets and the listing-specific operations the generic repository
//! does not cover.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::Serialize;

use super::property::Property;
use super::TransactionType;
use crate::store::{MemoryStore, MongoStore, StoreError};

const DEFAULT_PRICE_RANGE: Range = Range { min: 0.0, max: 100.0 };
const DEFAULT_AREA_RANGE: Range = Range {
    min: 0.0,
    max: 5000.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Falls back to `default` when the observed range cannot drive a slider.
    fn or_default(observed: Option<(f64, f64)>, default: Range) -> Range {
        match observed {
            Some((min, max)) if max >= min && !(min == 0.0 && max == 0.0) => Range { min, max },
            _ => default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LocalityOption {
    pub value: String,
    pub city: String,
}

/// Everything the filter screen needs to populate its controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub transaction_types: Vec<String>,
    pub property_categories: Vec<String>,
    pub property_subtypes: Vec<String>,
    pub furnishing_options: Vec<String>,
    pub facing_options: Vec<String>,
    pub cities: Vec<String>,
    pub localities: Vec<LocalityOption>,
    pub price_range: Range,
    pub area_range: Range,
    pub bedrooms: Vec<i64>,
    pub bathrooms: Vec<i64>,
    pub store_room_options: [bool; 2],
    pub servant_room_options: [bool; 2],
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            transaction_types: Vec::new(),
            property_categories: Vec::new(),
            property_subtypes: Vec::new(),
            furnishing_options: Vec::new(),
            facing_options: Vec::new(),
            cities: Vec::new(),
            localities: Vec::new(),
            price_range: DEFAULT_PRICE_RANGE,
            area_range: DEFAULT_AREA_RANGE,
            bedrooms: Vec::new(),
            bathrooms: Vec::new(),
            store_room_options: [true, false],
            servant_room_options: [true, false],
        }
    }
}

impl FilterOptions {
    /// Computes the facets over an in-process slice of listings.
    pub fn from_properties<'a>(properties: impl IntoIterator<Item = &'a Property>) -> Self {
        let mut transaction_types = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut subtypes = BTreeSet::new();
        let mut furnishing = BTreeSet::new();
        let mut facing = BTreeSet::new();
        let mut cities = BTreeSet::new();
        let mut localities = BTreeSet::new();
        let mut bedrooms = BTreeSet::new();
        let mut bathrooms = BTreeSet::new();
        let mut price: Option<(f64, f64)> = None;
        let mut area: Option<(f64, f64)> = None;

        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        let widen = |range: Option<(f64, f64)>, value: f64| match range {
            Some((min, max)) => Some((min.min(value), max.max(value))),
            None => Some((value, value)),
        };

        for property in properties {
            let listing = &property.listing;
            transaction_types.insert(listing.transaction_type.as_str().to_string());
            categories.extend(non_empty(&listing.property_category));
            subtypes.extend(non_empty(&listing.property_subtype));
            furnishing.insert(listing.furnishing.as_str().to_string());
            facing.extend(non_empty(&listing.facing));
            if !listing.location.city.is_empty() {
                cities.insert(listing.location.city.clone());
            }
            if !listing.location.locality.is_empty() {
                localities.insert((
                    listing.location.city.clone(),
                    listing.location.locality.clone(),
                ));
            }
            bedrooms.insert(i64::from(listing.bedrooms));
            bathrooms.insert(i64::from(listing.bathrooms));
            price = widen(price, listing.price);
            if listing.area_sqft > 0.0 {
                area = widen(area, listing.area_sqft);
            }
        }

        Self {
            transaction_types: transaction_types.into_iter().collect(),
            property_categories: categories.into_iter().collect(),
            property_subtypes: subtypes.into_iter().collect(),
            furnishing_options: furnishing.into_iter().collect(),
            facing_options: facing.into_iter().collect(),
            cities: cities.into_iter().collect(),
            localities: localities
                .into_iter()
                .map(|(city, value)| LocalityOption { value, city })
                .collect(),
            price_range: Range::or_default(price, DEFAULT_PRICE_RANGE),
            area_range: Range::or_default(area, DEFAULT_AREA_RANGE),
            bedrooms: bedrooms.into_iter().collect(),
            bathrooms: bathrooms.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Reads the single document produced by the `$facet` stage.
    fn from_facet_document(facet: &Document) -> Self {
        let range = |name: &str| {
            let first = facet
                .get_array(name)
                .ok()
                .and_then(|rows| rows.first())
                .and_then(Bson::as_document)?;
            Some((number(first.get("min"))?, number(first.get("max"))?))
        };

        Self {
            transaction_types: strings(facet, "transaction_types"),
            property_categories: strings(facet, "property_categories"),
            property_subtypes: strings(facet, "property_subtypes"),
            furnishing_options: strings(facet, "furnishing_options"),
            facing_options: strings(facet, "facing_options"),
            cities: strings(facet, "cities"),
            localities: rows(facet, "localities")
                .filter_map(|row| {
                    let value = row.get_str("value").ok().filter(|value| !value.is_empty())?;
                    Some(LocalityOption {
                        value: value.to_string(),
                        city: row.get_str("city").unwrap_or_default().to_string(),
                    })
                })
                .collect(),
            price_range: Range::or_default(range("price_range"), DEFAULT_PRICE_RANGE),
            area_range: Range::or_default(range("area_range"), DEFAULT_AREA_RANGE),
            bedrooms: integers(facet, "bedrooms"),
            bathrooms: integers(facet, "bathrooms"),
            ..Self::default()
        }
    }
}

fn rows<'a>(facet: &'a Document, name: &str) -> impl Iterator<Item = &'a Document> + 'a {
    facet
        .get_array(name)
        .map(|rows| rows.iter().filter_map(Bson::as_document).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
}

fn strings(facet: &Document, name: &str) -> Vec<String> {
    rows(facet, name)
        .filter_map(|row| row.get_str("value").ok().map(str::to_string))
        .collect()
}

fn integers(facet: &Document, name: &str) -> Vec<i64> {
    rows(facet, name)
        .filter_map(|row| number(row.get("value")).map(|value| value as i64))
        .collect()
}

fn number(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Double(value) => Some(*value),
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        _ => None,
    }
}

fn distinct_stage(field: &str) -> Vec<Document> {
    let path = format!("${field}");
    let mut present = Document::new();
    present.insert(field, doc! { "$exists": true, "$nin": [Bson::Null, ""] });
    vec![
        doc! { "$match": present },
        doc! { "$group": { "_id": path } },
        doc! { "$sort": { "_id": 1 } },
        doc! { "$project": { "value": "$_id", "_id": 0 } },
    ]
}

fn facet_pipeline(transaction_type: Option<TransactionType>) -> Vec<Document> {
    let mut matched = Document::new();
    if let Some(kind) = transaction_type {
        matched.insert("transaction_type", kind.as_str());
    }

    vec![
        doc! { "$match": matched },
        doc! {
            "$facet": {
                "transaction_types": distinct_stage("transaction_type"),
                "property_categories": distinct_stage("property_category"),
                "property_subtypes": distinct_stage("property_subtype"),
                "furnishing_options": distinct_stage("furnishing"),
                "facing_options": distinct_stage("facing"),
                "cities": distinct_stage("location.city"),
                "localities": [
                    { "$match": { "location.locality": { "$exists": true, "$nin": [Bson::Null, ""] } } },
                    { "$group": { "_id": { "locality": "$location.locality", "city": "$location.city" } } },
                    { "$sort": { "_id.city": 1, "_id.locality": 1 } },
                    { "$project": { "value": "$_id.locality", "city": "$_id.city", "_id": 0 } },
                ],
                "price_range": [
                    { "$group": { "_id": Bson::Null, "min": { "$min": "$price" }, "max": { "$max": "$price" } } },
                    { "$project": { "_id": 0, "min": 1, "max": 1 } },
                ],
                "area_range": [
                    { "$match": { "area_sqft": { "$exists": true, "$gt": 0 } } },
                    { "$group": { "_id": Bson::Null, "min": { "$min": "$area_sqft" }, "max": { "$max": "$area_sqft" } } },
                    { "$project": { "_id": 0, "min": 1, "max": 1 } },
                ],
                "bedrooms": distinct_stage("bedrooms"),
                "bathrooms": distinct_stage("bathrooms"),
            }
        },
    ]
}

/// Listing operations beyond plain CRUD.
#[async_trait]
pub trait PropertyIndex: Send + Sync {
    /// Facets over all listings, optionally scoped to one transaction type.
    async fn facets(
        &self,
        transaction_type: Option<TransactionType>,
    ) -> Result<FilterOptions, StoreError>;

    /// Adjusts the favorite counter; it never drops below zero.
    async fn bump_favorites(&self, id: ObjectId, delta: i64) -> Result<(), StoreError>;
}

#[async_trait]
impl PropertyIndex for MemoryStore<Property> {
    async fn facets(
        &self,
        transaction_type: Option<TransactionType>,
    ) -> Result<FilterOptions, StoreError> {
        let listings = self.snapshot();
        Ok(FilterOptions::from_properties(listings.iter().filter(
            |property| {
                transaction_type.map_or(true, |kind| property.listing.transaction_type == kind)
            },
        )))
    }

    async fn bump_favorites(&self, id: ObjectId, delta: i64) -> Result<(), StoreError> {
        self.modify(id, |property| {
            property.favorite_count = (property.favorite_count + delta).max(0);
        });
        Ok(())
    }
}

#[async_trait]
impl PropertyIndex for MongoStore<Property> {
    async fn facets(
        &self,
        transaction_type: Option<TransactionType>,
    ) -> Result<FilterOptions, StoreError> {
        let mut cursor = self
            .collection()
            .aggregate(facet_pipeline(transaction_type), None)
            .await?;
        match cursor.try_next().await? {
            Some(facet) => Ok(FilterOptions::from_facet_document(&facet)),
            None => Ok(FilterOptions::default()),
        }
    }

    async fn bump_favorites(&self, id: ObjectId, delta: i64) -> Result<(), StoreError> {
        let filter = if delta < 0 {
            doc! { "_id": id, "favorite_count": { "$gte": -delta } }
        } else {
            doc! { "_id": id }
        };
        self.collection()
            .update_one(filter, doc! { "$inc": { "favorite_count": delta } }, None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::property::tests::listing;
    use crate::store::Repository;
    use chrono::Utc;

    #[test]
    fn empty_collection_uses_slider_defaults() {
        let options = FilterOptions::from_properties(std::iter::empty());
        assert_eq!(options.price_range, Range { min: 0.0, max: 100.0 });
        assert_eq!(options.area_range, Range { min: 0.0, max: 5000.0 });
        assert_eq!(options.store_room_options, [true, false]);
    }

    #[test]
    fn facet_document_with_degenerate_price_range_falls_back() {
        let facet = doc! {
            "cities": [{ "value": "Chennai" }, { "value": "Pune" }],
            "localities": [{ "value": "Adyar", "city": "Chennai" }, { "value": "", "city": "Pune" }],
            "price_range": [{ "min": 0, "max": 0 }],
            "area_range": [{ "min": 450.0, "max": 3200.0 }],
            "bedrooms": [{ "value": 1_i32 }, { "value": 3_i64 }],
        };
        let options = FilterOptions::from_facet_document(&facet);
        assert_eq!(options.cities, vec!["Chennai", "Pune"]);
        assert_eq!(options.localities.len(), 1);
        assert_eq!(options.price_range, DEFAULT_PRICE_RANGE);
        assert_eq!(options.area_range, Range { min: 450.0, max: 3200.0 });
        assert_eq!(options.bedrooms, vec![1, 3]);
        assert!(options.transaction_types.is_empty());
    }

    #[tokio::test]
    async fn memory_facets_scope_by_transaction_type() {
        let store = MemoryStore::<Property>::default();
        for (title, kind, price, city) in [
            ("Villa", TransactionType::Sale, 9_000_000.0, "Chennai"),
            ("Flat", TransactionType::Rent, 20_000.0, "Pune"),
        ] {
            store
                .insert(Property::new(ObjectId::new(), listing(title, kind, price, city), Utc::now()))
                .await
                .expect("insert");
        }

        let all = store.facets(None).await.expect("facets");
        assert_eq!(all.transaction_types, vec!["rent", "sale"]);
        assert_eq!(all.price_range, Range { min: 20_000.0, max: 9_000_000.0 });

        let rent = store.facets(Some(TransactionType::Rent)).await.expect("facets");
        assert_eq!(rent.cities, vec!["Pune"]);
    }

    #[tokio::test]
    async fn favorite_counter_never_goes_negative() {
        let store = MemoryStore::<Property>::default();
        let property = store
            .insert(Property::new(
                ObjectId::new(),
                listing("Villa", TransactionType::Sale, 1.0, "Chennai"),
                Utc::now(),
            ))
            .await
            .expect("insert");

        store.bump_favorites(property.id, 1).await.expect("bump");
        store.bump_favorites(property.id, -1).await.expect("bump");
        store.bump_favorites(property.id, -1).await.expect("bump");
        let stored = store.get(property.id).await.expect("get").expect("exists");
        assert_eq!(stored.favorite_count, 0);
    }
}
