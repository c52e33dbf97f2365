use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{double_option, set, set_nullable, TransactionType};
use crate::store::{contains_ignore_case, escape_regex, Record};

/// Radius MongoDB uses when converting `$centerSphere` radians to metres.
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Furnishing {
    Furnished,
    SemiFurnished,
    Unfurnished,
}

impl Furnishing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Furnishing::Furnished => "furnished",
            Furnishing::SemiFurnished => "semi-furnished",
            Furnishing::Unfurnished => "unfurnished",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "furnished" => Some(Self::Furnished),
            "semi-furnished" => Some(Self::SemiFurnished),
            "unfurnished" => Some(Self::Unfurnished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PossessionStatus {
    ReadyToMove,
    UnderConstruction,
}

/// Lifecycle of a listing once it is posted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Inactive,
    Sold,
    Rented,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
            ListingStatus::Sold => "sold",
            ListingStatus::Rented => "rented",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "sold" => Some(Self::Sold),
            "rented" => Some(Self::Rented),
            _ => None,
        }
    }
}

/// GeoJSON point; coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

fn validate_point(point: &GeoPoint) -> Result<(), ValidationError> {
    if point.kind != "Point" {
        return Err(ValidationError::new("geo_type"));
    }
    if !(-180.0..=180.0).contains(&point.longitude()) || !(-90.0..=90.0).contains(&point.latitude())
    {
        return Err(ValidationError::new("geo_coordinates"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    pub address: String,
    pub locality: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(custom(function = "validate_point"))]
    pub geo: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Owner-supplied listing details, shared by the create payload, the record and the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PropertyListing {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: String,
    pub transaction_type: TransactionType,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_subtype: Option<String>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balconies: Option<u32>,
    #[validate(range(min = 0.0))]
    pub area_sqft: f64,
    pub furnishing: Furnishing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_floors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors_allowed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 4))]
    pub open_sides: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_room: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servant_room: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possession_status: Option<PossessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[validate(nested)]
    pub location: Location,
    #[serde(default)]
    pub images: Vec<PropertyImage>,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Stored listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub owner_id: ObjectId,
    #[serde(flatten)]
    pub listing: PropertyListing,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub posted_at: DateTime<Utc>,
}

impl Property {
    pub fn new(owner_id: ObjectId, listing: PropertyListing, posted_at: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            owner_id,
            listing,
            status: ListingStatus::Active,
            favorite_count: 0,
            posted_at,
        }
    }

    pub fn view(&self) -> PropertyView {
        PropertyView {
            id: self.id.to_hex(),
            owner_id: self.owner_id.to_hex(),
            listing: self.listing.clone(),
            status: self.status,
            favorite_count: self.favorite_count,
            posted_at: self.posted_at,
        }
    }

    /// Card used by the home screen sections.
    pub fn card(&self, base_url: &str) -> PropertyCard {
        let listing = &self.listing;
        let locality = listing.location.locality.trim().to_string();
        let city = listing.location.city.trim().to_string();
        let mut location = match (locality.is_empty(), city.is_empty()) {
            (false, false) => format!("{locality}, {city}"),
            (false, true) => locality.clone(),
            (true, false) => city.clone(),
            (true, true) => "N/A".to_string(),
        };

        let details = (listing.bedrooms > 0).then(|| format!("{} BHK", listing.bedrooms));
        if listing.transaction_type == TransactionType::Rent {
            if let Some(details) = &details {
                location = format!("{details} | {location}");
            }
        }

        let title = listing.title.trim();
        PropertyCard {
            id: self.id.to_hex(),
            owner_id: self.owner_id.to_hex(),
            title: if title.is_empty() {
                "Property".to_string()
            } else {
                title.to_string()
            },
            transaction_type: listing.transaction_type,
            tag: match listing.transaction_type {
                TransactionType::Rent => "Rent",
                TransactionType::Sale => "Sell",
            },
            price: listing.price,
            price_display: price_display(listing.price, listing.transaction_type),
            location,
            locality,
            city,
            image_url: listing
                .images
                .first()
                .and_then(|image| absolute_image_url(&image.url, base_url)),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            area_sqft: listing.area_sqft,
            details,
            posted_at: self.posted_at,
            is_favorite: false,
        }
    }
}

/// JSON shape of a stored listing.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyView {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    #[serde(flatten)]
    pub listing: PropertyListing,
    pub status: ListingStatus,
    pub favorite_count: i64,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub transaction_type: TransactionType,
    pub tag: &'static str,
    pub price: f64,
    pub price_display: String,
    pub location: String,
    pub locality: String,
    pub city: String,
    pub image_url: Option<String>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area_sqft: f64,
    pub details: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub is_favorite: bool,
}

/// Sale prices in lakh/crore shorthand, rents as whole rupees with thousands separators.
pub fn price_display(price: f64, transaction_type: TransactionType) -> String {
    let whole = price.trunc() as i64;
    match transaction_type {
        TransactionType::Rent => format!("₹{}", group_thousands(whole)),
        TransactionType::Sale => {
            let lacs = price / 100_000.0;
            if lacs >= 100.0 {
                format!("₹{}Cr", (lacs / 100.0).trunc() as i64)
            } else if lacs >= 1.0 {
                format!("₹{}L", lacs.trunc() as i64)
            } else {
                format!("₹{}", group_thousands(whole))
            }
        }
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn absolute_image_url(url: &str, base_url: &str) -> Option<String> {
    if url.starts_with("http") {
        Some(url.to_string())
    } else if url.starts_with('/') {
        Some(format!("{}{}", base_url.trim_end_matches('/'), url))
    } else {
        None
    }
}

/// Create payload: listing details plus the owning user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProperty {
    pub owner_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub listing: PropertyListing,
}

/// Partial update; only fields present in the request are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PropertyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub property_category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub property_subtype: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub balconies: Option<Option<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub area_sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furnishing: Option<Furnishing>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub floor_number: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub total_floors: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub floors_allowed: Option<Option<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 4))]
    pub open_sides: Option<u8>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub facing: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub store_room: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub servant_room: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub possession_status: Option<Option<PossessionStatus>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub available_from: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<PropertyImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
}

/// Circle around a point, radius in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadius {
    pub longitude: f64,
    pub latitude: f64,
    pub max_distance_m: f64,
}

impl GeoRadius {
    fn contains(&self, point: &GeoPoint) -> bool {
        haversine_m(
            (self.longitude, self.latitude),
            (point.longitude(), point.latitude()),
        ) <= self.max_distance_m
    }
}

fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Search predicates for listings. Every field narrows the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub owner_id: Option<ObjectId>,
    pub transaction_type: Option<TransactionType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<u32>,
    pub city: Option<String>,
    pub locality: Option<String>,
    pub furnishing: Option<Furnishing>,
    pub category: Option<String>,
    pub subtype: Option<String>,
    pub facing: Option<String>,
    pub store_room: Option<bool>,
    pub servant_room: Option<bool>,
    pub status: Option<ListingStatus>,
    /// Free text matched against title and description.
    pub text: Option<String>,
    pub near: Option<GeoRadius>,
}

impl PropertyFilter {
    fn matches(&self, property: &Property) -> bool {
        let listing = &property.listing;
        let within = |value: f64, min: Option<f64>, max: Option<f64>| {
            min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
        };

        self.owner_id.map_or(true, |owner| property.owner_id == owner)
            && self
                .transaction_type
                .map_or(true, |kind| listing.transaction_type == kind)
            && within(listing.price, self.min_price, self.max_price)
            && within(listing.area_sqft, self.min_area, self.max_area)
            && self.min_bedrooms.map_or(true, |min| listing.bedrooms >= min)
            && self.min_bathrooms.map_or(true, |min| listing.bathrooms >= min)
            && self
                .city
                .as_deref()
                .map_or(true, |city| contains_ignore_case(&listing.location.city, city))
            && self.locality.as_deref().map_or(true, |locality| {
                contains_ignore_case(&listing.location.locality, locality)
            })
            && self
                .furnishing
                .map_or(true, |furnishing| listing.furnishing == furnishing)
            && eq_opt(&self.category, &listing.property_category)
            && eq_opt(&self.subtype, &listing.property_subtype)
            && eq_opt(&self.facing, &listing.facing)
            && self
                .store_room
                .map_or(true, |flag| listing.store_room == Some(flag))
            && self
                .servant_room
                .map_or(true, |flag| listing.servant_room == Some(flag))
            && self.status.map_or(true, |status| property.status == status)
            && self.text.as_deref().map_or(true, |text| {
                text.split_whitespace().any(|term| {
                    contains_ignore_case(&listing.title, term)
                        || contains_ignore_case(&listing.description, term)
                })
            })
            && self
                .near
                .map_or(true, |near| near.contains(&listing.location.geo))
    }

    fn to_document(&self) -> Document {
        let mut query = Document::new();

        if let Some(owner) = self.owner_id {
            query.insert("owner_id", owner);
        }
        if let Some(kind) = self.transaction_type {
            query.insert("transaction_type", kind.as_str());
        }
        if let Some(range) = range_document(self.min_price, self.max_price) {
            query.insert("price", range);
        }
        if let Some(range) = range_document(self.min_area, self.max_area) {
            query.insert("area_sqft", range);
        }
        if let Some(min) = self.min_bedrooms {
            query.insert("bedrooms", doc! { "$gte": i64::from(min) });
        }
        if let Some(min) = self.min_bathrooms {
            query.insert("bathrooms", doc! { "$gte": i64::from(min) });
        }
        if let Some(city) = &self.city {
            query.insert("location.city", regex_document(city));
        }
        if let Some(locality) = &self.locality {
            query.insert("location.locality", regex_document(locality));
        }
        if let Some(furnishing) = self.furnishing {
            query.insert("furnishing", furnishing.as_str());
        }
        if let Some(category) = &self.category {
            query.insert("property_category", category.as_str());
        }
        if let Some(subtype) = &self.subtype {
            query.insert("property_subtype", subtype.as_str());
        }
        if let Some(facing) = &self.facing {
            query.insert("facing", facing.as_str());
        }
        if let Some(flag) = self.store_room {
            query.insert("store_room", flag);
        }
        if let Some(flag) = self.servant_room {
            query.insert("servant_room", flag);
        }
        if let Some(status) = self.status {
            query.insert("status", status.as_str());
        }
        if let Some(text) = &self.text {
            query.insert("$text", doc! { "$search": text.as_str() });
        }
        if let Some(near) = self.near {
            let radians = near.max_distance_m / EARTH_RADIUS_M;
            query.insert(
                "location.geo",
                doc! {
                    "$geoWithin": {
                        "$centerSphere": [[near.longitude, near.latitude], radians]
                    }
                },
            );
        }

        query
    }
}

fn eq_opt(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
        None => true,
    }
}

fn range_document(min: Option<f64>, max: Option<f64>) -> Option<Document> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let mut range = Document::new();
    if let Some(min) = min {
        range.insert("$gte", Bson::Double(min));
    }
    if let Some(max) = max {
        range.insert("$lte", Bson::Double(max));
    }
    Some(range)
}

fn regex_document(raw: &str) -> Document {
    doc! { "$regex": escape_regex(raw), "$options": "i" }
}

impl Record for Property {
    const COLLECTION: &'static str = "properties";
    const SORT_FIELD: &'static str = "posted_at";

    type Filter = PropertyFilter;
    type Patch = PropertyPatch;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.posted_at
    }

    fn matches(&self, filter: &PropertyFilter) -> bool {
        filter.matches(self)
    }

    fn filter_document(filter: &PropertyFilter) -> Document {
        filter.to_document()
    }

    fn apply(&mut self, patch: &PropertyPatch) {
        let listing = &mut self.listing;
        set(&mut listing.title, &patch.title);
        set(&mut listing.description, &patch.description);
        set(&mut listing.transaction_type, &patch.transaction_type);
        set(&mut listing.price, &patch.price);
        set_nullable(&mut listing.property_category, &patch.property_category);
        set_nullable(&mut listing.property_subtype, &patch.property_subtype);
        set(&mut listing.bedrooms, &patch.bedrooms);
        set(&mut listing.bathrooms, &patch.bathrooms);
        set_nullable(&mut listing.balconies, &patch.balconies);
        set(&mut listing.area_sqft, &patch.area_sqft);
        set(&mut listing.furnishing, &patch.furnishing);
        set_nullable(&mut listing.floor_number, &patch.floor_number);
        set_nullable(&mut listing.total_floors, &patch.total_floors);
        set_nullable(&mut listing.floors_allowed, &patch.floors_allowed);
        if let Some(open_sides) = patch.open_sides {
            listing.open_sides = Some(open_sides);
        }
        set_nullable(&mut listing.facing, &patch.facing);
        set_nullable(&mut listing.store_room, &patch.store_room);
        set_nullable(&mut listing.servant_room, &patch.servant_room);
        set_nullable(&mut listing.possession_status, &patch.possession_status);
        set_nullable(&mut listing.available_from, &patch.available_from);
        set(&mut listing.location, &patch.location);
        set(&mut listing.images, &patch.images);
        set(&mut listing.amenities, &patch.amenities);
        set(&mut self.status, &patch.status);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn listing(title: &str, kind: TransactionType, price: f64, city: &str) -> PropertyListing {
        PropertyListing {
            title: title.to_string(),
            description: format!("{title} with parking"),
            transaction_type: kind,
            price,
            property_category: Some("residential".to_string()),
            property_subtype: Some("Flats".to_string()),
            bedrooms: 2,
            bathrooms: 2,
            balconies: None,
            area_sqft: 1100.0,
            furnishing: Furnishing::SemiFurnished,
            floor_number: None,
            total_floors: None,
            floors_allowed: None,
            open_sides: None,
            facing: Some("East".to_string()),
            store_room: Some(true),
            servant_room: None,
            possession_status: None,
            available_from: None,
            location: Location {
                address: "12 Main Road".to_string(),
                locality: "Anna Nagar".to_string(),
                city: city.to_string(),
                geo: GeoPoint::new(80.2101, 13.0850),
            },
            images: Vec::new(),
            amenities: vec!["lift".to_string()],
        }
    }

    fn property(listing: PropertyListing) -> Property {
        Property::new(ObjectId::new(), listing, Utc::now())
    }

    #[test]
    fn formats_sale_and_rent_prices() {
        assert_eq!(price_display(4_500_000.0, TransactionType::Sale), "₹45L");
        assert_eq!(price_display(25_000_000.0, TransactionType::Sale), "₹2Cr");
        assert_eq!(price_display(95_000.0, TransactionType::Sale), "₹95,000");
        assert_eq!(price_display(15_000.0, TransactionType::Rent), "₹15,000");
        assert_eq!(price_display(1_234_567.0, TransactionType::Rent), "₹1,234,567");
        assert_eq!(price_display(800.0, TransactionType::Rent), "₹800");
    }

    #[test]
    fn rent_card_prefixes_bhk_details_and_resolves_image() {
        let mut rent = listing("Sea View", TransactionType::Rent, 18_000.0, "Chennai");
        rent.images.push(PropertyImage {
            url: "/uploads/a.jpg".to_string(),
            is_primary: true,
        });
        let card = property(rent).card("http://api.test/");
        assert_eq!(card.tag, "Rent");
        assert_eq!(card.location, "2 BHK | Anna Nagar, Chennai");
        assert_eq!(card.image_url.as_deref(), Some("http://api.test/uploads/a.jpg"));
        assert_eq!(card.price_display, "₹18,000");
    }

    #[test]
    fn city_filter_is_case_insensitive_substring() {
        let home = property(listing("Villa", TransactionType::Sale, 9_000_000.0, "Chennai"));
        let filter = PropertyFilter {
            city: Some("chen".to_string()),
            ..PropertyFilter::default()
        };
        assert!(home.matches(&filter));

        let elsewhere = PropertyFilter {
            city: Some("Mumbai".to_string()),
            ..PropertyFilter::default()
        };
        assert!(!home.matches(&elsewhere));
    }

    #[test]
    fn geo_radius_matches_nearby_points_only() {
        let home = property(listing("Villa", TransactionType::Sale, 1.0, "Chennai"));
        let close = PropertyFilter {
            near: Some(GeoRadius {
                longitude: 80.2150,
                latitude: 13.0850,
                max_distance_m: 5_000.0,
            }),
            ..PropertyFilter::default()
        };
        let far = PropertyFilter {
            near: Some(GeoRadius {
                longitude: 72.8777,
                latitude: 19.0760,
                max_distance_m: 5_000.0,
            }),
            ..PropertyFilter::default()
        };
        assert!(home.matches(&close));
        assert!(!home.matches(&far));
    }

    #[test]
    fn filter_document_escapes_user_input() {
        let filter = PropertyFilter {
            city: Some("St. Thomas (Mount)".to_string()),
            min_price: Some(10.0),
            transaction_type: Some(TransactionType::Rent),
            ..PropertyFilter::default()
        };
        let query = filter.to_document();
        assert_eq!(query.get_str("transaction_type").expect("type"), "rent");
        let city = query.get_document("location.city").expect("city regex");
        assert_eq!(city.get_str("$regex").expect("regex"), "St\\. Thomas \\(Mount\\)");
        let price = query.get_document("price").expect("price range");
        assert_eq!(price.get_f64("$gte").expect("gte"), 10.0);
        assert!(price.get("$lte").is_none());
    }

    #[test]
    fn patch_sets_and_clears_nullable_fields() {
        let mut home = property(listing("Villa", TransactionType::Sale, 1.0, "Chennai"));
        let patch: PropertyPatch =
            serde_json::from_str(r#"{"price": 2.5, "facing": null, "balconies": 2}"#)
                .expect("patch parses");
        home.apply(&patch);
        assert_eq!(home.listing.price, 2.5);
        assert_eq!(home.listing.facing, None);
        assert_eq!(home.listing.balconies, Some(2));

        let fields = Property::patch_document(&patch).expect("patch encodes");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("facing"), Some(&Bson::Null));
    }

    #[test]
    fn rejects_out_of_range_open_sides() {
        let mut bad = listing("Plot", TransactionType::Sale, 1.0, "Chennai");
        bad.open_sides = Some(5);
        assert!(bad.validate().is_err());
        bad.open_sides = Some(4);
        assert!(bad.validate().is_ok());
    }
}
