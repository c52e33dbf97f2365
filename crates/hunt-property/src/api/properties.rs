use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::extract::{page_request, parse_id, ApiJson, ApiQuery, KeyedPage};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::property::{
    Furnishing, GeoRadius, ListingStatus, NewProperty, Property, PropertyFilter, PropertyPatch,
    PropertyView,
};
use crate::domain::TransactionType;
use crate::error::ApiError;
use crate::store::Window;

const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_MAX_DISTANCE_M: f64 = 5000.0;
const OWNER_LISTING_CAP: u64 = 100;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/properties",
            get(list_properties).post(create_property),
        )
        .route("/api/properties/search", get(search_properties))
        .route("/api/properties/owner/:owner_id", get(properties_by_owner))
        .route(
            "/api/properties/:property_id",
            get(get_property).put(update_property).delete(delete_property),
        )
}

/// Query string shared by list and search.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PropertyQuery {
    page: Option<u64>,
    limit: Option<u64>,
    transaction_type: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_area: Option<f64>,
    max_area: Option<f64>,
    min_bedrooms: Option<u32>,
    min_bathrooms: Option<u32>,
    city: Option<String>,
    locality: Option<String>,
    furnishing: Option<String>,
    property_category: Option<String>,
    property_subtype: Option<String>,
    facing: Option<String>,
    store_room: Option<bool>,
    servant_room: Option<bool>,
    status: Option<String>,
    text: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    max_distance: Option<f64>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_transaction_type(raw: Option<&str>) -> Result<Option<TransactionType>, ApiError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => TransactionType::parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request("transaction_type must be 'sale' or 'rent'")),
        None => Ok(None),
    }
}

impl PropertyQuery {
    fn filter(&self) -> Result<PropertyFilter, ApiError> {
        let furnishing = match non_blank(&self.furnishing) {
            Some(raw) => Some(Furnishing::parse(&raw).ok_or_else(|| {
                ApiError::bad_request(
                    "furnishing must be 'furnished', 'semi-furnished' or 'unfurnished'",
                )
            })?),
            None => None,
        };
        let status = match non_blank(&self.status) {
            Some(raw) => Some(
                ListingStatus::parse(&raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown listing status '{raw}'")))?,
            ),
            None => None,
        };

        Ok(PropertyFilter {
            transaction_type: parse_transaction_type(self.transaction_type.as_deref())?,
            min_price: self.min_price,
            max_price: self.max_price,
            min_area: self.min_area,
            max_area: self.max_area,
            min_bedrooms: self.min_bedrooms,
            min_bathrooms: self.min_bathrooms,
            city: non_blank(&self.city),
            locality: non_blank(&self.locality),
            furnishing,
            category: non_blank(&self.property_category),
            subtype: non_blank(&self.property_subtype),
            facing: non_blank(&self.facing),
            store_room: self.store_room,
            servant_room: self.servant_room,
            status,
            ..PropertyFilter::default()
        })
    }

    fn search_filter(&self) -> Result<PropertyFilter, ApiError> {
        let mut filter = self.filter()?;
        filter.text = non_blank(&self.text);
        filter.near = match (self.longitude, self.latitude) {
            (Some(longitude), Some(latitude)) => {
                let max_distance_m = self.max_distance.unwrap_or(DEFAULT_MAX_DISTANCE_M);
                if max_distance_m < 1.0 {
                    return Err(ApiError::bad_request("max_distance must be at least 1 metre"));
                }
                Some(GeoRadius {
                    longitude,
                    latitude,
                    max_distance_m,
                })
            }
            (None, None) => None,
            _ => {
                return Err(ApiError::bad_request(
                    "longitude and latitude must be provided together",
                ))
            }
        };
        Ok(filter)
    }
}

async fn listing_page(
    context: &AppContext,
    filter: PropertyFilter,
    query: &PropertyQuery,
) -> Result<ApiJson<KeyedPage<PropertyView>>, ApiError> {
    let request = page_request(query.page, query.limit, DEFAULT_PAGE_SIZE)?;
    let page = context.stores.properties.page(&filter, request).await?;
    Ok(ApiJson(KeyedPage::new(
        "properties",
        page.map(|property| property.view()),
    )))
}

pub(crate) async fn list_properties(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<PropertyQuery>,
) -> Result<ApiJson<KeyedPage<PropertyView>>, ApiError> {
    let filter = query.filter()?;
    listing_page(&context, filter, &query).await
}

pub(crate) async fn search_properties(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<PropertyQuery>,
) -> Result<ApiJson<KeyedPage<PropertyView>>, ApiError> {
    let filter = query.search_filter()?;
    listing_page(&context, filter, &query).await
}

pub(crate) async fn create_property(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewProperty>,
) -> Result<(StatusCode, ApiJson<PropertyView>), ApiError> {
    payload.validate()?;
    let owner_id = parse_id(&payload.owner_id, "owner")?;
    if !context.stores.users.exists(owner_id).await? {
        return Err(ApiError::not_found("Owner not found"));
    }

    let property = context
        .stores
        .properties
        .insert(Property::new(owner_id, payload.listing, Utc::now()))
        .await?;
    info!(property_id = %property.id, owner_id = %owner_id, "property listed");
    Ok((StatusCode::CREATED, ApiJson(property.view())))
}

pub(crate) async fn get_property(
    State(context): State<AppContext>,
    Path(property_id): Path<String>,
) -> Result<ApiJson<PropertyView>, ApiError> {
    let id = parse_id(&property_id, "property")?;
    let property = context
        .stores
        .properties
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    Ok(ApiJson(property.view()))
}

pub(crate) async fn update_property(
    State(context): State<AppContext>,
    Path(property_id): Path<String>,
    ApiJson(patch): ApiJson<PropertyPatch>,
) -> Result<ApiJson<PropertyView>, ApiError> {
    let id = parse_id(&property_id, "property")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;

    let property = context
        .stores
        .properties
        .update(id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    Ok(ApiJson(property.view()))
}

pub(crate) async fn delete_property(
    State(context): State<AppContext>,
    Path(property_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&property_id, "property")?;
    if !context.stores.properties.delete(id).await? {
        return Err(ApiError::not_found("Property not found"));
    }
    info!(property_id = %id, "property deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn properties_by_owner(
    State(context): State<AppContext>,
    Path(owner_id): Path<String>,
) -> Result<ApiJson<Vec<PropertyView>>, ApiError> {
    let owner = parse_id(&owner_id, "owner")?;
    let filter = PropertyFilter {
        owner_id: Some(owner),
        ..PropertyFilter::default()
    };
    let properties = context
        .stores
        .properties
        .find(&filter, Window::first(OWNER_LISTING_CAP))
        .await?;
    Ok(ApiJson(
        properties.iter().map(Property::view).collect(),
    ))
}
