use std::collections::HashSet;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::extract::{success, ApiJson, ApiQuery, Success};
use super::AppContext;
use crate::domain::favorite::FavoriteFilter;
use crate::domain::property::{Property, PropertyCard, PropertyFilter};
use crate::domain::TransactionType;
use crate::error::ApiError;
use crate::store::Window;

const DEFAULT_SECTION_SIZE: u64 = 10;
const MAX_SECTION_SIZE: u64 = 20;
const FAVORITE_LOOKUP_CAP: u64 = 500;

pub(crate) fn router() -> Router<AppContext> {
    Router::new().route("/api/home", get(home_sections))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HomeQuery {
    city: Option<String>,
    user_id: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CitySection {
    section_title: String,
    city: String,
    properties: Vec<PropertyCard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Section {
    section_title: &'static str,
    properties: Vec<PropertyCard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HomeSections {
    top_selling_projects: CitySection,
    recommend_your_location: Section,
    property_for_rent: Section,
}

async fn section(
    context: &AppContext,
    filter: PropertyFilter,
    limit: u64,
    favorites: &HashSet<ObjectId>,
) -> Result<Vec<PropertyCard>, ApiError> {
    let base_url = context.content.public_base_url.as_str();
    let properties = context
        .stores
        .properties
        .find(&filter, Window::first(limit))
        .await?;
    Ok(properties
        .iter()
        .map(|property: &Property| {
            let mut card = property.card(base_url);
            card.is_favorite = favorites.contains(&property.id);
            card
        })
        .collect())
}

/// Property ids the user has saved. An unusable user id simply yields none.
async fn favorite_ids(
    context: &AppContext,
    user_id: Option<&str>,
) -> Result<HashSet<ObjectId>, ApiError> {
    let Some(user) = user_id.and_then(|raw| ObjectId::parse_str(raw.trim()).ok()) else {
        return Ok(HashSet::new());
    };
    let favorites = context
        .stores
        .favorites
        .find(
            &FavoriteFilter::for_user(user),
            Window::first(FAVORITE_LOOKUP_CAP),
        )
        .await?;
    Ok(favorites.into_iter().map(|favorite| favorite.property_id).collect())
}

pub(crate) async fn home_sections(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<HomeQuery>,
) -> Result<ApiJson<Success<HomeSections>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SECTION_SIZE);
    if !(1..=MAX_SECTION_SIZE).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_SECTION_SIZE}"
        )));
    }
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .unwrap_or(context.content.home_default_city.as_str())
        .to_string();
    let favorites = favorite_ids(&context, query.user_id.as_deref()).await?;

    let for_sale = PropertyFilter {
        transaction_type: Some(TransactionType::Sale),
        ..PropertyFilter::default()
    };
    let in_city = PropertyFilter {
        city: Some(city.clone()),
        ..for_sale.clone()
    };
    let for_rent = PropertyFilter {
        transaction_type: Some(TransactionType::Rent),
        ..PropertyFilter::default()
    };

    Ok(success(HomeSections {
        top_selling_projects: CitySection {
            section_title: format!("Top Selling Projects in {city}"),
            properties: section(&context, in_city, limit, &favorites).await?,
            city,
        },
        recommend_your_location: Section {
            section_title: "Recommend Your Location",
            properties: section(&context, for_sale, limit, &favorites).await?,
        },
        property_for_rent: Section {
            section_title: "Property for Rent",
            properties: section(&context, for_rent, limit, &favorites).await?,
        },
    }))
}
