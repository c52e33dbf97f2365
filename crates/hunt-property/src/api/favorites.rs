use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::{info, warn};

use super::extract::{parse_id, ApiJson};
use super::AppContext;
use crate::domain::favorite::{Favorite, FavoriteFilter, FavoriteView, NewFavorite};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::property::Property;
use crate::error::ApiError;
use crate::store::{PageRequest, Window};

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/favorites", post(add_favorite))
        .route("/api/favorites/user/:user_id", get(user_favorites))
        .route(
            "/api/favorites/user/:user_id/property/:property_id",
            delete(remove_pair),
        )
        .route(
            "/api/favorites/:favorite_id",
            get(get_favorite).delete(remove_favorite),
        )
}

/// Counter and owner notification are side effects; the favorite itself is
/// already stored, so failures here are only logged.
async fn after_favorited(context: &AppContext, property: &Property, user_id: ObjectId) {
    if let Err(err) = context
        .stores
        .property_index
        .bump_favorites(property.id, 1)
        .await
    {
        warn!(error = %err, property_id = %property.id, "favorite count not incremented");
    }

    if property.owner_id == user_id {
        return;
    }
    let notification = Notification::new(
        property.owner_id,
        NotificationKind::Favorite,
        "Property Favorited",
        format!("Someone added '{}' to their favorites", property.listing.title),
        Utc::now(),
    )
    .with_action(format!("/properties/{}", property.id.to_hex()));
    if let Err(err) = context.stores.notifications.insert(notification).await {
        warn!(error = %err, owner_id = %property.owner_id, "favorite notification not stored");
    }
}

async fn after_unfavorited(context: &AppContext, property_id: ObjectId) {
    if let Err(err) = context
        .stores
        .property_index
        .bump_favorites(property_id, -1)
        .await
    {
        warn!(error = %err, property_id = %property_id, "favorite count not decremented");
    }
}

pub(crate) async fn add_favorite(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewFavorite>,
) -> Result<(StatusCode, ApiJson<FavoriteView>), ApiError> {
    let property_id = parse_id(&payload.property_id, "property")?;
    let property = context
        .stores
        .properties
        .get(property_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;

    let user_id = parse_id(&payload.user_id, "user")?;
    if !context.stores.users.exists(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let pair = FavoriteFilter::pair(user_id, property_id);
    if context.stores.favorites.count(&pair).await? > 0 {
        return Err(ApiError::bad_request("Property already in favorites"));
    }

    let favorite = context
        .stores
        .favorites
        .insert(Favorite::new(user_id, property_id, Utc::now()))
        .await?;
    after_favorited(&context, &property, user_id).await;
    info!(favorite_id = %favorite.id, property_id = %property_id, "property favorited");

    Ok((StatusCode::CREATED, ApiJson(favorite.view())))
}

pub(crate) async fn user_favorites(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<ApiJson<Vec<FavoriteView>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let favorites = context
        .stores
        .favorites
        .find(
            &FavoriteFilter::for_user(user_id),
            Window::first(PageRequest::MAX_LIMIT),
        )
        .await?;
    Ok(ApiJson(favorites.iter().map(Favorite::view).collect()))
}

pub(crate) async fn get_favorite(
    State(context): State<AppContext>,
    Path(favorite_id): Path<String>,
) -> Result<ApiJson<FavoriteView>, ApiError> {
    let id = parse_id(&favorite_id, "favorite")?;
    let favorite = context
        .stores
        .favorites
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Favorite not found"))?;
    Ok(ApiJson(favorite.view()))
}

pub(crate) async fn remove_favorite(
    State(context): State<AppContext>,
    Path(favorite_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&favorite_id, "favorite")?;
    let favorite = context
        .stores
        .favorites
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Favorite not found"))?;
    if !context.stores.favorites.delete(id).await? {
        return Err(ApiError::not_found("Favorite not found"));
    }
    after_unfavorited(&context, favorite.property_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_pair(
    State(context): State<AppContext>,
    Path((user_id, property_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (Ok(user_id), Ok(property_id)) = (
        ObjectId::parse_str(user_id.trim()),
        ObjectId::parse_str(property_id.trim()),
    ) else {
        return Err(ApiError::bad_request("Invalid user ID or property ID"));
    };

    let removed = context
        .stores
        .favorites
        .delete_many(&FavoriteFilter::pair(user_id, property_id))
        .await?;
    if removed == 0 {
        return Err(ApiError::not_found("Favorite not found"));
    }
    after_unfavorited(&context, property_id).await;
    Ok(StatusCode::NO_CONTENT)
}
