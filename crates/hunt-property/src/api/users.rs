use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::extract::{parse_id, skip_window, ApiJson, ApiQuery};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::user::{NewUser, UserFilter, UserPatch, UserType, UserView};
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route(
            "/api/users/profile/:user_id",
            get(get_user).put(update_user),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserQuery {
    skip: Option<u64>,
    limit: Option<u64>,
    user_type: Option<UserType>,
}

/// Rejects an email or phone already held by a different user.
async fn ensure_available(
    context: &AppContext,
    email: Option<&str>,
    phone: Option<&str>,
    current: Option<ObjectId>,
) -> Result<(), ApiError> {
    let taken_by_other = |owner: Option<ObjectId>| owner.is_some() && owner != current;

    if let Some(email) = email {
        let owner = context
            .stores
            .users
            .find_one(&UserFilter::by_email(email))
            .await?
            .map(|user| user.id);
        if taken_by_other(owner) {
            return Err(ApiError::bad_request("Email already registered"));
        }
    }
    if let Some(phone) = phone {
        let owner = context
            .stores
            .users
            .find_one(&UserFilter::by_phone(phone))
            .await?
            .map(|user| user.id);
        if taken_by_other(owner) {
            return Err(ApiError::bad_request("Phone number already registered"));
        }
    }
    Ok(())
}

pub(crate) async fn create_user(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewUser>,
) -> Result<(StatusCode, ApiJson<UserView>), ApiError> {
    payload.validate()?;
    ensure_available(&context, Some(&payload.email), Some(&payload.phone), None).await?;

    let user = context
        .stores
        .users
        .insert(payload.into_user(Utc::now()))
        .await?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, ApiJson(user.view())))
}

pub(crate) async fn list_users(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<ApiJson<Vec<UserView>>, ApiError> {
    let window = skip_window(query.skip, query.limit)?;
    let filter = UserFilter {
        user_type: query.user_type,
        ..UserFilter::default()
    };
    let users = context.stores.users.find(&filter, window).await?;
    Ok(ApiJson(users.iter().map(|user| user.view()).collect()))
}

pub(crate) async fn get_user(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<ApiJson<UserView>, ApiError> {
    let id = parse_id(&user_id, "user")?;
    let user = context
        .stores
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiJson(user.view()))
}

pub(crate) async fn update_user(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<ApiJson<UserView>, ApiError> {
    let id = parse_id(&user_id, "user")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;
    ensure_available(
        &context,
        patch.email.as_deref(),
        patch.phone.as_deref(),
        Some(id),
    )
    .await?;

    let user = context
        .stores
        .users
        .update(id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiJson(user.view()))
}

pub(crate) async fn delete_user(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&user_id, "user")?;
    if !context.stores.users.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
