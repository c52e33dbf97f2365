use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use validator::Validate;

use super::extract::{parse_id, parse_optional_id, skip_window, ApiJson, ApiQuery};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::review::{
    NewReview, Review, ReviewFilter, ReviewPatch, ReviewSummary, ReviewView,
};
use crate::error::ApiError;
use crate::store::{PageRequest, Window};

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/reviews", get(list_reviews).post(create_review))
        .route("/api/reviews/property/:property_id", get(property_reviews))
        .route(
            "/api/reviews/property/:property_id/summary",
            get(property_summary),
        )
        .route(
            "/api/reviews/:review_id",
            get(get_review).put(update_review).delete(delete_review),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReviewQuery {
    skip: Option<u64>,
    limit: Option<u64>,
    property_id: Option<String>,
    user_id: Option<String>,
}

async fn ensure_property(context: &AppContext, id: ObjectId) -> Result<(), ApiError> {
    if context.stores.properties.exists(id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("Property not found"))
    }
}

pub(crate) async fn create_review(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewReview>,
) -> Result<(StatusCode, ApiJson<ReviewView>), ApiError> {
    payload.validate()?;
    let property_id = parse_id(&payload.property_id, "property")?;
    ensure_property(&context, property_id).await?;
    let user_id = parse_id(&payload.user_id, "user")?;
    if !context.stores.users.exists(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let review = Review {
        id: ObjectId::new(),
        property_id,
        user_id,
        rating: payload.rating,
        comment: payload.comment,
        created_at: Utc::now(),
        updated_at: None,
    };
    let review = context.stores.reviews.insert(review).await?;
    Ok((StatusCode::CREATED, ApiJson(review.view())))
}

pub(crate) async fn list_reviews(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> Result<ApiJson<Vec<ReviewView>>, ApiError> {
    let window = skip_window(query.skip, query.limit)?;
    let filter = ReviewFilter {
        property_id: parse_optional_id(query.property_id.as_deref(), "property")?,
        user_id: parse_optional_id(query.user_id.as_deref(), "user")?,
    };
    let reviews = context.stores.reviews.find(&filter, window).await?;
    Ok(ApiJson(reviews.iter().map(Review::view).collect()))
}

pub(crate) async fn property_reviews(
    State(context): State<AppContext>,
    Path(property_id): Path<String>,
) -> Result<ApiJson<Vec<ReviewView>>, ApiError> {
    let property_id = parse_id(&property_id, "property")?;
    let filter = ReviewFilter {
        property_id: Some(property_id),
        user_id: None,
    };
    let reviews = context
        .stores
        .reviews
        .find(&filter, Window::first(PageRequest::MAX_LIMIT))
        .await?;
    Ok(ApiJson(reviews.iter().map(Review::view).collect()))
}

pub(crate) async fn property_summary(
    State(context): State<AppContext>,
    Path(property_id): Path<String>,
) -> Result<ApiJson<ReviewSummary>, ApiError> {
    let property_id = parse_id(&property_id, "property")?;
    ensure_property(&context, property_id).await?;
    let filter = ReviewFilter {
        property_id: Some(property_id),
        user_id: None,
    };
    let reviews = context
        .stores
        .reviews
        .find(&filter, Window::unbounded())
        .await?;
    Ok(ApiJson(ReviewSummary::from_reviews(property_id, &reviews)))
}

pub(crate) async fn get_review(
    State(context): State<AppContext>,
    Path(review_id): Path<String>,
) -> Result<ApiJson<ReviewView>, ApiError> {
    let id = parse_id(&review_id, "review")?;
    let review = context
        .stores
        .reviews
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    Ok(ApiJson(review.view()))
}

pub(crate) async fn update_review(
    State(context): State<AppContext>,
    Path(review_id): Path<String>,
    ApiJson(patch): ApiJson<ReviewPatch>,
) -> Result<ApiJson<ReviewView>, ApiError> {
    let id = parse_id(&review_id, "review")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;
    let review = context
        .stores
        .reviews
        .update(id, &patch.stamped(Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    Ok(ApiJson(review.view()))
}

pub(crate) async fn delete_review(
    State(context): State<AppContext>,
    Path(review_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&review_id, "review")?;
    if !context.stores.reviews.delete(id).await? {
        return Err(ApiError::not_found("Review not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
