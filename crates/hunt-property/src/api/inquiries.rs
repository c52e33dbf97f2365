use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use super::extract::{parse_id, parse_optional_id, skip_window, ApiJson, ApiQuery};
use super::AppContext;
use crate::domain::inquiry::{
    Inquiry, InquiryFilter, InquiryPatch, InquiryStatus, InquiryView, NewInquiry,
};
use crate::domain::is_empty_patch;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::property::Property;
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/inquiries", get(list_inquiries).post(create_inquiry))
        .route(
            "/api/inquiries/:inquiry_id",
            get(get_inquiry).put(update_inquiry).delete(delete_inquiry),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InquiryQuery {
    skip: Option<u64>,
    limit: Option<u64>,
    property_id: Option<String>,
    user_id: Option<String>,
    status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<InquiryStatus>, ApiError> {
    raw.map(|value| {
        InquiryStatus::parse(value)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid status: {value}")))
    })
    .transpose()
}

async fn notify_owner(context: &AppContext, property: &Property, inquiry: &Inquiry) {
    if property.owner_id == inquiry.user_id {
        return;
    }
    let notification = Notification::new(
        property.owner_id,
        NotificationKind::Inquiry,
        "New Inquiry",
        format!("You received a new inquiry for '{}'", property.listing.title),
        inquiry.created_at,
    )
    .with_action(format!("/properties/{}", property.id.to_hex()));
    if let Err(err) = context.stores.notifications.insert(notification).await {
        warn!(error = %err, inquiry_id = %inquiry.id, "inquiry notification not stored");
    }
}

pub(crate) async fn create_inquiry(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewInquiry>,
) -> Result<(StatusCode, ApiJson<InquiryView>), ApiError> {
    payload.validate()?;
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

    let inquiry = Inquiry {
        id: ObjectId::new(),
        property_id,
        user_id,
        message: payload.message,
        contact_preference: payload.contact_preference,
        status: InquiryStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
        responded_at: None,
    };
    let inquiry = context.stores.inquiries.insert(inquiry).await?;
    notify_owner(&context, &property, &inquiry).await;
    info!(inquiry_id = %inquiry.id, property_id = %property_id, "inquiry created");

    Ok((StatusCode::CREATED, ApiJson(inquiry.view())))
}

pub(crate) async fn list_inquiries(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<InquiryQuery>,
) -> Result<ApiJson<Vec<InquiryView>>, ApiError> {
    let window = skip_window(query.skip, query.limit)?;
    let filter = InquiryFilter {
        property_id: parse_optional_id(query.property_id.as_deref(), "property")?,
        user_id: parse_optional_id(query.user_id.as_deref(), "user")?,
        status: parse_status(query.status.as_deref())?,
    };
    let inquiries = context.stores.inquiries.find(&filter, window).await?;
    Ok(ApiJson(inquiries.iter().map(Inquiry::view).collect()))
}

pub(crate) async fn get_inquiry(
    State(context): State<AppContext>,
    Path(inquiry_id): Path<String>,
) -> Result<ApiJson<InquiryView>, ApiError> {
    let id = parse_id(&inquiry_id, "inquiry")?;
    let inquiry = context
        .stores
        .inquiries
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inquiry not found"))?;
    Ok(ApiJson(inquiry.view()))
}

pub(crate) async fn update_inquiry(
    State(context): State<AppContext>,
    Path(inquiry_id): Path<String>,
    ApiJson(patch): ApiJson<InquiryPatch>,
) -> Result<ApiJson<InquiryView>, ApiError> {
    let id = parse_id(&inquiry_id, "inquiry")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;
    let inquiry = context
        .stores
        .inquiries
        .update(id, &patch.stamped(Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Inquiry not found"))?;
    Ok(ApiJson(inquiry.view()))
}

pub(crate) async fn delete_inquiry(
    State(context): State<AppContext>,
    Path(inquiry_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&inquiry_id, "inquiry")?;
    if !context.stores.inquiries.delete(id).await? {
        return Err(ApiError::not_found("Inquiry not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(
            parse_status(Some("Responded")).expect("known"),
            Some(InquiryStatus::Responded)
        );
        assert_eq!(parse_status(None).expect("absent"), None);
        assert!(parse_status(Some("archived")).is_err());
    }
}
