use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{page_request, parse_id, success, ApiJson, ApiQuery, KeyedPage, Success};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationPatch,
    NotificationView,
};
use crate::error::ApiError;

const DEFAULT_LIMIT: u64 = 20;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/notifications", post(create_notification))
        .route("/api/notifications/user/:user_id", get(user_notifications))
        .route(
            "/api/notifications/user/:user_id/unread-count",
            get(unread_count),
        )
        .route(
            "/api/notifications/user/:user_id/mark-all-read",
            post(mark_all_read),
        )
        .route(
            "/api/notifications/:notification_id",
            get(get_notification)
                .patch(update_notification)
                .delete(delete_notification),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationQuery {
    read: Option<bool>,
    #[serde(rename = "type")]
    kind: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationList {
    #[serde(flatten)]
    page: KeyedPage<NotificationView>,
    unread_count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCount {
    unread_count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MarkedRead {
    modified_count: u64,
}

pub(crate) async fn create_notification(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewNotification>,
) -> Result<(StatusCode, ApiJson<NotificationView>), ApiError> {
    payload.validate()?;
    let user_id = parse_id(&payload.user_id, "user")?;
    let mut notification = Notification::new(
        user_id,
        payload.kind,
        payload.title,
        payload.body,
        Utc::now(),
    );
    notification.read = payload.read;
    notification.action_url = payload.action_url;

    let notification = context.stores.notifications.insert(notification).await?;
    Ok((StatusCode::CREATED, ApiJson(notification.view())))
}

pub(crate) async fn user_notifications(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> Result<ApiJson<Success<NotificationList>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let kind = query
        .kind
        .as_deref()
        .map(|raw| {
            NotificationKind::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid notification type: {raw}")))
        })
        .transpose()?;
    let request = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = NotificationFilter {
        user_id: Some(user_id),
        read: query.read,
        kind,
    };

    let page = context.stores.notifications.page(&filter, request).await?;
    let unread_count = context
        .stores
        .notifications
        .count(&NotificationFilter::unread(user_id))
        .await?;

    Ok(success(NotificationList {
        page: KeyedPage::new("notifications", page.map(|item| item.view())),
        unread_count,
    }))
}

pub(crate) async fn unread_count(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<ApiJson<Success<UnreadCount>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let unread_count = context
        .stores
        .notifications
        .count(&NotificationFilter::unread(user_id))
        .await?;
    Ok(success(UnreadCount { unread_count }))
}

pub(crate) async fn mark_all_read(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<ApiJson<Success<MarkedRead>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let modified_count = context
        .stores
        .notifications
        .update_many(
            &NotificationFilter::unread(user_id),
            &NotificationPatch::mark_read(),
        )
        .await?;
    Ok(success(MarkedRead { modified_count }))
}

pub(crate) async fn get_notification(
    State(context): State<AppContext>,
    Path(notification_id): Path<String>,
) -> Result<ApiJson<NotificationView>, ApiError> {
    let id = parse_id(&notification_id, "notification")?;
    let notification = context
        .stores
        .notifications
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(ApiJson(notification.view()))
}

pub(crate) async fn update_notification(
    State(context): State<AppContext>,
    Path(notification_id): Path<String>,
    ApiJson(patch): ApiJson<NotificationPatch>,
) -> Result<ApiJson<NotificationView>, ApiError> {
    let id = parse_id(&notification_id, "notification")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;
    let notification = context
        .stores
        .notifications
        .update(id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(ApiJson(notification.view()))
}

pub(crate) async fn delete_notification(
    State(context): State<AppContext>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&notification_id, "notification")?;
    if !context.stores.notifications.delete(id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
