use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::extract::{parse_optional_id, success, ApiJson, ApiQuery, Success};
use super::AppContext;
use crate::domain::plans::{resolve_plan_id, PlanScreen};
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new().route("/api/subscription-plans", get(subscription_plans))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlanQuery {
    user_id: Option<String>,
}

/// Plan catalogue; with a user id the user's current tier is flagged.
/// Unknown users and unset plans land on the free tier.
pub(crate) async fn subscription_plans(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<PlanQuery>,
) -> Result<ApiJson<Success<PlanScreen>>, ApiError> {
    let stored_plan = match parse_optional_id(query.user_id.as_deref(), "user")? {
        Some(user_id) => context
            .stores
            .users
            .get(user_id)
            .await?
            .and_then(|user| user.subscription_plan_id),
        None => None,
    };
    Ok(success(PlanScreen::new(resolve_plan_id(
        stored_plan.as_deref(),
    ))))
}
