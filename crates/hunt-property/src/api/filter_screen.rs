use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::extract::{success, ApiJson, ApiQuery, Success};
use super::properties::parse_transaction_type;
use super::AppContext;
use crate::domain::facets::FilterOptions;
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new().route("/api/filter-screen", get(filter_options))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FilterScreenQuery {
    transaction_type: Option<String>,
}

/// Dropdown, slider and checkbox values for the search filter UI.
pub(crate) async fn filter_options(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<FilterScreenQuery>,
) -> Result<ApiJson<Success<FilterOptions>>, ApiError> {
    let transaction_type = parse_transaction_type(query.transaction_type.as_deref())?;
    let options = context
        .stores
        .property_index
        .facets(transaction_type)
        .await?;
    Ok(success(options))
}
