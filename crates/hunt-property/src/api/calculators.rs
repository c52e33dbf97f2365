use axum::routing::post;
use axum::Router;
use validator::Validate;

use super::extract::{success, ApiJson, Success};
use super::AppContext;
use crate::domain::finance::{
    EmiBreakdown, EmiRequest, FutureValue, FutureValueRequest, LoanEligibility,
    LoanEligibilityRequest, RentalValue, RentalValueRequest,
};
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/financial-calculators/loan-eligibility",
            post(loan_eligibility),
        )
        .route("/api/financial-calculators/rental-value", post(rental_value))
        .route("/api/financial-calculators/future-value", post(future_value))
        .route("/api/financial-calculators/emi", post(emi))
}

pub(crate) async fn loan_eligibility(
    ApiJson(payload): ApiJson<LoanEligibilityRequest>,
) -> Result<ApiJson<Success<LoanEligibility>>, ApiError> {
    payload.validate()?;
    Ok(success(payload.evaluate()))
}

pub(crate) async fn rental_value(
    ApiJson(payload): ApiJson<RentalValueRequest>,
) -> Result<ApiJson<Success<RentalValue>>, ApiError> {
    payload.validate()?;
    Ok(success(payload.evaluate()))
}

pub(crate) async fn future_value(
    ApiJson(payload): ApiJson<FutureValueRequest>,
) -> Result<ApiJson<Success<FutureValue>>, ApiError> {
    payload.validate()?;
    Ok(success(payload.evaluate()))
}

pub(crate) async fn emi(
    ApiJson(payload): ApiJson<EmiRequest>,
) -> Result<ApiJson<Success<EmiBreakdown>>, ApiError> {
    payload.validate()?;
    Ok(success(payload.evaluate()))
}
