//! Requirement, home loan and property cost submissions. Each form is
//! created once and read back by id or per submitting user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::extract::{page_request, parse_id, success, ApiJson, ApiQuery, KeyedPage, Success};
use super::AppContext;
use crate::domain::forms::{
    HomeLoanApplication, HomeLoanView, NewHomeLoanApplication, NewPropertyCostCalculation,
    NewRequirement, PropertyCostCalculation, PropertyCostView, Requirement, RequirementView,
    SubmitterFilter,
};
use crate::error::ApiError;
use crate::store::{Record, Repository};

const DEFAULT_LIMIT: u64 = 20;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/requirements", post(create_requirement))
        .route("/api/requirements/user/:user_id", get(user_requirements))
        .route("/api/requirements/:requirement_id", get(get_requirement))
        .route("/api/home-loan", post(create_home_loan))
        .route("/api/home-loan/user/:user_id", get(user_home_loans))
        .route("/api/home-loan/:application_id", get(get_home_loan))
        .route("/api/property-cost", post(create_cost_calculation))
        .route("/api/property-cost/user/:user_id", get(user_cost_calculations))
        .route("/api/property-cost/:calculation_id", get(get_cost_calculation))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmissionQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

type Listing<V> = ApiJson<Success<KeyedPage<V>>>;

async fn submissions_for<T, V>(
    repository: &dyn Repository<T>,
    user_id: &str,
    query: SubmissionQuery,
    key: &'static str,
    view: fn(&T) -> V,
) -> Result<Listing<V>, ApiError>
where
    T: Record<Filter = SubmitterFilter>,
    V: Serialize,
{
    let user_id = parse_id(user_id, "user")?;
    let request = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let page = repository
        .page(&SubmitterFilter::for_user(user_id), request)
        .await?;
    Ok(success(KeyedPage::new(key, page.map(|record| view(&record)))))
}

async fn submission<T, V>(
    repository: &dyn Repository<T>,
    raw_id: &str,
    label: &str,
    missing: &'static str,
    view: fn(&T) -> V,
) -> Result<ApiJson<Success<V>>, ApiError>
where
    T: Record,
    V: Serialize,
{
    let id = parse_id(raw_id, label)?;
    let record = repository
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(missing))?;
    Ok(success(view(&record)))
}

pub(crate) async fn create_requirement(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewRequirement>,
) -> Result<(StatusCode, ApiJson<Success<RequirementView>>), ApiError> {
    payload.validate()?;
    let requirement = context
        .stores
        .requirements
        .insert(payload.into_record(Utc::now()))
        .await?;
    info!(requirement_id = %requirement.id, city = %requirement.city, "requirement submitted");
    Ok((StatusCode::CREATED, success(requirement.view())))
}

pub(crate) async fn user_requirements(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<SubmissionQuery>,
) -> Result<Listing<RequirementView>, ApiError> {
    submissions_for(
        context.stores.requirements.as_ref(),
        &user_id,
        query,
        "requirements",
        Requirement::view,
    )
    .await
}

pub(crate) async fn get_requirement(
    State(context): State<AppContext>,
    Path(requirement_id): Path<String>,
) -> Result<ApiJson<Success<RequirementView>>, ApiError> {
    submission(
        context.stores.requirements.as_ref(),
        &requirement_id,
        "requirement",
        "Requirement not found",
        Requirement::view,
    )
    .await
}

pub(crate) async fn create_home_loan(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewHomeLoanApplication>,
) -> Result<(StatusCode, ApiJson<Success<HomeLoanView>>), ApiError> {
    payload.validate()?;
    let application = context
        .stores
        .home_loans
        .insert(payload.into_record(Utc::now()))
        .await?;
    info!(application_id = %application.id, loan_type = %application.loan_type, "home loan application submitted");
    Ok((StatusCode::CREATED, success(application.view())))
}

pub(crate) async fn user_home_loans(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<SubmissionQuery>,
) -> Result<Listing<HomeLoanView>, ApiError> {
    submissions_for(
        context.stores.home_loans.as_ref(),
        &user_id,
        query,
        "applications",
        HomeLoanApplication::view,
    )
    .await
}

pub(crate) async fn get_home_loan(
    State(context): State<AppContext>,
    Path(application_id): Path<String>,
) -> Result<ApiJson<Success<HomeLoanView>>, ApiError> {
    submission(
        context.stores.home_loans.as_ref(),
        &application_id,
        "application",
        "Application not found",
        HomeLoanApplication::view,
    )
    .await
}

pub(crate) async fn create_cost_calculation(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewPropertyCostCalculation>,
) -> Result<(StatusCode, ApiJson<Success<PropertyCostView>>), ApiError> {
    payload.validate()?;
    let calculation = context
        .stores
        .cost_calculations
        .insert(payload.into_record(Utc::now()))
        .await?;
    info!(calculation_id = %calculation.id, grand_total = calculation.grand_total, "property cost calculated");
    Ok((StatusCode::CREATED, success(calculation.view())))
}

pub(crate) async fn user_cost_calculations(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<SubmissionQuery>,
) -> Result<Listing<PropertyCostView>, ApiError> {
    submissions_for(
        context.stores.cost_calculations.as_ref(),
        &user_id,
        query,
        "calculations",
        PropertyCostCalculation::view,
    )
    .await
}

pub(crate) async fn get_cost_calculation(
    State(context): State<AppContext>,
    Path(calculation_id): Path<String>,
) -> Result<ApiJson<Success<PropertyCostView>>, ApiError> {
    submission(
        context.stores.cost_calculations.as_ref(),
        &calculation_id,
        "calculation",
        "Calculation not found",
        PropertyCostCalculation::view,
    )
    .await
}
