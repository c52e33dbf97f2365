use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::extract::{parse_id, parse_optional_id, skip_window, ApiJson, ApiQuery};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionPatch, TransactionStatus,
    TransactionView,
};
use crate::error::ApiError;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/transactions/:transaction_id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TransactionQuery {
    skip: Option<u64>,
    limit: Option<u64>,
    property_id: Option<String>,
    buyer_id: Option<String>,
    seller_id: Option<String>,
    status: Option<String>,
}

async fn existing_party(
    context: &AppContext,
    raw: &str,
    role: &str,
) -> Result<ObjectId, ApiError> {
    let id = parse_id(raw, role)?;
    if context.stores.users.exists(id).await? {
        Ok(id)
    } else {
        let mut label = role.to_string();
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Err(ApiError::not_found(format!("{label} not found")))
    }
}

pub(crate) async fn create_transaction(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewTransaction>,
) -> Result<(StatusCode, ApiJson<TransactionView>), ApiError> {
    payload.validate()?;
    let property_id = parse_id(&payload.property_id, "property")?;
    if !context.stores.properties.exists(property_id).await? {
        return Err(ApiError::not_found("Property not found"));
    }
    let buyer_id = existing_party(&context, &payload.buyer_id, "buyer").await?;
    let seller_id = existing_party(&context, &payload.seller_id, "seller").await?;

    let now = Utc::now();
    let transaction = Transaction {
        id: ObjectId::new(),
        property_id,
        buyer_id,
        seller_id,
        transaction_type: payload.transaction_type,
        amount: payload.amount,
        status: payload.status,
        created_at: now,
        completed_at: (payload.status == TransactionStatus::Completed).then_some(now),
    };
    let transaction = context.stores.transactions.insert(transaction).await?;
    info!(transaction_id = %transaction.id, "transaction recorded");
    Ok((StatusCode::CREATED, ApiJson(transaction.view())))
}

pub(crate) async fn list_transactions(
    State(context): State<AppContext>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<ApiJson<Vec<TransactionView>>, ApiError> {
    let window = skip_window(query.skip, query.limit)?;
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            TransactionStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid status: {raw}")))
        })
        .transpose()?;
    let filter = TransactionFilter {
        property_id: parse_optional_id(query.property_id.as_deref(), "property")?,
        buyer_id: parse_optional_id(query.buyer_id.as_deref(), "buyer")?,
        seller_id: parse_optional_id(query.seller_id.as_deref(), "seller")?,
        status,
    };
    let transactions = context.stores.transactions.find(&filter, window).await?;
    Ok(ApiJson(transactions.iter().map(Transaction::view).collect()))
}

pub(crate) async fn get_transaction(
    State(context): State<AppContext>,
    Path(transaction_id): Path<String>,
) -> Result<ApiJson<TransactionView>, ApiError> {
    let id = parse_id(&transaction_id, "transaction")?;
    let transaction = context
        .stores
        .transactions
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    Ok(ApiJson(transaction.view()))
}

pub(crate) async fn update_transaction(
    State(context): State<AppContext>,
    Path(transaction_id): Path<String>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> Result<ApiJson<TransactionView>, ApiError> {
    let id = parse_id(&transaction_id, "transaction")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    patch.validate()?;
    let transaction = context
        .stores
        .transactions
        .update(id, &patch.stamped(Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    Ok(ApiJson(transaction.view()))
}

pub(crate) async fn delete_transaction(
    State(context): State<AppContext>,
    Path(transaction_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&transaction_id, "transaction")?;
    if !context.stores.transactions.delete(id).await? {
        return Err(ApiError::not_found("Transaction not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
