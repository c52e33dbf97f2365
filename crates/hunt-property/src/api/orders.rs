use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use super::extract::{page_request, parse_id, success, ApiJson, ApiQuery, KeyedPage, Success};
use super::AppContext;
use crate::domain::is_empty_patch;
use crate::domain::order::{NewOrder, Order, OrderFilter, OrderPatch, OrderStatus, OrderView};
use crate::domain::user::UserPatch;
use crate::error::ApiError;

const DEFAULT_LIMIT: u64 = 20;

pub(crate) fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/user/:user_id", get(user_orders))
        .route(
            "/api/orders/:order_id",
            get(get_order).patch(update_order),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrderQuery {
    status: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

/// A successful payment moves the buyer onto the purchased plan. The order is
/// already stored, so failures here are only logged.
async fn activate_plan(context: &AppContext, order: &Order) {
    let patch = UserPatch {
        subscription_plan_id: Some(order.plan_id.clone()),
        ..UserPatch::default()
    };
    match context.stores.users.update(order.user_id, &patch).await {
        Ok(Some(_)) => {
            info!(order_id = %order.id, plan_id = %order.plan_id, "subscription plan activated");
        }
        Ok(None) => {
            warn!(order_id = %order.id, user_id = %order.user_id, "order user missing, plan not activated");
        }
        Err(err) => {
            warn!(error = %err, order_id = %order.id, user_id = %order.user_id, "plan not activated");
        }
    }
}

pub(crate) async fn create_order(
    State(context): State<AppContext>,
    ApiJson(payload): ApiJson<NewOrder>,
) -> Result<(StatusCode, ApiJson<OrderView>), ApiError> {
    payload.validate()?;
    let user_id = parse_id(&payload.user_id, "user")?;
    if !context.stores.users.exists(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let order = context
        .stores
        .orders
        .insert(payload.into_order(user_id, Utc::now()))
        .await?;
    if order.status == OrderStatus::Success {
        activate_plan(&context, &order).await;
    }
    info!(order_id = %order.id, order_number = %order.order_number, "order created");
    Ok((StatusCode::CREATED, ApiJson(order.view())))
}

pub(crate) async fn user_orders(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<ApiJson<Success<KeyedPage<OrderView>>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            OrderStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid status: {raw}")))
        })
        .transpose()?;
    let request = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = OrderFilter {
        user_id: Some(user_id),
        status,
    };
    let page = context.stores.orders.page(&filter, request).await?;
    Ok(success(KeyedPage::new(
        "orders",
        page.map(|order| order.view()),
    )))
}

pub(crate) async fn get_order(
    State(context): State<AppContext>,
    Path(order_id): Path<String>,
) -> Result<ApiJson<Success<OrderView>>, ApiError> {
    let id = parse_id(&order_id, "order")?;
    let order = context
        .stores
        .orders
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(success(order.view()))
}

pub(crate) async fn update_order(
    State(context): State<AppContext>,
    Path(order_id): Path<String>,
    ApiJson(patch): ApiJson<OrderPatch>,
) -> Result<ApiJson<Success<OrderView>>, ApiError> {
    let id = parse_id(&order_id, "order")?;
    if is_empty_patch(&patch) {
        return Err(ApiError::bad_request("No fields to update"));
    }
    let becomes_successful = patch.status == Some(OrderStatus::Success);
    let order = context
        .stores
        .orders
        .update(id, &patch.stamped(Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    if becomes_successful {
        activate_plan(&context, &order).await;
    }
    Ok(success(order.view()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mongodb::bson::oid::ObjectId;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::api::api_router;
    use crate::domain::user::User;
    use crate::store::{MemoryStore, Record, Repository, StoreError, Window};

    /// Users collection that accepts reads and inserts but rejects every update.
    #[derive(Default)]
    struct FrozenUsers(MemoryStore<User>);

    fn frozen() -> StoreError {
        StoreError::Duplicate {
            field: "subscription_plan_id".to_string(),
        }
    }

    #[async_trait]
    impl Repository<User> for FrozenUsers {
        async fn insert(&self, record: User) -> Result<User, StoreError> {
            self.0.insert(record).await
        }

        async fn get(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
            self.0.get(id).await
        }

        async fn find(
            &self,
            filter: &<User as Record>::Filter,
            window: Window,
        ) -> Result<Vec<User>, StoreError> {
            self.0.find(filter, window).await
        }

        async fn count(&self, filter: &<User as Record>::Filter) -> Result<u64, StoreError> {
            self.0.count(filter).await
        }

        async fn update(
            &self,
            _id: ObjectId,
            _patch: &<User as Record>::Patch,
        ) -> Result<Option<User>, StoreError> {
            Err(frozen())
        }

        async fn update_many(
            &self,
            _filter: &<User as Record>::Filter,
            _patch: &<User as Record>::Patch,
        ) -> Result<u64, StoreError> {
            Err(frozen())
        }

        async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
            self.0.delete(id).await
        }

        async fn delete_many(&self, filter: &<User as Record>::Filter) -> Result<u64, StoreError> {
            self.0.delete_many(filter).await
        }
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = router.clone().oneshot(request).await.expect("dispatch");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn paid_order_is_kept_when_plan_activation_fails() {
        let mut context = AppContext::in_memory();
        context.stores.users = Arc::new(FrozenUsers::default());
        let orders = context.stores.orders.clone();
        let router = api_router(context);

        let (status, user) = call(
            &router,
            "POST",
            "/api/users",
            json!({
                "name": "Buyer",
                "email": "buyer@example.com",
                "phone": "+919000000901",
                "user_type": "buyer",
                "password": "secret"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let user_id = user["_id"].as_str().expect("user id").to_string();

        let (status, order) = call(
            &router,
            "POST",
            "/api/orders",
            json!({
                "user_id": user_id,
                "plan_id": "silver",
                "plan_name": "Silver",
                "amount": 1400.0,
                "status": "success"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "success");

        let (_, pending) = call(
            &router,
            "POST",
            "/api/orders",
            json!({ "user_id": user_id, "plan_id": "gold", "plan_name": "Gold", "amount": 3500.0 }),
        )
        .await;
        let uri = format!("/api/orders/{}", pending["_id"].as_str().expect("order id"));
        let (status, patched) = call(&router, "PATCH", &uri, json!({ "status": "success" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["data"]["status"], "success");

        let stored = orders
            .count(&OrderFilter {
                user_id: ObjectId::parse_str(&user_id).ok(),
                status: Some(OrderStatus::Success),
            })
            .await
            .expect("count");
        assert_eq!(stored, 2);
    }
}
