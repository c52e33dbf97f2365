#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hunt_property::{api_router, AppContext};
use serde_json::{json, Value};
use tower::ServiceExt;

pub fn build_router() -> Router {
    api_router(AppContext::in_memory())
}

pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router dispatch");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json")
    };
    (status, payload)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, "GET", uri, None).await
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, "POST", uri, Some(body)).await
}

pub fn id_of(payload: &Value) -> String {
    payload["_id"].as_str().expect("record id").to_string()
}

pub async fn create_user(router: &Router, name: &str, phone: &str) -> String {
    let (status, body) = post(
        router,
        "/api/users",
        json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "phone": phone,
            "user_type": "owner",
            "password": "secret",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "user creation failed: {body}");
    id_of(&body)
}

pub fn listing(owner_id: &str, title: &str, transaction_type: &str, city: &str, price: f64) -> Value {
    json!({
        "owner_id": owner_id,
        "title": title,
        "description": format!("{title} close to the metro"),
        "transaction_type": transaction_type,
        "price": price,
        "property_category": "residential",
        "property_subtype": "apartment",
        "bedrooms": 2,
        "bathrooms": 2,
        "area_sqft": 1150.0,
        "furnishing": "semi-furnished",
        "facing": "east",
        "location": {
            "address": "12 Lake View Road",
            "locality": "Anna Nagar",
            "city": city,
            "geo": { "type": "Point", "coordinates": [80.2101, 13.0850] }
        },
        "images": [{ "url": "/uploads/front.jpg", "is_primary": true }],
        "amenities": ["lift", "parking"]
    })
}

pub async fn create_property(
    router: &Router,
    owner_id: &str,
    title: &str,
    transaction_type: &str,
    city: &str,
    price: f64,
) -> String {
    let (status, body) = post(
        router,
        "/api/properties",
        listing(owner_id, title, transaction_type, city, price),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "property creation failed: {body}");
    id_of(&body)
}
