mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use chrono::{DateTime, TimeZone, Utc};
use common::{build_router, create_property, create_user, get, listing, post, send};
use hunt_property::domain::property::{NewProperty, Property};
use hunt_property::{api_router, AppContext};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};

#[tokio::test]
async fn create_then_fetch_returns_same_listing() {
    let router = build_router();
    let owner = create_user(&router, "Meena", "+919000000101").await;
    let property = create_property(&router, &owner, "Sunrise Residency", "sale", "Chennai", 7_500_000.0).await;

    let (status, body) = get(&router, &format!("/api/properties/{property}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], property.as_str());
    assert_eq!(body["owner_id"], owner.as_str());
    assert_eq!(body["title"], "Sunrise Residency");
    assert_eq!(body["location"]["city"], "Chennai");
    assert_eq!(body["location"]["geo"]["coordinates"], json!([80.2101, 13.0850]));
    assert_eq!(body["favorite_count"], 0);
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn created_listing_reads_back_identically() {
    let router = build_router();
    let owner = create_user(&router, "Asha", "+919000000107").await;

    let (status, created) = post(
        &router,
        "/api/properties",
        listing(&owner, "Harbour View", "rent", "Chennai", 42_000.0),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = created["_id"].as_str().expect("property id");
    let (status, fetched) = get(&router, &format!("/api/properties/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_rejects_unknown_owner_and_bad_ids() {
    let router = build_router();

    let (status, body) = post(
        &router,
        "/api/properties",
        listing("65f1c0ffee0000000000beef", "Orphan", "rent", "Chennai", 25_000.0),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Owner not found");

    let (status, body) = post(
        &router,
        "/api/properties",
        listing("not-an-id", "Orphan", "rent", "Chennai", 25_000.0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid owner ID");

    let (status, body) = get(&router, "/api/properties/xyz").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid property ID");
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let router = build_router();
    let owner = create_user(&router, "Ravi", "+919000000102").await;
    for (index, price) in [3_000_000.0, 4_000_000.0, 5_000_000.0].into_iter().enumerate() {
        create_property(&router, &owner, &format!("Sale Home {index}"), "sale", "Chennai", price).await;
    }
    create_property(&router, &owner, "Rental Flat", "rent", "Chennai", 30_000.0).await;

    let (status, body) = get(&router, "/api/properties?transaction_type=sale&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["properties"].as_array().expect("items").len(), 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["has_prev"], false);
    assert_eq!(body["properties"][0]["title"], "Sale Home 2");

    let (_, body) = get(&router, "/api/properties?transaction_type=sale&limit=2&page=2").await;
    assert_eq!(body["properties"].as_array().expect("items").len(), 1);
    assert_eq!(body["has_prev"], true);

    let (_, body) = get(&router, "/api/properties?min_price=3500000&max_price=4500000").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["properties"][0]["price"], 4_000_000.0);

    let (status, _) = get(&router, "/api/properties?limit=101").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&router, "/api/properties?transaction_type=lease").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_matches_text_and_distance() {
    let router = build_router();
    let owner = create_user(&router, "Divya", "+919000000103").await;
    create_property(&router, &owner, "Lakeside Villa", "sale", "Chennai", 9_000_000.0).await;
    create_property(&router, &owner, "Garden Studio", "rent", "Chennai", 18_000.0).await;

    let (status, body) = get(&router, "/api/properties/search?text=lakeside").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["properties"][0]["title"], "Lakeside Villa");

    let (_, body) = get(
        &router,
        "/api/properties/search?longitude=80.2100&latitude=13.0851&max_distance=1000",
    )
    .await;
    assert_eq!(body["total"], 2);

    let (_, body) = get(
        &router,
        "/api/properties/search?longitude=77.5946&latitude=12.9716&max_distance=1000",
    )
    .await;
    assert_eq!(body["total"], 0);

    let (status, _) = get(&router, "/api/properties/search?longitude=80.21").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_delete_lifecycle() {
    let router = build_router();
    let owner = create_user(&router, "Kiran", "+919000000104").await;
    let property = create_property(&router, &owner, "Old Title", "sale", "Chennai", 6_000_000.0).await;
    let uri = format!("/api/properties/{property}");

    let (status, body) = send(&router, "PUT", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No fields to update");

    let (status, body) = send(&router, "PUT", &uri, Some(json!({ "title": "New Title", "price": 6_200_000.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "New Title");
    assert_eq!(body["price"], 6_200_000.0);
    assert_eq!(body["bedrooms"], 2);

    let (status, body) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Property not found");

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_listing_and_filter_screen() {
    let router = build_router();
    let owner = create_user(&router, "Latha", "+919000000105").await;
    let other = create_user(&router, "Arun", "+919000000106").await;
    create_property(&router, &owner, "Mine A", "sale", "Chennai", 5_000_000.0).await;
    create_property(&router, &owner, "Mine B", "rent", "Coimbatore", 20_000.0).await;
    create_property(&router, &other, "Theirs", "sale", "Madurai", 4_000_000.0).await;

    let (status, body) = get(&router, &format!("/api/properties/owner/{owner}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().expect("list").len(), 2);

    let (status, body) = get(&router, "/api/filter-screen?transaction_type=sale").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let cities = body["data"]["cities"].as_array().expect("cities");
    assert!(cities.contains(&json!("Chennai")));
    assert!(cities.contains(&json!("Madurai")));
    assert!(!cities.contains(&json!("Coimbatore")));
}

fn posted_at(item: &Value) -> DateTime<Utc> {
    let raw = item["posted_at"].as_str().expect("posted_at");
    DateTime::parse_from_rfc3339(raw)
        .expect("rfc3339 timestamp")
        .with_timezone(&Utc)
}

#[tokio::test]
async fn walking_every_page_visits_each_listing_once_newest_first() {
    let context = AppContext::in_memory();
    let owner = ObjectId::new();
    let same_instant = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single().expect("timestamp");

    for index in 0..23u32 {
        let payload: NewProperty = serde_json::from_value(listing(
            &owner.to_hex(),
            &format!("Listing {index}"),
            "sale",
            "Chennai",
            4_000_000.0 + f64::from(index),
        ))
        .expect("listing payload");
        // Every third listing shares a timestamp so ordering falls back to the id.
        let posted = if index % 3 == 0 {
            same_instant
        } else {
            same_instant + chrono::Duration::minutes(i64::from(index))
        };
        context
            .stores
            .properties
            .insert(Property::new(owner, payload.listing, posted))
            .await
            .expect("insert listing");
    }
    let router = api_router(context);

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let (status, body) = get(&router, &format!("/api/properties?limit=5&page={page}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 23);
        assert_eq!(body["total_pages"], 5);
        assert_eq!(body["has_prev"], page > 1);
        seen.extend(body["properties"].as_array().expect("items").iter().cloned());
        if body["has_next"] != true {
            break;
        }
        page += 1;
    }
    assert_eq!(page, 5);
    assert_eq!(seen.len(), 23);

    let ids: HashSet<&str> = seen
        .iter()
        .map(|item| item["_id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids.len(), 23);

    for pair in seen.windows(2) {
        let newer = (posted_at(&pair[0]), pair[0]["_id"].as_str().expect("id"));
        let older = (posted_at(&pair[1]), pair[1]["_id"].as_str().expect("id"));
        assert!(newer > older, "{newer:?} listed before {older:?}");
    }

    let (_, beyond) = get(&router, "/api/properties?limit=5&page=6").await;
    assert!(beyond["properties"].as_array().expect("items").is_empty());
    assert_eq!(beyond["has_next"], false);
}

#[tokio::test]
async fn empty_listing_reports_zero_pages() {
    let router = build_router();
    let (status, body) = get(&router, "/api/properties?transaction_type=rent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["total_pages"], 0);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_prev"], false);
    assert!(body["properties"].as_array().expect("items").is_empty());
}

#[tokio::test]
async fn oversized_page_numbers_are_rejected() {
    let router = build_router();
    let user = create_user(&router, "Gopal", "+919000000108").await;

    for uri in [
        "/api/properties?page=18446744073709551615&limit=10".to_string(),
        "/api/properties/search?page=1844674407370955163&limit=10".to_string(),
        format!("/api/notifications/user/{user}?page=18446744073709551615"),
        format!("/api/orders/user/{user}?page=18446744073709551615&limit=100"),
        "/api/users?skip=18446744073709551615".to_string(),
    ] {
        let (status, body) = get(&router, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}
