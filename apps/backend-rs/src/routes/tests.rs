use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Method, Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::v1_router;
use crate::auth::token_for;
use crate::state::AppState;

fn app() -> Router {
    Router::new()
        .nest("/v1", v1_router())
        .with_state(AppState::for_tests())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    roles: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_as(app, method, uri, roles.map(|roles| ("user-1", roles)), body).await
}

async fn send_as(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some((user_id, roles)) = user {
        request = request
            .header("x-user-id", user_id)
            .header("x-user-roles", roles);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => raw.parse().expect("decimal string"),
        other => other.to_string().parse().expect("decimal number"),
    }
}

fn id(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

async fn seed_rented_room(app: &Router) -> String {
    let (status, building) = send(
        app,
        Method::POST,
        "/v1/buildings",
        Some("admin"),
        Some(json!({
            "name": "B1",
            "electricity_unit_price": "1.20",
            "water_unit_price": "3.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, room) = send(
        app,
        Method::POST,
        "/v1/rooms",
        Some("admin"),
        Some(json!({
            "building_id": id(&building),
            "room_number": "R101",
            "rent": "2000",
            "default_deposit": "2000",
            "rental_status": "rented"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    id(&room)
}

#[tokio::test]
async fn health_reports_memory_store() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn requires_authentication_and_capability() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/v1/buildings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/buildings",
        Some("customer_service"),
        Some(json!({ "name": "B2" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/v1/buildings", Some("customer_service"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().expect("data").is_empty());
}

#[tokio::test]
async fn accepts_bearer_tokens() {
    let app = app();
    let token = token_for("test-secret", "finance-7", &["finance"]);
    let request = Request::builder()
        .uri("/v1/me")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["user"]["id"], "finance-7");
    assert!(body["capabilities"]
        .as_array()
        .expect("capabilities")
        .contains(&json!("manage_bills")));
}

#[tokio::test]
async fn estimated_bill_lifecycle_over_http() {
    let app = app();
    let room_id = seed_rented_room(&app).await;

    for (date, electricity, water) in [("2024-04-30", "150", "20"), ("2024-05-31", "210", "35")] {
        let (status, reading) = send(
            &app,
            Method::POST,
            "/v1/meter-readings",
            Some("content_manager"),
            Some(json!({
                "room_id": room_id,
                "reading_date": date,
                "electricity_reading": electricity,
                "water_reading": water,
                "meter_reader": "Li"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reading["status"], "confirmed");
    }

    let generate = |month: &str| {
        json!({ "room_id": room_id, "bill_month": month })
    };
    let (status, april) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(generate("2024-04")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&april["deposit"]), dec!(2000));

    let (status, may) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(generate("2024-05")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(may["bill_month"], "2024-05");
    assert_eq!(may["status"], "generated");
    assert_eq!(decimal(&may["electricity_amount"]), dec!(72.00));
    assert_eq!(decimal(&may["water_amount"]), dec!(52.50));
    assert_eq!(decimal(&may["total_amount"]), dec!(2124.50));

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(generate("2024-05")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(generate("2024-5")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let may_id = id(&may);
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/v1/estimated-bills/{may_id}/status"),
        Some("finance"),
        Some(json!({ "status": "paid" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, confirmed) = send(
        &app,
        Method::PUT,
        &format!("/v1/estimated-bills/{may_id}/status"),
        Some("finance"),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, list) = send(
        &app,
        Method::GET,
        &format!("/v1/estimated-bills?room_id={room_id}"),
        Some("customer_service"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let months: Vec<&str> = list["data"]
        .as_array()
        .expect("data")
        .iter()
        .filter_map(|bill| bill["bill_month"].as_str())
        .collect();
    assert_eq!(months, vec!["2024-05", "2024-04"]);
}

#[tokio::test]
async fn actual_bill_from_estimated_and_payment() {
    let app = app();
    let room_id = seed_rented_room(&app).await;
    let (_, estimated) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(json!({ "room_id": room_id, "bill_month": "2024-05" })),
    )
    .await;
    let estimated_id = id(&estimated);

    let (status, actual) = send(
        &app,
        Method::POST,
        &format!("/v1/actual-bills/from-estimated/{estimated_id}"),
        Some("finance"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(actual["estimated_bill_id"], json!(estimated_id));
    assert_eq!(actual["payment_status"], "unpaid");
    assert_eq!(
        decimal(&actual["total_amount"]),
        decimal(&estimated["total_amount"])
    );

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/actual-bills/from-estimated/{estimated_id}"),
        Some("finance"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let actual_id = id(&actual);
    let (status, patched) = send(
        &app,
        Method::PATCH,
        &format!("/v1/actual-bills/{actual_id}"),
        Some("finance"),
        Some(json!({ "other_fees": "30", "other_fees_description": "Cleaning" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&patched["total_amount"]), dec!(4030.00));

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/v1/actual-bills/{actual_id}/status"),
        Some("finance"),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, paid) = send(
        &app,
        Method::PUT,
        &format!("/v1/actual-bills/{actual_id}/payment"),
        Some("finance"),
        Some(json!({ "payment_status": "paid", "payment_date": "2024-06-05", "payment_method": "bank" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_date"], "2024-06-05");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/v1/estimated-bills/{actual_id}"),
        Some("finance"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_all_reports_batch_summary() {
    let app = app();
    let room_id = seed_rented_room(&app).await;
    send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate",
        Some("finance"),
        Some(json!({ "room_id": room_id, "bill_month": "2024-05" })),
    )
    .await;

    let (status, summary) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate-all",
        Some("finance"),
        Some(json!({ "bill_month": "2024-05" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["generated"], 0);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(summary["failed"], 0);

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/estimated-bills/generate-all",
        Some("customer_service"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_reading_date_conflicts() {
    let app = app();
    let room_id = seed_rented_room(&app).await;
    let reading = json!({
        "room_id": room_id,
        "reading_date": "2024-05-31",
        "electricity_reading": "210",
        "water_reading": "35",
        "meter_reader": "Li"
    });
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/meter-readings",
        Some("admin"),
        Some(reading.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/v1/meter-readings", Some("admin"), Some(reading)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, latest) = send(
        &app,
        Method::GET,
        &format!("/v1/rooms/{room_id}/meter-readings/latest"),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["reading_date"], "2024-05-31");
}

#[tokio::test]
async fn landlords_manage_only_their_own_buildings() {
    let app = app();
    let landlord = Some(("landlord-1", "content_manager"));
    let stranger = Some(("landlord-2", "content_manager"));

    let (status, building) = send_as(
        &app,
        Method::POST,
        "/v1/buildings",
        landlord,
        Some(json!({ "name": "B1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let building_id = id(&building);
    let room = json!({ "building_id": building_id, "room_number": "R101", "rent": "1500" });

    let (status, body) = send_as(&app, Method::POST, "/v1/rooms", stranger, Some(room.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, _) = send_as(&app, Method::POST, "/v1/rooms", landlord, Some(room.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, mine) = send_as(&app, Method::GET, "/v1/me/buildings", stranger, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(mine["data"].as_array().expect("data").is_empty());

    let owners = format!("/v1/buildings/{building_id}/owners");
    let grant = json!({ "user_id": "landlord-2" });
    let (status, _) = send_as(&app, Method::POST, &owners, landlord, Some(grant.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::POST, &owners, Some("admin"), Some(grant.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, &owners, Some("admin"), Some(grant)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, mine) = send_as(&app, Method::GET, "/v1/me/buildings", stranger, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"][0]["id"], building_id.as_str());

    let mut second_room = room;
    second_room["room_number"] = json!("R102");
    let (status, _) = send_as(&app, Method::POST, "/v1/rooms", stranger, Some(second_room)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("{owners}/landlord-2"),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("{owners}/landlord-2"),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reading_corrections_and_monitoring_over_http() {
    let app = app();
    let room_id = seed_rented_room(&app).await;
    let mut reading_ids = Vec::new();
    for (day, electricity, status) in [
        ("2024-04-30", "100", "confirmed"),
        ("2024-05-31", "1300", "pending"),
    ] {
        let (code, reading) = send(
            &app,
            Method::POST,
            "/v1/meter-readings",
            Some("admin"),
            Some(json!({
                "room_id": room_id,
                "reading_date": day,
                "electricity_reading": electricity,
                "water_reading": "10",
                "meter_reader": "Li",
                "status": status
            })),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
        reading_ids.push(id(&reading));
    }

    let (status, count) = send(
        &app,
        Method::GET,
        "/v1/meter-readings/pending/count",
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["pending"], 1);

    let abnormal_uri = format!("/v1/rooms/{room_id}/abnormal-readings");
    let (status, abnormal) = send(&app, Method::GET, &abnormal_uri, Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    let flagged = abnormal["data"].as_array().expect("data");
    assert_eq!(flagged.len(), 1);
    assert_eq!(decimal(&flagged[0]["electricity_usage"]), dec!(1200));

    let (status, corrected) = send(
        &app,
        Method::PUT,
        &format!("/v1/meter-readings/{}", reading_ids[1]),
        Some("admin"),
        Some(json!({ "electricity_reading": "180", "notes": "re-read" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&corrected["electricity_reading"]), dec!(180));
    assert_eq!(corrected["notes"], "re-read");

    let (status, abnormal) = send(&app, Method::GET, &abnormal_uri, Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(abnormal["data"].as_array().expect("data").is_empty());

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/v1/meter-readings/{}", reading_ids[1]),
        Some("admin"),
        Some(json!({ "water_reading": "-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/v1/meter-readings/{}", reading_ids[1]),
        Some("guest"),
        Some(json!({ "water_reading": "11" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn building_usage_statistics_over_http() {
    let app = app();
    let room_id = seed_rented_room(&app).await;
    let (_, room) = send(&app, Method::GET, &format!("/v1/rooms/{room_id}"), Some("admin"), None).await;
    let building_id = room["building_id"].as_str().expect("building").to_string();

    for (day, electricity) in [("2024-04-30", "100"), ("2024-05-31", "175")] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/meter-readings",
            Some("admin"),
            Some(json!({
                "room_id": room_id,
                "reading_date": day,
                "electricity_reading": electricity,
                "water_reading": "10",
                "meter_reader": "Li"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, stats) = send(
        &app,
        Method::GET,
        &format!(
            "/v1/buildings/{building_id}/usage-statistics?start_date=2024-01-01&end_date=2024-12-31"
        ),
        Some("customer_service"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["room_count"], 1);
    assert_eq!(stats["confirmed_readings"], 2);
    assert_eq!(decimal(&stats["electricity_usage"]), dec!(75));
    assert_eq!(decimal(&stats["water_usage"]), Decimal::ZERO);
}
