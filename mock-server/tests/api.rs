use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, router, MockState, CLIENT_ID, CLIENT_SECRET, PASSWORD, USERNAME};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<String> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

fn password_grant() -> Value {
    json!({
        "client_id": CLIENT_ID,
        "client_secret": CLIENT_SECRET,
        "username": USERNAME,
        "password": PASSWORD,
        "grant_type": "password",
    })
}

async fn issue(app: &Router, body: Value) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(json_request("/aladdin/api/v1/issue-token", None, body))
        .await
        .unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

async fn login(app: &Router) -> String {
    let (status, body) = issue(app, password_grant()).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

fn order(name: &str) -> Value {
    json!({
        "store_id": 1,
        "merchant_order_id": "INV-1",
        "recipient_name": name,
        "recipient_phone": "01712345678",
        "recipient_address": "House 1, Road 2, Dhanmondi",
        "delivery_type": 48,
        "item_type": 2,
        "item_quantity": 1,
        "item_weight": 0.5,
        "amount_to_collect": 900,
    })
}

// --- token issuance ---

#[tokio::test]
async fn password_grant_issues_tokens() {
    let state = MockState::new();
    let app = router(state.clone());

    let (status, body) = issue(&app, password_grant()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], mock_server::DEFAULT_EXPIRES_IN);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(state.password_grants().await, 1);
}

#[tokio::test]
async fn wrong_password_returns_401_envelope() {
    let app = app();
    let mut grant = password_grant();
    grant["password"] = json!("nope");

    let (status, body) = issue(&app, grant).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "error");
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn refresh_grant_rotates_refresh_token() {
    let state = MockState::new();
    let app = router(state.clone());
    let (_, first) = issue(&app, password_grant()).await;
    let refresh = json!({
        "client_id": CLIENT_ID,
        "client_secret": CLIENT_SECRET,
        "refresh_token": first["refresh_token"],
        "grant_type": "refresh_token",
    });

    let (status, second) = issue(&app, refresh.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(second["access_token"], first["access_token"]);

    let (status, _) = issue(&app, refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.refresh_grants().await, 2);
}

#[tokio::test]
async fn reject_auth_switch_fails_every_grant() {
    let state = MockState::new();
    let app = router(state.clone());
    state.set_reject_auth(true).await;

    let (status, _) = issue(&app, password_grant()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn configured_lifetime_is_announced() {
    let state = MockState::new();
    let app = router(state.clone());
    state.set_expires_in(90).await;

    let (_, body) = issue(&app, password_grant()).await;

    assert_eq!(body["expires_in"], 90);
}

// --- bearer checks ---

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app().oneshot(get_request("/aladdin/api/v1/stores", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Unauthenticated.");
}

#[tokio::test]
async fn revoked_token_returns_401() {
    let state = MockState::new();
    let app = router(state.clone());
    let token = login(&app).await;
    state.revoke_access_tokens().await;

    let resp = app
        .oneshot(get_request("/aladdin/api/v1/city-list", Some(&token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- orders ---

#[tokio::test]
async fn order_lifecycle() {
    let app = app();
    let token = login(&app).await;

    let resp = app
        .clone()
        .oneshot(json_request("/aladdin/api/v1/orders", Some(&token), order("Rahim")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    assert_eq!(created["type"], "success");
    assert_eq!(created["data"]["order_status"], "Pending");
    assert_eq!(created["data"]["delivery_fee"], 60.0);
    let consignment_id = created["data"]["consignment_id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(get_request(
            &format!("/aladdin/api/v1/orders/{consignment_id}/info"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info = body_json(resp).await;
    assert_eq!(info["data"]["consignment_id"], consignment_id.as_str());
    assert_eq!(info["data"]["merchant_order_id"], "INV-1");

    let resp = app
        .oneshot(get_request("/aladdin/api/v1/orders/UNKNOWN/info", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_without_recipient_name_returns_422() {
    let app = app();
    let token = login(&app).await;

    let resp = app
        .oneshot(json_request("/aladdin/api/v1/orders", Some(&token), order("")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Please fix the given errors");
    assert_eq!(body["errors"]["recipient_name"][0], "The recipient name field is required.");
}

#[tokio::test]
async fn bulk_order_is_queued() {
    let app = app();
    let token = login(&app).await;

    let resp = app
        .oneshot(json_request(
            "/aladdin/api/v1/orders/bulk",
            Some(&token),
            json!({ "orders": [order("A"), order("B")] }),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = body_json(resp).await;
    assert_eq!(body["code"], 202);
    assert_eq!(body["data"], true);
}

// --- stores, pricing, locations ---

#[tokio::test]
async fn created_store_appears_in_list() {
    let app = app();
    let token = login(&app).await;
    let store = json!({
        "name": "Banani Outlet",
        "contact_name": "Nadia",
        "contact_number": "01912345678",
        "address": "Road 11, Banani",
        "city_id": 1,
        "zone_id": 299,
        "area_id": 40,
    });

    let resp = app
        .clone()
        .oneshot(json_request("/aladdin/api/v1/stores", Some(&token), store))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["store_name"], "Banani Outlet");

    let resp = app
        .oneshot(get_request("/aladdin/api/v1/stores", Some(&token)))
        .await
        .unwrap();
    let list = body_json(resp).await;
    assert_eq!(list["data"]["total"], 2);
    assert_eq!(list["data"]["data"][1]["store_name"], "Banani Outlet");
    assert_eq!(list["data"]["data"][1]["is_active"], 0);
}

#[tokio::test]
async fn price_plan_quotes_weight_based_fee() {
    let app = app();
    let token = login(&app).await;
    let query = json!({
        "store_id": 1,
        "item_type": 2,
        "item_weight": 2.0,
        "delivery_type": 48,
        "recipient_city": 1,
        "recipient_zone": 298,
        "recipient_area": 37,
    });

    let resp = app
        .oneshot(json_request("/aladdin/api/v1/merchant/price-plan", Some(&token), query))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["final_price"], 75.0);
}

#[tokio::test]
async fn location_hierarchy_is_browsable() {
    let app = app();
    let token = login(&app).await;

    let cities = body_json(
        app.clone()
            .oneshot(get_request("/aladdin/api/v1/city-list", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cities["data"]["data"][0]["city_name"], "Dhaka");

    let zones = body_json(
        app.clone()
            .oneshot(get_request("/aladdin/api/v1/cities/1/zone-list", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(zones["data"]["data"][0]["zone_id"], 298);

    let areas = body_json(
        app.oneshot(get_request("/aladdin/api/v1/zones/298/area-list", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(areas["data"]["data"].as_array().unwrap().len(), 2);
}
