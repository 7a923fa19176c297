//! In-process stand-in for the Pathao merchant API.
//!
//! Implements token issuance (password and refresh grants), bearer checks and
//! the order, store, pricing and location endpoints with canned data. The
//! [`MockState`] handle lets tests revoke tokens, reject credentials and read
//! grant counters while the server is running.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const CLIENT_ID: &str = "mock-client";
pub const CLIENT_SECRET: &str = "mock-secret";
pub const USERNAME: &str = "merchant@example.com";
pub const PASSWORD: &str = "correct-horse";

/// Lifetime of issued access tokens unless overridden (five days).
pub const DEFAULT_EXPIRES_IN: u64 = 432_000;

const PREFIX: &str = "/aladdin/api/v1";

#[derive(Debug, Deserialize)]
pub struct IssueToken {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub store_id: u64,
    pub merchant_order_id: Option<String>,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_phone: String,
    #[serde(default)]
    pub recipient_address: String,
    pub delivery_type: u8,
    pub item_type: u8,
    pub item_quantity: u32,
    pub item_weight: f64,
    pub amount_to_collect: f64,
}

#[derive(Debug, Deserialize)]
pub struct BulkOrders {
    pub orders: Vec<NewOrder>,
}

#[derive(Debug, Deserialize)]
pub struct NewStore {
    pub name: String,
    pub contact_name: String,
    pub contact_number: String,
    pub address: String,
    pub city_id: u64,
    pub zone_id: u64,
    pub area_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub store_id: u64,
    pub item_type: u8,
    pub item_weight: f64,
    pub delivery_type: u8,
    pub recipient_city: u64,
    pub recipient_zone: u64,
    pub recipient_area: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredOrder {
    pub consignment_id: String,
    pub merchant_order_id: Option<String>,
    pub order_status: String,
    pub order_status_slug: String,
    pub updated_at: String,
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreRecord {
    pub store_id: u64,
    pub store_name: String,
    pub store_address: String,
    pub is_active: u8,
    pub city_id: u64,
    pub zone_id: u64,
    pub hub_id: u64,
    pub is_default_store: bool,
    pub is_default_return_store: bool,
}

struct Db {
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    orders: HashMap<String, StoredOrder>,
    stores: Vec<StoreRecord>,
    password_grants: u32,
    refresh_grants: u32,
    reject_auth: bool,
    expires_in: u64,
}

impl Db {
    fn new() -> Self {
        Self {
            access_tokens: HashSet::new(),
            refresh_tokens: HashSet::new(),
            orders: HashMap::new(),
            stores: vec![StoreRecord {
                store_id: 1,
                store_name: "Main Store".into(),
                store_address: "House 12, Road 4, Dhanmondi".into(),
                is_active: 1,
                city_id: 1,
                zone_id: 298,
                hub_id: 42,
                is_default_store: true,
                is_default_return_store: true,
            }],
            password_grants: 0,
            refresh_grants: 0,
            reject_auth: false,
            expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    fn issue(&mut self) -> Value {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens.insert(access_token.clone());
        self.refresh_tokens.insert(refresh_token.clone());
        json!({
            "token_type": "Bearer",
            "expires_in": self.expires_in,
            "access_token": access_token,
            "refresh_token": refresh_token,
        })
    }
}

/// Shared server state, also used by tests to steer the server.
#[derive(Clone)]
pub struct MockState {
    db: Arc<RwLock<Db>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    pub fn new() -> Self {
        Self {
            db: Arc::new(RwLock::new(Db::new())),
        }
    }

    pub async fn password_grants(&self) -> u32 {
        self.db.read().await.password_grants
    }

    pub async fn refresh_grants(&self) -> u32 {
        self.db.read().await.refresh_grants
    }

    /// Invalidate every access token; refresh tokens stay usable.
    pub async fn revoke_access_tokens(&self) {
        self.db.write().await.access_tokens.clear();
    }

    pub async fn revoke_all_tokens(&self) {
        let mut db = self.db.write().await;
        db.access_tokens.clear();
        db.refresh_tokens.clear();
    }

    /// Reject every token request with 401, whatever the credentials.
    pub async fn set_reject_auth(&self, reject: bool) {
        self.db.write().await.reject_auth = reject;
    }

    /// Lifetime, in seconds, announced for tokens issued from now on.
    pub async fn set_expires_in(&self, secs: u64) {
        self.db.write().await.expires_in = secs;
    }
}

type Reply = (StatusCode, Json<Value>);

fn success(status: StatusCode, message: &str, data: impl Serialize) -> Reply {
    let body = json!({
        "type": "success",
        "code": status.as_u16(),
        "message": message,
        "data": data,
    });
    (status, Json(body))
}

fn failure(status: StatusCode, message: &str) -> Reply {
    let body = json!({
        "type": "error",
        "code": status.as_u16(),
        "message": message,
    });
    (status, Json(body))
}

fn invalid(field: &str, problem: &str) -> Reply {
    let body = json!({
        "type": "error",
        "code": 422,
        "message": "Please fix the given errors",
        "errors": { field: [problem] },
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Reply> {
    let db = state.db.read().await;
    match bearer(headers) {
        Some(token) if db.access_tokens.contains(token) => Ok(()),
        _ => Err(failure(StatusCode::UNAUTHORIZED, "Unauthenticated.")),
    }
}

pub fn app() -> Router {
    router(MockState::new())
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route(&format!("{PREFIX}/issue-token"), post(issue_token))
        .route(&format!("{PREFIX}/orders"), post(create_order))
        .route(&format!("{PREFIX}/orders/bulk"), post(create_bulk_order))
        .route(&format!("{PREFIX}/orders/{{consignment_id}}/info"), get(order_info))
        .route(&format!("{PREFIX}/stores"), get(list_stores).post(create_store))
        .route(&format!("{PREFIX}/merchant/price-plan"), post(price_plan))
        .route(&format!("{PREFIX}/city-list"), get(city_list))
        .route(&format!("{PREFIX}/cities/{{city_id}}/zone-list"), get(zone_list))
        .route(&format!("{PREFIX}/zones/{{zone_id}}/area-list"), get(area_list))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, MockState::new()).await
}

pub async fn serve(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn issue_token(State(state): State<MockState>, Json(input): Json<IssueToken>) -> Reply {
    let mut db = state.db.write().await;
    if db.reject_auth || input.client_id != CLIENT_ID || input.client_secret != CLIENT_SECRET {
        tracing::debug!(grant = %input.grant_type, "token request rejected");
        return failure(StatusCode::UNAUTHORIZED, "Invalid client credentials");
    }

    match input.grant_type.as_str() {
        "password" => {
            db.password_grants += 1;
            if input.username.as_deref() != Some(USERNAME) || input.password.as_deref() != Some(PASSWORD) {
                return failure(StatusCode::UNAUTHORIZED, "Invalid credentials");
            }
            (StatusCode::OK, Json(db.issue()))
        }
        "refresh_token" => {
            db.refresh_grants += 1;
            let known = input
                .refresh_token
                .as_deref()
                .is_some_and(|token| db.refresh_tokens.remove(token));
            if !known {
                return failure(StatusCode::BAD_REQUEST, "The refresh token is invalid.");
            }
            (StatusCode::OK, Json(db.issue()))
        }
        other => {
            tracing::debug!(grant = other, "unsupported grant type");
            failure(StatusCode::BAD_REQUEST, "Unsupported grant type")
        }
    }
}

fn check_order(order: &NewOrder) -> Result<(), Reply> {
    if order.recipient_name.trim().is_empty() {
        return Err(invalid("recipient_name", "The recipient name field is required."));
    }
    if order.recipient_phone.len() != 11 {
        return Err(invalid("recipient_phone", "The recipient phone format is invalid."));
    }
    if order.recipient_address.trim().is_empty() {
        return Err(invalid("recipient_address", "The recipient address field is required."));
    }
    Ok(())
}

fn delivery_fee(delivery_type: u8, item_weight: f64) -> f64 {
    let base = if delivery_type == 12 { 100.0 } else { 60.0 };
    let extra_kg = (item_weight - 1.0).max(0.0).ceil();
    base + extra_kg * 15.0
}

fn place(db: &mut Db, order: &NewOrder) -> StoredOrder {
    let consignment_id = format!("DL{}", &Uuid::new_v4().simple().to_string()[..12]).to_uppercase();
    let stored = StoredOrder {
        consignment_id: consignment_id.clone(),
        merchant_order_id: order.merchant_order_id.clone(),
        order_status: "Pending".into(),
        order_status_slug: "Pending".into(),
        updated_at: "2024-01-01 10:00:00".into(),
        invoice_id: None,
    };
    db.orders.insert(consignment_id, stored.clone());
    stored
}

async fn create_order(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(order): Json<NewOrder>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    if let Err(reply) = check_order(&order) {
        return reply;
    }
    let stored = place(&mut *state.db.write().await, &order);
    let data = json!({
        "consignment_id": stored.consignment_id,
        "merchant_order_id": stored.merchant_order_id,
        "order_status": stored.order_status,
        "delivery_fee": delivery_fee(order.delivery_type, order.item_weight),
    });
    success(StatusCode::OK, "Order Created Successfully", data)
}

async fn create_bulk_order(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(bulk): Json<BulkOrders>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    if bulk.orders.is_empty() {
        return invalid("orders", "The orders field is required.");
    }
    for order in &bulk.orders {
        if let Err(reply) = check_order(order) {
            return reply;
        }
    }
    let mut db = state.db.write().await;
    for order in &bulk.orders {
        place(&mut db, order);
    }
    success(StatusCode::ACCEPTED, "Your bulk request is queued for processing.", true)
}

async fn order_info(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(consignment_id): Path<String>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    let db = state.db.read().await;
    match db.orders.get(&consignment_id) {
        Some(order) => success(StatusCode::OK, "Order info", order),
        None => failure(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn list_stores(State(state): State<MockState>, headers: HeaderMap) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    let db = state.db.read().await;
    let data = json!({
        "data": db.stores,
        "total": db.stores.len(),
        "current_page": 1,
        "per_page": 1000,
        "last_page": 1,
    });
    success(StatusCode::OK, "Store list fetched.", data)
}

async fn create_store(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(store): Json<NewStore>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    if store.name.trim().is_empty() {
        return invalid("name", "The name field is required.");
    }
    tracing::debug!(name = %store.name, area = store.area_id, "store created");
    let mut db = state.db.write().await;
    let store_id = db.stores.len() as u64 + 1;
    db.stores.push(StoreRecord {
        store_id,
        store_name: store.name.clone(),
        store_address: store.address,
        is_active: 0,
        city_id: store.city_id,
        zone_id: store.zone_id,
        hub_id: 42,
        is_default_store: false,
        is_default_return_store: false,
    });
    success(
        StatusCode::OK,
        "Store created successfully, Please wait one hour for approval.",
        json!({ "store_name": store.name }),
    )
}

async fn price_plan(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(query): Json<PriceQuery>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    tracing::debug!(
        store = query.store_id,
        item_type = query.item_type,
        city = query.recipient_city,
        zone = query.recipient_zone,
        area = query.recipient_area,
        "price quote"
    );
    let price = delivery_fee(query.delivery_type, query.item_weight);
    let data = json!({
        "price": price,
        "discount": 0,
        "promo_discount": 0,
        "plan_id": 69,
        "cod_enabled": 1,
        "cod_percentage": 0.01,
        "additional_charge": 0,
        "final_price": price,
    });
    success(StatusCode::OK, "price", data)
}

async fn city_list(State(state): State<MockState>, headers: HeaderMap) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    let cities = json!([
        { "city_id": 1, "city_name": "Dhaka" },
        { "city_id": 2, "city_name": "Chittagong" },
    ]);
    success(StatusCode::OK, "City successfully fetched.", json!({ "data": cities }))
}

async fn zone_list(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(city_id): Path<u64>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    let zones = match city_id {
        1 => json!([
            { "zone_id": 298, "zone_name": "Dhanmondi" },
            { "zone_id": 299, "zone_name": "Gulshan" },
        ]),
        2 => json!([{ "zone_id": 400, "zone_name": "Agrabad" }]),
        _ => json!([]),
    };
    success(StatusCode::OK, "Zone list fetched.", json!({ "data": zones }))
}

async fn area_list(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(zone_id): Path<u64>,
) -> Reply {
    if let Err(reply) = authorize(&state, &headers).await {
        return reply;
    }
    let areas = match zone_id {
        298 => json!([
            { "area_id": 37, "area_name": "Road 27", "home_delivery_available": true, "pickup_available": true },
            { "area_id": 38, "area_name": "Jigatola", "home_delivery_available": true, "pickup_available": false },
        ]),
        _ => json!([]),
    };
    success(StatusCode::OK, "Area list fetched.", json!({ "data": areas }))
}
