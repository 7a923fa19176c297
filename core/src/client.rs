//! Typed client for the Pathao merchant API.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`; both
//! are pure. The async method of the same name sends the built request
//! through the [`Gateway`], which attaches the bearer token, and hands the
//! response to the parser. Non-2xx responses become [`UpstreamError`].

use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{ApiError, ConfigError, UpstreamError};
use crate::gateway::Gateway;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    Area, BulkOrderRequest, City, Envelope, Listing, OrderCreated, OrderRequest, OrderStatus, PriceQuote,
    PriceRequest, StoreCreated, StoreList, StoreRequest, Zone,
};

const API_PREFIX: &str = "/aladdin/api/v1";

pub struct PathaoClient<T> {
    gateway: Gateway<T>,
}

impl<T> Clone for PathaoClient<T> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
        }
    }
}

impl PathaoClient<ReqwestTransport> {
    /// Client over a `reqwest` transport honouring the configured timeout.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(config, transport)?)
    }

    /// Client configured from the `PATHAO_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_config(Config::from_env()?)
    }
}

impl<T: Transport> PathaoClient<T> {
    pub fn new(config: Config, transport: T) -> Result<Self, ConfigError> {
        Ok(Self::with_gateway(Gateway::new(config, transport)?))
    }

    pub fn with_gateway(gateway: Gateway<T>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    pub async fn ensure_authenticated(&self) -> Result<(), ApiError> {
        self.gateway.ensure_authenticated().await
    }

    pub fn reset_session(&self) {
        self.gateway.reset_session();
    }

    fn url(&self, path: &str) -> String {
        self.gateway.config().endpoint(&format!("{API_PREFIX}{path}"))
    }

    // --- orders ---

    pub fn build_create_order(&self, order: &OrderRequest) -> Result<HttpRequest, ApiError> {
        HttpRequest::post_json(self.url("/orders"), order)
    }

    pub fn parse_create_order(&self, response: HttpResponse) -> Result<Envelope<OrderCreated>, ApiError> {
        parse_response(response)
    }

    pub async fn create_order(&self, order: &OrderRequest) -> Result<Envelope<OrderCreated>, ApiError> {
        let response = self.gateway.send(self.build_create_order(order)?).await?;
        self.parse_create_order(response)
    }

    pub fn build_create_bulk_order(&self, orders: &[OrderRequest]) -> Result<HttpRequest, ApiError> {
        let body = BulkOrderRequest {
            orders: orders.to_vec(),
        };
        HttpRequest::post_json(self.url("/orders/bulk"), &body)
    }

    /// Bulk orders are queued upstream; `data` is only an acknowledgement.
    pub fn parse_create_bulk_order(&self, response: HttpResponse) -> Result<Envelope<serde_json::Value>, ApiError> {
        parse_response(response)
    }

    pub async fn create_bulk_order(&self, orders: &[OrderRequest]) -> Result<Envelope<serde_json::Value>, ApiError> {
        let response = self.gateway.send(self.build_create_bulk_order(orders)?).await?;
        self.parse_create_bulk_order(response)
    }

    pub fn build_get_order_status(&self, consignment_id: &str) -> HttpRequest {
        HttpRequest::get(self.url(&format!("/orders/{consignment_id}/info")))
    }

    pub fn parse_get_order_status(&self, response: HttpResponse) -> Result<Envelope<OrderStatus>, ApiError> {
        parse_response(response)
    }

    pub async fn get_order_status(&self, consignment_id: &str) -> Result<Envelope<OrderStatus>, ApiError> {
        let response = self.gateway.send(self.build_get_order_status(consignment_id)).await?;
        self.parse_get_order_status(response)
    }

    // --- stores ---

    pub fn build_create_store(&self, store: &StoreRequest) -> Result<HttpRequest, ApiError> {
        HttpRequest::post_json(self.url("/stores"), store)
    }

    pub fn parse_create_store(&self, response: HttpResponse) -> Result<Envelope<StoreCreated>, ApiError> {
        parse_response(response)
    }

    pub async fn create_store(&self, store: &StoreRequest) -> Result<Envelope<StoreCreated>, ApiError> {
        let response = self.gateway.send(self.build_create_store(store)?).await?;
        self.parse_create_store(response)
    }

    pub fn build_get_stores(&self) -> HttpRequest {
        HttpRequest::get(self.url("/stores"))
    }

    pub fn parse_get_stores(&self, response: HttpResponse) -> Result<Envelope<StoreList>, ApiError> {
        parse_response(response)
    }

    pub async fn get_stores(&self) -> Result<Envelope<StoreList>, ApiError> {
        let response = self.gateway.send(self.build_get_stores()).await?;
        self.parse_get_stores(response)
    }

    // --- pricing ---

    pub fn build_calculate_price(&self, request: &PriceRequest) -> Result<HttpRequest, ApiError> {
        HttpRequest::post_json(self.url("/merchant/price-plan"), request)
    }

    pub fn parse_calculate_price(&self, response: HttpResponse) -> Result<Envelope<PriceQuote>, ApiError> {
        parse_response(response)
    }

    pub async fn calculate_price(&self, request: &PriceRequest) -> Result<Envelope<PriceQuote>, ApiError> {
        let response = self.gateway.send(self.build_calculate_price(request)?).await?;
        self.parse_calculate_price(response)
    }

    // --- locations ---

    pub fn build_get_cities(&self) -> HttpRequest {
        HttpRequest::get(self.url("/city-list"))
    }

    pub fn parse_get_cities(&self, response: HttpResponse) -> Result<Envelope<Listing<City>>, ApiError> {
        parse_response(response)
    }

    pub async fn get_cities(&self) -> Result<Envelope<Listing<City>>, ApiError> {
        let response = self.gateway.send(self.build_get_cities()).await?;
        self.parse_get_cities(response)
    }

    pub fn build_get_zones(&self, city_id: u64) -> HttpRequest {
        HttpRequest::get(self.url(&format!("/cities/{city_id}/zone-list")))
    }

    pub fn parse_get_zones(&self, response: HttpResponse) -> Result<Envelope<Listing<Zone>>, ApiError> {
        parse_response(response)
    }

    pub async fn get_zones(&self, city_id: u64) -> Result<Envelope<Listing<Zone>>, ApiError> {
        let response = self.gateway.send(self.build_get_zones(city_id)).await?;
        self.parse_get_zones(response)
    }

    pub fn build_get_areas(&self, zone_id: u64) -> HttpRequest {
        HttpRequest::get(self.url(&format!("/zones/{zone_id}/area-list")))
    }

    pub fn parse_get_areas(&self, response: HttpResponse) -> Result<Envelope<Listing<Area>>, ApiError> {
        parse_response(response)
    }

    pub async fn get_areas(&self, zone_id: u64) -> Result<Envelope<Listing<Area>>, ApiError> {
        let response = self.gateway.send(self.build_get_areas(zone_id)).await?;
        self.parse_get_areas(response)
    }
}

/// Map non-success status codes to [`UpstreamError`].
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(UpstreamError::from_response(response).into())
}

fn parse_response<D: DeserializeOwned>(response: HttpResponse) -> Result<Envelope<D>, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TransportError;
    use crate::http::HttpMethod;
    use crate::types::{DeliveryType, ItemType};

    /// Transport that must never be reached: build/parse are pure.
    struct Offline;

    impl Transport for Offline {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("offline"))
        }
    }

    fn client() -> PathaoClient<Arc<Offline>> {
        let config = Config::new("https://merchant.pathao.test/", "id", "secret", "user@example.com", "pw");
        PathaoClient::new(config, Arc::new(Offline)).unwrap()
    }

    fn order() -> OrderRequest {
        OrderRequest {
            store_id: 10,
            merchant_order_id: Some("INV-42".into()),
            recipient_name: "Karim".into(),
            recipient_phone: "01812345678".into(),
            recipient_secondary_phone: None,
            recipient_address: "Road 5, Gulshan".into(),
            recipient_city: None,
            recipient_zone: None,
            recipient_area: None,
            delivery_type: DeliveryType::OnDemand,
            item_type: ItemType::Document,
            special_instruction: None,
            item_quantity: 1,
            item_weight: 0.5,
            item_description: None,
            amount_to_collect: 0.0,
        }
    }

    #[test]
    fn build_create_order_produces_correct_request() {
        let req = client().build_create_order(&order()).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://merchant.pathao.test/aladdin/api/v1/orders");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("authorization"), None);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["delivery_type"], 12);
        assert_eq!(body["item_type"], 1);
        assert_eq!(body["merchant_order_id"], "INV-42");
    }

    #[test]
    fn build_create_bulk_order_wraps_orders() {
        let req = client().build_create_bulk_order(&[order(), order()]).unwrap();
        assert_eq!(req.url, "https://merchant.pathao.test/aladdin/api/v1/orders/bulk");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["orders"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn get_requests_have_no_body() {
        let client = client();
        let cases = [
            (client.build_get_order_status("DL121224VS8TTJ"), "/orders/DL121224VS8TTJ/info"),
            (client.build_get_stores(), "/stores"),
            (client.build_get_cities(), "/city-list"),
            (client.build_get_zones(1), "/cities/1/zone-list"),
            (client.build_get_areas(298), "/zones/298/area-list"),
        ];
        for (req, path) in cases {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(req.url, format!("https://merchant.pathao.test/aladdin/api/v1{path}"));
            assert!(req.body.is_none());
        }
    }

    #[test]
    fn build_calculate_price_targets_price_plan() {
        let request = PriceRequest {
            store_id: 10,
            item_type: ItemType::Parcel,
            item_weight: 1.0,
            delivery_type: DeliveryType::Normal,
            recipient_city: 1,
            recipient_zone: 298,
            recipient_area: 37,
        };
        let req = client().build_calculate_price(&request).unwrap();
        assert_eq!(req.url, "https://merchant.pathao.test/aladdin/api/v1/merchant/price-plan");
    }

    #[test]
    fn parse_create_order_success() {
        let response = HttpResponse::new(
            200,
            r#"{"type":"success","code":200,"message":"Order Created Successfully","data":{"consignment_id":"DL121224VS8TTJ","merchant_order_id":"INV-42","order_status":"Pending","delivery_fee":80}}"#,
        );
        let created = client().parse_create_order(response).unwrap();
        assert_eq!(created.message, "Order Created Successfully");
        assert_eq!(created.data.consignment_id, "DL121224VS8TTJ");
        assert_eq!(created.data.delivery_fee, 80.0);
    }

    #[test]
    fn parse_validation_failure_keeps_field_errors() {
        let response = HttpResponse::new(
            422,
            r#"{"type":"error","code":422,"message":"Please fix the given errors","errors":{"recipient_name":["The recipient name field is required."]}}"#,
        );
        let err = client().parse_create_order(response).unwrap_err();
        assert_eq!(err.status(), Some(422));
        match err {
            ApiError::Upstream(upstream) => {
                assert_eq!(upstream.message, "Please fix the given errors");
                let errors = upstream.errors.unwrap();
                assert_eq!(errors["recipient_name"], vec!["The recipient name field is required.".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_non_json_error_falls_back_to_status() {
        let err = client().parse_get_stores(HttpResponse::new(502, "Bad Gateway")).unwrap_err();
        match err {
            ApiError::Upstream(upstream) => {
                assert_eq!(upstream.status, 502);
                assert_eq!(upstream.code, 502);
                assert_eq!(upstream.message, "HTTP 502");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_bad_json() {
        let err = client().parse_get_cities(HttpResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_accepts_any_success_status() {
        let response = HttpResponse::new(
            202,
            r#"{"type":"success","code":202,"message":"Your bulk request is queued for processing.","data":true}"#,
        );
        let queued = client().parse_create_bulk_order(response).unwrap();
        assert_eq!(queued.code, 202);
        assert_eq!(queued.data, serde_json::Value::Bool(true));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_from_authentication() {
        let err = client().get_cities().await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }
}
