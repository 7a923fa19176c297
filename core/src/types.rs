//! Request and response DTOs for the Pathao merchant API.
//!
//! # Design
//! The mock-server crate defines its own copies of these shapes; the
//! integration tests catch drift between the two. Optional request fields are
//! skipped when absent so the upstream applies its own defaults (for example
//! auto-detecting the recipient city from the address).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every Pathao response wraps its payload in this envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// List payloads nest their items one level deeper: `data.data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DeliveryType {
    Normal,
    OnDemand,
}

impl From<DeliveryType> for u8 {
    fn from(value: DeliveryType) -> Self {
        match value {
            DeliveryType::Normal => 48,
            DeliveryType::OnDemand => 12,
        }
    }
}

impl TryFrom<u8> for DeliveryType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            48 => Ok(DeliveryType::Normal),
            12 => Ok(DeliveryType::OnDemand),
            other => Err(format!("unknown delivery type {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ItemType {
    Document,
    Parcel,
}

impl From<ItemType> for u8 {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::Document => 1,
            ItemType::Parcel => 2,
        }
    }
}

impl TryFrom<u8> for ItemType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ItemType::Document),
            2 => Ok(ItemType::Parcel),
            other => Err(format!("unknown item type {other}")),
        }
    }
}

/// Payload of `POST /issue-token`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub store_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_order_id: Option<String>,
    pub recipient_name: String,
    pub recipient_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_secondary_phone: Option<String>,
    pub recipient_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_city: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_zone: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_area: Option<u64>,
    pub delivery_type: DeliveryType,
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instruction: Option<String>,
    pub item_quantity: u32,
    /// Kilograms.
    pub item_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_description: Option<String>,
    /// Cash to collect on delivery, 0 for prepaid orders.
    pub amount_to_collect: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub consignment_id: String,
    #[serde(default)]
    pub merchant_order_id: Option<String>,
    pub order_status: String,
    pub delivery_fee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrderRequest {
    pub orders: Vec<OrderRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub consignment_id: String,
    #[serde(default)]
    pub merchant_order_id: Option<String>,
    pub order_status: String,
    pub order_status_slug: String,
    pub updated_at: String,
    #[serde(default)]
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    pub name: String,
    pub contact_name: String,
    pub contact_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_number: Option<String>,
    pub address: String,
    pub city_id: u64,
    pub zone_id: u64,
    pub area_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCreated {
    pub store_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: u64,
    pub store_name: String,
    pub store_address: String,
    /// 1 when active, 0 when deactivated.
    pub is_active: u8,
    pub city_id: u64,
    pub zone_id: u64,
    pub hub_id: u64,
    pub is_default_store: bool,
    pub is_default_return_store: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreList {
    pub data: Vec<Store>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub current_page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub last_page: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub store_id: u64,
    pub item_type: ItemType,
    pub item_weight: f64,
    pub delivery_type: DeliveryType,
    pub recipient_city: u64,
    pub recipient_zone: u64,
    pub recipient_area: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub discount: f64,
    pub promo_discount: f64,
    pub plan_id: u64,
    pub cod_enabled: u8,
    pub cod_percentage: f64,
    pub additional_charge: f64,
    pub final_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub city_id: u64,
    pub city_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: u64,
    pub zone_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub area_id: u64,
    pub area_name: String,
    pub home_delivery_available: bool,
    pub pickup_available: bool,
}
