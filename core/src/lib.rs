//! Async client core for the Pathao courier merchant API.
//!
//! # Overview
//! [`PathaoClient`] builds typed requests for orders, stores, pricing and
//! locations and sends them through a [`Gateway`]. The gateway owns the
//! account's session: it obtains OAuth2 tokens (password grant, refresh when
//! possible), attaches the bearer header, retries once on a 401, and trips a
//! circuit breaker after repeated upstream failures.
//!
//! # Design
//! - The HTTP round-trip sits behind the [`Transport`] trait.
//!   [`ReqwestTransport`] is the production implementation; tests script the
//!   upstream in memory.
//! - `build_*` and `parse_*` methods on the client are pure, so request
//!   shapes and error mapping are testable without a network.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.
//! - Sessions live in memory only and are never shared between gateways.

mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
mod session;
pub mod transport;
pub mod types;

pub use breaker::{BreakerSnapshot, BreakerState};
pub use client::PathaoClient;
pub use config::{Config, GatewaySettings};
pub use error::{ApiError, AuthError, ConfigError, TransportError, UpstreamError};
pub use gateway::Gateway;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    Area, City, DeliveryType, Envelope, ItemType, Listing, OrderCreated, OrderRequest, OrderStatus, PriceQuote,
    PriceRequest, Store, StoreCreated, StoreList, StoreRequest, TokenResponse, Zone,
};
