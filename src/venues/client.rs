//! Venue Client Adapter surface (§4.A).
//!
//! A uniform operation set, independent of which venue is behind it.
//! Modeled on `vault/execution.rs::ExecutionAdapter` (the teacher's
//! async-trait order-placement seam), extended to cover market listing,
//! book retrieval, cancellation, polling, and balances.

use crate::domain::{OrderState, OrderTicket, Price};
use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub title: String,
    pub resolution_date: chrono::DateTime<chrono::Utc>,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub tick_size: f64,
    pub min_order_size: f64,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct MarketPage {
    pub markets: Vec<MarketSummary>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum MarketStatusFilter {
    Active,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub state: OrderState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CancelResult {
    Ack,
    AlreadyTerminal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatus {
    pub state: OrderState,
    pub filled_qty: f64,
    pub avg_fill_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balances {
    /// token/collateral id -> (available, reserved)
    pub balances: std::collections::HashMap<String, (f64, f64)>,
}

/// Uniform adapter surface consumed by the Matcher, Book Fetcher, and
/// both strategies. Each concrete venue (`OpinionClient`, `VantageClient`)
/// normalizes its own wire format behind this trait so the rest of the
/// engine never branches on venue identity except to pick an adapter
/// instance.
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_markets(
        &self,
        status: MarketStatusFilter,
        cursor: Option<String>,
    ) -> Result<MarketPage, AdapterError>;

    async fn get_book(&self, token_id: &str) -> Result<crate::domain::BookSnapshot, AdapterError>;

    async fn get_books_batch(
        &self,
        token_ids: &[String],
    ) -> Result<std::collections::HashMap<String, crate::domain::BookSnapshot>, AdapterError>;

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderResult, AdapterError>;

    async fn cancel_order(&self, order_id: &str) -> Result<CancelResult, AdapterError>;

    async fn poll_order(&self, order_id: &str) -> Result<OrderStatus, AdapterError>;

    async fn get_balances(&self) -> Result<Balances, AdapterError>;

    /// Normalize a venue-native price string into the engine's internal
    /// representation. §8 round-trip law: `to_price(from_price(x)) == x`.
    fn from_price_str(&self, raw: &str, tick_size: f64) -> Result<Price, AdapterError> {
        let value: f64 = raw
            .parse()
            .map_err(|_| AdapterError::SchemaDrift {
                venue: self.name(),
                message: format!("unparseable price {raw:?}"),
            })?;
        Price::new(value, tick_size).map_err(AdapterError::Validation)
    }

    fn to_price_str(&self, price: Price) -> String {
        format!("{:.3}", price.value())
    }
}
