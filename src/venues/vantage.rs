//! Vantage venue adapter — Venue B, fee-free under the §4.D model.
//!
//! Wire shapes and the bearer-token auth header are grounded on
//! `scrapers/dome.rs`: a simpler JSON REST surface than Opinion's CLOB,
//! with numeric (not string) prices and no per-market tick override.

use super::client::{
    Balances, CancelResult, MarketPage, MarketStatusFilter, MarketSummary, OrderResult,
    OrderStatus, VenueClient,
};
use super::retry::{retry_with_backoff, DegradedTracker};
use super::token_bucket::TokenBucket;
use crate::credentials::VenueCredentials;
use crate::domain::{BookLevel, BookSnapshot, OrderState, OrderTicket, Price, Venue};
use crate::error::AdapterError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const NAME: &str = "vantage";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Deserialize)]
struct WireLevel {
    price: f64,
    size: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct WireBook {
    instrument_id: String,
    bids: Vec<WireLevel>,
    asks: Vec<WireLevel>,
    ts_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct WireMarket {
    id: String,
    name: String,
    resolves_at: chrono::DateTime<chrono::Utc>,
    yes_instrument: String,
    no_instrument: String,
    min_size: f64,
    is_closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct WireMarketPage {
    items: Vec<WireMarket>,
    cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct WireOrderRequest<'a> {
    instrument_id: &'a str,
    side: &'a str,
    price: f64,
    quantity: f64,
    order_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct WireOrderAck {
    id: String,
    state: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireOrderStatus {
    state: String,
    filled: f64,
    avg_price: Option<f64>,
}

pub struct VantageClient {
    base_url: String,
    http: Client,
    bucket: TokenBucket,
    degraded: DegradedTracker,
    credentials: VenueCredentials,
}

impl VantageClient {
    pub fn new(base_url: impl Into<String>, rps: f64, credentials: VenueCredentials) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("xvenue-arb/0.1")
                .build()
                .expect("failed to build HTTP client"),
            bucket: TokenBucket::new(rps),
            degraded: DegradedTracker::new(5),
            credentials,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_degraded()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, AdapterError> {
        self.bucket.acquire().await;
        retry_with_backoff(NAME, &self.degraded, || async {
            let url = format!("{}{}", self.base_url, path);
            let mut req = self.http.get(&url).query(params);
            req = self.credentials.sign(req, NAME);

            let response = req.send().await.map_err(|e| AdapterError::Transient {
                venue: NAME,
                message: e.to_string(),
            })?;

            match response.status() {
                StatusCode::OK => response.json::<T>().await.map_err(|e| AdapterError::SchemaDrift {
                    venue: NAME,
                    message: e.to_string(),
                }),
                StatusCode::TOO_MANY_REQUESTS => Err(AdapterError::RateLimited { venue: NAME }),
                StatusCode::NOT_FOUND => Err(AdapterError::NotFound {
                    venue: NAME,
                    what: path.to_string(),
                }),
                status if status.is_server_error() => Err(AdapterError::Transient {
                    venue: NAME,
                    message: format!("server error {status}"),
                }),
                status => Err(AdapterError::Unknown {
                    venue: NAME,
                    message: format!("unexpected status {status}"),
                }),
            }
        })
        .await
    }

    fn convert_book(&self, wire: WireBook) -> Result<BookSnapshot, AdapterError> {
        let convert = |levels: Vec<WireLevel>| -> Result<Vec<BookLevel>, AdapterError> {
            levels
                .into_iter()
                .map(|l| {
                    let price = Price::new(l.price, DEFAULT_TICK_SIZE).map_err(AdapterError::Validation)?;
                    Ok(BookLevel { price, size: l.size })
                })
                .collect()
        };

        let mut bids = convert(wire.bids)?;
        let mut asks = convert(wire.asks)?;
        bids.sort_by(|a, b| b.price.value().partial_cmp(&a.price.value()).unwrap());
        asks.sort_by(|a, b| a.price.value().partial_cmp(&b.price.value()).unwrap());

        Ok(BookSnapshot {
            token_id: wire.instrument_id,
            venue: Venue::Vantage,
            bids,
            asks,
            timestamp_ms: wire.ts_ms,
        })
    }
}

#[async_trait]
impl VenueClient for VantageClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn list_markets(
        &self,
        status: MarketStatusFilter,
        cursor: Option<String>,
    ) -> Result<MarketPage, AdapterError> {
        let mut params = vec![];
        if let MarketStatusFilter::Active = status {
            params.push(("open", "true".to_string()));
        }
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let page: WireMarketPage = self.get_json("/v1/markets", &params).await?;
        info!(count = page.items.len(), "fetched Vantage markets");

        Ok(MarketPage {
            markets: page
                .items
                .into_iter()
                .map(|m| MarketSummary {
                    market_id: m.id,
                    title: m.name,
                    resolution_date: m.resolves_at,
                    yes_token_id: m.yes_instrument,
                    no_token_id: m.no_instrument,
                    tick_size: DEFAULT_TICK_SIZE,
                    min_order_size: m.min_size,
                    closed: m.is_closed,
                })
                .collect(),
            next_cursor: page.cursor,
        })
    }

    async fn get_book(&self, token_id: &str) -> Result<BookSnapshot, AdapterError> {
        let wire: WireBook = self
            .get_json("/v1/book", &[("instrument_id", token_id.to_string())])
            .await?;
        self.convert_book(wire)
    }

    async fn get_books_batch(
        &self,
        token_ids: &[String],
    ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
        let joined = token_ids.join(",");
        let wires: Vec<WireBook> = self
            .get_json("/v1/books", &[("instrument_ids", joined)])
            .await?;
        let mut out = HashMap::with_capacity(wires.len());
        for wire in wires {
            let id = wire.instrument_id.clone();
            out.insert(id, self.convert_book(wire)?);
        }
        debug!(count = out.len(), "fetched Vantage books batch");
        Ok(out)
    }

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderResult, AdapterError> {
        self.bucket.acquire().await;
        let side = match ticket.side {
            crate::domain::Side::Buy => "buy",
            crate::domain::Side::Sell => "sell",
        };
        let order_type = match ticket.tif {
            crate::domain::TimeInForce::Ioc => "ioc",
            crate::domain::TimeInForce::Gtc => "limit",
        };
        let body = WireOrderRequest {
            instrument_id: &ticket.token_id,
            side,
            price: ticket.limit_price.value(),
            quantity: ticket.order_qty,
            order_type,
        };

        retry_with_backoff(NAME, &self.degraded, || async {
            let url = format!("{}/v1/orders", self.base_url);
            let mut req = self.http.post(&url).json(&body);
            req = self.credentials.sign(req, NAME);
            let response = req.send().await.map_err(|e| AdapterError::Transient {
                venue: NAME,
                message: e.to_string(),
            })?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let ack: WireOrderAck = response.json().await.map_err(|e| AdapterError::SchemaDrift {
                        venue: NAME,
                        message: e.to_string(),
                    })?;
                    Ok(OrderResult {
                        order_id: ack.id,
                        state: parse_state(&ack.state)?,
                    })
                }
                StatusCode::PAYMENT_REQUIRED => Err(AdapterError::InsufficientBalance {
                    venue: NAME,
                    needed: ticket.order_qty * ticket.limit_price.value(),
                    available: 0.0,
                }),
                StatusCode::TOO_MANY_REQUESTS => Err(AdapterError::RateLimited { venue: NAME }),
                status => Err(AdapterError::Transient {
                    venue: NAME,
                    message: format!("order placement returned {status}"),
                }),
            }
        })
        .await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<CancelResult, AdapterError> {
        self.bucket.acquire().await;
        retry_with_backoff(NAME, &self.degraded, || async {
            let url = format!("{}/v1/orders/{}", self.base_url, order_id);
            let mut req = self.http.delete(&url);
            req = self.credentials.sign(req, NAME);
            let response = req.send().await.map_err(|e| AdapterError::Transient {
                venue: NAME,
                message: e.to_string(),
            })?;
            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(CancelResult::Ack),
                StatusCode::CONFLICT | StatusCode::NOT_FOUND => Ok(CancelResult::AlreadyTerminal),
                status => Err(AdapterError::Transient {
                    venue: NAME,
                    message: format!("cancel returned {status}"),
                }),
            }
        })
        .await
    }

    async fn poll_order(&self, order_id: &str) -> Result<OrderStatus, AdapterError> {
        let wire: WireOrderStatus = self
            .get_json(&format!("/v1/orders/{order_id}"), &[])
            .await?;
        Ok(OrderStatus {
            state: parse_state(&wire.state)?,
            filled_qty: wire.filled,
            avg_fill_price: wire.avg_price,
        })
    }

    async fn get_balances(&self) -> Result<Balances, AdapterError> {
        let wire: HashMap<String, (f64, f64)> = self.get_json("/v1/balances", &[]).await?;
        Ok(Balances { balances: wire })
    }
}

fn parse_state(raw: &str) -> Result<OrderState, AdapterError> {
    match raw {
        "pending" => Ok(OrderState::PendingSubmit),
        "open" => Ok(OrderState::Open),
        "partially_filled" => Ok(OrderState::PartiallyFilled),
        "filled" => Ok(OrderState::Filled),
        "canceled" | "cancelled" => Ok(OrderState::Canceled),
        "rejected" => Ok(OrderState::Rejected),
        other => Err(AdapterError::SchemaDrift {
            venue: NAME,
            message: format!("unknown order state {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_states() {
        assert_eq!(parse_state("open").unwrap(), OrderState::Open);
        assert_eq!(parse_state("filled").unwrap(), OrderState::Filled);
    }

    #[test]
    fn unknown_state_is_schema_drift() {
        assert!(matches!(
            parse_state("huh").unwrap_err(),
            AdapterError::SchemaDrift { .. }
        ));
    }
}
