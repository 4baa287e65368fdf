//! Opinion venue adapter — Venue A, which charges the §4.D fee curve.
//!
//! Wire shapes are grounded on `scrapers/polymarket_api.rs`'s CLOB API
//! types (`CLOBMarket`, `Token`, `OrderBook`, `PriceInfo`): a REST+JSON
//! CLOB with string-encoded prices/sizes that must be normalized onto
//! the tick grid.

use super::client::{
    Balances, CancelResult, MarketPage, MarketStatusFilter, MarketSummary, OrderResult,
    OrderStatus, VenueClient,
};
use super::retry::{retry_with_backoff, DegradedTracker};
use super::token_bucket::TokenBucket;
use crate::credentials::VenueCredentials;
use crate::domain::{BookLevel, BookSnapshot, OrderState, OrderTicket, Venue};
use crate::error::AdapterError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const NAME: &str = "opinion";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct WireOrderBook {
    market: String,
    asset_id: String,
    bids: Vec<WireLevel>,
    asks: Vec<WireLevel>,
    timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct WireLevel {
    price: String,
    size: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireMarket {
    condition_id: String,
    question: String,
    end_date_iso: chrono::DateTime<chrono::Utc>,
    yes_token_id: String,
    no_token_id: String,
    tick_size: f64,
    min_order_size: f64,
    closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct WireMarketPage {
    data: Vec<WireMarket>,
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct WireOrderRequest<'a> {
    token_id: &'a str,
    side: &'a str,
    price: String,
    size: f64,
    tif: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct WireOrderAck {
    order_id: String,
    status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireOrderStatus {
    status: String,
    filled_size: f64,
    avg_price: Option<f64>,
}

pub struct OpinionClient {
    base_url: String,
    http: Client,
    bucket: TokenBucket,
    degraded: DegradedTracker,
    credentials: VenueCredentials,
}

impl OpinionClient {
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

    fn convert_book(&self, wire: WireOrderBook, tick_size: f64) -> Result<BookSnapshot, AdapterError> {
        let convert = |levels: Vec<WireLevel>| -> Result<Vec<BookLevel>, AdapterError> {
            levels
                .into_iter()
                .map(|l| {
                    let price = self.from_price_str(&l.price, tick_size)?;
                    let size: f64 = l.size.parse().map_err(|_| AdapterError::SchemaDrift {
                        venue: NAME,
                        message: format!("unparseable size {:?}", l.size),
                    })?;
                    Ok(BookLevel { price, size })
                })
                .collect()
        };

        Ok(BookSnapshot {
            token_id: wire.asset_id,
            venue: Venue::Opinion,
            bids: convert(wire.bids)?,
            asks: convert(wire.asks)?,
            timestamp_ms: wire.timestamp,
        })
        .map(|mut snapshot| {
            let _ = &wire.market; // market id retained on the wire type only
            snapshot.bids.sort_by(|a, b| b.price.value().partial_cmp(&a.price.value()).unwrap());
            snapshot.asks.sort_by(|a, b| a.price.value().partial_cmp(&b.price.value()).unwrap());
            snapshot
        })
    }
}

#[async_trait]
impl VenueClient for OpinionClient {
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
            params.push(("active", "true".to_string()));
        }
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let page: WireMarketPage = self.get_json("/markets", &params).await?;
        info!(count = page.data.len(), "fetched Opinion markets");

        Ok(MarketPage {
            markets: page
                .data
                .into_iter()
                .map(|m| MarketSummary {
                    market_id: m.condition_id,
                    title: m.question,
                    resolution_date: m.end_date_iso,
                    yes_token_id: m.yes_token_id,
                    no_token_id: m.no_token_id,
                    tick_size: m.tick_size,
                    min_order_size: m.min_order_size,
                    closed: m.closed,
                })
                .collect(),
            next_cursor: page.next_cursor,
        })
    }

    async fn get_book(&self, token_id: &str) -> Result<BookSnapshot, AdapterError> {
        let wire: WireOrderBook = self
            .get_json("/book", &[("token_id", token_id.to_string())])
            .await?;
        // Tick size is not carried on the book endpoint; Opinion's
        // standard grid is 0.01 except where the market overrides it,
        // which `list_markets` already captured onto the Token.
        self.convert_book(wire, 0.01)
    }

    async fn get_books_batch(
        &self,
        token_ids: &[String],
    ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
        let joined = token_ids.join(",");
        let wires: Vec<WireOrderBook> = self
            .get_json("/books", &[("token_ids", joined)])
            .await?;
        let mut out = HashMap::with_capacity(wires.len());
        for wire in wires {
            let asset_id = wire.asset_id.clone();
            let snapshot = self.convert_book(wire, 0.01)?;
            out.insert(asset_id, snapshot);
        }
        debug!(count = out.len(), "fetched Opinion books batch");
        Ok(out)
    }

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderResult, AdapterError> {
        self.bucket.acquire().await;
        let side = match ticket.side {
            crate::domain::Side::Buy => "BUY",
            crate::domain::Side::Sell => "SELL",
        };
        let tif = match ticket.tif {
            crate::domain::TimeInForce::Ioc => "IOC",
            crate::domain::TimeInForce::Gtc => "GTC",
        };
        let body = WireOrderRequest {
            token_id: &ticket.token_id,
            side,
            price: self.to_price_str(ticket.limit_price),
            size: ticket.order_qty,
            tif,
        };

        retry_with_backoff(NAME, &self.degraded, || async {
            let url = format!("{}/order", self.base_url);
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
                        order_id: ack.order_id,
                        state: parse_state(&ack.status)?,
                    })
                }
                StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
                    Err(AdapterError::InsufficientBalance {
                        venue: NAME,
                        needed: ticket.order_qty * ticket.limit_price.value(),
                        available: 0.0,
                    })
                }
                StatusCode::UNPROCESSABLE_ENTITY => Err(AdapterError::Validation(
                    crate::error::ValidationError::SizeBelowMinimum {
                        size: ticket.order_qty,
                        min: 0.0,
                    },
                )),
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
            let url = format!("{}/order/{}/cancel", self.base_url, order_id);
            let mut req = self.http.post(&url);
            req = self.credentials.sign(req, NAME);
            let response = req.send().await.map_err(|e| AdapterError::Transient {
                venue: NAME,
                message: e.to_string(),
            })?;
            match response.status() {
                StatusCode::OK => Ok(CancelResult::Ack),
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
            .get_json(&format!("/order/{order_id}"), &[])
            .await?;
        Ok(OrderStatus {
            state: parse_state(&wire.status)?,
            filled_qty: wire.filled_size,
            avg_fill_price: wire.avg_price,
        })
    }

    async fn get_balances(&self) -> Result<Balances, AdapterError> {
        let wire: HashMap<String, (f64, f64)> = self.get_json("/balances", &[]).await?;
        Ok(Balances { balances: wire })
    }
}

fn parse_state(raw: &str) -> Result<OrderState, AdapterError> {
    match raw {
        "PENDING" => Ok(OrderState::PendingSubmit),
        "OPEN" => Ok(OrderState::Open),
        "PARTIALLY_FILLED" => Ok(OrderState::PartiallyFilled),
        "FILLED" => Ok(OrderState::Filled),
        "CANCELED" | "CANCELLED" => Ok(OrderState::Canceled),
        "REJECTED" => Ok(OrderState::Rejected),
        other => Err(AdapterError::SchemaDrift {
            venue: NAME,
            message: format!("unknown order status {other:?}"),
        }),
    }
}
