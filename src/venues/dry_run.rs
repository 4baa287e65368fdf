//! Dry-run decorator (§6 operator interface): scan and log, never order.
//!
//! Wraps a real `VenueClient` and passes every read-only call straight
//! through (markets, books, balances) so the scanner and matcher behave
//! identically to a live run. `place_order`/`cancel_order` never reach
//! the network: they log what would have been sent and report back a
//! synthetic rejection, so both strategies see a "no fill" and abort
//! cleanly rather than assume a position was taken.

use crate::domain::{BookSnapshot, OrderState, OrderTicket, Price};
use crate::error::AdapterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::client::{Balances, CancelResult, MarketPage, MarketStatusFilter, OrderResult, OrderStatus};
use super::VenueClient;

pub struct DryRunClient {
    inner: Arc<dyn VenueClient>,
}

impl DryRunClient {
    pub fn wrap(inner: Arc<dyn VenueClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl VenueClient for DryRunClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn list_markets(
        &self,
        status: MarketStatusFilter,
        cursor: Option<String>,
    ) -> Result<MarketPage, AdapterError> {
        self.inner.list_markets(status, cursor).await
    }

    async fn get_book(&self, token_id: &str) -> Result<BookSnapshot, AdapterError> {
        self.inner.get_book(token_id).await
    }

    async fn get_books_batch(
        &self,
        token_ids: &[String],
    ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
        self.inner.get_books_batch(token_ids).await
    }

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderResult, AdapterError> {
        info!(
            venue = self.inner.name(),
            token_id = %ticket.token_id,
            side = ?ticket.side,
            qty = ticket.order_qty,
            price = ticket.limit_price.value(),
            "dry run: would place order"
        );
        Ok(OrderResult {
            order_id: format!("dryrun-{}", Uuid::new_v4()),
            state: OrderState::Rejected,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<CancelResult, AdapterError> {
        info!(order_id, "dry run: would cancel order");
        Ok(CancelResult::AlreadyTerminal)
    }

    async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, AdapterError> {
        Ok(OrderStatus {
            state: OrderState::Rejected,
            filled_qty: 0.0,
            avg_fill_price: None,
        })
    }

    async fn get_balances(&self) -> Result<Balances, AdapterError> {
        self.inner.get_balances().await
    }

    fn from_price_str(&self, raw: &str, tick_size: f64) -> Result<Price, AdapterError> {
        self.inner.from_price_str(raw, tick_size)
    }

    fn to_price_str(&self, price: Price) -> String {
        self.inner.to_price_str(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, TimeInForce, Venue};
    use crate::venues::client::MarketSummary;

    struct StubClient;

    #[async_trait]
    impl VenueClient for StubClient {
        fn name(&self) -> &'static str {
            "opinion"
        }
        async fn list_markets(
            &self,
            _status: MarketStatusFilter,
            _cursor: Option<String>,
        ) -> Result<MarketPage, AdapterError> {
            Ok(MarketPage {
                markets: Vec::<MarketSummary>::new(),
                next_cursor: None,
            })
        }
        async fn get_book(&self, _token_id: &str) -> Result<BookSnapshot, AdapterError> {
            unimplemented!()
        }
        async fn get_books_batch(
            &self,
            _token_ids: &[String],
        ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
            Ok(HashMap::new())
        }
        async fn place_order(&self, _ticket: &OrderTicket) -> Result<OrderResult, AdapterError> {
            panic!("dry run must never call through to place_order");
        }
        async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, AdapterError> {
            panic!("dry run must never call through to cancel_order");
        }
        async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, AdapterError> {
            unimplemented!()
        }
        async fn get_balances(&self) -> Result<Balances, AdapterError> {
            Ok(Balances::default())
        }
    }

    #[tokio::test]
    async fn place_order_never_reaches_the_inner_client() {
        let client = DryRunClient::wrap(Arc::new(StubClient));
        let ticket = OrderTicket::new(
            Venue::Opinion,
            "tok",
            Side::Buy,
            10.0,
            10.0,
            Price::new(0.5, 0.01).unwrap(),
            TimeInForce::Ioc,
        );
        let result = client.place_order(&ticket).await.unwrap();
        assert_eq!(result.state, OrderState::Rejected);
    }

    #[tokio::test]
    async fn read_paths_pass_through_to_the_inner_client() {
        let client = DryRunClient::wrap(Arc::new(StubClient));
        let page = client.list_markets(MarketStatusFilter::Active, None).await.unwrap();
        assert!(page.markets.is_empty());
    }
}
