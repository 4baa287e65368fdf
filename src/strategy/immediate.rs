//! Immediate Strategy (§4.F): crosses both legs with IOC orders as soon
//! as an opportunity clears `θ_immediate`, without waiting out the rest
//! of the scan.

use super::reconciliation::{reconcile, ReconciliationRequest};
use crate::domain::{Opportunity, OrderState, OrderTicket, PositionInFlight, Side, TimeInForce, Venue};
use crate::pricing::FeeModel;
use crate::tradelog::{TradeLog, TradeLogEntry};
use crate::venues::VenueClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct ImmediateConfig {
    pub min_hedge_size: f64,
    pub slippage_cap_ticks: u32,
    pub max_hedge_attempts: u32,
    pub order_poll_interval: Duration,
    pub order_poll_timeout: Duration,
}

pub struct ImmediateStrategy {
    opinion: Arc<dyn VenueClient>,
    vantage: Arc<dyn VenueClient>,
    fee_model: FeeModel,
    trade_log: Arc<TradeLog>,
    cfg: ImmediateConfig,
}

#[derive(Debug)]
pub struct ImmediateOutcome {
    pub position: PositionInFlight,
    pub aborted: bool,
    pub deficit_after_reconciliation: f64,
}

impl ImmediateStrategy {
    pub fn new(
        opinion: Arc<dyn VenueClient>,
        vantage: Arc<dyn VenueClient>,
        fee_model: FeeModel,
        trade_log: Arc<TradeLog>,
        cfg: ImmediateConfig,
    ) -> Self {
        Self {
            opinion,
            vantage,
            fee_model,
            trade_log,
            cfg,
        }
    }

    fn client_for(&self, venue: Venue) -> &dyn VenueClient {
        match venue {
            Venue::Opinion => self.opinion.as_ref(),
            Venue::Vantage => self.vantage.as_ref(),
        }
    }

    /// §4.F steps 2-8. Returns `None` if the first leg produced nothing
    /// to hedge (step 6 abort).
    pub async fn execute(&self, opportunity: &Opportunity) -> Option<ImmediateOutcome> {
        // Step 2: first venue is whichever has shallower depth at the
        // best ask, reducing cancellation risk on the deeper side.
        let opinion_shallower = opportunity.depth_opinion <= opportunity.depth_vantage;
        let (first_venue, first_price, first_token) = if opinion_shallower {
            (Venue::Opinion, opportunity.p_opinion, opportunity.opinion_token.token_id.clone())
        } else {
            (Venue::Vantage, opportunity.p_vantage, opportunity.vantage_token.token_id.clone())
        };
        let (second_venue, second_price, second_token) = if opinion_shallower {
            (Venue::Vantage, opportunity.p_vantage, opportunity.vantage_token.token_id.clone())
        } else {
            (Venue::Opinion, opportunity.p_opinion, opportunity.opinion_token.token_id.clone())
        };

        let target_qty = opportunity.quantity_cap;
        let first_price = crate::domain::Price::raw(first_price);
        let sizing = self.fee_model.size_for_platform(first_venue, first_price.value(), target_qty);

        let mut first_ticket = OrderTicket::new(
            first_venue,
            first_token,
            Side::Buy,
            target_qty,
            sizing.order_qty,
            first_price,
            TimeInForce::Ioc,
        );

        let client = self.client_for(first_venue);
        let placed = match client.place_order(&first_ticket).await {
            Ok(result) => result,
            Err(err) => {
                warn!(pair_id = %opportunity.pair_id, "first leg placement failed, aborting: {err}");
                return None;
            }
        };
        first_ticket.order_id = Some(placed.order_id.clone());
        first_ticket.state = placed.state;

        let status = match super::poll_until_terminal(
            client,
            &placed.order_id,
            self.cfg.order_poll_interval,
            self.cfg.order_poll_timeout,
        )
        .await
        {
            Ok(status) => status,
            Err(err) => {
                warn!(pair_id = %opportunity.pair_id, "first leg poll failed, aborting: {err}");
                return None;
            }
        };
        first_ticket.state = status.state;
        first_ticket.filled_qty = status.filled_qty;
        first_ticket.avg_fill_price = status.avg_fill_price;

        let received_first = self
            .fee_model
            .received_for_order(first_venue, first_price.value(), status.filled_qty);

        self.trade_log.append(TradeLogEntry::from_ticket(&opportunity.pair_id, &first_ticket));

        // Step 6: abort if the fill is too small to hedge profitably.
        if received_first < self.cfg.min_hedge_size {
            info!(
                pair_id = %opportunity.pair_id,
                received_first,
                "first leg fill below min_hedge_size, aborting without hedge"
            );
            let mut position = PositionInFlight::new(opportunity.pair_id.clone(), first_ticket);
            position.record_first_fill(received_first);
            return Some(ImmediateOutcome {
                position,
                aborted: true,
                deficit_after_reconciliation: received_first,
            });
        }

        let mut position = PositionInFlight::new(opportunity.pair_id.clone(), first_ticket);
        position.record_first_fill(received_first);

        // Step 7: hedge on the second venue for the quantity actually
        // received on the first leg, at the scanned price or up to
        // slippage_cap ticks worse.
        let second_tick = if second_venue == Venue::Opinion {
            opportunity.opinion_token.tick_size
        } else {
            opportunity.vantage_token.tick_size
        };
        let second_price_value = (second_price + second_tick * self.cfg.slippage_cap_ticks as f64).min(1.0);
        let second_price = crate::domain::Price::raw(second_price_value);
        let second_sizing = self.fee_model.size_for_platform(second_venue, second_price.value(), received_first);

        let mut second_ticket = OrderTicket::new(
            second_venue,
            second_token,
            Side::Buy,
            received_first,
            second_sizing.order_qty,
            second_price,
            TimeInForce::Ioc,
        );

        let second_client = self.client_for(second_venue);
        let mut received_second = 0.0;
        match second_client.place_order(&second_ticket).await {
            Ok(result) => {
                second_ticket.order_id = Some(result.order_id.clone());
                if let Ok(status) = super::poll_until_terminal(
                    second_client,
                    &result.order_id,
                    self.cfg.order_poll_interval,
                    self.cfg.order_poll_timeout,
                )
                .await
                {
                    second_ticket.state = status.state;
                    second_ticket.filled_qty = status.filled_qty;
                    received_second = self
                        .fee_model
                        .received_for_order(second_venue, second_price.value(), status.filled_qty);
                }
            }
            Err(err) => {
                warn!(pair_id = %opportunity.pair_id, "second leg placement failed, routing to reconciliation: {err}");
            }
        }

        self.trade_log.append(TradeLogEntry::from_ticket(&opportunity.pair_id, &second_ticket));
        position.record_hedge_fill(received_second);
        position.second_leg = Some(second_ticket);

        // Step 8: deficit funnels to Reconciliation.
        let deficit = position.deficit();
        let final_deficit = if deficit > 1e-9 {
            let request = ReconciliationRequest {
                opportunity_id: opportunity.pair_id.clone(),
                venue: second_venue,
                token_id: if opinion_shallower {
                    opportunity.vantage_token.token_id.clone()
                } else {
                    opportunity.opinion_token.token_id.clone()
                },
                side: Side::Buy,
                tick_size: second_tick,
                base_price: second_price.value(),
                max_slippage_edge: (opportunity.raw_edge - 0.005).max(0.0),
            };
            let outcome = reconcile(second_client, &self.fee_model, &request, deficit, self.cfg.max_hedge_attempts).await;
            position.record_hedge_fill(outcome.filled_qty);
            position.deficit()
        } else {
            0.0
        };

        Some(ImmediateOutcome {
            position,
            aborted: false,
            deficit_after_reconciliation: final_deficit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookSnapshot, Outcome, Price, Token};
    use crate::pricing::FeeCurve;
    use crate::venues::{Balances, CancelResult, MarketPage, MarketStatusFilter, OrderResult, OrderStatus};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct AlwaysFillsClient {
        venue: Venue,
        fill_qty: f64,
    }

    #[async_trait]
    impl VenueClient for AlwaysFillsClient {
        fn name(&self) -> &'static str {
            match self.venue {
                Venue::Opinion => "opinion",
                Venue::Vantage => "vantage",
            }
        }
        async fn list_markets(
            &self,
            _status: MarketStatusFilter,
            _cursor: Option<String>,
        ) -> Result<MarketPage, crate::error::AdapterError> {
            unimplemented!()
        }
        async fn get_book(&self, _token_id: &str) -> Result<BookSnapshot, crate::error::AdapterError> {
            unimplemented!()
        }
        async fn get_books_batch(
            &self,
            _token_ids: &[String],
        ) -> Result<HashMap<String, BookSnapshot>, crate::error::AdapterError> {
            unimplemented!()
        }
        async fn place_order(&self, _ticket: &OrderTicket) -> Result<OrderResult, crate::error::AdapterError> {
            Ok(OrderResult {
                order_id: "o1".into(),
                state: OrderState::Filled,
            })
        }
        async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, crate::error::AdapterError> {
            unimplemented!()
        }
        async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, crate::error::AdapterError> {
            Ok(OrderStatus {
                state: OrderState::Filled,
                filled_qty: self.fill_qty,
                avg_fill_price: None,
            })
        }
        async fn get_balances(&self) -> Result<Balances, crate::error::AdapterError> {
            unimplemented!()
        }
    }

    fn sample_opportunity() -> Opportunity {
        Opportunity {
            pair_id: "p1".into(),
            combination_label: "opinion_yes/vantage_no",
            opinion_token: Token::new(Venue::Opinion, "m1", "op-yes", Outcome::Yes, 0.01, 1.0),
            vantage_token: Token::new(Venue::Vantage, "m1", "va-no", Outcome::No, 0.01, 1.0),
            p_opinion: 0.55,
            p_vantage: 0.40,
            depth_opinion: 500.0,
            depth_vantage: 500.0,
            best_bid_opinion: Some(0.54),
            best_bid_vantage: Some(0.39),
            raw_edge: 0.05,
            effective_edge: 0.045,
            quantity_cap: 500.0,
            annualized_return: 1.0,
            days_to_resolution: 30.0,
            strategy: Some(crate::domain::StrategyClass::Immediate),
            suspicious: false,
        }
    }

    #[tokio::test]
    async fn fully_filled_legs_produce_a_balanced_position() {
        let opinion = Arc::new(AlwaysFillsClient {
            venue: Venue::Opinion,
            fill_qty: 500.0,
        });
        let vantage = Arc::new(AlwaysFillsClient {
            venue: Venue::Vantage,
            fill_qty: 500.0,
        });
        let trade_log = Arc::new(TradeLog::in_memory());
        let strategy = ImmediateStrategy::new(
            opinion,
            vantage,
            FeeModel::new(FeeCurve::default()),
            trade_log,
            ImmediateConfig {
                min_hedge_size: 1.0,
                slippage_cap_ticks: 3,
                max_hedge_attempts: 5,
                order_poll_interval: Duration::from_millis(1),
                order_poll_timeout: Duration::from_millis(50),
            },
        );

        let outcome = strategy.execute(&sample_opportunity()).await.unwrap();
        assert!(!outcome.aborted);
        assert!(outcome.position.is_balanced(0.01));
    }

    #[tokio::test]
    async fn tiny_first_fill_aborts_without_hedging() {
        let opinion = Arc::new(AlwaysFillsClient {
            venue: Venue::Opinion,
            fill_qty: 0.1,
        });
        let vantage = Arc::new(AlwaysFillsClient {
            venue: Venue::Vantage,
            fill_qty: 500.0,
        });
        let trade_log = Arc::new(TradeLog::in_memory());
        let strategy = ImmediateStrategy::new(
            opinion,
            vantage,
            FeeModel::new(FeeCurve::default()),
            trade_log,
            ImmediateConfig {
                min_hedge_size: 1.0,
                slippage_cap_ticks: 3,
                max_hedge_attempts: 5,
                order_poll_interval: Duration::from_millis(1),
                order_poll_timeout: Duration::from_millis(50),
            },
        );

        let outcome = strategy.execute(&sample_opportunity()).await.unwrap();
        assert!(outcome.aborted);
        assert_eq!(outcome.position.hedged_qty_accumulated, 0.0);
    }
}
