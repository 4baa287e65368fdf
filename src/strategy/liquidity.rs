//! Liquidity Strategy (§4.G): rests an order to capture the spread,
//! hedging on fill. State machine per ticket:
//!
//! ```text
//! IDLE → RESTING → PARTIALLY_FILLED ↔ RESTING → FILLED → HEDGING → DONE
//!                                         ↓
//!                                   REPRICING → RESTING
//!                                         ↓
//!                                    CANCELING → IDLE (on exit)
//! ```
//!
//! Grounded in shape on the `pm_as_ofi` coordinator's reprice/debounce
//! pattern (anti-thrashing via a minimum re-submit interval).

use super::reconciliation::{reconcile, ReconciliationRequest};
use crate::domain::{Opportunity, OrderTicket, Price, Side, TimeInForce, Venue};
use crate::pricing::FeeModel;
use crate::tradelog::{TradeLog, TradeLogEntry};
use crate::venues::VenueClient;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Idle,
    Resting,
    PartiallyFilled,
    Filled,
    Hedging,
    Done,
    Repricing,
    Canceling,
}

pub struct LiquidityConfig {
    pub target_size: f64,
    pub liquidity_min_annualized_pct: f64,
    pub liquidity_exit_margin_pct: f64,
    pub min_order_size: f64,
    pub reprice_min_interval: Duration,
    pub max_hedge_attempts: u32,
}

pub struct LiquidityTicket {
    pub pair_id: String,
    pub combination_label: &'static str,
    pub rest_venue: Venue,
    pub rest_token_id: String,
    pub hedge_venue: Venue,
    pub hedge_token_id: String,
    pub tick_size: f64,
    pub state: TicketState,
    pub resting_order_id: Option<String>,
    /// Price our resting order was last submitted at — needed to detect
    /// "was outbid" / "better price available" independently of edge
    /// collapse (§4.G clauses a/b).
    pub rest_price: Option<f64>,
    pub target_qty: f64,
    pub first_filled_qty_accumulated: f64,
    pub hedged_qty_accumulated: f64,
    last_reprice_at: Option<Instant>,
}

impl LiquidityTicket {
    pub fn new(opportunity: &Opportunity, rest_on_opinion: bool, target_qty: f64) -> Self {
        let (rest_venue, rest_token_id, hedge_venue, hedge_token_id, tick_size) = if rest_on_opinion {
            (
                Venue::Opinion,
                opportunity.opinion_token.token_id.clone(),
                Venue::Vantage,
                opportunity.vantage_token.token_id.clone(),
                opportunity.opinion_token.tick_size,
            )
        } else {
            (
                Venue::Vantage,
                opportunity.vantage_token.token_id.clone(),
                Venue::Opinion,
                opportunity.opinion_token.token_id.clone(),
                opportunity.vantage_token.tick_size,
            )
        };

        Self {
            pair_id: opportunity.pair_id.clone(),
            combination_label: opportunity.combination_label,
            rest_venue,
            rest_token_id,
            hedge_venue,
            hedge_token_id,
            tick_size,
            state: TicketState::Idle,
            resting_order_id: None,
            rest_price: None,
            target_qty,
            first_filled_qty_accumulated: 0.0,
            hedged_qty_accumulated: 0.0,
            last_reprice_at: None,
        }
    }

    pub fn deficit(&self) -> f64 {
        (self.first_filled_qty_accumulated - self.hedged_qty_accumulated).max(0.0)
    }
}

pub struct LiquidityStrategy {
    opinion: Arc<dyn VenueClient>,
    vantage: Arc<dyn VenueClient>,
    fee_model: FeeModel,
    trade_log: Arc<TradeLog>,
    cfg: LiquidityConfig,
}

impl LiquidityStrategy {
    pub fn new(
        opinion: Arc<dyn VenueClient>,
        vantage: Arc<dyn VenueClient>,
        fee_model: FeeModel,
        trade_log: Arc<TradeLog>,
        cfg: LiquidityConfig,
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

    /// Advance `ticket` one step given the current scan's opportunity
    /// view (or `None` if the pair/combination no longer appears in this
    /// frame — treated as edge collapse, driving toward CANCELING).
    pub async fn on_scan(&self, ticket: &mut LiquidityTicket, opportunity: Option<&Opportunity>) {
        match ticket.state {
            TicketState::Idle => self.start_resting(ticket, opportunity).await,
            TicketState::Resting | TicketState::PartiallyFilled => {
                self.poll_resting(ticket, opportunity).await
            }
            TicketState::Repricing => self.reprice(ticket, opportunity).await,
            TicketState::Filled => self.begin_hedge(ticket).await,
            TicketState::Hedging => {} // terminal per call; `begin_hedge` drives straight to Done/awaits completion
            TicketState::Done | TicketState::Canceling => {}
        }
    }

    /// §4.G: `p_rest = max(best_bid + tick, scanned_price)`, where
    /// `scanned_price` is the best-ask this ticket's opportunity was
    /// evaluated against. Falls back to the scanned price alone when the
    /// book has no bid side yet.
    fn target_rest_price(&self, ticket: &LiquidityTicket, opp: &Opportunity) -> f64 {
        let (scanned_price, best_bid) = if ticket.rest_venue == Venue::Opinion {
            (opp.p_opinion, opp.best_bid_opinion)
        } else {
            (opp.p_vantage, opp.best_bid_vantage)
        };
        match best_bid {
            Some(bid) => (bid + ticket.tick_size).max(scanned_price),
            None => scanned_price,
        }
        .max(ticket.tick_size)
    }

    async fn start_resting(&self, ticket: &mut LiquidityTicket, opportunity: Option<&Opportunity>) {
        let Some(opp) = opportunity else { return };
        let rest_price_value = self.target_rest_price(ticket, opp);

        let rest_price = Price::raw(rest_price_value);
        let qty = ticket.target_qty.min(opp.quantity_cap);
        let sizing = self.fee_model.size_for_platform(ticket.rest_venue, rest_price.value(), qty);

        let resting = OrderTicket::new(
            ticket.rest_venue,
            ticket.rest_token_id.clone(),
            Side::Buy,
            qty,
            sizing.order_qty,
            rest_price,
            TimeInForce::Gtc,
        );

        match self.client_for(ticket.rest_venue).place_order(&resting).await {
            Ok(result) => {
                ticket.resting_order_id = Some(result.order_id);
                ticket.rest_price = Some(rest_price_value);
                ticket.state = TicketState::Resting;
                info!(pair_id = %ticket.pair_id, "liquidity ticket resting");
            }
            Err(err) => {
                warn!(pair_id = %ticket.pair_id, "failed to place resting order: {err}");
            }
        }
    }

    async fn poll_resting(&self, ticket: &mut LiquidityTicket, opportunity: Option<&Opportunity>) {
        let Some(order_id) = ticket.resting_order_id.clone() else {
            ticket.state = TicketState::Idle;
            return;
        };

        let status = match self.client_for(ticket.rest_venue).poll_order(&order_id).await {
            Ok(s) => s,
            Err(err) => {
                warn!(pair_id = %ticket.pair_id, "failed to poll resting order: {err}");
                return;
            }
        };

        let received = self
            .fee_model
            .received_for_order(ticket.rest_venue, status.avg_fill_price.unwrap_or(0.0), status.filled_qty);
        ticket.first_filled_qty_accumulated = received.max(ticket.first_filled_qty_accumulated);

        use crate::domain::OrderState;
        match status.state {
            OrderState::Filled => {
                ticket.state = TicketState::Filled;
                return;
            }
            OrderState::PartiallyFilled => {
                ticket.state = TicketState::PartiallyFilled;

                // §4.G: a remainder too small to keep resting cancels
                // immediately, independent of edge collapse.
                let remainder = ticket.target_qty - ticket.first_filled_qty_accumulated;
                if remainder < self.cfg.min_order_size {
                    ticket.state = TicketState::Repricing;
                    return;
                }
            }
            OrderState::Canceled | OrderState::Rejected => {
                ticket.state = TicketState::Idle;
                return;
            }
            _ => {}
        }

        // §4.G RESTING → REPRICING triggers, each independent of the others:
        // (a) a strictly better resting price is now available, (b) our
        // resting price is no longer best (someone outbid us), (c) the
        // opportunity's annualized edge collapsed below θ_liquidity_exit.
        if let Some(opp) = opportunity {
            let annualized_pct = opp.annualized_return * 100.0;
            let exit_threshold = self.cfg.liquidity_min_annualized_pct - self.cfg.liquidity_exit_margin_pct;
            let edge_collapsed = annualized_pct < exit_threshold;

            let current_best_price = self.target_rest_price(ticket, opp);
            let rest_price = ticket.rest_price.unwrap_or(current_best_price);
            let better_price_available = current_best_price > rest_price + 1e-9;

            let best_bid = if ticket.rest_venue == Venue::Opinion {
                opp.best_bid_opinion
            } else {
                opp.best_bid_vantage
            };
            let outbid = best_bid
                .map(|bid| bid + ticket.tick_size > rest_price + 1e-9)
                .unwrap_or(false);

            if edge_collapsed || better_price_available || outbid {
                ticket.state = TicketState::Repricing;
            }
        } else {
            ticket.state = TicketState::Repricing;
        }
    }

    async fn reprice(&self, ticket: &mut LiquidityTicket, opportunity: Option<&Opportunity>) {
        if let Some(last) = ticket.last_reprice_at {
            if last.elapsed() < self.cfg.reprice_min_interval {
                return; // debounced — evaluated again next frame
            }
        }

        if let Some(order_id) = ticket.resting_order_id.take() {
            match self.client_for(ticket.rest_venue).cancel_order(&order_id).await {
                Ok(_) => {}
                Err(err) => warn!(pair_id = %ticket.pair_id, "cancel before reprice failed: {err}"),
            }
        }
        ticket.rest_price = None;
        ticket.last_reprice_at = Some(Instant::now());

        let remainder = ticket.target_qty - ticket.first_filled_qty_accumulated;
        if remainder < self.cfg.min_order_size {
            ticket.state = if ticket.first_filled_qty_accumulated > 0.0 {
                TicketState::Filled
            } else {
                TicketState::Idle
            };
            return;
        }

        match opportunity {
            Some(_) => ticket.state = TicketState::Idle, // re-evaluate fresh next frame via IDLE → RESTING
            None => ticket.state = TicketState::Canceling,
        }
    }

    async fn begin_hedge(&self, ticket: &mut LiquidityTicket) {
        ticket.state = TicketState::Hedging;
        let deficit = ticket.deficit();
        if deficit <= 1e-9 {
            ticket.state = TicketState::Done;
            return;
        }

        let hedge_client = self.client_for(ticket.hedge_venue);
        let hedge_price_value = match hedge_client.get_book(&ticket.hedge_token_id).await {
            Ok(book) => book.best_ask().map(|a| a.price.value()).unwrap_or(0.5),
            Err(_) => 0.5,
        };
        let hedge_price = Price::raw(hedge_price_value);
        let sizing = self.fee_model.size_for_platform(ticket.hedge_venue, hedge_price.value(), deficit);

        let hedge_ticket = OrderTicket::new(
            ticket.hedge_venue,
            ticket.hedge_token_id.clone(),
            Side::Buy,
            deficit,
            sizing.order_qty,
            hedge_price,
            TimeInForce::Ioc,
        );

        match hedge_client.place_order(&hedge_ticket).await {
            Ok(result) => {
                if let Ok(status) = hedge_client.poll_order(&result.order_id).await {
                    let received = self
                        .fee_model
                        .received_for_order(ticket.hedge_venue, hedge_price.value(), status.filled_qty);
                    ticket.hedged_qty_accumulated = (ticket.hedged_qty_accumulated + received).min(ticket.first_filled_qty_accumulated);
                    self.trade_log.append(TradeLogEntry::from_ticket(&ticket.pair_id, &hedge_ticket));
                }
            }
            Err(err) => warn!(pair_id = %ticket.pair_id, "hedge placement failed: {err}"),
        }

        if ticket.deficit() > 1e-9 {
            let request = ReconciliationRequest {
                opportunity_id: ticket.pair_id.clone(),
                venue: ticket.hedge_venue,
                token_id: ticket.hedge_token_id.clone(),
                side: Side::Buy,
                tick_size: ticket.tick_size,
                base_price: hedge_price.value(),
                max_slippage_edge: 0.02,
            };
            let outcome = reconcile(hedge_client, &self.fee_model, &request, ticket.deficit(), self.cfg.max_hedge_attempts).await;
            ticket.hedged_qty_accumulated = (ticket.hedged_qty_accumulated + outcome.filled_qty).min(ticket.first_filled_qty_accumulated);
        }

        ticket.state = TicketState::Done;
    }

    /// Supervisor shutdown / pair de-listing (§4.G "Any → CANCELING").
    pub async fn cancel_and_drain(&self, ticket: &mut LiquidityTicket) {
        ticket.state = TicketState::Canceling;
        if let Some(order_id) = ticket.resting_order_id.take() {
            let _ = self.client_for(ticket.rest_venue).cancel_order(&order_id).await;
        }
        if ticket.deficit() > 1e-9 {
            self.begin_hedge_from_canceling(ticket).await;
        }
    }

    async fn begin_hedge_from_canceling(&self, ticket: &mut LiquidityTicket) {
        ticket.state = TicketState::Hedging;
        self.begin_hedge(ticket).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookLevel, BookSnapshot, OrderState, Outcome, Token};
    use crate::pricing::FeeCurve;
    use crate::venues::{Balances, CancelResult, MarketPage, MarketStatusFilter, OrderResult, OrderStatus};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedClient {
        venue: Venue,
        poll_states: Mutex<Vec<(OrderState, f64, f64)>>,
    }

    #[async_trait]
    impl VenueClient for ScriptedClient {
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
            Ok(BookSnapshot {
                token_id: "tok".into(),
                venue: self.venue,
                bids: vec![],
                asks: vec![BookLevel {
                    price: Price::new(0.40, 0.01).unwrap(),
                    size: 500.0,
                }],
                timestamp_ms: 0,
            })
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
                state: OrderState::Open,
            })
        }
        async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, crate::error::AdapterError> {
            Ok(CancelResult::Ack)
        }
        async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, crate::error::AdapterError> {
            let mut states = self.poll_states.lock().unwrap();
            let (state, filled, price) = if states.is_empty() {
                (OrderState::Filled, 0.0, 0.40)
            } else {
                states.remove(0)
            };
            Ok(OrderStatus {
                state,
                filled_qty: filled,
                avg_fill_price: Some(price),
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
            p_opinion: 0.30,
            p_vantage: 0.30,
            depth_opinion: 500.0,
            depth_vantage: 500.0,
            best_bid_opinion: Some(0.28),
            best_bid_vantage: Some(0.28),
            raw_edge: 0.40,
            effective_edge: 0.38,
            quantity_cap: 250.0,
            annualized_return: 3.0,
            days_to_resolution: 30.0,
            strategy: Some(crate::domain::StrategyClass::Liquidity),
            suspicious: false,
        }
    }

    #[tokio::test]
    async fn idle_ticket_transitions_to_resting_on_first_scan() {
        let rest = Arc::new(ScriptedClient {
            venue: Venue::Opinion,
            poll_states: Mutex::new(vec![]),
        });
        let hedge = Arc::new(ScriptedClient {
            venue: Venue::Vantage,
            poll_states: Mutex::new(vec![]),
        });
        let strategy = LiquidityStrategy::new(
            rest,
            hedge,
            FeeModel::new(FeeCurve::default()),
            Arc::new(TradeLog::in_memory()),
            LiquidityConfig {
                target_size: 250.0,
                liquidity_min_annualized_pct: 20.0,
                liquidity_exit_margin_pct: 0.5,
                min_order_size: 1.0,
                reprice_min_interval: Duration::from_secs(5),
                max_hedge_attempts: 5,
            },
        );

        let opp = sample_opportunity();
        let mut ticket = LiquidityTicket::new(&opp, true, 250.0);
        strategy.on_scan(&mut ticket, Some(&opp)).await;
        assert_eq!(ticket.state, TicketState::Resting);
        assert!(ticket.resting_order_id.is_some());
    }

    #[tokio::test]
    async fn partial_fill_then_full_fill_drives_to_hedging_and_done() {
        let rest = Arc::new(ScriptedClient {
            venue: Venue::Opinion,
            poll_states: Mutex::new(vec![
                (OrderState::PartiallyFilled, 150.0, 0.29),
                (OrderState::Filled, 250.0, 0.29),
            ]),
        });
        let hedge = Arc::new(ScriptedClient {
            venue: Venue::Vantage,
            poll_states: Mutex::new(vec![(OrderState::Filled, 250.0, 0.30)]),
        });
        let strategy = LiquidityStrategy::new(
            rest,
            hedge,
            FeeModel::new(FeeCurve::default()),
            Arc::new(TradeLog::in_memory()),
            LiquidityConfig {
                target_size: 250.0,
                liquidity_min_annualized_pct: 20.0,
                liquidity_exit_margin_pct: 0.5,
                min_order_size: 1.0,
                reprice_min_interval: Duration::from_secs(5),
                max_hedge_attempts: 5,
            },
        );

        let opp = sample_opportunity();
        let mut ticket = LiquidityTicket::new(&opp, true, 250.0);
        ticket.state = TicketState::Resting;
        ticket.resting_order_id = Some("o1".into());

        strategy.on_scan(&mut ticket, Some(&opp)).await;
        assert_eq!(ticket.state, TicketState::PartiallyFilled);

        strategy.on_scan(&mut ticket, Some(&opp)).await;
        assert_eq!(ticket.state, TicketState::Filled);

        strategy.on_scan(&mut ticket, Some(&opp)).await;
        assert_eq!(ticket.state, TicketState::Done);
        assert!(ticket.deficit() <= 0.01);
    }
}
