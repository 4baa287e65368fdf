//! Order tickets, their lifecycle state machine, and in-flight positions.

use super::token::{Price, Venue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Ioc,
    Gtc,
}

/// §3 Order State. Transitions are venue-reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    PendingSubmit,
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Canceled | OrderState::Rejected
        )
    }
}

/// A placed or intended order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: Option<String>,
    pub venue: Venue,
    pub token_id: String,
    pub side: Side,
    /// What we want to end up holding.
    pub target_fill_qty: f64,
    /// What we submit — differs from `target_fill_qty` when a per-unit
    /// fee is withheld from the received quantity (§4.D).
    pub order_qty: f64,
    pub limit_price: Price,
    pub tif: TimeInForce,
    pub state: OrderState,
    pub filled_qty: f64,
    pub avg_fill_price: Option<f64>,
}

impl OrderTicket {
    pub fn new(
        venue: Venue,
        token_id: impl Into<String>,
        side: Side,
        target_fill_qty: f64,
        order_qty: f64,
        limit_price: Price,
        tif: TimeInForce,
    ) -> Self {
        Self {
            order_id: None,
            venue,
            token_id: token_id.into(),
            side,
            target_fill_qty,
            order_qty,
            limit_price,
            tif,
            state: OrderState::PendingSubmit,
            filled_qty: 0.0,
            avg_fill_price: None,
        }
    }
}

/// §3 Position-in-flight: bookkeeping for one in-progress arbitrage.
/// Mutated only through the position's owner task (§5 ordering
/// guarantee).
#[derive(Debug, Clone)]
pub struct PositionInFlight {
    pub opportunity_id: String,
    pub first_leg: OrderTicket,
    pub second_leg: Option<OrderTicket>,
    pub first_filled_qty_accumulated: f64,
    pub hedged_qty_accumulated: f64,
}

impl PositionInFlight {
    pub fn new(opportunity_id: impl Into<String>, first_leg: OrderTicket) -> Self {
        Self {
            opportunity_id: opportunity_id.into(),
            first_leg,
            second_leg: None,
            first_filled_qty_accumulated: 0.0,
            hedged_qty_accumulated: 0.0,
        }
    }

    /// §3, §8: `deficit = first_filled - hedged`, and the invariant
    /// `hedged_qty ≤ first_filled_qty` must hold at every observation.
    pub fn deficit(&self) -> f64 {
        (self.first_filled_qty_accumulated - self.hedged_qty_accumulated).max(0.0)
    }

    pub fn record_first_fill(&mut self, qty: f64) {
        self.first_filled_qty_accumulated += qty;
    }

    pub fn record_hedge_fill(&mut self, qty: f64) {
        let capped = qty.min(self.deficit());
        self.hedged_qty_accumulated += capped;
        debug_assert!(self.hedged_qty_accumulated <= self.first_filled_qty_accumulated + 1e-9);
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.deficit() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> OrderTicket {
        OrderTicket::new(
            Venue::Opinion,
            "tok",
            Side::Buy,
            100.0,
            105.0,
            Price::new(0.5, 0.01).unwrap(),
            TimeInForce::Ioc,
        )
    }

    #[test]
    fn deficit_starts_at_zero() {
        let pos = PositionInFlight::new("opp1", ticket());
        assert_eq!(pos.deficit(), 0.0);
    }

    #[test]
    fn hedge_fill_never_exceeds_first_fill() {
        let mut pos = PositionInFlight::new("opp1", ticket());
        pos.record_first_fill(50.0);
        pos.record_hedge_fill(100.0); // attempt to over-hedge
        assert!(pos.hedged_qty_accumulated <= pos.first_filled_qty_accumulated);
        assert_eq!(pos.hedged_qty_accumulated, 50.0);
    }

    #[test]
    fn balanced_within_tolerance() {
        let mut pos = PositionInFlight::new("opp1", ticket());
        pos.record_first_fill(100.0);
        pos.record_hedge_fill(99.995);
        assert!(pos.is_balanced(0.01));
        assert!(!pos.is_balanced(0.001));
    }

    #[test]
    fn order_state_terminal_classification() {
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Canceled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(!OrderState::Open.is_terminal());
        assert!(!OrderState::PartiallyFilled.is_terminal());
    }
}
