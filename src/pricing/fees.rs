//! Fee & Sizing Model (§4.D)
//!
//! Translates a target fill quantity into an order quantity and back,
//! under each venue's fee schedule. Generalizes the flat-percentage
//! shape of the teacher's `FeeCalculator` into the configurable
//! quadratic curve the spec calls for.

use crate::domain::Venue;
use serde::{Deserialize, Serialize};

/// Coefficients of Opinion's per-trade fee curve:
/// `fee_rate(p) = a * p * (1 - p) + c`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeCurve {
    pub a: f64,
    pub c: f64,
    pub min_fee: f64,
}

impl Default for FeeCurve {
    fn default() -> Self {
        Self {
            a: 0.06,
            c: 0.0025,
            min_fee: 0.50,
        }
    }
}

impl FeeCurve {
    pub fn fee_rate(&self, price: f64) -> f64 {
        self.a * price * (1.0 - price) + self.c
    }
}

/// Result of sizing an order for a target fill quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingResult {
    /// Shares to submit in the order.
    pub order_qty: f64,
    /// Effective cost per share, inclusive of fees.
    pub effective_cost_per_share: f64,
}

/// Fee-aware sizing for both venues (§4.D).
#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    pub opinion: FeeCurve,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            opinion: FeeCurve::default(),
        }
    }
}

impl FeeModel {
    pub fn new(opinion: FeeCurve) -> Self {
        Self { opinion }
    }

    /// Given a target fill `Q_target` (shares the operator wants to
    /// hold after fees) at price `p`, compute the order quantity to
    /// submit and the effective per-share cost (§4.D steps 1-5).
    ///
    /// Vantage charges no order-side fee: sizing is the identity.
    pub fn size_for_platform(&self, venue: Venue, price: f64, target_qty: f64) -> SizingResult {
        match venue {
            Venue::Vantage => SizingResult {
                order_qty: target_qty,
                effective_cost_per_share: price,
            },
            Venue::Opinion => self.size_opinion(price, target_qty),
        }
    }

    fn size_opinion(&self, price: f64, target_qty: f64) -> SizingResult {
        if price <= 0.0 {
            return SizingResult {
                order_qty: target_qty,
                effective_cost_per_share: price,
            };
        }

        let f = self.opinion.fee_rate(price);
        let provisional_order_qty = target_qty / (1.0 - f);
        let nominal_fee = price * provisional_order_qty * f;

        if nominal_fee > self.opinion.min_fee {
            SizingResult {
                order_qty: provisional_order_qty,
                effective_cost_per_share: price / (1.0 - f),
            }
        } else {
            let order_qty = target_qty + self.opinion.min_fee / price;
            let effective_cost_per_share = price + self.opinion.min_fee / (price * order_qty);
            SizingResult {
                order_qty,
                effective_cost_per_share,
            }
        }
    }

    /// Inverse of `size_for_platform`: given the quantity actually
    /// submitted/filled as `order_qty`, what quantity is received net
    /// of fees. Used after fills to compute hedge sizing.
    pub fn received_for_order(&self, venue: Venue, price: f64, order_qty: f64) -> f64 {
        match venue {
            Venue::Vantage => order_qty,
            Venue::Opinion => {
                if price <= 0.0 {
                    return order_qty;
                }
                let f = self.opinion.fee_rate(price);
                let nominal_fee = price * order_qty * f;
                let actual_fee = nominal_fee.max(self.opinion.min_fee);
                (order_qty - actual_fee / price).max(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vantage_sizing_is_identity() {
        let model = FeeModel::default();
        let r = model.size_for_platform(Venue::Vantage, 0.4, 500.0);
        assert_eq!(r.order_qty, 500.0);
        assert_eq!(r.effective_cost_per_share, 0.4);
    }

    #[test]
    fn opinion_sizing_min_fee_branch_dominates_at_low_price() {
        // Boundary scenario from §8: p=0.01, target 200 shares, MIN_FEE
        // branch dominates since 0.01 * 200 * fee_rate << 0.50.
        let model = FeeModel::default();
        let r = model.size_for_platform(Venue::Opinion, 0.01, 200.0);
        assert!((r.order_qty - 250.0).abs() < 1.0);

        let received = model.received_for_order(Venue::Opinion, 0.01, r.order_qty);
        assert!((received - 200.0).abs() < 0.01);
    }

    #[test]
    fn opinion_sizing_round_trip_within_epsilon() {
        // §8 invariant: received(v, p, size_for_platform(v, p, Q)) = Q ± ε
        let model = FeeModel::default();
        for target in [10.0, 100.0, 500.0, 999.0] {
            for price in [0.05, 0.3, 0.5, 0.7, 0.95] {
                let r = model.size_for_platform(Venue::Opinion, price, target);
                let received = model.received_for_order(Venue::Opinion, price, r.order_qty);
                assert!(
                    (received - target).abs() < 0.01,
                    "target={target} price={price} received={received}"
                );
            }
        }
    }

    #[test]
    fn nominal_fee_branch_used_at_high_quantity() {
        let model = FeeModel::default();
        let r = model.size_for_platform(Venue::Opinion, 0.5, 10_000.0);
        // At this quantity the nominal fee should dominate MIN_FEE.
        let f = model.opinion.fee_rate(0.5);
        let expected_order_qty = 10_000.0 / (1.0 - f);
        assert!((r.order_qty - expected_order_qty).abs() < 1e-6);
    }
}
