//! Opportunity Scanner (§4.E): joins one scan frame with the current
//! pair snapshot and the fee model to emit ranked opportunities.
//!
//! Grounded on `arbitrage/engine.rs`'s `ArbitrageOpportunity` shape and
//! spread computation, generalized from single-sided polymarket/kalshi
//! spread detection into the two-combination cross-venue join the spec
//! requires.

use crate::domain::{BookSnapshot, Combination, MarketPair, Opportunity, ScanFrame, StrategyClass, Venue};
use crate::pricing::FeeModel;
use tracing::debug;

pub struct ScannerConfig {
    pub immediate_min_edge_pct: f64,
    pub immediate_max_edge_pct: f64,
    pub liquidity_min_annualized_pct: f64,
    pub max_per_trade_shares: f64,
    pub max_notional: f64,
}

pub struct Scanner {
    fee_model: FeeModel,
    cfg: ScannerConfig,
}

impl Scanner {
    pub fn new(fee_model: FeeModel, cfg: ScannerConfig) -> Self {
        Self { fee_model, cfg }
    }

    /// §4.E: for every pair and both crossing combinations, emit an
    /// opportunity record when either strategy threshold is cleared, or
    /// when the edge is suspiciously large (flagged, not executed).
    /// Pairs/combinations that clear neither bar are silently dropped.
    pub fn scan(&self, frame: &ScanFrame, pairs: &[MarketPair]) -> Vec<Opportunity> {
        let mut out = Vec::new();
        let now = chrono::Utc::now();

        for pair in pairs {
            for combination in Combination::ALL {
                if let Some(opp) = self.evaluate(frame, pair, combination, now) {
                    out.push(opp);
                }
            }
        }

        out
    }

    fn evaluate(
        &self,
        frame: &ScanFrame,
        pair: &MarketPair,
        combination: Combination,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<Opportunity> {
        let (opinion_token, vantage_token) = combination.tokens(pair);

        let opinion_book = frame.get(&opinion_token.token_id)?;
        let vantage_book = frame.get(&vantage_token.token_id)?;

        let (p_opinion, depth_opinion) = best_ask(opinion_book)?;
        let (p_vantage, depth_vantage) = best_ask(vantage_book)?;
        let best_bid_opinion = opinion_book.best_bid().map(|b| b.price.value());
        let best_bid_vantage = vantage_book.best_bid().map(|b| b.price.value());

        let raw_edge = 1.0 - (p_opinion + p_vantage);
        if raw_edge <= 0.0 {
            return None;
        }

        let days_to_resolution = pair.days_to_resolution(now);

        // Step 5 computed ahead of step 4 here: the effective per-share
        // cost needs a quantity to size against, and the quantity cap
        // only depends on raw prices/depth, not the fee-adjusted price.
        let quantity_cap = depth_opinion
            .min(depth_vantage)
            .min(self.cfg.max_per_trade_shares)
            .min(self.cfg.max_notional / (p_opinion + p_vantage));

        if quantity_cap <= 0.0 {
            return None;
        }

        let sizing = self.fee_model.size_for_platform(Venue::Opinion, p_opinion, quantity_cap);
        let effective_edge = 1.0 - (sizing.effective_cost_per_share + p_vantage);

        let annualized_return = effective_edge / (p_opinion + p_vantage) * (365.0 / days_to_resolution);

        let suspicious = effective_edge * 100.0 > self.cfg.immediate_max_edge_pct;
        let strategy = if suspicious {
            None
        } else if effective_edge * 100.0 > self.cfg.immediate_min_edge_pct {
            Some(StrategyClass::Immediate)
        } else if annualized_return * 100.0 > self.cfg.liquidity_min_annualized_pct {
            Some(StrategyClass::Liquidity)
        } else {
            None
        };

        if strategy.is_none() && !suspicious {
            return None;
        }

        if suspicious {
            debug!(
                pair_id = %pair.pair_id,
                effective_edge,
                "opportunity exceeds immediate_max_edge_pct, flagging suspicious"
            );
        }

        Some(Opportunity {
            pair_id: pair.pair_id.clone(),
            combination_label: Opportunity::combination_label(combination),
            opinion_token: opinion_token.clone(),
            vantage_token: vantage_token.clone(),
            p_opinion,
            p_vantage,
            depth_opinion,
            depth_vantage,
            best_bid_opinion,
            best_bid_vantage,
            raw_edge,
            effective_edge,
            quantity_cap,
            annualized_return,
            days_to_resolution,
            strategy,
            suspicious,
        })
    }
}

fn best_ask(book: &BookSnapshot) -> Option<(f64, f64)> {
    let ask = book.best_ask()?;
    if ask.size <= 0.0 {
        return None;
    }
    Some((ask.price.value(), ask.size))
}

/// Ranks opportunities the way each strategy consumes them (§4.E): the
/// Immediate strategy ranks by annualized return, the Liquidity
/// strategy by raw edge.
pub fn rank_for_immediate(mut opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    opportunities.sort_by(|a, b| b.annualized_return.partial_cmp(&a.annualized_return).unwrap());
    opportunities
}

pub fn rank_for_liquidity(mut opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    opportunities.sort_by(|a, b| b.raw_edge.partial_cmp(&a.raw_edge).unwrap());
    opportunities
}
