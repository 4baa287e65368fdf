//! Arbitrage opportunities produced by the Scanner (§3, §4.E).

use super::market_pair::Combination;
use super::token::Token;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyClass {
    Immediate,
    Liquidity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub pair_id: String,
    pub combination_label: &'static str,
    pub opinion_token: Token,
    pub vantage_token: Token,
    /// Best ask on each side.
    pub p_opinion: f64,
    pub p_vantage: f64,
    /// Depth available at the best ask on each side.
    pub depth_opinion: f64,
    pub depth_vantage: f64,
    /// Best bid on each side at scan time, if the book had one — the
    /// Liquidity Strategy rests one tick above this (§4.G).
    pub best_bid_opinion: Option<f64>,
    pub best_bid_vantage: Option<f64>,
    /// `1 - (p1 + p2)`.
    pub raw_edge: f64,
    /// Raw edge after substituting the fee-adjusted effective cost for
    /// the Opinion leg (§4.D, §4.E step 4).
    pub effective_edge: f64,
    /// `min(depth_a, depth_b, per_trade_limit, max_notional / (p1+p2))`.
    pub quantity_cap: f64,
    /// `edge / (p1+p2) * (365 / days_to_resolution)`.
    pub annualized_return: f64,
    pub days_to_resolution: f64,
    pub strategy: Option<StrategyClass>,
    pub suspicious: bool,
}

impl Opportunity {
    pub fn combination_label(combination: Combination) -> &'static str {
        match combination {
            Combination::OpinionYesVantageNo => "opinion_yes/vantage_no",
            Combination::OpinionNoVantageYes => "opinion_no/vantage_yes",
        }
    }
}
