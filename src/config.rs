//! Engine configuration (§6). Grounded on `models.rs::Config::from_env`'s
//! env-var-with-default pattern, extended to cover every tunable the
//! spec names.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scan_interval_ms: u64,
    pub matcher_refresh_s: u64,
    pub immediate_min_edge_pct: f64,
    pub immediate_max_edge_pct: f64,
    pub liquidity_min_annualized_pct: f64,
    pub liquidity_target_size: f64,
    /// §4.G θ_liquidity_exit margin: reprice/cancel once annualized edge
    /// drops below `liquidity_min_annualized_pct - liquidity_exit_margin_pct`.
    pub liquidity_exit_margin_pct: f64,
    pub max_per_trade_shares: f64,
    pub max_notional: f64,
    pub max_concurrent_immediate: usize,
    pub orderbook_batch_size: usize,
    pub opinion_max_rps: f64,
    pub vantage_max_rps: f64,
    pub opinion_min_fee: f64,
    pub fee_curve_a: f64,
    pub fee_curve_c: f64,
    pub title_similarity_threshold: f64,
    pub max_resolution_date_delta_hours: i64,
    pub max_book_age_ms: i64,
    pub min_hedge_size: f64,
    pub slippage_cap_ticks: u32,
    pub max_hedge_attempts: u32,
    /// §5 order-poll tick for the Immediate Strategy's place-then-poll loop.
    pub order_poll_interval_ms: u64,
    pub both_venues_down_halt_minutes: u64,
    pub opinion_base_url: String,
    pub vantage_base_url: String,
    pub trade_log_path: String,
    pub bridge_bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_interval_ms: 500,
            matcher_refresh_s: 300,
            immediate_min_edge_pct: 2.0,
            immediate_max_edge_pct: 50.0,
            liquidity_min_annualized_pct: 20.0,
            liquidity_target_size: 250.0,
            liquidity_exit_margin_pct: 0.5,
            max_per_trade_shares: 1000.0,
            max_notional: 5000.0,
            max_concurrent_immediate: 2,
            orderbook_batch_size: 20,
            opinion_max_rps: 15.0,
            vantage_max_rps: 20.0,
            opinion_min_fee: 0.50,
            fee_curve_a: 0.06,
            fee_curve_c: 0.0025,
            title_similarity_threshold: 0.85,
            max_resolution_date_delta_hours: 48,
            max_book_age_ms: 2000,
            min_hedge_size: 1.0,
            slippage_cap_ticks: 3,
            max_hedge_attempts: 5,
            order_poll_interval_ms: 100,
            both_venues_down_halt_minutes: 30,
            opinion_base_url: "https://api.opinion.example".to_string(),
            vantage_base_url: "https://api.vantage.example".to_string(),
            trade_log_path: "./trades.jsonl".to_string(),
            bridge_bind_addr: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::EngineError> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let env_u64 = |key: &str, default: u64| -> Result<u64, crate::error::EngineError> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|_| crate::error::EngineError::Config(format!("{key} is not a valid integer: {v:?}"))),
                Err(_) => Ok(default),
            }
        };
        let env_f64 = |key: &str, default: f64| -> Result<f64, crate::error::EngineError> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|_| crate::error::EngineError::Config(format!("{key} is not a valid number: {v:?}"))),
                Err(_) => Ok(default),
            }
        };
        let env_usize = |key: &str, default: usize| -> Result<usize, crate::error::EngineError> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|_| crate::error::EngineError::Config(format!("{key} is not a valid count: {v:?}"))),
                Err(_) => Ok(default),
            }
        };
        let env_i64 = |key: &str, default: i64| -> Result<i64, crate::error::EngineError> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|_| crate::error::EngineError::Config(format!("{key} is not a valid integer: {v:?}"))),
                Err(_) => Ok(default),
            }
        };
        let env_u32 = |key: &str, default: u32| -> Result<u32, crate::error::EngineError> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|_| crate::error::EngineError::Config(format!("{key} is not a valid integer: {v:?}"))),
                Err(_) => Ok(default),
            }
        };
        let env_string = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Ok(Self {
            scan_interval_ms: env_u64("SCAN_INTERVAL_MS", defaults.scan_interval_ms)?,
            matcher_refresh_s: env_u64("MATCHER_REFRESH_S", defaults.matcher_refresh_s)?,
            immediate_min_edge_pct: env_f64("IMMEDIATE_MIN_EDGE_PCT", defaults.immediate_min_edge_pct)?,
            immediate_max_edge_pct: env_f64("IMMEDIATE_MAX_EDGE_PCT", defaults.immediate_max_edge_pct)?,
            liquidity_min_annualized_pct: env_f64(
                "LIQUIDITY_MIN_ANNUALIZED_PCT",
                defaults.liquidity_min_annualized_pct,
            )?,
            liquidity_target_size: env_f64("LIQUIDITY_TARGET_SIZE", defaults.liquidity_target_size)?,
            liquidity_exit_margin_pct: env_f64(
                "LIQUIDITY_EXIT_MARGIN_PCT",
                defaults.liquidity_exit_margin_pct,
            )?,
            max_per_trade_shares: env_f64("MAX_PER_TRADE_SHARES", defaults.max_per_trade_shares)?,
            max_notional: env_f64("MAX_NOTIONAL", defaults.max_notional)?,
            max_concurrent_immediate: env_usize(
                "MAX_CONCURRENT_IMMEDIATE",
                defaults.max_concurrent_immediate,
            )?,
            orderbook_batch_size: env_usize("ORDERBOOK_BATCH_SIZE", defaults.orderbook_batch_size)?,
            opinion_max_rps: env_f64("OPINION_MAX_RPS", defaults.opinion_max_rps)?,
            vantage_max_rps: env_f64("VANTAGE_MAX_RPS", defaults.vantage_max_rps)?,
            opinion_min_fee: env_f64("OPINION_MIN_FEE", defaults.opinion_min_fee)?,
            fee_curve_a: env_f64("FEE_CURVE_A", defaults.fee_curve_a)?,
            fee_curve_c: env_f64("FEE_CURVE_C", defaults.fee_curve_c)?,
            title_similarity_threshold: env_f64(
                "TITLE_SIMILARITY_THRESHOLD",
                defaults.title_similarity_threshold,
            )?,
            max_resolution_date_delta_hours: env_i64(
                "MAX_RESOLUTION_DATE_DELTA_HOURS",
                defaults.max_resolution_date_delta_hours,
            )?,
            max_book_age_ms: env_i64("MAX_BOOK_AGE_MS", defaults.max_book_age_ms)?,
            min_hedge_size: env_f64("MIN_HEDGE_SIZE", defaults.min_hedge_size)?,
            slippage_cap_ticks: env_u32("SLIPPAGE_CAP_TICKS", defaults.slippage_cap_ticks)?,
            max_hedge_attempts: env_u32("MAX_HEDGE_ATTEMPTS", defaults.max_hedge_attempts)?,
            order_poll_interval_ms: env_u64("ORDER_POLL_INTERVAL_MS", defaults.order_poll_interval_ms)?,
            both_venues_down_halt_minutes: env_u64(
                "BOTH_VENUES_DOWN_HALT_MINUTES",
                defaults.both_venues_down_halt_minutes,
            )?,
            opinion_base_url: env_string("OPINION_BASE_URL", &defaults.opinion_base_url),
            vantage_base_url: env_string("VANTAGE_BASE_URL", &defaults.vantage_base_url),
            trade_log_path: env_string("TRADE_LOG_PATH", &defaults.trade_log_path),
            bridge_bind_addr: env_string("BRIDGE_BIND_ADDR", &defaults.bridge_bind_addr),
        })
    }
}
