//! Venue Client Adapter (§4.A): a uniform trait over each venue's REST
//! API, plus the shared rate-limiting and retry machinery both concrete
//! adapters use.

pub mod client;
pub mod dry_run;
pub mod opinion;
pub mod retry;
pub mod token_bucket;
pub mod vantage;

pub use client::{
    Balances, CancelResult, MarketPage, MarketStatusFilter, MarketSummary, OrderResult,
    OrderStatus, VenueClient,
};
pub use dry_run::DryRunClient;
pub use opinion::OpinionClient;
pub use retry::{retry_with_backoff, DegradedTracker};
pub use token_bucket::TokenBucket;
pub use vantage::VantageClient;
