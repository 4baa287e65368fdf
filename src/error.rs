//! Typed error taxonomy.
//!
//! Replaces the "mixed exceptions and sentinel return values" pattern
//! called out in the design notes with uniform typed results: callers
//! branch explicitly on `AdapterError`/`EngineError` variants instead of
//! inspecting string messages. `anyhow` is still used at the CLI
//! boundary (`main.rs`) for top-level context chaining, matching the
//! teacher's own split.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("price {0} outside [0, 1]")]
    PriceOutOfRange(f64),
    #[error("price {value} is off the {tick_size} tick grid")]
    OffGrid { value: f64, tick_size: f64 },
    #[error("size {size} below minimum order size {min}")]
    SizeBelowMinimum { size: f64, min: f64 },
}

/// Errors surfaced by a `VenueClient` implementation (§4.A, §7).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Retryable network/transport failure. The adapter has already
    /// exhausted its retry budget by the time this reaches the caller.
    #[error("transport error calling {venue}: {message}")]
    Transient { venue: &'static str, message: String },

    /// The venue rejected the request for exceeding its rate limit.
    /// Counts against the same retry budget as `Transient`.
    #[error("rate limited by {venue}")]
    RateLimited { venue: &'static str },

    /// The venue's response no longer matches the expected schema.
    /// Fatal: unsafe to continue trading against this venue.
    #[error("schema drift from {venue}: {message}")]
    SchemaDrift { venue: &'static str, message: String },

    /// A request-level validation failure (off-grid price, size below
    /// minimum). Not retryable; the caller should skip and move on.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Balance insufficient to place the requested order.
    #[error("insufficient balance on {venue}: need {needed}, have {available}")]
    InsufficientBalance {
        venue: &'static str,
        needed: f64,
        available: f64,
    },

    /// The order or resource referenced no longer exists / was never
    /// found.
    #[error("not found on {venue}: {what}")]
    NotFound { venue: &'static str, what: String },

    /// Anything else — logged with context, isolates to the affected
    /// call, never crashes the supervisor.
    #[error("unexpected error from {venue}: {message}")]
    Unknown { venue: &'static str, message: String },
}

impl AdapterError {
    /// Transient failures and rate-limit rejections share a retry
    /// budget per §7.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transient { .. } | AdapterError::RateLimited { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, AdapterError::SchemaDrift { .. })
    }
}

/// Supervisor-level errors. Only `SchemaDrift` and `BothVenuesDown`
/// halt the engine (§7 propagation policy); everything else is isolated
/// to the one opportunity or ticket that triggered it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("venue schema drift, halting: {0}")]
    SchemaDrift(String),

    #[error("both venues unavailable for more than {minutes} minutes")]
    BothVenuesDown { minutes: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl EngineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Config(_) => 1,
            EngineError::BothVenuesDown { .. } => 2,
            _ => 1,
        }
    }
}
