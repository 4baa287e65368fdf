//! Execution strategies (§4.F, §4.G) and their shared primitives.
//!
//! Design note: "polling loops inside deeply nested code" is replaced
//! here with one `poll_until_terminal` used by both strategies, instead
//! of each re-implementing its own wait loop.

pub mod immediate;
pub mod liquidity;
pub mod reconciliation;

pub use immediate::{ImmediateConfig, ImmediateOutcome, ImmediateStrategy};
pub use liquidity::{LiquidityConfig, LiquidityStrategy, LiquidityTicket, TicketState};
pub use reconciliation::{reconcile, ReconciliationOutcome, ReconciliationRequest};

use crate::error::AdapterError;
use crate::venues::{OrderStatus, VenueClient};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Polls `order_id` on `client` every `interval` until the venue reports
/// a terminal state or `timeout` elapses.
pub async fn poll_until_terminal(
    client: &dyn VenueClient,
    order_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<OrderStatus, AdapterError> {
    let deadline = Instant::now() + timeout;
    loop {
        let status = client.poll_order(order_id).await?;
        if status.state.is_terminal() {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            return Ok(status);
        }
        sleep(interval).await;
    }
}
