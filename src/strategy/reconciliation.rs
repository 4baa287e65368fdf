//! Reconciliation (§4.F step 8, §4.H): closes a hedge deficit by
//! placing progressively more aggressive IOC orders.

use crate::domain::{OrderTicket, Price, Side, TimeInForce, Venue};
use crate::error::AdapterError;
use crate::pricing::FeeModel;
use crate::venues::VenueClient;
use tracing::{info, warn};

pub struct ReconciliationRequest {
    pub opportunity_id: String,
    pub venue: Venue,
    pub token_id: String,
    pub side: Side,
    pub tick_size: f64,
    pub base_price: f64,
    /// Stop-loss: the cumulative price degradation allowed before
    /// giving up and leaving the remainder as open exposure
    /// (`raw_edge - 0.5%`, §4.F step 8).
    pub max_slippage_edge: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationOutcome {
    pub filled_qty: f64,
    pub attempts_used: u32,
    pub gave_up: bool,
}

/// Places progressively worse IOC orders (`price = best_ask + k·tick`)
/// until `deficit` is filled, `max_attempts` is exhausted, or the
/// cumulative slippage would exceed `max_slippage_edge`.
pub async fn reconcile(
    client: &dyn VenueClient,
    fee_model: &FeeModel,
    request: &ReconciliationRequest,
    deficit: f64,
    max_attempts: u32,
) -> ReconciliationOutcome {
    let mut remaining = deficit;
    let mut filled_total = 0.0;
    let mut attempts_used = 0;

    for k in 0..max_attempts {
        if remaining <= 1e-9 {
            break;
        }

        let candidate_price = (request.base_price + k as f64 * request.tick_size).min(1.0);
        let slippage = candidate_price - request.base_price;
        if slippage > request.max_slippage_edge {
            warn!(
                opportunity_id = %request.opportunity_id,
                slippage,
                "reconciliation stop-loss reached, leaving residual exposure"
            );
            return ReconciliationOutcome {
                filled_qty: filled_total,
                attempts_used,
                gave_up: true,
            };
        }

        attempts_used += 1;
        let price = match Price::new(candidate_price, request.tick_size) {
            Ok(p) => p,
            Err(_) => Price::raw(candidate_price),
        };
        let sizing = fee_model.size_for_platform(request.venue, price.value(), remaining);

        let ticket = OrderTicket::new(
            request.venue,
            request.token_id.clone(),
            request.side,
            remaining,
            sizing.order_qty,
            price,
            TimeInForce::Ioc,
        );

        match place_and_await_terminal(client, &ticket).await {
            Ok(filled) => {
                let received = fee_model.received_for_order(request.venue, price.value(), filled);
                filled_total += received;
                remaining = (remaining - received).max(0.0);
                info!(
                    opportunity_id = %request.opportunity_id,
                    attempt = k,
                    received,
                    remaining,
                    "reconciliation attempt filled"
                );
            }
            Err(err) => {
                warn!(opportunity_id = %request.opportunity_id, attempt = k, "reconciliation attempt failed: {err}");
            }
        }
    }

    ReconciliationOutcome {
        filled_qty: filled_total,
        attempts_used,
        gave_up: remaining > 1e-9,
    }
}

async fn place_and_await_terminal(client: &dyn VenueClient, ticket: &OrderTicket) -> Result<f64, AdapterError> {
    let result = client.place_order(ticket).await?;
    // IOC orders auto-terminate venue-side; poll once to confirm the
    // terminal fill quantity (§5: "still polls to terminal-confirm").
    let status = client.poll_order(&result.order_id).await?;
    Ok(status.filled_qty)
}
