//! Supervisor (§4.H, §5): the main orchestration loop. Owns scan
//! cadence, matcher refresh cadence, dispatch to strategies, global
//! concurrency caps, and the set of in-flight positions.
//!
//! Positions are exclusively owned here; strategies never touch more
//! than the `PositionInFlight`/`LiquidityTicket` handed to them for one
//! call, matching the §5 ordering guarantee ("no two tasks mutate a
//! position in parallel") via a serialized per-ticket state and a
//! broadcast channel for read-only observers (the dashboard bridge).

use crate::domain::{Opportunity, PositionInFlight, StrategyClass};
use crate::matcher::PairRegistry;
use crate::scanner::Scanner;
use crate::strategy::{ImmediateStrategy, LiquidityStrategy, LiquidityTicket, TicketState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, Semaphore};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub enum SupervisorEvent {
    OpportunitiesScanned { count: usize, frame_time_ms: i64 },
    ImmediateExecuted { pair_id: String, balanced: bool, deficit: f64 },
    LiquidityTicketAdvanced { pair_id: String, state: String },
    MatcherHalted { minutes: u64 },
}

pub struct SupervisorConfig {
    pub scan_interval: Duration,
    pub matcher_refresh: Duration,
    pub max_concurrent_immediate: usize,
}

pub struct Supervisor {
    registry: Arc<PairRegistry>,
    fetcher: Arc<crate::fetcher::BookFetcher>,
    scanner: Arc<Scanner>,
    immediate: Arc<ImmediateStrategy>,
    liquidity: Arc<LiquidityStrategy>,
    cfg: SupervisorConfig,
    immediate_permits: Arc<Semaphore>,
    liquidity_tickets: Mutex<HashMap<String, LiquidityTicket>>,
    completed_positions: Mutex<Vec<PositionInFlight>>,
    events: broadcast::Sender<SupervisorEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<PairRegistry>,
        fetcher: Arc<crate::fetcher::BookFetcher>,
        scanner: Arc<Scanner>,
        immediate: Arc<ImmediateStrategy>,
        liquidity: Arc<LiquidityStrategy>,
        cfg: SupervisorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            registry,
            fetcher,
            scanner,
            immediate,
            liquidity,
            cfg,
            immediate_permits: Arc::new(Semaphore::new(cfg_max_concurrent(&cfg))),
            liquidity_tickets: Mutex::new(HashMap::new()),
            completed_positions: Mutex::new(Vec::new()),
            events,
            shutdown,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Runs until the shutdown watch fires. On exit, drains all resting
    /// liquidity tickets (§5 cancellation semantics).
    pub async fn run(&self) -> Result<(), crate::error::EngineError> {
        let mut scan_tick = tokio::time::interval(self.cfg.scan_interval);
        let mut matcher_tick = tokio::time::interval(self.cfg.matcher_refresh);
        let mut shutdown = self.shutdown.clone();

        // Prime the pair registry before the first scan.
        if let Err(err) = self.registry.refresh().await {
            self.handle_matcher_error(&err);
            if matches!(err, crate::error::EngineError::BothVenuesDown { .. }) {
                return Err(err);
            }
        }

        loop {
            tokio::select! {
                _ = scan_tick.tick() => {
                    self.run_one_scan().await;
                }
                _ = matcher_tick.tick() => {
                    if let Err(err) = self.registry.refresh().await {
                        self.handle_matcher_error(&err);
                        if matches!(err, crate::error::EngineError::BothVenuesDown { .. }) {
                            self.drain_liquidity_tickets().await;
                            return Err(err);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        info!("shutdown signal received, draining");
                        self.drain_liquidity_tickets().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_matcher_error(&self, err: &crate::error::EngineError) {
        if let crate::error::EngineError::BothVenuesDown { minutes } = err {
            let _ = self.events.send(SupervisorEvent::MatcherHalted { minutes: *minutes });
        }
    }

    async fn run_one_scan(&self) {
        let pairs = self.registry.current();
        let mut tokens_by_venue: HashMap<crate::domain::Venue, Vec<String>> = HashMap::new();
        for pair in pairs.iter() {
            tokens_by_venue
                .entry(crate::domain::Venue::Opinion)
                .or_default()
                .extend([pair.opinion_yes.token_id.clone(), pair.opinion_no.token_id.clone()]);
            tokens_by_venue
                .entry(crate::domain::Venue::Vantage)
                .or_default()
                .extend([pair.vantage_yes.token_id.clone(), pair.vantage_no.token_id.clone()]);
        }

        let frame = self.fetcher.fetch_frame(&tokens_by_venue).await;
        let opportunities = self.scanner.scan(&frame, &pairs);
        let _ = self.events.send(SupervisorEvent::OpportunitiesScanned {
            count: opportunities.len(),
            frame_time_ms: frame.frame_time_ms,
        });

        for opportunity in &opportunities {
            if opportunity.suspicious {
                warn!(
                    pair_id = %opportunity.pair_id,
                    "edge > immediate_max_edge_pct, skipping"
                );
                continue;
            }

            match opportunity.strategy {
                Some(StrategyClass::Immediate) => self.dispatch_immediate(opportunity.clone()),
                Some(StrategyClass::Liquidity) => self.dispatch_liquidity(opportunity).await,
                None => {}
            }
        }

        self.advance_idle_liquidity_tickets(&opportunities).await;
    }

    fn dispatch_immediate(&self, opportunity: Opportunity) {
        let permits = self.immediate_permits.clone();
        let immediate = self.immediate.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.try_acquire_owned() else {
                // §4.F step 1: at most K_immediate run in parallel; drop
                // this one rather than queue — the next scan will
                // re-emit it if it's still there.
                return;
            };
            if let Some(outcome) = immediate.execute(&opportunity).await {
                let balanced = outcome.position.is_balanced(0.01);
                let _ = events.send(SupervisorEvent::ImmediateExecuted {
                    pair_id: opportunity.pair_id.clone(),
                    balanced,
                    deficit: outcome.deficit_after_reconciliation,
                });
                if !balanced {
                    error!(
                        pair_id = %opportunity.pair_id,
                        deficit = outcome.deficit_after_reconciliation,
                        "immediate execution left residual exposure"
                    );
                }
            }
        });
    }

    async fn dispatch_liquidity(&self, opportunity: &Opportunity) {
        let key = ticket_key(opportunity);
        let mut tickets = self.liquidity_tickets.lock().await;
        let ticket = tickets.entry(key).or_insert_with(|| {
            // §4.G: rest on whichever venue currently has the better
            // queue position — here, the shallower depth, mirroring the
            // Immediate strategy's first-leg choice (§4.F step 2).
            let rest_on_opinion = opportunity.depth_opinion <= opportunity.depth_vantage;
            LiquidityTicket::new(opportunity, rest_on_opinion, opportunity.quantity_cap)
        });
        self.liquidity.on_scan(ticket, Some(opportunity)).await;
        let _ = self.events.send(SupervisorEvent::LiquidityTicketAdvanced {
            pair_id: opportunity.pair_id.clone(),
            state: format!("{:?}", ticket.state),
        });
    }

    /// Tickets whose pair/combination no longer appears in this frame
    /// still need to be driven (e.g. RESTING with no fresh opportunity
    /// should reprice/cancel per §4.G's edge-collapse path).
    async fn advance_idle_liquidity_tickets(&self, opportunities: &[Opportunity]) {
        let seen: std::collections::HashSet<String> =
            opportunities.iter().map(ticket_key).collect();
        let mut tickets = self.liquidity_tickets.lock().await;
        let stale_keys: Vec<String> = tickets
            .iter()
            .filter(|(k, t)| !seen.contains(*k) && !matches!(t.state, TicketState::Idle | TicketState::Done))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale_keys {
            if let Some(ticket) = tickets.get_mut(&key) {
                self.liquidity.on_scan(ticket, None).await;
            }
        }
        tickets.retain(|_, t| t.state != TicketState::Done);
    }

    async fn drain_liquidity_tickets(&self) {
        let mut tickets = self.liquidity_tickets.lock().await;
        for ticket in tickets.values_mut() {
            self.liquidity.cancel_and_drain(ticket).await;
        }
    }
}

fn ticket_key(opportunity: &Opportunity) -> String {
    format!("{}:{}", opportunity.pair_id, opportunity.combination_label)
}

fn cfg_max_concurrent(cfg: &SupervisorConfig) -> usize {
    cfg.max_concurrent_immediate.max(1)
}
