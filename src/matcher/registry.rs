//! Matched-pair registry (§4.B): the Matcher's sole owned state.
//!
//! Publishes an immutable snapshot via `arc-swap` so the Scanner never
//! observes a partially-rebuilt pair set — generalizing the "refresh
//! atomically, readers hold a reference for the scan" ownership rule
//! from the arbitrage engine's `RwLock<RiskManager>` pattern
//! (`arbitrage/engine.rs`) into a lock-free swap, since pair refresh is
//! infrequent (every 5 minutes) relative to scan reads (every 500 ms).

use super::similarity::{title_similarity, within_resolution_window};
use crate::domain::{Combination, MarketPair, VenueMarket};
use crate::error::EngineError;
use crate::venues::{MarketStatusFilter, VenueClient};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub struct MatcherConfig {
    pub title_similarity_threshold: f64,
    pub max_resolution_date_delta_hours: i64,
    pub both_venues_down_halt_minutes: u64,
}

struct StickyBinding {
    pair_id: String,
    vantage_market_id: String,
    score: f64,
}

pub struct PairRegistry {
    opinion: Arc<dyn VenueClient>,
    vantage: Arc<dyn VenueClient>,
    cfg: MatcherConfig,
    snapshot: ArcSwap<Vec<MarketPair>>,
    sticky: Mutex<HashMap<String, StickyBinding>>,
    both_down_since: Mutex<Option<Instant>>,
}

impl PairRegistry {
    pub fn new(opinion: Arc<dyn VenueClient>, vantage: Arc<dyn VenueClient>, cfg: MatcherConfig) -> Self {
        Self {
            opinion,
            vantage,
            cfg,
            snapshot: ArcSwap::from_pointee(Vec::new()),
            sticky: Mutex::new(HashMap::new()),
            both_down_since: Mutex::new(None),
        }
    }

    /// Read-only snapshot of the current pair set. Consumers hold this
    /// reference for the duration of one scan; it is never mutated.
    pub fn current(&self) -> Arc<Vec<MarketPair>> {
        self.snapshot.load_full()
    }

    /// §4.B(1): refresh each venue's market list and rebuild the pair
    /// set. Failures on one or both venues preserve the existing
    /// snapshot; if both have failed continuously for longer than
    /// `both_venues_down_halt_minutes`, returns `BothVenuesDown`.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        let opinion_markets = self.fetch_all(self.opinion.as_ref()).await;
        let vantage_markets = self.fetch_all(self.vantage.as_ref()).await;

        match (&opinion_markets, &vantage_markets) {
            (Err(_), Err(_)) => {
                let mut since = self.both_down_since.lock().await;
                let first_failure = *since.get_or_insert_with(Instant::now);
                let elapsed = first_failure.elapsed();
                warn!(elapsed_secs = elapsed.as_secs(), "both venues failed market refresh");
                if elapsed >= Duration::from_secs(self.cfg.both_venues_down_halt_minutes * 60) {
                    return Err(EngineError::BothVenuesDown {
                        minutes: elapsed.as_secs() / 60,
                    });
                }
                return Ok(());
            }
            _ => {
                *self.both_down_since.lock().await = None;
            }
        }

        let opinion_markets = match opinion_markets {
            Ok(m) => m,
            Err(e) => {
                warn!("Opinion market refresh failed, keeping existing pairs: {e}");
                return Ok(());
            }
        };
        let vantage_markets = match vantage_markets {
            Ok(m) => m,
            Err(e) => {
                warn!("Vantage market refresh failed, keeping existing pairs: {e}");
                return Ok(());
            }
        };

        let pairs = self.rebuild_pairs(opinion_markets, vantage_markets).await;
        info!(count = pairs.len(), "matcher refreshed pair snapshot");
        self.snapshot.store(Arc::new(pairs));
        Ok(())
    }

    async fn fetch_all(&self, client: &dyn VenueClient) -> Result<Vec<VenueMarket>, crate::error::AdapterError> {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = client.list_markets(MarketStatusFilter::Active, cursor).await?;
            out.extend(page.markets.into_iter().map(|m| VenueMarket {
                market_id: m.market_id.clone(),
                title: m.title,
                resolution_date: m.resolution_date,
                yes_token: crate::domain::Token::new(
                    venue_of(client),
                    m.market_id.clone(),
                    m.yes_token_id,
                    crate::domain::Outcome::Yes,
                    m.tick_size,
                    m.min_order_size,
                ),
                no_token: crate::domain::Token::new(
                    venue_of(client),
                    m.market_id.clone(),
                    m.no_token_id,
                    crate::domain::Outcome::No,
                    m.tick_size,
                    m.min_order_size,
                ),
                closed: m.closed,
            }));
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(out)
    }

    async fn rebuild_pairs(
        &self,
        opinion_markets: Vec<VenueMarket>,
        vantage_markets: Vec<VenueMarket>,
    ) -> Vec<MarketPair> {
        let mut sticky = self.sticky.lock().await;
        let vantage_by_id: HashMap<&str, &VenueMarket> =
            vantage_markets.iter().map(|m| (m.market_id.as_str(), m)).collect();

        let mut pairs = Vec::new();

        for opinion_market in &opinion_markets {
            if opinion_market.closed {
                sticky.remove(&opinion_market.market_id);
                continue;
            }

            let binding = sticky.get(&opinion_market.market_id);
            let matched_vantage = if let Some(binding) = binding {
                // Sticky: re-verify, don't re-match, unless the bound
                // market closed. Reuses the binding's `pair_id` so a
                // continuously-matched pair keeps the same identity
                // across refreshes.
                vantage_by_id
                    .get(binding.vantage_market_id.as_str())
                    .filter(|m| !m.closed)
                    .map(|m| (*m, binding.score, binding.pair_id.clone()))
            } else {
                None
            };

            let (vantage_market, score, pair_id) = match matched_vantage {
                Some(found) => found,
                None => match self.best_candidate(opinion_market, &vantage_markets) {
                    Some((vantage_market, score)) => {
                        let pair_id = Uuid::new_v4().to_string();
                        sticky.insert(
                            opinion_market.market_id.clone(),
                            StickyBinding {
                                pair_id: pair_id.clone(),
                                vantage_market_id: vantage_market.market_id.clone(),
                                score,
                            },
                        );
                        (vantage_market, score, pair_id)
                    }
                    None => continue,
                },
            };

            pairs.push(MarketPair {
                pair_id,
                opinion_yes: opinion_market.yes_token.clone(),
                opinion_no: opinion_market.no_token.clone(),
                vantage_yes: vantage_market.yes_token.clone(),
                vantage_no: vantage_market.no_token.clone(),
                resolution_date: opinion_market.resolution_date,
                match_score: score,
            });
        }

        pairs
    }

    /// §4.B(2)(3): best candidate by combined score; ties broken by
    /// earlier resolution date.
    fn best_candidate<'a>(
        &self,
        opinion_market: &VenueMarket,
        vantage_markets: &'a [VenueMarket],
    ) -> Option<(&'a VenueMarket, f64)> {
        vantage_markets
            .iter()
            .filter(|v| !v.closed)
            .filter_map(|v| {
                if !within_resolution_window(
                    opinion_market.resolution_date,
                    v.resolution_date,
                    self.cfg.max_resolution_date_delta_hours,
                ) {
                    return None;
                }
                let score = title_similarity(&opinion_market.title, &v.title);
                if score >= self.cfg.title_similarity_threshold {
                    Some((v, score))
                } else {
                    None
                }
            })
            .max_by(|(va, sa), (vb, sb)| {
                sa.partial_cmp(sb)
                    .unwrap()
                    .then(vb.resolution_date.cmp(&va.resolution_date))
            })
    }
}

fn venue_of(client: &dyn VenueClient) -> crate::domain::Venue {
    match client.name() {
        "opinion" => crate::domain::Venue::Opinion,
        _ => crate::domain::Venue::Vantage,
    }
}

/// All complementary combinations a matched pair supports (§4.E).
pub fn combinations() -> [Combination; 2] {
    Combination::ALL
}
