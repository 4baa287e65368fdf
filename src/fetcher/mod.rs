//! Book Fetcher (§4.C): rate-limited, batched order-book retrieval that
//! publishes one consistent scan frame per cycle.

use crate::domain::{BookSnapshot, ScanFrame, Venue};
use crate::venues::VenueClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub struct FetcherConfig {
    pub batch_size: usize,
    pub max_book_age_ms: i64,
    pub opinion_max_concurrent: usize,
    pub vantage_max_concurrent: usize,
    pub book_fetch_timeout: Duration,
}

pub struct BookFetcher {
    opinion: Arc<dyn VenueClient>,
    vantage: Arc<dyn VenueClient>,
    cfg: FetcherConfig,
}

impl BookFetcher {
    pub fn new(opinion: Arc<dyn VenueClient>, vantage: Arc<dyn VenueClient>, cfg: FetcherConfig) -> Self {
        Self { opinion, vantage, cfg }
    }

    /// Fetches all tokens in `tokens_by_venue`, partitioned into
    /// batches of `batch_size`, dispatched concurrently up to
    /// `⌈rate⌉` in-flight per venue. Batches that don't complete
    /// within the fetch timeout are dropped rather than blocking the
    /// whole frame; snapshots older than `max_book_age_ms` relative to
    /// the frame's own timestamp are dropped as stale.
    pub async fn fetch_frame(&self, tokens_by_venue: &HashMap<Venue, Vec<String>>) -> ScanFrame {
        let frame_time_ms = chrono::Utc::now().timestamp_millis();
        let mut frame = ScanFrame::new(frame_time_ms);

        let opinion_tokens = tokens_by_venue.get(&Venue::Opinion).cloned().unwrap_or_default();
        let vantage_tokens = tokens_by_venue.get(&Venue::Vantage).cloned().unwrap_or_default();

        let (opinion_books, vantage_books) = tokio::join!(
            self.fetch_venue(self.opinion.as_ref(), &opinion_tokens, self.cfg.opinion_max_concurrent),
            self.fetch_venue(self.vantage.as_ref(), &vantage_tokens, self.cfg.vantage_max_concurrent),
        );

        for (token_id, snapshot) in opinion_books.into_iter().chain(vantage_books) {
            if snapshot.is_stale(frame_time_ms, self.cfg.max_book_age_ms) {
                debug!(token_id, "dropping stale book from scan frame");
                continue;
            }
            frame.insert(snapshot);
        }

        frame
    }

    async fn fetch_venue(
        &self,
        client: &dyn VenueClient,
        tokens: &[String],
        max_concurrent: usize,
    ) -> HashMap<String, BookSnapshot> {
        if tokens.is_empty() {
            return HashMap::new();
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let batches: Vec<Vec<String>> = tokens
            .chunks(self.cfg.batch_size.max(1))
            .map(|c| c.to_vec())
            .collect();

        let mut tasks = Vec::with_capacity(batches.len());
        for batch in batches {
            let semaphore = semaphore.clone();
            let timeout = self.cfg.book_fetch_timeout;
            // SAFETY-free note: `client` outlives this function call
            // (owned by the Supervisor for the process lifetime), so a
            // raw borrow across the spawned future would require a
            // lifetime we don't have here; instead batches run as local
            // futures joined together; no task boundary is crossed.
            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                match tokio::time::timeout(timeout, client.get_books_batch(&batch)).await {
                    Ok(Ok(books)) => books,
                    Ok(Err(err)) => {
                        warn!(venue = client.name(), "book batch fetch failed: {err}");
                        HashMap::new()
                    }
                    Err(_) => {
                        warn!(venue = client.name(), "book batch fetch timed out, dropping stragglers");
                        HashMap::new()
                    }
                }
            });
        }

        let results = futures_util::future::join_all(tasks).await;
        let mut merged = HashMap::new();
        for books in results {
            merged.extend(books);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookLevel, Price};
    use crate::error::AdapterError;
    use crate::venues::{
        Balances, CancelResult, MarketPage, MarketStatusFilter, OrderResult, OrderStatus,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClient {
        name: &'static str,
        call_count: AtomicUsize,
        latency: Duration,
    }

    #[async_trait]
    impl VenueClient for StubClient {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn list_markets(
            &self,
            _status: MarketStatusFilter,
            _cursor: Option<String>,
        ) -> Result<MarketPage, AdapterError> {
            unimplemented!()
        }

        async fn get_book(&self, _token_id: &str) -> Result<BookSnapshot, AdapterError> {
            unimplemented!()
        }

        async fn get_books_batch(
            &self,
            token_ids: &[String],
        ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            let now = chrono::Utc::now().timestamp_millis();
            Ok(token_ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        BookSnapshot {
                            token_id: id.clone(),
                            venue: Venue::Opinion,
                            bids: vec![BookLevel {
                                price: Price::new(0.40, 0.01).unwrap(),
                                size: 100.0,
                            }],
                            asks: vec![BookLevel {
                                price: Price::new(0.41, 0.01).unwrap(),
                                size: 100.0,
                            }],
                            timestamp_ms: now,
                        },
                    )
                })
                .collect())
        }

        async fn place_order(
            &self,
            _ticket: &crate::domain::OrderTicket,
        ) -> Result<OrderResult, AdapterError> {
            unimplemented!()
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, AdapterError> {
            unimplemented!()
        }

        async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, AdapterError> {
            unimplemented!()
        }

        async fn get_balances(&self) -> Result<Balances, AdapterError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn fetch_frame_batches_and_merges_results() {
        let opinion = Arc::new(StubClient {
            name: "opinion",
            call_count: AtomicUsize::new(0),
            latency: Duration::from_millis(1),
        });
        let vantage = Arc::new(StubClient {
            name: "vantage",
            call_count: AtomicUsize::new(0),
            latency: Duration::from_millis(1),
        });

        let fetcher = BookFetcher::new(
            opinion.clone(),
            vantage.clone(),
            FetcherConfig {
                batch_size: 2,
                max_book_age_ms: 2000,
                opinion_max_concurrent: 4,
                vantage_max_concurrent: 4,
                book_fetch_timeout: Duration::from_secs(2),
            },
        );

        let mut tokens = HashMap::new();
        tokens.insert(
            Venue::Opinion,
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        tokens.insert(Venue::Vantage, vec!["d".to_string()]);

        let frame = fetcher.fetch_frame(&tokens).await;
        assert_eq!(frame.books.len(), 4);
        // Three opinion tokens at batch size 2 => two batches.
        assert_eq!(opinion.call_count.load(Ordering::SeqCst), 2);
        assert_eq!(vantage.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_books_are_dropped_from_the_frame() {
        struct StaleClient;
        #[async_trait]
        impl VenueClient for StaleClient {
            fn name(&self) -> &'static str {
                "opinion"
            }
            async fn list_markets(
                &self,
                _status: MarketStatusFilter,
                _cursor: Option<String>,
            ) -> Result<MarketPage, AdapterError> {
                unimplemented!()
            }
            async fn get_book(&self, _token_id: &str) -> Result<BookSnapshot, AdapterError> {
                unimplemented!()
            }
            async fn get_books_batch(
                &self,
                token_ids: &[String],
            ) -> Result<HashMap<String, BookSnapshot>, AdapterError> {
                let stale_ts = chrono::Utc::now().timestamp_millis() - 10_000;
                Ok(token_ids
                    .iter()
                    .map(|id| {
                        (
                            id.clone(),
                            BookSnapshot {
                                token_id: id.clone(),
                                venue: Venue::Opinion,
                                bids: vec![],
                                asks: vec![],
                                timestamp_ms: stale_ts,
                            },
                        )
                    })
                    .collect())
            }
            async fn place_order(
                &self,
                _ticket: &crate::domain::OrderTicket,
            ) -> Result<OrderResult, AdapterError> {
                unimplemented!()
            }
            async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, AdapterError> {
                unimplemented!()
            }
            async fn poll_order(&self, _order_id: &str) -> Result<OrderStatus, AdapterError> {
                unimplemented!()
            }
            async fn get_balances(&self) -> Result<Balances, AdapterError> {
                unimplemented!()
            }
        }

        let opinion = Arc::new(StaleClient);
        let vantage = Arc::new(StaleClient);
        let fetcher = BookFetcher::new(
            opinion,
            vantage,
            FetcherConfig {
                batch_size: 20,
                max_book_age_ms: 2000,
                opinion_max_concurrent: 4,
                vantage_max_concurrent: 4,
                book_fetch_timeout: Duration::from_secs(2),
            },
        );

        let mut tokens = HashMap::new();
        tokens.insert(Venue::Opinion, vec!["a".to_string()]);
        let frame = fetcher.fetch_frame(&tokens).await;
        assert!(frame.books.is_empty());
    }
}
