//! Order book levels and snapshots.

use super::token::{Price, Venue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    /// Cumulative size available at this price or better, in shares.
    pub size: f64,
}

/// A single token's order book at one point in time.
///
/// Invariant: `best_bid < best_ask`; all prices lie on the tick grid
/// (enforced at construction via `Price`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub token_id: String,
    pub venue: Venue,
    /// Descending by price.
    pub bids: Vec<BookLevel>,
    /// Ascending by price.
    pub asks: Vec<BookLevel>,
    pub timestamp_ms: i64,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn is_crossed_or_empty(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b.price.value() >= a.price.value(),
            _ => true,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.timestamp_ms).max(0)
    }

    pub fn is_stale(&self, now_ms: i64, max_age_ms: i64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }
}

/// One scan's worth of book snapshots, stamped with the frame's
/// wall-clock time. Opportunities built from a frame use only that
/// frame's snapshots (§4.C).
#[derive(Debug, Clone)]
pub struct ScanFrame {
    pub frame_time_ms: i64,
    pub books: std::collections::HashMap<String, BookSnapshot>,
}

impl ScanFrame {
    pub fn new(frame_time_ms: i64) -> Self {
        Self {
            frame_time_ms,
            books: std::collections::HashMap::new(),
        }
    }

    pub fn get(&self, token_id: &str) -> Option<&BookSnapshot> {
        self.books.get(token_id)
    }

    pub fn insert(&mut self, snapshot: BookSnapshot) {
        self.books.insert(snapshot.token_id.clone(), snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::Price;

    fn level(p: f64) -> BookLevel {
        BookLevel {
            price: Price::new(p, 0.01).unwrap(),
            size: 100.0,
        }
    }

    #[test]
    fn best_bid_below_best_ask_is_not_crossed() {
        let book = BookSnapshot {
            token_id: "t".into(),
            venue: Venue::Opinion,
            bids: vec![level(0.48)],
            asks: vec![level(0.52)],
            timestamp_ms: 0,
        };
        assert!(!book.is_crossed_or_empty());
    }

    #[test]
    fn empty_side_counts_as_crossed_or_empty() {
        let book = BookSnapshot {
            token_id: "t".into(),
            venue: Venue::Opinion,
            bids: vec![],
            asks: vec![level(0.52)],
            timestamp_ms: 0,
        };
        assert!(book.is_crossed_or_empty());
    }

    #[test]
    fn staleness_uses_max_book_age() {
        let book = BookSnapshot {
            token_id: "t".into(),
            venue: Venue::Opinion,
            bids: vec![level(0.48)],
            asks: vec![level(0.52)],
            timestamp_ms: 1_000,
        };
        assert!(!book.is_stale(2_000, 2_000));
        assert!(book.is_stale(3_001, 2_000));
    }
}
