//! Trade log (§6): the engine's only persisted state across restarts —
//! an append-only JSON-lines file, one record per executed leg.
//!
//! Grounded on `signals/storage.rs`'s buffered-store shape, generalized
//! from an in-memory ring buffer to a file-backed append log since the
//! trade log must survive process restarts, and extended with an
//! in-memory mode for tests that mirrors `SignalStorage::get_recent`.

use crate::domain::{OrderState, OrderTicket, Venue};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub opportunity_id: String,
    pub venue: Venue,
    pub token_id: String,
    pub side: crate::domain::Side,
    pub order_qty: f64,
    pub limit_price: f64,
    pub filled_qty: f64,
    pub avg_fill_price: Option<f64>,
    pub fee: f64,
    pub state: OrderState,
}

impl TradeLogEntry {
    pub fn from_ticket(opportunity_id: &str, ticket: &OrderTicket) -> Self {
        let fee = ticket.order_qty - ticket.filled_qty.min(ticket.order_qty);
        Self {
            timestamp: chrono::Utc::now(),
            opportunity_id: opportunity_id.to_string(),
            venue: ticket.venue,
            token_id: ticket.token_id.clone(),
            side: ticket.side,
            order_qty: ticket.order_qty,
            limit_price: ticket.limit_price.value(),
            filled_qty: ticket.filled_qty,
            avg_fill_price: ticket.avg_fill_price,
            fee,
            state: ticket.state,
        }
    }
}

enum Sink {
    File(Mutex<std::fs::File>),
    Memory(Mutex<Vec<TradeLogEntry>>),
}

pub struct TradeLog {
    sink: Sink,
}

impl TradeLog {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path.into())?;
        Ok(Self {
            sink: Sink::File(Mutex::new(file)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }
    }

    pub fn append(&self, entry: TradeLogEntry) {
        match &self.sink {
            Sink::File(file) => {
                let line = match serde_json::to_string(&entry) {
                    Ok(l) => l,
                    Err(err) => {
                        error!("failed to serialize trade log entry: {err}");
                        return;
                    }
                };
                let mut file = file.lock().unwrap();
                if let Err(err) = writeln!(file, "{line}") {
                    warn!("failed to append to trade log: {err}");
                }
            }
            Sink::Memory(entries) => {
                entries.lock().unwrap().push(entry);
            }
        }
    }

    /// Test/inspection hook — only meaningful for `in_memory` logs.
    pub fn entries(&self) -> Vec<TradeLogEntry> {
        match &self.sink {
            Sink::Memory(entries) => entries.lock().unwrap().clone(),
            Sink::File(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Price, Side, TimeInForce};

    fn ticket() -> OrderTicket {
        let mut t = OrderTicket::new(
            Venue::Opinion,
            "tok",
            Side::Buy,
            100.0,
            105.0,
            Price::new(0.5, 0.01).unwrap(),
            TimeInForce::Ioc,
        );
        t.filled_qty = 100.0;
        t.state = OrderState::Filled;
        t
    }

    #[test]
    fn in_memory_log_accumulates_entries() {
        let log = TradeLog::in_memory();
        log.append(TradeLogEntry::from_ticket("opp1", &ticket()));
        log.append(TradeLogEntry::from_ticket("opp1", &ticket()));
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn file_backed_log_appends_one_json_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let log = TradeLog::open(&path).unwrap();
        log.append(TradeLogEntry::from_ticket("opp1", &ticket()));
        log.append(TradeLogEntry::from_ticket("opp2", &ticket()));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("opportunity_id").is_some());
        }
    }
}
