//! Core identifiers: venues, outcome tokens, and validated prices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two venues the engine trades across.
///
/// Opinion charges a per-trade fee curve (§4.D); Vantage charges no
/// order-side fee in this model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Opinion,
    Vantage,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Opinion => "opinion",
            Venue::Vantage => "vantage",
        }
    }

    pub fn other(&self) -> Venue {
        match self {
            Venue::Opinion => Venue::Vantage,
            Venue::Vantage => Venue::Opinion,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn complement(&self) -> Outcome {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

/// A price on the `[0, 1]` tick grid, validated at construction.
///
/// Prices are rational numbers with at most three decimal places; the
/// grid step is the token's `tick_size`. Constructing a `Price` off the
/// grid or outside `[0, 1]` is a `ValidationError`, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price(f64);

impl Price {
    /// Number of decimal places the engine preserves when normalizing
    /// venue-native price strings. See §3: "at most three decimal places."
    pub const DECIMALS: u32 = 3;

    pub fn new(value: f64, tick_size: f64) -> Result<Self, crate::error::ValidationError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(crate::error::ValidationError::PriceOutOfRange(value));
        }
        if tick_size > 0.0 {
            let ticks = value / tick_size;
            let rounded = ticks.round();
            if (ticks - rounded).abs() > 1e-6 {
                return Err(crate::error::ValidationError::OffGrid { value, tick_size });
            }
        }
        Ok(Price(round_to_decimals(value, Self::DECIMALS)))
    }

    /// Construct without grid validation — used for derived values
    /// (effective costs, hedge-offer prices) that are not literal book
    /// levels and therefore need not sit on the venue's tick grid.
    pub fn raw(value: f64) -> Self {
        Price(round_to_decimals(value.clamp(0.0, 1.0), Self::DECIMALS))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// One outcome token, on one venue, for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub venue: Venue,
    pub market_id: String,
    pub token_id: String,
    pub outcome: Outcome,
    pub tick_size: f64,
    pub min_order_size: f64,
}

impl Token {
    pub fn new(
        venue: Venue,
        market_id: impl Into<String>,
        token_id: impl Into<String>,
        outcome: Outcome,
        tick_size: f64,
        min_order_size: f64,
    ) -> Self {
        Self {
            venue,
            market_id: market_id.into(),
            token_id: token_id.into(),
            outcome,
            tick_size,
            min_order_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_on_grid_accepted() {
        let p = Price::new(0.55, 0.01).unwrap();
        assert!((p.value() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn price_off_grid_rejected() {
        let err = Price::new(0.5551, 0.01).unwrap_err();
        assert!(matches!(err, crate::error::ValidationError::OffGrid { .. }));
    }

    #[test]
    fn price_out_of_range_rejected() {
        assert!(Price::new(1.2, 0.01).is_err());
        assert!(Price::new(-0.1, 0.01).is_err());
    }

    #[test]
    fn round_trip_normalization() {
        // to_price(from_price(x)) == x per §8 round-trip law.
        let raw = "0.473";
        let parsed: f64 = raw.parse().unwrap();
        let price = Price::new(parsed, 0.001).unwrap();
        assert_eq!(format!("{}", price), raw);
    }

    #[test]
    fn outcome_complement_is_involution() {
        assert_eq!(Outcome::Yes.complement(), Outcome::No);
        assert_eq!(Outcome::No.complement().complement(), Outcome::No);
    }
}
