//! Matched markets — the unit all downstream scanning/execution operates on.

use super::token::Token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A market as discovered from one venue's market list, prior to
/// matching (§4.B step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueMarket {
    pub market_id: String,
    pub title: String,
    pub resolution_date: DateTime<Utc>,
    pub yes_token: Token,
    pub no_token: Token,
    pub closed: bool,
}

/// `(venue_A_token_YES, venue_A_token_NO, venue_B_token_YES, venue_B_token_NO)`
/// bound because they refer to the same real-world question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPair {
    pub pair_id: String,
    pub opinion_yes: Token,
    pub opinion_no: Token,
    pub vantage_yes: Token,
    pub vantage_no: Token,
    pub resolution_date: DateTime<Utc>,
    /// Once bound, a pair is sticky — re-verified each refresh but not
    /// re-matched unless either side's market closes (§4.B step 4).
    pub match_score: f64,
}

impl MarketPair {
    pub fn days_to_resolution(&self, now: DateTime<Utc>) -> f64 {
        let delta = self.resolution_date.signed_duration_since(now);
        let days = delta.num_milliseconds() as f64 / 86_400_000.0;
        if days <= 0.0 {
            1.0
        } else {
            days
        }
    }

    /// The four token ids that make up this pair, for book-fetch fan-out.
    pub fn token_ids(&self) -> [&str; 4] {
        [
            self.opinion_yes.token_id.as_str(),
            self.opinion_no.token_id.as_str(),
            self.vantage_yes.token_id.as_str(),
            self.vantage_no.token_id.as_str(),
        ]
    }
}

/// Combination of complementary outcomes evaluated by the Scanner (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    /// Buy YES on Opinion, buy NO on Vantage.
    OpinionYesVantageNo,
    /// Buy NO on Opinion, buy YES on Vantage.
    OpinionNoVantageYes,
}

impl Combination {
    pub const ALL: [Combination; 2] = [
        Combination::OpinionYesVantageNo,
        Combination::OpinionNoVantageYes,
    ];

    /// (opinion token id, vantage token id) for this combination.
    pub fn tokens<'a>(&self, pair: &'a MarketPair) -> (&'a Token, &'a Token) {
        match self {
            Combination::OpinionYesVantageNo => (&pair.opinion_yes, &pair.vantage_no),
            Combination::OpinionNoVantageYes => (&pair.opinion_no, &pair.vantage_yes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::{Outcome, Venue};
    use chrono::Duration;

    fn token(venue: Venue, outcome: Outcome) -> Token {
        Token::new(venue, "m1", format!("{venue}-{outcome:?}"), outcome, 0.01, 5.0)
    }

    fn sample_pair(resolution_offset_days: i64) -> MarketPair {
        MarketPair {
            pair_id: "p1".into(),
            opinion_yes: token(Venue::Opinion, Outcome::Yes),
            opinion_no: token(Venue::Opinion, Outcome::No),
            vantage_yes: token(Venue::Vantage, Outcome::Yes),
            vantage_no: token(Venue::Vantage, Outcome::No),
            resolution_date: Utc::now() + Duration::days(resolution_offset_days),
            match_score: 0.9,
        }
    }

    #[test]
    fn days_to_resolution_floors_at_one_day_when_past() {
        let pair = sample_pair(-1);
        assert_eq!(pair.days_to_resolution(Utc::now()), 1.0);
    }

    #[test]
    fn days_to_resolution_reflects_future_date() {
        let pair = sample_pair(10);
        let days = pair.days_to_resolution(Utc::now());
        assert!(days > 9.0 && days <= 10.0);
    }

    #[test]
    fn combination_tokens_pick_complementary_outcomes() {
        let pair = sample_pair(5);
        let (a, b) = Combination::OpinionYesVantageNo.tokens(&pair);
        assert_eq!(a.outcome, Outcome::Yes);
        assert_eq!(a.venue, Venue::Opinion);
        assert_eq!(b.outcome, Outcome::No);
        assert_eq!(b.venue, Venue::Vantage);
    }
}
