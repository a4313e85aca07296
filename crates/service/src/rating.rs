//! Rating aggregation and the per-rater upsert rules.
//!
//! Restaurants and waiters deliberately keep different duplicate policies:
//! a second restaurant rating from the same user is refused, while a second
//! waiter rating replaces the first. Both policies are named here so callers
//! pick one explicitly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use models::rating::{Rating, MAX_SCORE};

use crate::errors::ServiceError;

/// What to do when the rater already has a record on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingPolicy {
    /// Fail with `DuplicateRating`; used for restaurants.
    RejectDuplicate,
    /// Replace score and timestamp in place; used for waiters.
    Overwrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingOutcome {
    Inserted,
    Updated,
}

/// Apply one rating to a target's sequence. The rater appears at most once afterwards.
pub fn apply_rating(
    ratings: &mut Vec<Rating>,
    rater: Uuid,
    score: u8,
    now: DateTime<Utc>,
    policy: RatingPolicy,
) -> Result<RatingOutcome, ServiceError> {
    if score > MAX_SCORE {
        return Err(ServiceError::Validation(format!("rating must be between 0 and {MAX_SCORE}")));
    }
    match (ratings.iter_mut().find(|r| r.rated_by == rater), policy) {
        (Some(_), RatingPolicy::RejectDuplicate) => Err(ServiceError::DuplicateRating),
        (Some(existing), RatingPolicy::Overwrite) => {
            existing.score = score;
            existing.rated_at = now;
            Ok(RatingOutcome::Updated)
        }
        (None, _) => {
            ratings.push(Rating { score, rated_by: rater, rated_at: now });
            Ok(RatingOutcome::Inserted)
        }
    }
}

/// Parse a score taken from a URL segment or form field.
pub fn parse_score(raw: &str) -> Result<u8, ServiceError> {
    let trimmed = raw.trim();
    let value: u32 = trimmed
        .parse()
        .map_err(|_| ServiceError::Validation(format!("rating must be a whole number, got {trimmed:?}")))?;
    if value > MAX_SCORE as u32 {
        return Err(ServiceError::Validation(format!("rating must be between 0 and {MAX_SCORE}")));
    }
    Ok(value as u8)
}

/// Average of a rating sequence, or the "no ratings" sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AverageRating {
    Score(u32),
    NoRatings,
}

impl AverageRating {
    pub fn score(&self) -> Option<u32> {
        match self {
            AverageRating::Score(s) => Some(*s),
            AverageRating::NoRatings => None,
        }
    }
}

impl fmt::Display for AverageRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageRating::Score(s) => write!(f, "{} / {}", s, MAX_SCORE),
            AverageRating::NoRatings => f.write_str("No ratings yet"),
        }
    }
}

impl Serialize for AverageRating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `round(sum / count)`, halves rounded up.
pub fn average(ratings: &[Rating]) -> AverageRating {
    if ratings.is_empty() {
        return AverageRating::NoRatings;
    }
    let n = ratings.len() as u64;
    let sum: u64 = ratings.iter().map(|r| r.score as u64).sum();
    AverageRating::Score(((2 * sum + n) / (2 * n)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings_of(scores: &[u8]) -> Vec<Rating> {
        scores
            .iter()
            .map(|&score| Rating { score, rated_by: Uuid::new_v4(), rated_at: Utc::now() })
            .collect()
    }

    #[test]
    fn average_matches_rounded_mean() {
        let cases: &[&[u8]] = &[&[80], &[1, 2], &[0, 100], &[70, 71, 71], &[33, 33, 34], &[99, 100, 100, 100], &[5, 6, 6, 6, 6, 6]];
        for scores in cases {
            let expected = (scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64).round() as u32;
            assert_eq!(average(&ratings_of(scores)), AverageRating::Score(expected), "scores {scores:?}");
        }
    }

    #[test]
    fn half_rounds_up() {
        assert_eq!(average(&ratings_of(&[1, 2])), AverageRating::Score(2));
        assert_eq!(average(&ratings_of(&[0, 1])), AverageRating::Score(1));
    }

    #[test]
    fn empty_is_sentinel() {
        let avg = average(&[]);
        assert_eq!(avg, AverageRating::NoRatings);
        assert_eq!(avg.to_string(), "No ratings yet");
        assert_eq!(avg.score(), None);
    }

    #[test]
    fn display_carries_unit_label() {
        assert_eq!(AverageRating::Score(80).to_string(), "80 / 100");
        assert_eq!(serde_json::to_value(AverageRating::Score(80)).unwrap(), "80 / 100");
    }

    #[test]
    fn overwrite_keeps_single_record_with_latest_values() {
        let rater = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut seq = ratings_of(&[50]);
        seq[0].rated_by = other;

        let t1 = Utc::now();
        assert_eq!(apply_rating(&mut seq, rater, 70, t1, RatingPolicy::Overwrite).unwrap(), RatingOutcome::Inserted);
        let t2 = t1 + chrono::Duration::seconds(5);
        assert_eq!(apply_rating(&mut seq, rater, 90, t2, RatingPolicy::Overwrite).unwrap(), RatingOutcome::Updated);
        let t3 = t2 + chrono::Duration::seconds(5);
        apply_rating(&mut seq, rater, 40, t3, RatingPolicy::Overwrite).unwrap();

        let mine: Vec<_> = seq.iter().filter(|r| r.rated_by == rater).collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].score, 40);
        assert_eq!(mine[0].rated_at, t3);
        // position of the original record is kept
        assert_eq!(seq[0].rated_by, other);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn reject_policy_leaves_sequence_unchanged() {
        let rater = Uuid::new_v4();
        let mut seq = Vec::new();
        apply_rating(&mut seq, rater, 80, Utc::now(), RatingPolicy::RejectDuplicate).unwrap();
        let before = seq.clone();

        let err = apply_rating(&mut seq, rater, 60, Utc::now(), RatingPolicy::RejectDuplicate).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRating));
        assert_eq!(seq, before);
        assert_eq!(average(&seq), AverageRating::Score(80));
    }

    #[test]
    fn out_of_range_score_rejected_before_mutation() {
        let mut seq = Vec::new();
        assert!(matches!(
            apply_rating(&mut seq, Uuid::new_v4(), 101, Utc::now(), RatingPolicy::Overwrite),
            Err(ServiceError::Validation(_))
        ));
        assert!(seq.is_empty());
    }

    #[test]
    fn parse_score_accepts_range_only() {
        assert_eq!(parse_score("0").unwrap(), 0);
        assert_eq!(parse_score(" 100 ").unwrap(), 100);
        for bad in ["101", "-1", "abc", "", "7.5", "99999999999"] {
            assert!(matches!(parse_score(bad), Err(ServiceError::Validation(_))), "{bad}");
        }
    }
}
