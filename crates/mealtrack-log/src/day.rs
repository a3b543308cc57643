
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single calendar day, independent of time-of-day and timezone.
/// Renders as zero-padded `YYYY-MM-DD`, so string order equals day order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

#[derive(Debug, Clone, thiserror::Error)]
pub enum DayParseError {
    #[error("InvalidDate: {0}")]
    InvalidDate(#[from] chrono::ParseError),
}

impl DayKey {
    /// Parses a `YYYY-MM-DD` token as plain year/month/day integers.
    /// Nothing timezone-aware is involved, so the day can never drift by
    /// the host's local offset.
    pub fn parse(token: &str) -> Result<Self, DayParseError> {
        Ok(Self(NaiveDate::parse_from_str(token, "%Y-%m-%d")?))
    }

    pub fn today() -> Self {
        Self(chrono::Utc::now().date_naive())
    }

    pub fn next(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    pub fn prev(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // NaiveDate displays as zero-padded %Y-%m-%d
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(token: &str) -> DayKey {
        DayKey::parse(token).expect("valid date token")
    }

    #[test]
    fn tokens_for_the_same_day_normalize_identically() {
        assert_eq!(key("2024-1-5"), key("2024-01-05"));
        assert_eq!(key("2024-1-5").to_string(), "2024-01-05");
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["2024-13-40", "2024-02-30", "banana", "", "05-01-2024", "2024-01-05T10:00:00"] {
            assert!(DayKey::parse(token).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn string_order_matches_chronological_order() {
        let days = ["2023-12-31", "2024-01-01", "2024-02-29", "2024-03-01", "2024-10-09"];
        let keys: Vec<DayKey> = days.iter().map(|d| key(d)).collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_string() < pair[1].to_string());
        }
    }

    #[test]
    fn next_steps_exactly_one_calendar_day() {
        assert_eq!(key("2024-03-01").next(), Some(key("2024-03-02")));
        assert_eq!(key("2023-12-31").next(), Some(key("2024-01-01")));
        assert_eq!(key("2024-02-28").next(), Some(key("2024-02-29")));
        assert_eq!(key("2023-02-28").next(), Some(key("2023-03-01")));
    }

    #[test]
    fn prev_steps_exactly_one_calendar_day() {
        assert_eq!(key("2024-03-01").prev(), Some(key("2024-02-29")));
        assert_eq!(key("2024-01-01").prev(), Some(key("2023-12-31")));
    }
}
