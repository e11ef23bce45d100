use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One state of the quarter navigator. `months` always holds the three
/// zero-based month indices of the quarter; navigation is unbounded in
/// both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuarterInfo {
    pub label: String,
    pub year: i32,
    pub quarter: u32,
    pub months: [u32; 3],
}

impl QuarterInfo {
    /// `quarter` must be in 1..=4; both navigation and parsing only
    /// ever produce values in that range.
    #[must_use]
    pub fn new(year: i32, quarter: u32) -> Self {
        debug_assert!((1..=4).contains(&quarter));
        let base = (quarter - 1) * 3;
        Self {
            label: format!("Q{quarter} {year}"),
            year,
            quarter,
            months: [base, base + 1, base + 2],
        }
    }

    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month0() / 3 + 1)
    }

    #[must_use]
    pub fn next(&self) -> Self {
        if self.quarter >= 4 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.quarter + 1)
        }
    }

    #[must_use]
    pub fn previous(&self) -> Self {
        if self.quarter <= 1 {
            Self::new(self.year - 1, 4)
        } else {
            Self::new(self.year, self.quarter - 1)
        }
    }

    /// Compact form used for persistence and CLI arguments ("2024-Q3").
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }

    pub fn parse_key(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (year, rest) = trimmed.split_once(['-', 'q', 'Q'])?;
        let year: i32 = year.parse().ok()?;
        let quarter: u32 = rest.trim_start_matches(['q', 'Q']).parse().ok()?;
        if (1..=4).contains(&quarter) {
            Some(Self::new(year, quarter))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::QuarterInfo;

    #[test]
    fn months_are_the_three_indices_of_the_quarter() {
        assert_eq!(QuarterInfo::new(2024, 1).months, [0, 1, 2]);
        assert_eq!(QuarterInfo::new(2024, 3).months, [6, 7, 8]);
        assert_eq!(QuarterInfo::new(2024, 4).months, [9, 10, 11]);
    }

    #[test]
    fn next_rolls_q4_into_the_following_year() {
        let q4 = QuarterInfo::new(2024, 4);
        let next = q4.next();
        assert_eq!((next.year, next.quarter), (2025, 1));
    }

    #[test]
    fn previous_rolls_q1_into_the_prior_year() {
        let q1 = QuarterInfo::new(2024, 1);
        let prev = q1.previous();
        assert_eq!((prev.year, prev.quarter), (2023, 4));
    }

    #[test]
    fn mid_year_navigation_keeps_the_year() {
        let q2 = QuarterInfo::new(2024, 2);
        assert_eq!((q2.next().year, q2.next().quarter), (2024, 3));
        assert_eq!((q2.previous().year, q2.previous().quarter), (2024, 1));
    }

    #[test]
    fn containing_uses_one_based_quarter_of_the_month() {
        let march = NaiveDate::from_ymd_opt(2024, 3, 31).expect("valid date");
        let april = NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date");
        assert_eq!(QuarterInfo::containing(march).quarter, 1);
        assert_eq!(QuarterInfo::containing(april).quarter, 2);
    }

    #[test]
    fn label_and_key_formats() {
        let q3 = QuarterInfo::new(2024, 3);
        assert_eq!(q3.label, "Q3 2024");
        assert_eq!(q3.key(), "2024-Q3");
    }

    #[test]
    fn parse_key_roundtrips_and_rejects_junk() {
        let parsed = QuarterInfo::parse_key("2024-Q3").expect("parse key");
        assert_eq!((parsed.year, parsed.quarter), (2024, 3));
        assert_eq!(
            QuarterInfo::parse_key("2024q1").map(|q| q.quarter),
            Some(1)
        );
        assert!(QuarterInfo::parse_key("2024-Q5").is_none());
        assert!(QuarterInfo::parse_key("garbage").is_none());
    }
}
