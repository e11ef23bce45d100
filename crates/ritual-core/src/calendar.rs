use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const DAY_HEADERS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

/// Builds the week-row layout for one month: each row is exactly 7
/// cells, a cell is either a 1-based day number or `None` for the
/// leading/trailing blanks of the first and last week.
///
/// `month0` is zero-based (0 = January); anything chrono rejects as a
/// month is an error rather than being normalized.
pub fn month_grid(year: i32, month0: u32) -> anyhow::Result<Vec<Vec<Option<u32>>>> {
    let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .ok_or_else(|| anyhow!("invalid year/month: {year}-{}", month0 + 1))?;
    let leading = first.weekday().num_days_from_sunday() as usize;
    let days = days_in_month(first);

    let mut weeks = Vec::with_capacity(6);
    let mut week: Vec<Option<u32>> = vec![None; leading];

    for day in 1..=days {
        week.push(Some(day));
        if week.len() == 7 {
            weeks.push(week);
            week = Vec::new();
        }
    }

    if !week.is_empty() {
        while week.len() < 7 {
            week.push(None);
        }
        weeks.push(week);
    }

    Ok(weeks)
}

/// Day count via the first of the following month minus one day, so
/// leap years and the December rollover come from chrono rather than a
/// hardcoded table.
fn days_in_month(first: NaiveDate) -> u32 {
    let (next_year, next_month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// Canonical zero-padded date key for a grid cell, matching the format
/// logs are stored with.
#[must_use]
pub fn date_key(year: i32, month0: u32, day: u32) -> String {
    format!("{year:04}-{:02}-{day:02}", month0 + 1)
}

#[cfg(test)]
mod tests {
    use super::{date_key, month_grid};

    #[test]
    fn rows_are_always_seven_wide() {
        for (year, month0) in [(2024, 0), (2024, 1), (2025, 11), (1999, 5)] {
            let weeks = month_grid(year, month0).expect("valid month");
            for week in &weeks {
                assert_eq!(week.len(), 7, "{year}-{month0}");
            }
        }
    }

    #[test]
    fn cell_count_matches_days_and_days_increase() {
        // March 2024 has 31 days and starts on a Friday.
        let weeks = month_grid(2024, 2).expect("valid month");
        let days: Vec<u32> = weeks.iter().flatten().flatten().copied().collect();
        assert_eq!(days.len(), 31);
        assert_eq!(days, (1..=31).collect::<Vec<u32>>());
        assert_eq!(weeks[0][5], Some(1));
    }

    #[test]
    fn leap_february_has_29_cells() {
        let leap: Vec<u32> = month_grid(2024, 1)
            .expect("valid month")
            .into_iter()
            .flatten()
            .flatten()
            .collect();
        let common: Vec<u32> = month_grid(2023, 1)
            .expect("valid month")
            .into_iter()
            .flatten()
            .flatten()
            .collect();
        assert_eq!(leap.len(), 29);
        assert_eq!(common.len(), 28);
    }

    #[test]
    fn blanks_only_in_first_and_last_rows() {
        let weeks = month_grid(2024, 8).expect("valid month");
        for week in &weeks[1..weeks.len() - 1] {
            assert!(week.iter().all(Option::is_some));
        }
    }

    #[test]
    fn out_of_range_month_is_rejected() {
        assert!(month_grid(2024, 12).is_err());
    }

    #[test]
    fn date_keys_are_zero_padded() {
        assert_eq!(date_key(2024, 2, 1), "2024-03-01");
        assert_eq!(date_key(2024, 11, 31), "2024-12-31");
    }
}
