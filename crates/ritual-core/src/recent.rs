use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::aggregate::group_logs_by_date;
use crate::habit::HabitLog;

pub const WINDOW_DAYS: i64 = 7;

/// Returns the logs within the trailing 7-day window (inclusive)
/// anchored at the most recent date present, grouped by date with the
/// groups ordered newest first.
///
/// The anchor comparison is lexical, which is correct for canonical
/// fixed-width ISO dates; the cutoff itself is real calendar
/// subtraction so month and year boundaries are crossed properly.
#[must_use]
pub fn recent_window(logs: &[HabitLog]) -> Vec<(String, Vec<HabitLog>)> {
    if logs.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<HabitLog> = logs.to_vec();
    sorted.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let anchor = sorted[0].date.clone();
    let cutoff = match NaiveDate::parse_from_str(&anchor, "%Y-%m-%d") {
        Ok(date) => (date - Duration::days(WINDOW_DAYS))
            .format("%Y-%m-%d")
            .to_string(),
        Err(err) => {
            // Dates are validated on the way in, so a bad anchor means
            // the store was edited by hand. Degrade to an empty window
            // instead of filtering against garbage.
            warn!(anchor = %anchor, error = %err, "anchor date is not ISO; recent window is empty");
            return Vec::new();
        }
    };

    sorted.retain(|log| log.date >= cutoff);
    debug!(anchor = %anchor, cutoff = %cutoff, kept = sorted.len(), "recency window");

    let mut grouped = group_logs_by_date(&sorted);
    grouped.sort_by(|a, b| b.0.cmp(&a.0));
    grouped
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::recent_window;
    use crate::habit::HabitLog;

    fn log(date: &str) -> HabitLog {
        HabitLog::new(Uuid::new_v4(), date.to_string(), None, Utc::now())
    }

    #[test]
    fn window_is_inclusive_of_exactly_seven_days_back() {
        let logs: Vec<HabitLog> = (1..=10)
            .map(|day| log(&format!("2024-01-{day:02}")))
            .collect();

        let grouped = recent_window(&logs);
        let dates: Vec<&str> = grouped.iter().map(|(date, _)| date.as_str()).collect();

        assert_eq!(dates.first().copied(), Some("2024-01-10"));
        assert!(dates.contains(&"2024-01-03"), "boundary day included");
        assert!(!dates.contains(&"2024-01-02"), "day before boundary excluded");
    }

    #[test]
    fn cutoff_crosses_year_boundary() {
        let logs = vec![log("2024-01-03"), log("2023-12-27"), log("2023-12-26")];

        let grouped = recent_window(&logs);
        let dates: Vec<&str> = grouped.iter().map(|(date, _)| date.as_str()).collect();

        assert_eq!(dates, vec!["2024-01-03", "2023-12-27"]);
    }

    #[test]
    fn groups_are_ordered_newest_first() {
        let logs = vec![log("2024-05-01"), log("2024-05-03"), log("2024-05-02")];

        let grouped = recent_window(&logs);
        let dates: Vec<&str> = grouped.iter().map(|(date, _)| date.as_str()).collect();

        assert_eq!(dates, vec!["2024-05-03", "2024-05-02", "2024-05-01"]);
    }

    #[test]
    fn same_date_logs_tie_break_on_created_at_descending() {
        let older = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).single().expect("valid ts");
        let mut first = log("2024-05-01");
        first.created_at = older;
        let mut second = log("2024-05-01");
        second.created_at = older + Duration::hours(2);

        let grouped = recent_window(&[first.clone(), second.clone()]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].1[0].id, second.id);
        assert_eq!(grouped[0].1[1].id, first.id);
    }

    #[test]
    fn empty_input_yields_empty_grouping() {
        assert!(recent_window(&[]).is_empty());
    }

    #[test]
    fn malformed_anchor_yields_empty_grouping() {
        let logs = vec![log("not-a-date"), log("2024-01-01")];
        assert!(recent_window(&logs).is_empty());
    }
}
