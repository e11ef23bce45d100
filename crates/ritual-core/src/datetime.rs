use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "ritual-time.toml";
const TIMEZONE_ENV_VAR: &str = "RITUAL_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "RITUAL_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

pub fn project_timezone() -> &'static Tz {
    static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();
    PROJECT_TZ.get_or_init(resolve_project_timezone)
}

/// The calendar date "now" falls on in the project timezone. All log
/// dates are day-granular, so this is the only clock read the core
/// needs.
#[must_use]
pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(project_timezone()).date_naive()
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn resolve_project_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    chrono_tz::UTC
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed reading timezone config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed parsing timezone config file");
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured project timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

/// Parses the date expressions accepted by `log` and `editlog`. Habit
/// logs record things that already happened, so weekday names resolve
/// to the most recent past occurrence rather than the next one.
///
/// This is the boundary where non-ISO input is rejected; everything
/// past it holds canonical "YYYY-MM-DD" strings.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(input: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "today" => return Ok(today),
        "yesterday" => {
            return today
                .checked_sub_signed(Duration::days(1))
                .ok_or_else(|| anyhow!("date out of range"));
        }
        "tomorrow" => {
            return today
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| anyhow!("date out of range"));
        }
        _ => {}
    }

    if let Some(target) = parse_weekday_name(&lower) {
        return Ok(previous_weekday_date(today, target));
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)d$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(token) {
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative day count")?;
        let delta = if caps.name("sign").map(|m| m.as_str()) == Some("-") {
            -num
        } else {
            num
        };
        return today
            .checked_add_signed(Duration::days(delta))
            .ok_or_else(|| anyhow!("date out of range: {token}"));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: today/yesterday/tomorrow, weekday names \
         (e.g. monday), -Nd/+Nd, YYYY-MM-DD"
    })
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Most recent occurrence of `target` on or before `from`; "monday"
/// asked for on a Monday means today.
fn previous_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let delta = (7 + from_idx - target_idx) % 7;
    from.checked_sub_signed(Duration::days(delta)).unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{format_date, parse_date_expr};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn parses_named_days() {
        // 2024-03-15 is a Friday.
        let today = day("2024-03-15");
        assert_eq!(parse_date_expr("today", today).expect("parse"), today);
        assert_eq!(
            parse_date_expr("yesterday", today).expect("parse"),
            day("2024-03-14")
        );
    }

    #[test]
    fn weekday_names_resolve_backwards() {
        let friday = day("2024-03-15");
        assert_eq!(
            parse_date_expr("monday", friday).expect("parse"),
            day("2024-03-11")
        );
        assert_eq!(
            parse_date_expr("friday", friday).expect("parse"),
            friday
        );
        assert_eq!(
            parse_date_expr("sat", friday).expect("parse"),
            day("2024-03-09")
        );
    }

    #[test]
    fn relative_days_cross_month_boundaries() {
        let today = day("2024-03-02");
        assert_eq!(
            parse_date_expr("-5d", today).expect("parse"),
            day("2024-02-26")
        );
        assert_eq!(
            parse_date_expr("+1d", today).expect("parse"),
            day("2024-03-03")
        );
    }

    #[test]
    fn literal_iso_dates_pass_through() {
        let today = day("2024-03-15");
        let parsed = parse_date_expr("2023-11-05", today).expect("parse");
        assert_eq!(format_date(parsed), "2023-11-05");
    }

    #[test]
    fn junk_is_rejected() {
        let today = day("2024-03-15");
        assert!(parse_date_expr("03/15/2024", today).is_err());
        assert!(parse_date_expr("soonish", today).is_err());
    }
}
