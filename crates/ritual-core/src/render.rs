use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::warn;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::aggregate::CalendarEntry;
use crate::calendar::{self, DAY_HEADERS, MONTH_NAMES};
use crate::config::Config;
use crate::habit::{Habit, HabitLog};
use crate::quarter::QuarterInfo;

const DEFAULT_CALENDAR_DOTS: usize = 4;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    /// How many habit dots one day cell shows. Display policy only;
    /// the aggregator always carries the full color list.
    max_dots: usize,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        let max_dots = cfg
            .get_usize("calendar.dots")
            .unwrap_or(DEFAULT_CALENDAR_DOTS)
            .max(1);

        Ok(Self { color, max_dots })
    }

    /// Draws the three month grids of a quarter, one under another,
    /// marking each day that has entries with up to `max_dots` colored
    /// dots. A date whose entry has no colors (all logs orphaned)
    /// renders as a plain day.
    #[tracing::instrument(skip(self, quarter, entries))]
    pub fn print_quarter(
        &mut self,
        quarter: &QuarterInfo,
        entries: &HashMap<String, CalendarEntry>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let cell_width = 2 + 1 + self.max_dots;

        writeln!(out, "{}", quarter.label)?;

        for month0 in quarter.months {
            let name = MONTH_NAMES
                .get(month0 as usize)
                .copied()
                .unwrap_or("?");
            writeln!(out)?;
            writeln!(out, "{name} {}", quarter.year)?;

            let header: Vec<String> = DAY_HEADERS
                .iter()
                .map(|h| format!("{h:<cell_width$}"))
                .collect();
            writeln!(out, "{}", header.join("").trim_end())?;

            for week in calendar::month_grid(quarter.year, month0)? {
                let mut line = String::new();
                for cell in week {
                    match cell {
                        Some(day) => {
                            let key = calendar::date_key(quarter.year, month0, day);
                            let dots = entries
                                .get(&key)
                                .map(|entry| self.paint_dots(&entry.colors))
                                .unwrap_or_default();
                            let rendered = format!("{day:>2} {dots}");
                            line.push_str(&pad_visible(&rendered, cell_width));
                        }
                        None => line.push_str(&" ".repeat(cell_width)),
                    }
                }
                writeln!(out, "{}", line.trim_end())?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, habits, logs))]
    pub fn print_habit_table(&mut self, habits: &[Habit], logs: &[HabitLog]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for log in logs {
            *counts.entry(log.habit_id).or_default() += 1;
        }

        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Color".to_string(),
            "Logged".to_string(),
            "Description".to_string(),
        ];

        let rows: Vec<Vec<String>> = habits
            .iter()
            .map(|habit| {
                vec![
                    short_id(habit.id),
                    habit.name.clone(),
                    self.paint_hex(&habit.color, &habit.color),
                    counts.get(&habit.id).copied().unwrap_or(0).to_string(),
                    habit.description.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, logs, habits))]
    pub fn print_log_table(&mut self, logs: &[HabitLog], habits: &[Habit]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let by_id: HashMap<Uuid, &Habit> = habits.iter().map(|h| (h.id, h)).collect();

        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Habit".to_string(),
            "Note".to_string(),
        ];

        let rows: Vec<Vec<String>> = logs
            .iter()
            .map(|log| {
                let habit_cell = match by_id.get(&log.habit_id) {
                    Some(habit) => {
                        format!("{} {}", self.paint_hex("●", &habit.color), habit.name)
                    }
                    None => "(deleted habit)".to_string(),
                };
                vec![
                    short_id(log.id),
                    log.date.clone(),
                    habit_cell,
                    log.note.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// The "last 7 days" view: one heading per date, newest first,
    /// then one line per log. Orphaned logs are skipped here the same
    /// way the aggregator drops them.
    #[tracing::instrument(skip(self, grouped, habits))]
    pub fn print_recent(
        &mut self,
        grouped: &[(String, Vec<HabitLog>)],
        habits: &[Habit],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let by_id: HashMap<Uuid, &Habit> = habits.iter().map(|h| (h.id, h)).collect();

        for (date, logs) in grouped {
            writeln!(out, "{}", heading_for_date(date))?;
            for log in logs {
                let Some(habit) = by_id.get(&log.habit_id) else {
                    warn!(log = %log.id, habit = %log.habit_id, "skipping log for missing habit");
                    continue;
                };
                let dot = self.paint_hex("●", &habit.color);
                match log.note.as_deref() {
                    Some(note) if !note.is_empty() => {
                        writeln!(out, "  {dot} {}  — {note}", habit.name)?;
                    }
                    _ => writeln!(out, "  {dot} {}", habit.name)?,
                }
            }
            writeln!(out)?;
        }

        Ok(())
    }

    fn paint_dots(&self, colors: &[String]) -> String {
        colors
            .iter()
            .take(self.max_dots)
            .map(|color| self.paint_hex("•", color))
            .collect()
    }

    fn paint_hex(&self, text: &str, color: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        match parse_hex_color(color) {
            Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            None => text.to_string(),
        }
    }
}

/// "#rgb" and "#rrggbb"; anything else is rendered unpainted since
/// habit colors are free-form strings.
fn parse_hex_color(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    match hex.len() {
        3 => {
            let mut parts = [0_u8; 3];
            for (idx, ch) in hex.chars().enumerate() {
                let nibble = ch.to_digit(16)? as u8;
                parts[idx] = nibble * 16 + nibble;
            }
            Some((parts[0], parts[1], parts[2]))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}

fn heading_for_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%A, %B %-d").to_string(),
        Err(_) => date.to_string(),
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0_usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn pad_visible(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    let padding = width.saturating_sub(visible);
    format!("{text}{}", " ".repeat(padding))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{parse_hex_color, strip_ansi};

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_hex_color("#f00"), Some((255, 0, 0)));
        assert_eq!(parse_hex_color("#22c55e"), Some((0x22, 0xc5, 0x5e)));
        assert_eq!(parse_hex_color("tomato"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        let painted = "\x1b[38;2;255;0;0m•\x1b[0m";
        assert_eq!(strip_ansi(painted), "•");
    }
}
