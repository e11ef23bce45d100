use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::habit::{Habit, HabitLog};

/// Derived per-date display data, rebuilt from scratch on every call.
/// `colors` keeps the order the logs were supplied in; a date whose
/// logs all reference missing habits still gets an entry with an empty
/// color list, so consumers must check emptiness rather than key
/// presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub colors: Vec<String>,
}

/// Groups logs by exact date-string equality. Group order is the order
/// dates were first seen; order within a group is input order. Dates
/// are compared as raw strings, so callers must supply canonical
/// "YYYY-MM-DD" keys.
#[must_use]
pub fn group_logs_by_date(logs: &[HabitLog]) -> Vec<(String, Vec<HabitLog>)> {
    let mut grouped: Vec<(String, Vec<HabitLog>)> = Vec::new();

    for log in logs {
        match grouped.iter_mut().find(|(date, _)| *date == log.date) {
            Some((_, group)) => group.push(log.clone()),
            None => grouped.push((log.date.clone(), vec![log.clone()])),
        }
    }

    grouped
}

/// Joins each log against the habit list and collects the habit colors
/// per date. Logs whose `habit_id` has no matching habit are dropped
/// silently; orphans are a tolerated data-quality state, not an error.
#[must_use]
pub fn build_calendar_entries(logs: &[HabitLog], habits: &[Habit]) -> HashMap<String, CalendarEntry> {
    let colors_by_habit: HashMap<Uuid, &str> = habits
        .iter()
        .map(|habit| (habit.id, habit.color.as_str()))
        .collect();

    let mut entries = HashMap::new();
    for (date, group) in group_logs_by_date(logs) {
        let colors: Vec<String> = group
            .iter()
            .filter_map(|log| colors_by_habit.get(&log.habit_id))
            .map(|color| (*color).to_string())
            .collect();
        entries.insert(date, CalendarEntry { colors });
    }

    debug!(
        logs = logs.len(),
        habits = habits.len(),
        dates = entries.len(),
        "built calendar entries"
    );
    entries
}
