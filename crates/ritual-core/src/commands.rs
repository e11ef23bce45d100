use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::build_calendar_entries;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{self, parse_date_expr};
use crate::habit::{Habit, HabitLog};
use crate::quarter::QuarterInfo;
use crate::recent::recent_window;
use crate::render::Renderer;

/// Habits created without an explicit color get this one.
const DEFAULT_HABIT_COLOR: &str = "#6366f1";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "habits",
        "modify",
        "delete",
        "log",
        "logs",
        "editlog",
        "unlog",
        "cal",
        "recent",
        "undo",
        "export",
        "import",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let today = datetime::today(now);
    let command = inv.command.as_str();

    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(store, &inv.command_args, now),
        "habits" => cmd_habits(store, renderer),
        "modify" => cmd_modify(store, &inv.command_args, now),
        "delete" => cmd_delete(store, &inv.command_args),
        "log" => cmd_log(store, &inv.command_args, now, today),
        "logs" => cmd_logs(store, renderer, &inv.command_args),
        "editlog" => cmd_editlog(store, &inv.command_args, now, today),
        "unlog" => cmd_unlog(store, &inv.command_args),
        "cal" => cmd_cal(store, renderer, &inv.command_args, today),
        "recent" => cmd_recent(store, renderer),
        "undo" => cmd_undo(store),
        "export" => cmd_export(store),
        "import" => cmd_import(store),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &mut DataStore, args: &[String], now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let mut name_parts = Vec::new();
    let mut color = DEFAULT_HABIT_COLOR.to_string();
    let mut description = String::new();

    for arg in args {
        match split_mod(arg) {
            Some(("color", value)) => color = value.to_string(),
            Some(("desc" | "description", value)) => description = value.to_string(),
            _ => name_parts.push(arg.clone()),
        }
    }

    let name = name_parts.join(" ");
    if name.trim().is_empty() {
        return Err(anyhow!("add: habit name is required"));
    }

    let mut habits = store.load_habits()?;
    let logs = store.load_logs()?;
    if habits
        .iter()
        .any(|habit| habit.name.eq_ignore_ascii_case(&name))
    {
        return Err(anyhow!("a habit named '{name}' already exists"));
    }

    store.push_undo_snapshot(&habits, &logs)?;

    let habit = Habit::new(name, color, description, now);
    habits.push(habit.clone());
    store.save_habits(&habits)?;

    debug!(habit_count = habits.len(), "habit added");
    println!("Created habit '{}' ({}).", habit.name, brief(habit.id));
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_habits(store: &mut DataStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command habits");

    let mut habits = store.load_habits()?;
    let logs = store.load_logs()?;
    habits.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    renderer.print_habit_table(&habits, &logs)?;
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_modify(
    store: &mut DataStore,
    args: &[String],
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let (selector, mods) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify: habit selector is required"))?;
    if mods.is_empty() {
        return Err(anyhow!("modify: nothing to change"));
    }

    let mut habits = store.load_habits()?;
    let logs = store.load_logs()?;
    let id = resolve_habit(&habits, selector)?.id;

    store.push_undo_snapshot(&habits, &logs)?;

    let habit = habits
        .iter_mut()
        .find(|habit| habit.id == id)
        .ok_or_else(|| anyhow!("habit disappeared while modifying"))?;

    for arg in mods {
        match split_mod(arg) {
            Some(("name", value)) => habit.name = value.to_string(),
            Some(("color", value)) => habit.color = value.to_string(),
            Some(("desc" | "description", value)) => habit.description = value.to_string(),
            _ => return Err(anyhow!("modify: unrecognized modifier: {arg}")),
        }
    }
    if habit.name.trim().is_empty() {
        return Err(anyhow!("modify: habit name cannot be empty"));
    }
    habit.updated_at = now;

    let name = habit.name.clone();
    store.save_habits(&habits)?;
    println!("Modified habit '{name}'.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let selector = args
        .first()
        .ok_or_else(|| anyhow!("delete: habit selector is required"))?;

    let mut habits = store.load_habits()?;
    let logs = store.load_logs()?;
    let habit = resolve_habit(&habits, selector)?.clone();

    store.push_undo_snapshot(&habits, &logs)?;

    habits.retain(|row| row.id != habit.id);
    store.save_habits(&habits)?;

    // Logs referencing the habit stay behind as orphans; the views
    // filter them out of display rather than treating them as errors.
    let orphaned = logs.iter().filter(|log| log.habit_id == habit.id).count();
    if orphaned > 0 {
        debug!(orphaned, habit = %habit.id, "habit deleted; logs left orphaned");
    }

    println!("Deleted habit '{}'.", habit.name);
    Ok(())
}

#[instrument(skip(store, args, now, today))]
fn cmd_log(
    store: &mut DataStore,
    args: &[String],
    now: chrono::DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command log");

    let mut selector: Option<&str> = None;
    let mut date = today;
    let mut note_parts = Vec::new();

    for arg in args {
        match split_mod(arg) {
            Some(("date", value)) => date = parse_date_expr(value, today)?,
            _ if selector.is_none() => selector = Some(arg),
            _ => note_parts.push(arg.clone()),
        }
    }

    let selector = selector.ok_or_else(|| anyhow!("log: habit selector is required"))?;
    let note = if note_parts.is_empty() {
        None
    } else {
        Some(note_parts.join(" "))
    };

    let habits = store.load_habits()?;
    let mut logs = store.load_logs()?;
    let habit = resolve_habit(&habits, selector)?.clone();

    store.push_undo_snapshot(&habits, &logs)?;

    let log = HabitLog::new(habit.id, datetime::format_date(date), note, now);
    logs.push(log.clone());
    store.save_logs(&logs)?;

    debug!(log_count = logs.len(), "log added");
    println!("Logged '{}' for {}.", habit.name, log.date);
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_logs(store: &mut DataStore, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command logs");

    let habits = store.load_habits()?;
    let mut logs = store.load_logs()?;

    if let Some(selector) = args.first() {
        let habit = resolve_habit(&habits, selector)?;
        logs.retain(|log| log.habit_id == habit.id);
    }

    logs.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    renderer.print_log_table(&logs, &habits)?;
    Ok(())
}

#[instrument(skip(store, args, now, today))]
fn cmd_editlog(
    store: &mut DataStore,
    args: &[String],
    now: chrono::DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command editlog");

    let (selector, mods) = args
        .split_first()
        .ok_or_else(|| anyhow!("editlog: log id is required"))?;
    if mods.is_empty() {
        return Err(anyhow!("editlog: nothing to change"));
    }

    let habits = store.load_habits()?;
    let mut logs = store.load_logs()?;
    let id = resolve_log(&logs, selector)?.id;

    store.push_undo_snapshot(&habits, &logs)?;

    let log = logs
        .iter_mut()
        .find(|log| log.id == id)
        .ok_or_else(|| anyhow!("log disappeared while editing"))?;

    for arg in mods {
        match split_mod(arg) {
            Some(("date", value)) => {
                log.date = datetime::format_date(parse_date_expr(value, today)?);
            }
            Some(("note", value)) => {
                log.note = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            Some(("habit", value)) => log.habit_id = resolve_habit(&habits, value)?.id,
            _ => return Err(anyhow!("editlog: unrecognized modifier: {arg}")),
        }
    }
    log.updated_at = now;

    let date = log.date.clone();
    store.save_logs(&logs)?;
    println!("Updated log ({}) for {date}.", brief(id));
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_unlog(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command unlog");

    let selector = args
        .first()
        .ok_or_else(|| anyhow!("unlog: log id is required"))?;

    let habits = store.load_habits()?;
    let mut logs = store.load_logs()?;
    let log = resolve_log(&logs, selector)?.clone();

    store.push_undo_snapshot(&habits, &logs)?;

    logs.retain(|row| row.id != log.id);
    store.save_logs(&logs)?;

    println!("Deleted log ({}) for {}.", brief(log.id), log.date);
    Ok(())
}

#[instrument(skip(store, renderer, args, today))]
fn cmd_cal(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command cal");

    let active = store.get_active_quarter()?;
    let current = QuarterInfo::containing(today);

    let quarter = match args.first().map(|arg| arg.to_ascii_lowercase()).as_deref() {
        None => active.unwrap_or(current),
        Some("next") => {
            let next = active.unwrap_or_else(|| current.clone()).next();
            store.set_active_quarter(Some(&next))?;
            next
        }
        Some("prev" | "previous") => {
            let prev = active.unwrap_or_else(|| current.clone()).previous();
            store.set_active_quarter(Some(&prev))?;
            prev
        }
        Some("today") => {
            store.set_active_quarter(None)?;
            current
        }
        Some(other) => {
            let jumped = QuarterInfo::parse_key(other)
                .ok_or_else(|| anyhow!("cal: expected next/prev/today or YYYY-Qn, got: {other}"))?;
            store.set_active_quarter(Some(&jumped))?;
            jumped
        }
    };

    let habits = store.load_habits()?;
    let logs = store.load_logs()?;
    let entries = build_calendar_entries(&logs, &habits);

    renderer.print_quarter(&quarter, &entries)?;
    println!();
    println!("Total logged: {}", logs.len());
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_recent(store: &mut DataStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command recent");

    let habits = store.load_habits()?;
    let logs = store.load_logs()?;

    let grouped = recent_window(&logs);
    if grouped.is_empty() {
        println!("No logs yet.");
        return Ok(());
    }

    renderer.print_recent(&grouped, &habits)?;
    Ok(())
}

#[instrument(skip(store))]
fn cmd_undo(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command undo");

    let Some((habits, logs)) = store.pop_undo_snapshot()? else {
        println!("No undo transactions available.");
        return Ok(());
    };

    store.save_habits(&habits)?;
    store.save_logs(&logs)?;

    println!("Undo completed.");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    habits: Vec<Habit>,
    logs: Vec<HabitLog>,
}

#[instrument(skip(store))]
fn cmd_export(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command export");

    let snapshot = Snapshot {
        habits: store.load_habits()?,
        logs: store.load_logs()?,
    };

    let out = serde_json::to_string(&snapshot)?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command import");

    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed reading stdin")?;

    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let snapshot: Snapshot = serde_json::from_str(trimmed).context("failed parsing snapshot JSON")?;

    let mut habits = store.load_habits()?;
    let mut logs = store.load_logs()?;
    store.push_undo_snapshot(&habits, &logs)?;

    let mut upserted_habits = 0_u64;
    for incoming in snapshot.habits {
        match habits.iter_mut().find(|row| row.id == incoming.id) {
            Some(existing) => *existing = incoming,
            None => habits.push(incoming),
        }
        upserted_habits += 1;
    }

    let mut upserted_logs = 0_u64;
    for incoming in snapshot.logs {
        if NaiveDate::parse_from_str(&incoming.date, "%Y-%m-%d").is_err() {
            warn!(log = %incoming.id, date = %incoming.date, "skipping log with non-ISO date");
            continue;
        }
        match logs.iter_mut().find(|row| row.id == incoming.id) {
            Some(existing) => *existing = incoming,
            None => logs.push(incoming),
        }
        upserted_logs += 1;
    }

    store.save_habits(&habits)?;
    store.save_logs(&logs)?;

    println!("Imported {upserted_habits} habit(s) and {upserted_logs} log(s).");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, habits, modify, delete, log, logs, editlog, unlog, cal, recent, undo, export, import"
    );
    Ok(())
}

fn split_mod(token: &str) -> Option<(&str, &str)> {
    token.split_once(':').or_else(|| token.split_once('='))
}

/// Selects a habit by id, id prefix, exact name, or unambiguous name
/// prefix (case-insensitive).
fn resolve_habit<'a>(habits: &'a [Habit], selector: &str) -> anyhow::Result<&'a Habit> {
    let lowered = selector.to_ascii_lowercase();

    if let Ok(id) = Uuid::parse_str(selector)
        && let Some(habit) = habits.iter().find(|habit| habit.id == id)
    {
        return Ok(habit);
    }

    if let Some(habit) = habits
        .iter()
        .find(|habit| habit.name.eq_ignore_ascii_case(selector))
    {
        return Ok(habit);
    }

    let mut by_prefix = habits.iter().filter(|habit| {
        habit.name.to_ascii_lowercase().starts_with(&lowered)
            || habit.id.to_string().starts_with(&lowered)
    });
    let first = by_prefix
        .next()
        .ok_or_else(|| anyhow!("no habit matches '{selector}'"))?;
    if by_prefix.next().is_some() {
        return Err(anyhow!("habit selector '{selector}' is ambiguous"));
    }
    Ok(first)
}

fn resolve_log<'a>(logs: &'a [HabitLog], selector: &str) -> anyhow::Result<&'a HabitLog> {
    let lowered = selector.to_ascii_lowercase();

    let mut by_prefix = logs
        .iter()
        .filter(|log| log.id.to_string().starts_with(&lowered));
    let first = by_prefix
        .next()
        .ok_or_else(|| anyhow!("no log matches '{selector}'"))?;
    if by_prefix.next().is_some() {
        return Err(anyhow!("log selector '{selector}' is ambiguous"));
    }
    Ok(first)
}

fn brief(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{expand_command_abbrev, known_command_names, resolve_habit};
    use crate::habit::Habit;

    #[test]
    fn exact_commands_win_over_prefixes() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("log", &known), Some("log"));
        assert_eq!(expand_command_abbrev("cal", &known), Some("cal"));
        assert_eq!(expand_command_abbrev("rec", &known), Some("recent"));
        assert_eq!(expand_command_abbrev("u", &known), None);
    }

    #[test]
    fn habit_selectors_resolve_names_and_prefixes() {
        let now = Utc::now();
        let habits = vec![
            Habit::new("Run".to_string(), "#f00".to_string(), String::new(), now),
            Habit::new("Read".to_string(), "#00f".to_string(), String::new(), now),
        ];

        assert_eq!(resolve_habit(&habits, "run").expect("resolve").name, "Run");
        assert_eq!(
            resolve_habit(&habits, "rea").expect("resolve").name,
            "Read"
        );
        assert!(resolve_habit(&habits, "r").is_err(), "ambiguous prefix");
        assert!(resolve_habit(&habits, "gym").is_err(), "no match");
    }
}
