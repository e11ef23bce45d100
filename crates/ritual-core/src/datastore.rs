use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::habit::{Habit, HabitLog};
use crate::quarter::QuarterInfo;

/// The data-access boundary: everything the views consume is loaded
/// fresh from here per invocation. Failure to read maps to "no data
/// available" for the caller to surface; the derived views themselves
/// are all total over empty collections.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub habits_path: PathBuf,
    pub logs_path: PathBuf,
    pub undo_path: PathBuf,
    pub quarter_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoEntry {
    habits: Vec<Habit>,
    logs: Vec<HabitLog>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let habits_path = data_dir.join("habits.data");
        let logs_path = data_dir.join("logs.data");
        let undo_path = data_dir.join("undo.data");
        let quarter_path = data_dir.join("quarter.data");

        for path in [&habits_path, &logs_path, &undo_path, &quarter_path] {
            if !path.exists() {
                fs::write(path, "")?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            habits = %habits_path.display(),
            logs = %logs_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            habits_path,
            logs_path,
            undo_path,
            quarter_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_habits(&self) -> anyhow::Result<Vec<Habit>> {
        load_jsonl(&self.habits_path).context("failed to load habits.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_logs(&self) -> anyhow::Result<Vec<HabitLog>> {
        load_jsonl(&self.logs_path).context("failed to load logs.data")
    }

    #[tracing::instrument(skip(self, habits))]
    pub fn save_habits(&self, habits: &[Habit]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.habits_path, habits).context("failed to save habits.data")
    }

    #[tracing::instrument(skip(self, logs))]
    pub fn save_logs(&self, logs: &[HabitLog]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.logs_path, logs).context("failed to save logs.data")
    }

    #[tracing::instrument(skip(self, habits, logs))]
    pub fn push_undo_snapshot(&self, habits: &[Habit], logs: &[HabitLog]) -> anyhow::Result<()> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        entries.push(UndoEntry {
            habits: habits.to_vec(),
            logs: logs.to_vec(),
        });
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn pop_undo_snapshot(&self) -> anyhow::Result<Option<(Vec<Habit>, Vec<HabitLog>)>> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(Some((entry.habits, entry.logs)))
    }

    /// The quarter the `cal` view left off on, if any. Junk in the
    /// file reads as "none"; navigation state is disposable.
    #[tracing::instrument(skip(self))]
    pub fn get_active_quarter(&self) -> anyhow::Result<Option<QuarterInfo>> {
        let raw = fs::read_to_string(&self.quarter_path)
            .with_context(|| format!("failed reading {}", self.quarter_path.display()))?;
        Ok(QuarterInfo::parse_key(raw.trim()))
    }

    #[tracing::instrument(skip(self))]
    pub fn set_active_quarter(&self, quarter: Option<&QuarterInfo>) -> anyhow::Result<()> {
        let payload = quarter.map(QuarterInfo::key).unwrap_or_default();
        fs::write(&self.quarter_path, payload)
            .with_context(|| format!("failed writing {}", self.quarter_path.display()))?;
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
