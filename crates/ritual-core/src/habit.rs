use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: Uuid,

    pub name: String,

    /// CSS color string, e.g. "#f00" or "#22c55e". Stored as-is; not
    /// validated.
    pub color: String,

    #[serde(default)]
    pub description: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// One logged occurrence of one habit on one calendar day. There is no
/// uniqueness constraint: the same habit may be logged several times on
/// the same date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitLog {
    pub id: Uuid,

    pub habit_id: Uuid,

    /// Canonical "YYYY-MM-DD". Kept as a plain string for wire
    /// compatibility; commands validate before it gets here.
    pub date: String,

    #[serde(default)]
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(name: String, color: String, description: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

impl HabitLog {
    pub fn new(habit_id: Uuid, date: String, note: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            habit_id,
            date,
            note,
            created_at: now,
            updated_at: now,
        }
    }
}
