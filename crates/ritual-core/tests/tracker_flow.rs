use chrono::Utc;
use ritual_core::aggregate::build_calendar_entries;
use ritual_core::datastore::DataStore;
use ritual_core::habit::{Habit, HabitLog};
use ritual_core::quarter::QuarterInfo;
use ritual_core::recent::recent_window;
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn datastore_roundtrip_and_derived_views() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let now = Utc::now();
    let habit = Habit::new(
        "Morning run".to_string(),
        "#f00".to_string(),
        "30 minutes before work".to_string(),
        now,
    );
    store
        .save_habits(std::slice::from_ref(&habit))
        .expect("save habits");

    let logs = vec![
        HabitLog::new(habit.id, "2024-03-01".to_string(), None, now),
        HabitLog::new(
            habit.id,
            "2024-03-02".to_string(),
            Some("easy pace".to_string()),
            now,
        ),
        // Orphan: references a habit that was never stored.
        HabitLog::new(Uuid::new_v4(), "2024-03-02".to_string(), None, now),
    ];
    store.save_logs(&logs).expect("save logs");

    let loaded_habits = store.load_habits().expect("load habits");
    let loaded_logs = store.load_logs().expect("load logs");
    assert_eq!(loaded_habits, vec![habit.clone()]);
    assert_eq!(loaded_logs, logs);

    let entries = build_calendar_entries(&loaded_logs, &loaded_habits);
    assert_eq!(
        entries.get("2024-03-01").expect("entry").colors,
        vec!["#f00".to_string()]
    );
    assert_eq!(
        entries.get("2024-03-02").expect("entry").colors,
        vec!["#f00".to_string()],
        "orphaned log contributes no color"
    );

    let grouped = recent_window(&loaded_logs);
    let dates: Vec<&str> = grouped.iter().map(|(date, _)| date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-02", "2024-03-01"]);
}

#[test]
fn undo_restores_the_previous_snapshot() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let now = Utc::now();
    let habit = Habit::new("Read".to_string(), "#00f".to_string(), String::new(), now);
    store
        .save_habits(std::slice::from_ref(&habit))
        .expect("save habits");

    store
        .push_undo_snapshot(std::slice::from_ref(&habit), &[])
        .expect("push snapshot");

    let log = HabitLog::new(habit.id, "2024-03-05".to_string(), None, now);
    store
        .save_logs(std::slice::from_ref(&log))
        .expect("save logs");
    assert_eq!(store.load_logs().expect("load logs").len(), 1);

    let (habits, logs) = store
        .pop_undo_snapshot()
        .expect("pop snapshot")
        .expect("snapshot present");
    store.save_habits(&habits).expect("restore habits");
    store.save_logs(&logs).expect("restore logs");

    assert_eq!(store.load_habits().expect("load habits").len(), 1);
    assert!(store.load_logs().expect("load logs").is_empty());
    assert!(
        store
            .pop_undo_snapshot()
            .expect("pop snapshot")
            .is_none()
    );
}

#[test]
fn active_quarter_persists_between_opens() {
    let temp = tempdir().expect("tempdir");

    {
        let store = DataStore::open(temp.path()).expect("open datastore");
        assert!(store.get_active_quarter().expect("read quarter").is_none());
        let q = QuarterInfo::new(2024, 2).next();
        store
            .set_active_quarter(Some(&q))
            .expect("persist quarter");
    }

    let store = DataStore::open(temp.path()).expect("reopen datastore");
    let active = store
        .get_active_quarter()
        .expect("read quarter")
        .expect("quarter present");
    assert_eq!((active.year, active.quarter), (2024, 3));
}
