//! Workout record persistence over rusqlite.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::path::Path;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS fittrack (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date DATE NOT NULL,
    calories INTEGER NOT NULL,
    distance REAL NOT NULL,
    description TEXT NOT NULL
)";

/// One logged workout entry as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub calories: i64,
    pub distance: f64,
    pub description: String,
}

/// A validated entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutInput {
    pub date: NaiveDate,
    pub calories: i64,
    pub distance: f64,
    pub description: String,
}

impl WorkoutInput {
    /// Build an input from raw entry-form text.
    ///
    /// Every field must be filled in: an empty or unparsable calories,
    /// distance, or description value is rejected with
    /// [`StoreError::Validation`] so the user can correct the form.
    pub fn from_form(
        date: NaiveDate,
        calories: &str,
        distance: &str,
        description: &str,
    ) -> Result<Self, StoreError> {
        let calories = calories.trim();
        if calories.is_empty() {
            return Err(StoreError::Validation("calories is required".into()));
        }
        let distance = distance.trim();
        if distance.is_empty() {
            return Err(StoreError::Validation("distance is required".into()));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(StoreError::Validation("description is required".into()));
        }

        let calories = calories.parse::<i64>().map_err(|_| {
            StoreError::Validation(format!("calories must be a whole number, got {calories:?}"))
        })?;
        let distance = distance.parse::<f64>().map_err(|_| {
            StoreError::Validation(format!("distance must be a number, got {distance:?}"))
        })?;

        Ok(Self {
            date,
            calories,
            distance,
            description: description.to_string(),
        })
    }
}

/// Store wrapper owning the SQLite connection.
///
/// Opened once at startup and passed to the UI; every operation runs on the
/// single UI thread.
pub struct WorkoutStore {
    conn: Connection,
}

impl WorkoutStore {
    /// Open or create the database file at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;

        let store = Self { conn };
        store.initialize()?;

        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;

        let store = Self { conn };
        store.initialize()?;

        Ok(store)
    }

    /// Ensure the `fittrack` table exists. Idempotent, runs on every start.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(|e| StoreError::Open(e.to_string()))
    }

    /// Every record, ordered by date descending. An empty store yields an
    /// empty vec, not an error.
    pub fn list_all(&self) -> Result<Vec<WorkoutRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, date, calories, distance, description FROM fittrack
                 ORDER BY date DESC",
            )
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RecordRow {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    calories: row.get(2)?,
                    distance: row.get(3)?,
                    description: row.get(4)?,
                })
            })
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| StoreError::Persistence(e.to_string()))?;
            records.push(row.into_record()?);
        }

        Ok(records)
    }

    /// Insert a new record and return its freshly assigned id.
    pub fn insert(&self, entry: &WorkoutInput) -> Result<i64, StoreError> {
        if entry.description.trim().is_empty() {
            return Err(StoreError::Validation("description is required".into()));
        }

        self.conn
            .execute(
                "INSERT INTO fittrack (date, calories, distance, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.date.format(DATE_FORMAT).to_string(),
                    entry.calories,
                    entry.distance,
                    entry.description,
                ],
            )
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Remove the record with the given id.
    ///
    /// A missing id is a silent no-op success; the caller refreshes its
    /// listing afterwards either way.
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute("DELETE FROM fittrack WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        if affected == 0 {
            log::debug!("delete: no record with id {id}");
        }

        Ok(())
    }

    /// Remove every record unconditionally. Irreversible.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM fittrack", [])
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        Ok(())
    }
}

/// Intermediate struct for reading record rows from the database.
struct RecordRow {
    id: i64,
    date: String,
    calories: i64,
    distance: f64,
    description: String,
}

impl RecordRow {
    fn into_record(self) -> Result<WorkoutRecord, StoreError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|e| {
            StoreError::Persistence(format!("invalid date in record {}: {}", self.id, e))
        })?;

        Ok(WorkoutRecord {
            id: self.id,
            date,
            calories: self.calories,
            distance: self.distance,
            description: self.description,
        })
    }
}

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn run(date_str: &str) -> WorkoutInput {
        WorkoutInput {
            date: date(date_str),
            calories: 300,
            distance: 5.0,
            description: "run".into(),
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = WorkoutStore::open_in_memory().expect("Failed to create store");
        store.initialize().expect("Second initialize failed");
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn insert_then_list_contains_record() {
        let store = WorkoutStore::open_in_memory().unwrap();
        let id = store.insert(&run("2024-01-01")).unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].date, date("2024-01-01"));
        assert_eq!(records[0].calories, 300);
        assert_eq!(records[0].distance, 5.0);
        assert_eq!(records[0].description, "run");
    }

    #[test]
    fn inserted_ids_are_unique() {
        let store = WorkoutStore::open_in_memory().unwrap();
        let a = store.insert(&run("2024-01-01")).unwrap();
        let b = store.insert(&run("2024-01-01")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn list_orders_by_date_descending() {
        let store = WorkoutStore::open_in_memory().unwrap();
        store.insert(&run("2024-01-01")).unwrap();
        store.insert(&run("2024-01-02")).unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(records[0].date, date("2024-01-02"));
        assert_eq!(records[1].date, date("2024-01-01"));
    }

    #[test]
    fn insert_rejects_blank_description() {
        let store = WorkoutStore::open_in_memory().unwrap();
        let mut entry = run("2024-01-01");
        entry.description = "  ".into();

        let err = store.insert(&entry).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_exactly_one() {
        let store = WorkoutStore::open_in_memory().unwrap();
        let keep = store.insert(&run("2024-01-01")).unwrap();
        let gone = store.insert(&run("2024-01-02")).unwrap();

        store.delete(gone).unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, keep);
    }

    #[test]
    fn delete_missing_id_is_noop() {
        let store = WorkoutStore::open_in_memory().unwrap();
        store.insert(&run("2024-01-01")).unwrap();

        store.delete(9999).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn clear_all_empties_store() {
        let store = WorkoutStore::open_in_memory().unwrap();
        store.insert(&run("2024-01-01")).unwrap();
        store.insert(&run("2024-01-02")).unwrap();

        store.clear_all().unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn from_form_parses_valid_input() {
        let input = WorkoutInput::from_form(date("2024-01-01"), " 300 ", "5.5", " run ").unwrap();
        assert_eq!(input.calories, 300);
        assert_eq!(input.distance, 5.5);
        assert_eq!(input.description, "run");
    }

    #[test]
    fn from_form_rejects_empty_fields() {
        let d = date("2024-01-01");
        for (calories, distance, description) in
            [("", "5.0", "run"), ("300", "", "run"), ("300", "5.0", "")]
        {
            let err = WorkoutInput::from_form(d, calories, distance, description).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn from_form_rejects_non_numeric_values() {
        let d = date("2024-01-01");
        assert!(matches!(
            WorkoutInput::from_form(d, "lots", "5.0", "run"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            WorkoutInput::from_form(d, "300", "far", "run"),
            Err(StoreError::Validation(_))
        ));
    }
}
