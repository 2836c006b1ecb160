use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::util::{mean, round_tenth};

/// Records older than this many days are left out of the progress series
const PROGRESS_WINDOW_DAYS: i64 = 7;
const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not prepare data directory: {0}")]
    Io(#[from] io::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("bad timestamp in progress table: {0}")]
    Timestamp(String),
}

/// One completed typing session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub song_id: String,
    pub wpm: u32,
    pub accuracy: u32,
    pub completed_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyWpm {
    /// Short weekday name, e.g. `Mon`
    pub date: String,
    pub wpm: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub average_wpm: u32,
    pub average_accuracy: f64,
    pub songs_completed: usize,
    pub progress_data: Vec<DailyWpm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub average_wpm: u32,
    pub songs_completed: usize,
}

/// Append-only store of completed sessions plus read-side aggregation
pub trait ProgressStore {
    fn record_session(&self, record: &SessionRecord) -> Result<(), StoreError>;
    fn user_stats(&self, user_id: &str, now: DateTime<Local>) -> Result<UserStats, StoreError>;
    fn leaderboard(&self, filter: &str, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// SQLite-backed progress store
#[derive(Debug)]
pub struct ProgressDb {
    conn: Connection,
}

impl ProgressDb {
    /// Open the database under the user's state directory
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("lyrictype_progress.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                song_id TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_progress_user ON user_progress(user_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_progress_completed ON user_progress(completed_at)",
            [],
        )?;

        Ok(Self { conn })
    }

    /// All records of a user, oldest first
    pub fn user_records(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, song_id, wpm, accuracy, completed_at
            FROM user_progress
            WHERE user_id = ?1
            ORDER BY completed_at ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (user_id, song_id, wpm, accuracy, completed_at) = row?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|_| StoreError::Timestamp(completed_at.clone()))?
                .with_timezone(&Local);
            records.push(SessionRecord {
                user_id,
                song_id,
                wpm,
                accuracy,
                completed_at,
            });
        }
        Ok(records)
    }

    /// Write a user's records as CSV, returning how many rows were written
    pub fn export_csv<W: io::Write>(&self, user_id: &str, writer: W) -> Result<usize, StoreError> {
        let records = self.user_records(user_id)?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        for record in &records {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(records.len())
    }
}

impl ProgressStore for ProgressDb {
    fn record_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO user_progress (user_id, song_id, wpm, accuracy, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.user_id,
                record.song_id,
                record.wpm,
                record.accuracy,
                // UTC keeps the text column chronologically sortable
                record.completed_at.with_timezone(&Utc).to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn user_stats(&self, user_id: &str, now: DateTime<Local>) -> Result<UserStats, StoreError> {
        let records = self.user_records(user_id)?;
        Ok(aggregate_stats(&records, now))
    }

    fn leaderboard(&self, filter: &str, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, AVG(wpm) AS avg_wpm, COUNT(*) AS completed
            FROM user_progress
            GROUP BY user_id
            ORDER BY avg_wpm DESC, completed DESC, user_id ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let needle = filter.trim().to_lowercase();
        let mut entries = Vec::new();
        for (idx, row) in rows.enumerate() {
            let (user_id, avg_wpm, completed) = row?;
            if !needle.is_empty() && !user_id.to_lowercase().contains(&needle) {
                continue;
            }
            entries.push(LeaderboardEntry {
                rank: idx + 1,
                user_id,
                average_wpm: avg_wpm.round() as u32,
                songs_completed: completed as usize,
            });
            if entries.len() == limit {
                break;
            }
        }
        Ok(entries)
    }
}

/// Averages over all records and a per-weekday wpm series for the last week.
pub fn aggregate_stats(records: &[SessionRecord], now: DateTime<Local>) -> UserStats {
    let wpms: Vec<f64> = records.iter().map(|r| r.wpm as f64).collect();
    let accuracies: Vec<f64> = records.iter().map(|r| r.accuracy as f64).collect();

    // (weekday, running average, count) in order of first appearance
    let mut days: Vec<(String, f64, u32)> = Vec::new();
    for record in records.iter().filter(|r| age_in_days(r.completed_at, now) <= PROGRESS_WINDOW_DAYS) {
        let label = record.completed_at.format("%a").to_string();
        match days.iter_mut().find(|(day, _, _)| *day == label) {
            Some((_, wpm, count)) => {
                *wpm = (*wpm * *count as f64 + record.wpm as f64) / (*count + 1) as f64;
                *count += 1;
            }
            None => days.push((label, record.wpm as f64, 1)),
        }
    }

    UserStats {
        average_wpm: mean(&wpms).unwrap_or(0.0).round() as u32,
        average_accuracy: round_tenth(mean(&accuracies).unwrap_or(0.0)),
        songs_completed: records.len(),
        progress_data: days
            .into_iter()
            .map(|(date, wpm, _)| DailyWpm {
                date,
                wpm: wpm.round() as u32,
            })
            .collect(),
    }
}

/// Whole days between two instants, rounded up.
fn age_in_days(at: DateTime<Local>, now: DateTime<Local>) -> i64 {
    let diff_ms = (now - at).num_milliseconds().abs() as f64;
    (diff_ms / MS_PER_DAY).ceil() as i64
}
