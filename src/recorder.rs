use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{error::Result, session::SessionResult};

pub const HISTORY_HEADER: [&str; 5] = ["DateTime", "Gender", "Exercise", "Reps", "DurationSec"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of the workout history log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "DateTime")]
    pub timestamp: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Exercise")]
    pub exercise: String,
    #[serde(rename = "Reps")]
    pub reps: u32,
    #[serde(rename = "DurationSec")]
    pub duration_secs: u64,
}

impl HistoryRow {
    pub fn from_result(result: &SessionResult) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            gender: result.gender.as_str().to_string(),
            exercise: result.exercise.as_str().to_string(),
            reps: result.reps,
            duration_secs: result.duration_secs,
        }
    }
}

/// Append-only store of completed sessions.
pub trait ResultRecorder: Send + Sync {
    fn record(&self, result: &SessionResult) -> Result<()>;

    /// Most recent `limit` rows, oldest first.
    fn recent(&self, limit: usize) -> Result<Vec<HistoryRow>>;
}

/// CSV-backed history log.
#[derive(Debug)]
pub struct CsvRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvRecorder {
    /// Opens the log, writing the header if the file is new or empty.
    /// Call once at startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(HISTORY_HEADER)?;
            writer.flush()?;
            log::info!("created history log at {}", path.display());
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

impl ResultRecorder for CsvRecorder {
    fn record(&self, result: &SessionResult) -> Result<()> {
        let _guard = self.write_lock.lock();
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(HistoryRow::from_result(result))?;
        writer.flush()?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        let file = File::open(&self.path)?;
        let mut reader = csv::Reader::from_reader(file);
        let mut rows = VecDeque::with_capacity(limit);
        for row in reader.deserialize::<HistoryRow>() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    log::warn!("skipping malformed history row: {err}");
                    continue;
                }
            };
            if rows.len() == limit {
                rows.pop_front();
            }
            if limit > 0 {
                rows.push_back(row);
            }
        }
        Ok(rows.into())
    }
}

/// In-memory recorder, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    rows: Mutex<Vec<HistoryRow>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<HistoryRow> {
        self.rows.lock().clone()
    }
}

impl ResultRecorder for MemoryRecorder {
    fn record(&self, result: &SessionResult) -> Result<()> {
        self.rows.lock().push(HistoryRow::from_result(result));
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        let rows = self.rows.lock();
        let start = rows.len().saturating_sub(limit);
        Ok(rows[start..].to_vec())
    }
}
