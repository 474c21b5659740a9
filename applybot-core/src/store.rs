//! Append-only CSV ledger of jobs already applied to.
//!
//! Columns are `job_id,job_title,company,applied_date`, the date written as
//! local `YYYY-MM-DD HH:MM:SS`. The header is written only when the file is
//! created (or found empty); every later append adds exactly one row.
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const APPLIED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedJobRecord {
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    #[serde(rename = "applied_date", with = "applied_date")]
    pub applied_at: NaiveDateTime,
}

impl AppliedJobRecord {
    /// Stamp a new record with the current local time, truncated to seconds.
    pub fn new(
        job_id: impl Into<String>,
        job_title: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        let now = Local::now().naive_local();
        Self {
            job_id: job_id.into(),
            job_title: job_title.into(),
            company: company.into(),
            applied_at: now.with_nanosecond(0).unwrap_or(now),
        }
    }
}

mod applied_date {
    use super::APPLIED_DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(APPLIED_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), APPLIED_DATE_FORMAT).map_err(D::Error::custom)
    }
}

#[derive(Debug, Deserialize)]
struct JobIdRow {
    job_id: String,
}

/// The durable half of the dedup machinery.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every persisted job id.
    ///
    /// Never fails: a missing file is an empty history, and unreadable rows
    /// are logged and skipped.
    pub fn load(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(err) => {
                if is_not_found(&err) {
                    debug!(target: "store.load", path = %self.path.display(), "no prior store");
                } else {
                    warn!(target: "store.load", path = %self.path.display(), error = %err, "store unreadable; starting empty");
                }
                return ids;
            }
        };

        for row in reader.deserialize::<JobIdRow>() {
            match row {
                Ok(row) if !row.job_id.trim().is_empty() => {
                    ids.insert(row.job_id);
                }
                Ok(_) => {}
                Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                    warn!(target: "store.load", error = %err, "store read aborted");
                    break;
                }
                Err(err) => {
                    warn!(target: "store.load", error = %err, "skipping malformed row");
                }
            }
        }
        info!(target: "store.load", path = %self.path.display(), count = ids.len(), "loaded applied jobs");
        ids
    }

    /// Full history, oldest first. A missing file yields an empty list.
    pub fn records(&self) -> Result<Vec<AppliedJobRecord>, StoreError> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(err) if is_not_found(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut records = Vec::new();
        for row in reader.deserialize::<AppliedJobRecord>() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Durably append one record, creating the file (with header) if needed.
    pub fn append(&self, record: &AppliedJobRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        debug!(target: "store.append", job_id = %record.job_id, header = write_header, "record appended");
        Ok(())
    }
}

fn is_not_found(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}
