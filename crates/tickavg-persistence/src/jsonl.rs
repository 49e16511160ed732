//! JSON Lines file storage.
//!
//! One append-only file per UTC event date (`trades_YYYY-MM-DD.jsonl`):
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Files are never rewritten, so an interrupted append loses at most the
//!   last line
//!
//! File I/O is blocking and runs on the tokio blocking pool.

use crate::error::PersistenceResult;
use crate::storage::{RecordQuery, Storage};
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tickavg_core::TradeRecord;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "trades_";
const FILE_SUFFIX: &str = ".jsonl";

/// Append-only JSON Lines storage partitioned by event date.
#[derive(Debug, Clone)]
pub struct JsonLinesStorage {
    data_dir: PathBuf,
    /// Serializes appends so lines from concurrent batches never interleave.
    write_lock: Arc<Mutex<()>>,
}

impl JsonLinesStorage {
    /// Open storage rooted at `data_dir`, creating the directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        info!(data_dir = %data_dir.display(), "Opened JSON Lines storage");
        Ok(Self {
            data_dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_for(dir: &Path, date: NaiveDate) -> PathBuf {
        dir.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d")))
    }

    fn date_of(path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        let date = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    fn append_blocking(
        dir: &Path,
        write_lock: &Mutex<()>,
        records: &[TradeRecord],
    ) -> PersistenceResult<()> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&TradeRecord>> = BTreeMap::new();
        for record in records {
            by_date
                .entry(record.event_time().date_naive())
                .or_default()
                .push(record);
        }

        let _guard = write_lock.lock();
        for (date, records) in by_date {
            let path = Self::file_for(dir, date);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = BufWriter::new(file);
            for record in &records {
                let json = serde_json::to_string(record)?;
                writeln!(writer, "{json}")?;
            }
            writer.flush()?;
            debug!(file = %path.display(), records = records.len(), "Appended trade records");
        }
        Ok(())
    }

    fn query_blocking(dir: &Path, query: &RecordQuery) -> PersistenceResult<Vec<TradeRecord>> {
        let mut matching = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(date) = Self::date_of(&path) else {
                continue;
            };
            if !query.bound.may_contain_date(date) {
                continue;
            }

            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TradeRecord>(&line) {
                    Ok(record) if query.matches(&record) => matching.push(record),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "Skipping corrupt trade record line"
                        );
                    }
                }
            }
        }
        Ok(query.finish(matching))
    }
}

impl Storage for JsonLinesStorage {
    fn query(&self, query: RecordQuery) -> BoxFuture<'_, PersistenceResult<Vec<TradeRecord>>> {
        let dir = self.data_dir.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::query_blocking(&dir, &query)).await?
        })
    }

    fn append_batch<'a>(
        &'a self,
        records: &'a [TradeRecord],
    ) -> BoxFuture<'a, PersistenceResult<()>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(());
            }
            let dir = self.data_dir.clone();
            let write_lock = self.write_lock.clone();
            let owned = records.to_vec();
            tokio::task::spawn_blocking(move || Self::append_blocking(&dir, &write_lock, &owned))
                .await?
        })
    }
}
