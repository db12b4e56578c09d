use chrono::{Duration, NaiveDate};
use pulse_core::ArchiveSnapshot;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;
use crate::retention::{RetentionPolicy, Verdict};

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Prefix of in-flight writes; such files are never treated as archives
const TEMP_PREFIX: &str = ".archive-";

/// Result of an archival attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Written,
    /// A file for the date already exists; nothing was written
    AlreadyPresent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub kept: usize,
    pub deleted: usize,
    /// Files whose name is not a date
    pub skipped: usize,
}

/// Owns the archive directory: one `YYYY-MM-DD.json` per business date.
///
/// All methods do blocking file I/O; async callers run them on the blocking pool.
#[derive(Debug, Clone)]
pub struct Archiver {
    dir: PathBuf,
    policy: RetentionPolicy,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format(DATE_FORMAT)))
    }

    /// Write the snapshot for its date unless one already exists.
    ///
    /// The body goes to a temp file in the archive directory and is then moved
    /// into place without clobbering, so a concurrent writer for the same date
    /// sees [`ArchiveOutcome::AlreadyPresent`] and an interrupted write never
    /// leaves a partial file under the dated name.
    pub fn archive(&self, snapshot: &ArchiveSnapshot) -> Result<ArchiveOutcome, ArchiveError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(snapshot.date);
        if path.exists() {
            tracing::debug!("Archive for {} already present", snapshot.date);
            return Ok(ArchiveOutcome::AlreadyPresent);
        }
        let body = serde_json::to_vec_pretty(snapshot)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        temp.write_all(&body)?;
        temp.as_file().sync_all()?;

        match temp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::info!("Archived snapshot {}", path.display());
                Ok(ArchiveOutcome::Written)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!("Archive for {} already present", snapshot.date);
                Ok(ArchiveOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Archive, then sweep. The sweep runs whatever the archival outcome.
    pub fn archive_and_sweep(
        &self,
        snapshot: &ArchiveSnapshot,
        today: NaiveDate,
    ) -> (Result<ArchiveOutcome, ArchiveError>, SweepReport) {
        let outcome = self.archive(snapshot);
        if let Err(e) = &outcome {
            tracing::warn!("Archiving {} failed: {}", snapshot.date, e);
        }
        let report = self.sweep(today);
        (outcome, report)
    }

    /// Apply the retention policy to every file in the archive directory.
    ///
    /// Unparseable names are skipped, deletion failures are logged, and a
    /// missing directory is an empty sweep.
    pub fn sweep(&self, today: NaiveDate) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Cannot read archive dir {}: {}", self.dir.display(), e);
                }
                return report;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(date) = date_from_path(&path) else {
                tracing::debug!("Skipping non-archive file {}", path.display());
                report.skipped += 1;
                continue;
            };

            match self.policy.evaluate(date, today) {
                Verdict::Keep => report.kept += 1,
                Verdict::Delete => match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!("Retention removed {}", path.display());
                        report.deleted += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to remove {}: {}", path.display(), e);
                        report.kept += 1;
                    }
                },
            }
        }

        tracing::info!(
            "Retention sweep: kept {}, deleted {}, skipped {}",
            report.kept,
            report.deleted,
            report.skipped
        );
        report
    }

    /// Archived dates, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| date_from_path(&e.path()).ok())
                    .collect()
            })
            .unwrap_or_default();
        dates.sort();
        dates
    }

    pub fn load(&self, date: NaiveDate) -> Result<ArchiveSnapshot, ArchiveError> {
        let text = fs::read_to_string(self.path_for(date))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Snapshots from the last `days` days up to and including `today`,
    /// newest first. Unreadable files are skipped.
    pub fn load_history(&self, today: NaiveDate, days: i64) -> Vec<ArchiveSnapshot> {
        let earliest = today - Duration::days(days);
        let mut history: Vec<ArchiveSnapshot> = self
            .dates()
            .into_iter()
            .rev()
            .filter(|d| *d >= earliest && *d <= today)
            .filter_map(|d| match self.load(d) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!("Skipping unreadable archive {}: {}", d, e);
                    None
                }
            })
            .collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        history
    }
}

/// Parse the business date out of `YYYY-MM-DD.json`.
pub fn date_from_path(path: &Path) -> Result<NaiveDate, ArchiveError> {
    let invalid = || ArchiveError::InvalidName(path.display().to_string());
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(invalid());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).map_err(|_| invalid())
}
