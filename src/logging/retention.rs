//! Log file retention management
//!
//! Handles cleanup of old log files based on the calendar date of their last
//! modification.

use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};

use crate::clock::Clock;
use crate::config::Zone;
use crate::error::SweepError;

/// Default retention period in days
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Files modified before this date were eligible; `None` if nothing was scanned
    pub cutoff: Option<NaiveDate>,
    pub deleted: Vec<PathBuf>,
    /// Entries that could not be inspected or removed
    pub skipped: Vec<SweepError>,
    /// Set when the directory itself could not be read
    pub aborted: Option<SweepError>,
}

impl SweepReport {
    /// Human-readable lines: deletions, then skipped entries, then an abort if any
    pub fn notices(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .deleted
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                format!("Deleted old log file: {}", name)
            })
            .collect();
        lines.extend(self.skipped.iter().map(|e| e.to_string()));
        if let Some(err) = &self.aborted {
            lines.push(err.to_string());
        }
        lines
    }
}

/// Delete regular files in `logs_dir` last modified before `today - retention_days`.
///
/// A missing directory is not an error. Problems with single entries are recorded and
/// skipped; a failure to read the directory stops the sweep. Nothing is propagated.
pub fn sweep(logs_dir: &Path, retention_days: u64, zone: Zone, clock: &dyn Clock) -> SweepReport {
    let mut report = SweepReport::default();
    if !logs_dir.is_dir() {
        return report;
    }

    let today = zone.date_of(clock.now());
    let cutoff = today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(NaiveDate::MIN);
    report.cutoff = Some(cutoff);

    let entries = match fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(source) => {
            tracing::warn!("Failed to read log directory {}: {}", logs_dir.display(), source);
            report.aborted = Some(SweepError::Directory {
                path: logs_dir.to_path_buf(),
                source,
            });
            return report;
        }
    };

    sweep_entries(&mut report, logs_dir, entries, cutoff, zone);
    report
}

/// Sweep listed entries into `report`, stopping if the listing itself fails
fn sweep_entries(
    report: &mut SweepReport,
    logs_dir: &Path,
    entries: impl IntoIterator<Item = io::Result<DirEntry>>,
    cutoff: NaiveDate,
    zone: Zone,
) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                tracing::warn!("Log directory {} became unreadable: {}", logs_dir.display(), source);
                report.aborted = Some(SweepError::Directory {
                    path: logs_dir.to_path_buf(),
                    source,
                });
                break;
            }
        };

        match sweep_entry(&entry, cutoff, zone) {
            Ok(true) => {
                let path = entry.path();
                tracing::info!("Deleted old log file {}", path.display());
                report.deleted.push(path);
            }
            Ok(false) => {}
            Err(source) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                tracing::warn!("Skipping {} during log cleanup: {}", name, source);
                report.skipped.push(SweepError::Entry { name, source });
            }
        }
    }
}

/// Delete `entry` if it is a regular file last modified before `cutoff`
fn sweep_entry(entry: &DirEntry, cutoff: NaiveDate, zone: Zone) -> io::Result<bool> {
    if !entry.file_type()?.is_file() {
        return Ok(false);
    }
    let modified = entry.metadata()?.modified()?;
    if zone.date_of_system_time(modified) < cutoff {
        fs::remove_file(entry.path())?;
        return Ok(true);
    }
    Ok(false)
}
