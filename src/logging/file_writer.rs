//! Daily log file with lazy rotation
//!
//! The sink owns at most one open file. The file always belongs to a calendar day in
//! the configured zone; the first write on a new day closes it and opens the next one.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::SinkError;
use crate::output::OutputTarget;

/// Width of the divider under the session banner
const BANNER_WIDTH: usize = 50;

enum SinkState {
    Closed,
    Open {
        day: NaiveDate,
        path: PathBuf,
        file: File,
    },
}

/// Owner of the current day's log file
pub struct FileSink {
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
    state: SinkState,
}

/// Header written at the top of a new or empty log file
pub fn session_banner(at: DateTime<FixedOffset>) -> String {
    format!(
        "Logging initiated for {}\n{}\n",
        at.format("%A, %d %B %Y"),
        "–".repeat(BANNER_WIDTH)
    )
}

impl FileSink {
    /// Create a closed sink; nothing touches the disk until the first rotation
    pub fn new(settings: Arc<Settings>, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            state: SinkState::Closed,
        }
    }

    /// Day of the open file
    pub fn current_day(&self) -> Option<NaiveDate> {
        match &self.state {
            SinkState::Open { day, .. } => Some(*day),
            SinkState::Closed => None,
        }
    }

    /// Path of the open file
    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            SinkState::Open { path, .. } => Some(path),
            SinkState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SinkState::Open { .. })
    }

    /// Make sure the open file belongs to today, switching files if needed.
    ///
    /// `console` receives the close notice and, when console output is enabled, the
    /// banner of a freshly started file.
    pub fn rotate_if_needed(&mut self, console: &dyn OutputTarget) -> Result<(), SinkError> {
        let now = self.clock.now();
        let today = self.settings.zone.date_of(now);
        if self.current_day() == Some(today) {
            return Ok(());
        }

        if let SinkState::Open { day, path, file } =
            std::mem::replace(&mut self.state, SinkState::Closed)
        {
            drop(file);
            tracing::debug!("Closed log file {} for {}", path.display(), day);
            let _ = console.write_str(&format!(
                "[{}] Closed log file for {}\n",
                self.settings.zone.format(now, "%H:%M:%S"),
                day
            ));
        }

        let path = self.settings.log_path_for(now);
        let is_empty = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Unavailable {
                path: path.clone(),
                source,
            })?;

        if is_empty {
            let banner = session_banner(self.settings.zone.localize(now));
            file.write_all(&self.settings.encoding.encode(&banner))
                .map_err(|source| SinkError::Write {
                    path: path.clone(),
                    source,
                })?;
            if self.settings.write_to_console {
                let _ = console.write_str(&banner);
            }
        }

        tracing::debug!("Opened log file {} for {}", path.display(), today);
        self.state = SinkState::Open {
            day: today,
            path,
            file,
        };
        Ok(())
    }

    /// Append one record, timestamped now.
    ///
    /// A closed sink ignores the record. A failed append closes the sink so that the
    /// next rotation reopens the file.
    pub fn write_record(&mut self, message: &str) -> Result<(), SinkError> {
        let SinkState::Open { path, file, .. } = &mut self.state else {
            return Ok(());
        };

        let timestamp = self.settings.timestamp(self.clock.now());
        let mut line = self.settings.template.render(&timestamp, message);
        line.push('\n');

        if let Err(source) = file.write_all(&self.settings.encoding.encode(&line)) {
            let path = path.clone();
            self.state = SinkState::Closed;
            return Err(SinkError::Write { path, source });
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.state {
            SinkState::Open { file, .. } => file.flush(),
            SinkState::Closed => Ok(()),
        }
    }

    /// Close the open file, if any
    pub fn close(&mut self) {
        if let SinkState::Open { path, .. } = std::mem::replace(&mut self.state, SinkState::Closed)
        {
            tracing::debug!("Closed log file {}", path.display());
        }
    }
}
