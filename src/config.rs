//! Configuration management for teelog

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::str::FromStr;
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::{LineTemplate, DEFAULT_RETENTION_DAYS};

/// Timezone used for day boundaries, filenames and timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Zone {
    /// The host's local timezone
    #[default]
    Local,
    Utc,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
}

impl Zone {
    /// Convert an instant into this zone
    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Zone::Local => at.with_timezone(&chrono::Local).fixed_offset(),
            Zone::Utc => at.fixed_offset(),
            Zone::Fixed(offset) => at.with_timezone(offset),
        }
    }

    /// Calendar date of an instant in this zone
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        self.localize(at).date_naive()
    }

    /// Calendar date of a file timestamp in this zone
    pub fn date_of_system_time(&self, at: SystemTime) -> NaiveDate {
        self.date_of(DateTime::<Utc>::from(at))
    }

    /// Render an instant with a strftime pattern.
    ///
    /// Patterns are checked by [`TeeConfig::validate`]; should one still fail to
    /// render, the raw pattern is returned instead of panicking.
    pub fn format(&self, at: DateTime<Utc>, pattern: &str) -> String {
        let mut out = String::new();
        if write!(out, "{}", self.localize(at).format(pattern)).is_err() {
            return pattern.to_string();
        }
        out
    }
}

impl FromStr for Zone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(Zone::Local),
            "utc" | "z" => return Ok(Zone::Utc),
            _ => {}
        }
        parse_offset(trimmed)
            .map(Zone::Fixed)
            .ok_or_else(|| ConfigError::InvalidTimezone(s.to_string()))
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl TryFrom<String> for Zone {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.to_string()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => f.write_str("local"),
            Zone::Utc => f.write_str("utc"),
            Zone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Text encoding of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Encode text for the file
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        match self {
            Encoding::Utf8 => Cow::Borrowed(text.as_bytes()),
            Encoding::Utf16Le => {
                Cow::Owned(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
            }
            Encoding::Utf16Be => {
                Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        }
    }
}

impl FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "utf16le" => Ok(Encoding::Utf16Le),
            "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(ConfigError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.as_str().to_string()
    }
}

/// Interceptor configuration, as written by users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeeConfig {
    /// Zone for day boundaries and timestamps: "local", "utc" or "+05:30"
    #[serde(default)]
    pub timezone: Zone,

    /// Directory holding the daily log files (`~` is expanded)
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// strftime pattern for the file name, evaluated once per calendar day
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    /// strftime pattern for the `{timestamp}` slot
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Files whose modification date is older than this many days are removed
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    #[serde(default = "default_true")]
    pub write_to_file: bool,

    #[serde(default = "default_true")]
    pub write_to_console: bool,

    /// Record layout with `{timestamp}` and `{message}` slots
    #[serde(default = "default_line_template")]
    pub line_template: String,

    #[serde(default)]
    pub encoding: Encoding,

    /// Run the retention sweep during install
    #[serde(default = "default_true")]
    pub cleanup_on_startup: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_filename_pattern() -> String {
    "log_%d-%m-%Y.txt".to_string()
}

fn default_timestamp_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_retention_days() -> u64 {
    DEFAULT_RETENTION_DAYS
}

fn default_true() -> bool {
    true
}

fn default_line_template() -> String {
    "[{timestamp}] {message}".to_string()
}

impl Default for TeeConfig {
    fn default() -> Self {
        Self {
            timezone: Zone::default(),
            directory: default_directory(),
            filename_pattern: default_filename_pattern(),
            timestamp_format: default_timestamp_format(),
            retention_days: default_retention_days(),
            write_to_file: true,
            write_to_console: true,
            line_template: default_line_template(),
            encoding: Encoding::default(),
            cleanup_on_startup: true,
        }
    }
}

impl TeeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file, or return the defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check every pattern and produce the settings the interceptor runs on
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        check_strftime("timestamp", &self.timestamp_format)?;
        check_filename_pattern(&self.filename_pattern)?;
        let template = LineTemplate::parse(&self.line_template)?;
        let directory = PathBuf::from(
            shellexpand::tilde(&self.directory.to_string_lossy()).into_owned(),
        );

        Ok(Settings {
            zone: self.timezone,
            directory,
            filename_pattern: self.filename_pattern.clone(),
            timestamp_format: self.timestamp_format.clone(),
            retention_days: self.retention_days,
            write_to_file: self.write_to_file,
            write_to_console: self.write_to_console,
            template,
            encoding: self.encoding,
            cleanup_on_startup: self.cleanup_on_startup,
        })
    }
}

fn check_strftime(field: &'static str, pattern: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidFormat {
            field,
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// The file name must render to a single, non-empty path component
fn check_filename_pattern(pattern: &str) -> Result<(), ConfigError> {
    check_strftime("filename", pattern)?;
    let invalid = || ConfigError::InvalidFormat {
        field: "filename",
        pattern: pattern.to_string(),
    };
    let sample = Utc
        .with_ymd_and_hms(2000, 12, 31, 23, 59, 59)
        .single()
        .ok_or_else(invalid)?;
    let rendered = Zone::Utc.format(sample, pattern);
    let trimmed = rendered.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || rendered.contains('/')
        || rendered.contains(MAIN_SEPARATOR)
    {
        return Err(invalid());
    }
    Ok(())
}

/// Validated configuration. Read-only for the lifetime of an interceptor.
#[derive(Debug, Clone)]
pub struct Settings {
    pub zone: Zone,
    pub directory: PathBuf,
    pub filename_pattern: String,
    pub timestamp_format: String,
    pub retention_days: u64,
    pub write_to_file: bool,
    pub write_to_console: bool,
    pub template: LineTemplate,
    pub encoding: Encoding,
    pub cleanup_on_startup: bool,
}

impl Settings {
    /// Path of the log file for the day containing `at`
    pub fn log_path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(self.zone.format(at, &self.filename_pattern))
    }

    /// Timestamp for the `{timestamp}` slot
    pub fn timestamp(&self, at: DateTime<Utc>) -> String {
        self.zone.format(at, &self.timestamp_format)
    }
}
