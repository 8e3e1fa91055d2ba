//! teelog - duplicate a process's console output into rotating daily log files
//!
//! Output written through an [`output::OutputRegistry`] is echoed to the console and
//! appended, one timestamped record per line, to a log file that rotates at midnight
//! in the configured timezone. Old files are swept on startup.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Encoding, Settings, TeeConfig, Zone};
pub use error::{ConfigError, SinkError, SweepError};
pub use logging::{install, install_with_clock, TeeHandle};
pub use output::{MemoryConsole, OutputRegistry, OutputTarget, Role};
