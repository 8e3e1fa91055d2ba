//! Output interception for teelog
//!
//! Tees the stdout/stderr roles into daily log files with timestamped lines, lazy
//! rotation and retention cleanup.

mod buffer;
mod file_writer;
mod install;
mod interceptor;
mod retention;
mod template;

pub use buffer::LineBuffer;
pub use file_writer::{session_banner, FileSink};
pub use install::{install, install_with_clock, TeeHandle};
pub use interceptor::Interceptor;
pub use retention::{sweep, SweepReport, DEFAULT_RETENTION_DAYS};
pub use template::LineTemplate;
