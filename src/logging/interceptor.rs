//! The tee: console passthrough plus line-based file logging

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::SinkError;
use crate::output::OutputTarget;

use super::buffer::LineBuffer;
use super::file_writer::FileSink;

struct Inner {
    buffer: LineBuffer,
    sink: Option<FileSink>,
    /// A sink failure has been reported and not yet recovered from
    failing: bool,
}

/// Stands in for the console: every write is echoed to the captured console and,
/// line by line, appended to the day's log file.
pub struct Interceptor {
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
    console: Arc<dyn OutputTarget>,
    captured_stderr: Arc<dyn OutputTarget>,
    inner: Mutex<Inner>,
}

impl Interceptor {
    /// Build an interceptor around the captured console targets.
    ///
    /// With `file_enabled` the sink is opened for today right away; a failure there is
    /// reported and retried on the next write.
    pub(crate) fn new(
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
        console: Arc<dyn OutputTarget>,
        captured_stderr: Arc<dyn OutputTarget>,
        file_enabled: bool,
    ) -> Self {
        let sink = file_enabled.then(|| FileSink::new(Arc::clone(&settings), Arc::clone(&clock)));
        let interceptor = Self {
            settings,
            clock,
            console,
            captured_stderr,
            inner: Mutex::new(Inner {
                buffer: LineBuffer::new(),
                sink,
                failing: false,
            }),
        };

        {
            let mut inner = interceptor.lock();
            let Inner { sink, failing, .. } = &mut *inner;
            if let Some(sink) = sink {
                if let Err(err) = sink.rotate_if_needed(interceptor.console.as_ref()) {
                    interceptor.report(failing, &err);
                }
            }
        }

        interceptor
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report a sink failure on the console, once per run of consecutive failures
    fn report(&self, failing: &mut bool, err: &SinkError) {
        if !*failing {
            *failing = true;
            tracing::warn!("Log file unavailable: {}", err);
            let _ = self.console.write_str(&format!(
                "[teelog] {}; continuing with console output only\n",
                err
            ));
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The stdout target captured at install time
    pub fn console(&self) -> &Arc<dyn OutputTarget> {
        &self.console
    }

    /// The stderr target captured at install time
    pub fn captured_stderr(&self) -> &Arc<dyn OutputTarget> {
        &self.captured_stderr
    }

    /// Whether file logging is still part of this interceptor
    pub fn has_file_sink(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Path of the log file currently open
    pub fn current_log_path(&self) -> Option<PathBuf> {
        self.lock()
            .sink
            .as_ref()
            .and_then(|sink| sink.current_path().map(|p| p.to_path_buf()))
    }

    /// Text waiting for a newline
    pub fn pending(&self) -> String {
        self.lock().buffer.pending().to_string()
    }

    /// Echo `text` to the console and log every line it completes
    pub fn write(&self, text: &str) {
        let mut inner = self.lock();

        if self.settings.write_to_console {
            let _ = self.console.write_str(text);
        }

        let Inner {
            buffer,
            sink,
            failing,
        } = &mut *inner;
        let Some(sink) = sink else {
            return;
        };

        // The buffer follows the stream even while the file is unavailable
        let rotated = sink.rotate_if_needed(self.console.as_ref());
        let lines = buffer.push(text);
        if let Err(err) = rotated {
            self.report(failing, &err);
            return;
        }

        for line in lines {
            if let Err(err) = sink.write_record(&line) {
                self.report(failing, &err);
                return;
            }
        }

        if *failing {
            *failing = false;
            tracing::info!("Log file available again");
        }
    }

    /// Flush the console and the open file. Buffered partial lines stay buffered.
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.lock();
        let console = self.console.flush();
        let file = match inner.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        };
        console.and(file)
    }

    /// Write any non-blank residue as a final record and close the file.
    ///
    /// Later writes only reach the console.
    pub(crate) fn close(&self) {
        let mut inner = self.lock();
        let Inner {
            buffer,
            sink,
            failing,
        } = &mut *inner;

        let residue = buffer.take_residue();
        if let Some(mut sink) = sink.take() {
            if let Some(residue) = residue {
                if let Err(err) = sink.write_record(&residue) {
                    self.report(failing, &err);
                }
            }
            sink.close();
        }
    }
}

impl OutputTarget for Interceptor {
    fn write_str(&self, text: &str) -> io::Result<()> {
        self.write(text);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Interceptor::flush(self)
    }
}
