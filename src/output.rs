//! Output targets and the registry that routes the stdout/stderr roles
//!
//! The standard streams cannot be swapped out from under `println!`, so the currently
//! active output target lives in an explicit [`OutputRegistry`]. Output meant to be
//! teed goes through the registry (directly, via [`RoleWriter`], or with the
//! `tee_print!` macros). Installing an interceptor swaps the registry's targets and
//! uninstalling swaps them back.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use crate::logging::Interceptor;

/// Something text can be written to
pub trait OutputTarget: Send + Sync {
    fn write_str(&self, text: &str) -> io::Result<()>;
    fn flush(&self) -> io::Result<()>;
}

/// The process's real standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStdout;

impl OutputTarget for ProcessStdout {
    fn write_str(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// The process's real standard error
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStderr;

impl OutputTarget for ProcessStderr {
    fn write_str(&self, text: &str) -> io::Result<()> {
        io::stderr().lock().write_all(text.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// In-memory target, handy for capturing console output
#[derive(Debug, Default)]
pub struct MemoryConsole {
    contents: Mutex<String>,
}

impl MemoryConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Return and clear everything written so far
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.contents.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl OutputTarget for MemoryConsole {
    fn write_str(&self, text: &str) -> io::Result<()> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(text);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Which standard stream a write is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Stdout,
    Stderr,
}

pub(crate) struct Slots {
    pub(crate) stdout: Arc<dyn OutputTarget>,
    pub(crate) stderr: Arc<dyn OutputTarget>,
    pub(crate) installed: Option<Arc<Interceptor>>,
}

/// Holds the active target of each role and the installed interceptor, if any
pub struct OutputRegistry {
    slots: Mutex<Slots>,
}

static GLOBAL: LazyLock<Arc<OutputRegistry>> = LazyLock::new(OutputRegistry::process);

impl OutputRegistry {
    /// Create a registry with explicit initial targets
    pub fn new(stdout: Arc<dyn OutputTarget>, stderr: Arc<dyn OutputTarget>) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(Slots {
                stdout,
                stderr,
                installed: None,
            }),
        })
    }

    /// Create a registry wired to the real stdout and stderr
    pub fn process() -> Arc<Self> {
        Self::new(Arc::new(ProcessStdout), Arc::new(ProcessStderr))
    }

    /// The process-wide registry used by the `tee_print!` family
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub(crate) fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Currently active target of a role
    pub fn target(&self, role: Role) -> Arc<dyn OutputTarget> {
        let slots = self.lock_slots();
        match role {
            Role::Stdout => Arc::clone(&slots.stdout),
            Role::Stderr => Arc::clone(&slots.stderr),
        }
    }

    /// Whether an interceptor is currently installed
    pub fn is_installed(&self) -> bool {
        self.lock_slots().installed.is_some()
    }

    /// Write text to the active target of a role
    pub fn write(&self, role: Role, text: &str) -> io::Result<()> {
        self.target(role).write_str(text)
    }

    pub fn flush(&self, role: Role) -> io::Result<()> {
        self.target(role).flush()
    }

    /// Byte-oriented writer for the stdout role
    pub fn stdout(self: &Arc<Self>) -> RoleWriter {
        RoleWriter::new(Arc::clone(self), Role::Stdout)
    }

    /// Byte-oriented writer for the stderr role
    pub fn stderr(self: &Arc<Self>) -> RoleWriter {
        RoleWriter::new(Arc::clone(self), Role::Stderr)
    }
}

/// `io::Write` adapter over a registry role.
///
/// Bytes are decoded as UTF-8. An incomplete multi-byte sequence at the end of a write
/// is held until the next one; invalid bytes become U+FFFD.
pub struct RoleWriter {
    registry: Arc<OutputRegistry>,
    role: Role,
    pending: Vec<u8>,
}

impl RoleWriter {
    pub fn new(registry: Arc<OutputRegistry>, role: Role) -> Self {
        Self {
            registry,
            role,
            pending: Vec::new(),
        }
    }

    fn decode_pending(&mut self) -> String {
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + len);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

impl Write for RoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let text = self.decode_pending();
        if !text.is_empty() {
            self.registry.write(self.role, &text)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.registry.flush(self.role)
    }

    /// Formats the whole message first so that one `write!` is one write to the target
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        let text = fmt::format(args);
        self.write_all(text.as_bytes())
    }
}

impl Drop for RoleWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            let _ = self.registry.write(self.role, &text);
        }
    }
}

/// Backend of the `tee_print!` macros
#[doc(hidden)]
pub fn print_to(role: Role, args: fmt::Arguments<'_>) {
    let text = fmt::format(args);
    let _ = OutputRegistry::global().write(role, &text);
}

/// Like `print!`, but routed through the global registry
#[macro_export]
macro_rules! tee_print {
    ($($arg:tt)*) => {
        $crate::output::print_to($crate::output::Role::Stdout, format_args!($($arg)*))
    };
}

/// Like `println!`, but routed through the global registry
#[macro_export]
macro_rules! tee_println {
    () => {
        $crate::output::print_to($crate::output::Role::Stdout, format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::output::print_to(
            $crate::output::Role::Stdout,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}

/// Like `eprint!`, but routed through the global registry
#[macro_export]
macro_rules! tee_eprint {
    ($($arg:tt)*) => {
        $crate::output::print_to($crate::output::Role::Stderr, format_args!($($arg)*))
    };
}

/// Like `eprintln!`, but routed through the global registry
#[macro_export]
macro_rules! tee_eprintln {
    () => {
        $crate::output::print_to($crate::output::Role::Stderr, format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::output::print_to(
            $crate::output::Role::Stderr,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}
