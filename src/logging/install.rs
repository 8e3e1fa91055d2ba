//! Installing and removing the interceptor
//!
//! Installation validates the configuration, prepares the log directory, runs the
//! retention sweep and then points both output roles of a registry at a new
//! interceptor. The returned [`TeeHandle`] puts the captured targets back.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, TeeConfig};
use crate::error::ConfigError;
use crate::output::{OutputRegistry, OutputTarget};

use super::interceptor::Interceptor;
use super::retention::{self, SweepReport};

/// Handle to an installed interceptor
pub struct TeeHandle {
    interceptor: Arc<Interceptor>,
    registry: Arc<OutputRegistry>,
    already_installed: bool,
}

/// Install an interceptor on `registry` using the wall clock
pub fn install(
    config: &TeeConfig,
    registry: &Arc<OutputRegistry>,
) -> Result<TeeHandle, ConfigError> {
    install_with_clock(config, registry, Arc::new(SystemClock))
}

/// Install an interceptor on `registry`.
///
/// If one is already installed this does nothing but print a notice; the returned
/// handle then refers to the existing interceptor.
pub fn install_with_clock(
    config: &TeeConfig,
    registry: &Arc<OutputRegistry>,
    clock: Arc<dyn Clock>,
) -> Result<TeeHandle, ConfigError> {
    let settings = Arc::new(config.validate()?);
    let mut slots = registry.lock_slots();

    if let Some(existing) = &slots.installed {
        tracing::info!("Output interceptor already installed");
        let _ = slots.stdout.write_str("Logging is already set up.\n");
        return Ok(TeeHandle {
            interceptor: Arc::clone(existing),
            registry: Arc::clone(registry),
            already_installed: true,
        });
    }

    let console = Arc::clone(&slots.stdout);
    let stderr = Arc::clone(&slots.stderr);

    let file_enabled = settings.write_to_file && prepare_directory(&settings, console.as_ref());
    if file_enabled && settings.cleanup_on_startup {
        run_sweep(&settings, clock.as_ref(), console.as_ref());
    }

    let interceptor = Arc::new(Interceptor::new(
        settings,
        clock,
        console,
        stderr,
        file_enabled,
    ));
    let target: Arc<dyn OutputTarget> = interceptor.clone();
    slots.stdout = Arc::clone(&target);
    slots.stderr = target;
    slots.installed = Some(Arc::clone(&interceptor));
    drop(slots);

    tracing::info!("Output interceptor installed");
    Ok(TeeHandle {
        interceptor,
        registry: Arc::clone(registry),
        already_installed: false,
    })
}

/// Create the log directory; on failure file logging is off for this install
fn prepare_directory(settings: &Settings, console: &dyn OutputTarget) -> bool {
    match fs::create_dir_all(&settings.directory) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "Failed to create log directory {}: {}",
                settings.directory.display(),
                e
            );
            let _ = console.write_str(&format!(
                "[teelog] cannot create log directory {}: {}; file logging disabled\n",
                settings.directory.display(),
                e
            ));
            false
        }
    }
}

/// Sweep the log directory, narrating progress on the console
fn run_sweep(settings: &Settings, clock: &dyn Clock, console: &dyn OutputTarget) -> SweepReport {
    let stamp = || settings.zone.format(clock.now(), "%H:%M:%S");

    let _ = console.write_str(&format!("[{}] Running daily log cleanup...\n", stamp()));
    let report = retention::sweep(
        &settings.directory,
        settings.retention_days,
        settings.zone,
        clock,
    );
    for notice in report.notices() {
        let _ = console.write_str(&format!("[{}] {}\n", stamp(), notice));
    }
    let _ = console.write_str(&format!("[{}] Log cleanup finished.\n", stamp()));

    report
}

impl TeeHandle {
    /// Restore the captured console targets and close the log file.
    ///
    /// Returns `false` (after printing a notice) if this handle's interceptor is not the
    /// active one, e.g. on a second call.
    pub fn uninstall(&self) -> bool {
        let mut slots = self.registry.lock_slots();
        let active = slots
            .installed
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, &self.interceptor));

        if !active {
            let target = Arc::clone(&slots.stdout);
            drop(slots);
            tracing::info!("Output interceptor not installed, nothing to remove");
            let _ = target.write_str("Logging is not set up.\n");
            return false;
        }

        slots.stdout = Arc::clone(self.interceptor.console());
        slots.stderr = Arc::clone(self.interceptor.captured_stderr());
        slots.installed = None;
        drop(slots);

        self.interceptor.close();
        tracing::info!("Output interceptor removed");
        true
    }

    /// Whether this handle's interceptor is the one currently installed
    pub fn is_active(&self) -> bool {
        self.registry
            .lock_slots()
            .installed
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, &self.interceptor))
    }

    /// True if `install` found an interceptor already in place
    pub fn was_already_installed(&self) -> bool {
        self.already_installed
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    /// Path of the log file currently open
    pub fn current_log_path(&self) -> Option<PathBuf> {
        self.interceptor.current_log_path()
    }

    /// Run the retention sweep now with the installed settings
    pub fn sweep_now(&self) -> SweepReport {
        let settings = self.interceptor.settings();
        let clock = self.interceptor.clock();
        if !self.interceptor.has_file_sink() {
            return SweepReport::default();
        }
        // Notices go to the captured console, not the log file
        run_sweep(settings, clock.as_ref(), self.interceptor.console().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::config::Zone;
    use crate::output::{MemoryConsole, Role};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::io::Write;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct Setup {
        temp_dir: TempDir,
        out: Arc<MemoryConsole>,
        err: Arc<MemoryConsole>,
        registry: Arc<OutputRegistry>,
        clock: FakeClock,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 45, 0).unwrap()
    }

    fn setup() -> Setup {
        let out = MemoryConsole::new();
        let err = MemoryConsole::new();
        let registry = OutputRegistry::new(out.clone(), err.clone());
        Setup {
            temp_dir: TempDir::new().unwrap(),
            out,
            err,
            registry,
            clock: FakeClock::at(now()),
        }
    }

    impl Setup {
        fn config(&self) -> TeeConfig {
            TeeConfig {
                timezone: Zone::Utc,
                directory: self.temp_dir.path().join("logs"),
                ..TeeConfig::default()
            }
        }

        fn install(&self, config: &TeeConfig) -> TeeHandle {
            install_with_clock(config, &self.registry, Arc::new(self.clock.clone())).unwrap()
        }

        fn log_file(&self) -> PathBuf {
            self.temp_dir.path().join("logs").join("log_18-10-2026.txt")
        }
    }

    fn records(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|line| line.starts_with('['))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_install_routes_both_roles() {
        let s = setup();
        let handle = s.install(&s.config());

        s.registry.write(Role::Stdout, "from stdout\n").unwrap();
        s.registry.write(Role::Stderr, "from stderr\n").unwrap();

        assert!(handle.is_active());
        assert!(!handle.was_already_installed());
        assert!(s.registry.is_installed());
        assert_eq!(handle.current_log_path(), Some(s.log_file()));
        assert_eq!(
            records(&s.log_file()),
            vec!["[09:45:00] from stdout", "[09:45:00] from stderr"]
        );
        assert!(s.out.contents().ends_with("from stdout\nfrom stderr\n"));
        assert_eq!(s.err.contents(), "");
    }

    #[test]
    fn test_install_creates_nested_directory() {
        let s = setup();
        let mut config = s.config();
        config.directory = s.temp_dir.path().join("a").join("b").join("c");

        let handle = s.install(&config);

        assert!(config.directory.is_dir());
        assert!(handle
            .current_log_path()
            .unwrap()
            .starts_with(&config.directory));
    }

    #[test]
    fn test_second_install_is_noop() {
        let s = setup();
        let first = s.install(&s.config());
        let second = s.install(&s.config());

        assert!(second.was_already_installed());
        assert!(Arc::ptr_eq(first.interceptor(), second.interceptor()));
        assert!(s.out.contents().contains("Logging is already set up.\n"));
        assert_eq!(records(&s.log_file()), vec!["[09:45:00] Logging is already set up."]);

        assert!(second.uninstall());
        assert!(!first.is_active());
        assert!(!s.registry.is_installed());
    }

    #[test]
    fn test_uninstall_restores_exact_targets() {
        let s = setup();
        let before_out = s.registry.target(Role::Stdout);
        let before_err = s.registry.target(Role::Stderr);
        let handle = s.install(&s.config());

        assert!(!Arc::ptr_eq(&s.registry.target(Role::Stdout), &before_out));
        assert!(handle.uninstall());

        assert!(Arc::ptr_eq(&s.registry.target(Role::Stdout), &before_out));
        assert!(Arc::ptr_eq(&s.registry.target(Role::Stderr), &before_err));
        assert!(!handle.is_active());
    }

    #[test]
    fn test_uninstall_flushes_residue_and_is_idempotent() {
        let s = setup();
        let handle = s.install(&s.config());
        let mut stdout = s.registry.stdout();

        write!(stdout, "complete\nunterminated tail").unwrap();
        assert!(handle.uninstall());
        assert!(!handle.uninstall());

        assert_eq!(
            records(&s.log_file()),
            vec!["[09:45:00] complete", "[09:45:00] unterminated tail"]
        );
        assert!(s.out.contents().ends_with("Logging is not set up.\n"));

        // Output after uninstall goes straight to the console
        s.registry.write(Role::Stdout, "plain\n").unwrap();
        assert_eq!(records(&s.log_file()).len(), 2);
        assert!(s.out.contents().ends_with("plain\n"));
    }

    #[test]
    fn test_reinstall_after_uninstall_appends() {
        let s = setup();
        let first = s.install(&s.config());
        s.registry.write(Role::Stdout, "one\n").unwrap();
        first.uninstall();

        let second = s.install(&s.config());
        s.registry.write(Role::Stdout, "two\n").unwrap();
        second.uninstall();

        let content = std::fs::read_to_string(s.log_file()).unwrap();
        assert_eq!(content.matches("Logging initiated").count(), 1);
        assert_eq!(records(&s.log_file()), vec!["[09:45:00] one", "[09:45:00] two"]);
    }

    #[test]
    fn test_install_runs_cleanup() {
        let s = setup();
        let dir = s.temp_dir.path().join("logs");
        std::fs::create_dir_all(&dir).unwrap();
        let stale = dir.join("log_01-10-2026.txt");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(SystemTime::from(now() - Duration::days(17)))
            .unwrap();
        drop(file);

        s.install(&s.config());

        assert!(!stale.exists());
        let out = s.out.contents();
        assert!(out.starts_with("[09:45:00] Running daily log cleanup...\n"));
        assert!(out.contains("[09:45:00] Deleted old log file: log_01-10-2026.txt\n"));
        assert!(out.contains("[09:45:00] Log cleanup finished.\n"));
    }

    #[test]
    fn test_install_without_cleanup_keeps_old_files() {
        let s = setup();
        let dir = s.temp_dir.path().join("logs");
        std::fs::create_dir_all(&dir).unwrap();
        let stale = dir.join("old.txt");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(SystemTime::from(now() - Duration::days(30)))
            .unwrap();
        drop(file);

        let mut config = s.config();
        config.cleanup_on_startup = false;
        s.install(&config);

        assert!(stale.exists());
        assert!(!s.out.contents().contains("Running daily log cleanup"));
    }

    #[test]
    fn test_sweep_now() {
        let s = setup();
        let handle = s.install(&s.config());
        let dir = s.temp_dir.path().join("logs");
        let stale = dir.join("stale.txt");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(SystemTime::from(now() - Duration::days(9)))
            .unwrap();
        drop(file);

        let report = handle.sweep_now();

        assert!(report.deleted.contains(&stale));
        assert!(!stale.exists());
        assert!(s.out.contents().contains("Deleted old log file: stale.txt"));
    }

    #[test]
    fn test_unusable_directory_degrades_to_console() {
        let s = setup();
        let blocker = s.temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let mut config = s.config();
        config.directory = blocker.join("logs");

        let handle = s.install(&config);
        s.registry.write(Role::Stdout, "still visible\n").unwrap();

        assert!(handle.is_active());
        assert!(!handle.interceptor().has_file_sink());
        assert_eq!(handle.current_log_path(), None);
        let out = s.out.contents();
        assert!(out.contains("file logging disabled"));
        assert!(out.ends_with("still visible\n"));
        assert!(handle.uninstall());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_install() {
        let s = setup();
        let mut config = s.config();
        config.line_template = "{when} {message}".to_string();

        let result = install_with_clock(&config, &s.registry, Arc::new(s.clock.clone()));

        assert!(matches!(result, Err(ConfigError::UnknownPlaceholder { .. })));
        assert!(!s.registry.is_installed());
    }

    #[test]
    fn test_concurrent_writers_through_registry() {
        let s = setup();
        let mut config = s.config();
        config.write_to_console = false;
        let handle = s.install(&config);
        let threads = 6;
        let per_thread = 150;

        let workers: Vec<_> = (0..threads)
            .map(|t| {
                let registry = Arc::clone(&s.registry);
                std::thread::spawn(move || {
                    let mut stdout = registry.stdout();
                    for i in 0..per_thread {
                        writeln!(stdout, "worker-{}-{}", t, i).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        handle.uninstall();

        let lines = records(&s.log_file());
        assert_eq!(lines.len(), threads * per_thread);
        let mut seen: Vec<&str> = lines
            .iter()
            .map(|l| l.strip_prefix("[09:45:00] worker-").unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), threads * per_thread);
    }
}
