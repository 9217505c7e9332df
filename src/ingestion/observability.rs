//! Import outcome reporting.
//!
//! Callers that want logging, metrics or alerting hook an [`ImportObserver`]
//! into [`super::unified::ImportOptions`]; the unified entrypoint reports
//! success, advisory notices, failures and threshold-crossing alerts.
//! Parsing itself never depends on an observer being present.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ImportError;

use super::detect::ImportFormat;

/// Severity classification used for observer callbacks and alert thresholds.
///
/// The lower two levels travel through [`ImportObserver::on_notice`] and
/// describe imports that succeeded; the upper two classify failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportSeverity {
    /// Advisory, e.g. the format was inferred by content signature rather
    /// than requested by the caller.
    Info,
    /// The import succeeded but the outcome is suspicious, e.g. a
    /// recognized file that contributed no dives at all.
    Warning,
    /// The import failed on the file's content.
    Error,
    /// The import failed below the parser, on I/O or store access.
    Critical,
}

impl Default for ImportSeverity {
    /// The default alert threshold: only critical failures alert.
    fn default() -> Self {
        Self::Critical
    }
}

/// Context about an import attempt.
#[derive(Debug, Clone)]
pub struct ImportContext {
    /// The input path used for the import.
    pub path: PathBuf,
    /// Format the import was dispatched to, when one was determined.
    pub format: Option<ImportFormat>,
}

impl ImportContext {
    fn label(&self) -> String {
        match self.format {
            Some(f) => format!("{} [{f:?}]", self.path.display()),
            None => format!("{} [unrecognized]", self.path.display()),
        }
    }
}

/// What a successful import contributed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Number of dives added to the session.
    pub dives: usize,
    /// Number of dive sites newly registered by this import.
    pub sites: usize,
}

/// Observer interface for import outcomes.
pub trait ImportObserver: Send + Sync {
    /// Called when an import succeeds.
    fn on_success(&self, _ctx: &ImportContext, _stats: ImportStats) {}

    /// Called for advisory events around a successful import, at
    /// [`ImportSeverity::Info`] or [`ImportSeverity::Warning`].
    fn on_notice(&self, _ctx: &ImportContext, _severity: ImportSeverity, _message: &str) {}

    /// Called when an import fails.
    fn on_failure(&self, _ctx: &ImportContext, _severity: ImportSeverity, _error: &ImportError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ImportObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ImportObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ImportObserver for CompositeObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_notice(&self, ctx: &ImportContext, severity: ImportSeverity, message: &str) {
        for o in &self.observers {
            o.on_notice(ctx, severity, message);
        }
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs import events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl ImportObserver for StdErrObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        eprintln!(
            "import {}: ok, {} dives, {} new sites",
            ctx.label(),
            stats.dives,
            stats.sites
        );
    }

    fn on_notice(&self, ctx: &ImportContext, severity: ImportSeverity, message: &str) {
        eprintln!("import {}: {severity:?}: {message}", ctx.label());
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        eprintln!("import {}: failed ({severity:?}): {error}", ctx.label());
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        eprintln!("import {}: ALERT ({severity:?}): {error}", ctx.label());
    }
}

/// Appends import events to a local log file, one timestamped line each.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open or write the log file
    /// are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, ctx: &ImportContext, event: fmt::Arguments<'_>) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} import {}: {event}", epoch_secs(), ctx.label());
        }
    }
}

impl ImportObserver for FileObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        self.append(
            ctx,
            format_args!("ok, {} dives, {} new sites", stats.dives, stats.sites),
        );
    }

    fn on_notice(&self, ctx: &ImportContext, severity: ImportSeverity, message: &str) {
        self.append(ctx, format_args!("{severity:?}: {message}"));
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.append(ctx, format_args!("failed ({severity:?}): {error}"));
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.append(ctx, format_args!("ALERT ({severity:?}): {error}"));
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        notices: AtomicUsize,
        alerts: AtomicUsize,
    }

    impl ImportObserver for Counter {
        fn on_notice(&self, _ctx: &ImportContext, _severity: ImportSeverity, _message: &str) {
            self.notices.fetch_add(1, Ordering::SeqCst);
        }

        fn on_alert(&self, _ctx: &ImportContext, _severity: ImportSeverity, _error: &ImportError) {
            self.alerts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> ImportContext {
        ImportContext {
            path: PathBuf::from("log.csv"),
            format: None,
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(ImportSeverity::Info < ImportSeverity::Warning);
        assert!(ImportSeverity::Warning < ImportSeverity::Error);
        assert!(ImportSeverity::Error < ImportSeverity::Critical);
    }

    #[test]
    fn composite_fans_out() {
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let composite = CompositeObserver::new(vec![a.clone(), b.clone()]);
        let err = ImportError::NotRecognized("log.csv".into());
        composite.on_alert(&ctx(), ImportSeverity::Error, &err);
        composite.on_notice(&ctx(), ImportSeverity::Warning, "no dives recognized");
        assert_eq!(a.alerts.load(Ordering::SeqCst), 1);
        assert_eq!(b.alerts.load(Ordering::SeqCst), 1);
        assert_eq!(a.notices.load(Ordering::SeqCst), 1);
        assert_eq!(b.notices.load(Ordering::SeqCst), 1);
    }
}
