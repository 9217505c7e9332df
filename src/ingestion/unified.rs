//! Unified import entrypoint.
//!
//! Most callers should use [`import_from_path`], which imports a file into an
//! in-memory [`crate::model::DiveLog`] session.
//!
//! - If [`ImportOptions::format`] is `None`, the format is inferred from the
//!   file's content signature (see [`super::detect`]). Delimited-text formats
//!   carry no signature and must be selected explicitly.
//! - If an [`super::observability::ImportObserver`] is provided,
//!   success/failure/alerts are reported to it.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ImportError, ImportResult};
use crate::model::DiveLog;
use crate::native;

use super::container;
use super::db::{self, DbImportOptions};
use super::detect::{self, ImportFormat};
use super::dl7;
use super::observability::{ImportContext, ImportObserver, ImportSeverity, ImportStats};
use super::seabear;
use super::tabular::{self, FieldMapping};

/// Options controlling unified import behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone, Default)]
pub struct ImportOptions {
    /// If `None`, auto-detect the format from the file's content signature.
    pub format: Option<ImportFormat>,
    /// Column mapping for delimited-text and DL7 sources.
    ///
    /// Required for [`ImportFormat::ManualCsv`] and
    /// [`ImportFormat::ProfileCsv`]; optional for [`ImportFormat::Dl7`]
    /// (the standard DAN layout is used when absent).
    pub mapping: Option<FieldMapping>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn ImportObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: ImportSeverity,
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("format", &self.format)
            .field("mapping_set", &self.mapping.is_some())
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Unified import entry point for path-based sources.
///
/// Dives and sites decoded from the file are appended to `log`; on any
/// error the session is left untouched.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with dive and site counts
/// - `on_notice` around a success: at `Info` when the format was inferred
///   rather than requested, at `Warning` when a recognized file contributed
///   no dives
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >=
///   `options.alert_at_or_above`
///
/// # Examples
///
/// ## Auto-detect by content signature
///
/// ```no_run
/// use divelog_ingest::ingestion::{import_from_path, ImportOptions};
/// use divelog_ingest::model::DiveLog;
///
/// # fn main() -> Result<(), divelog_ingest::ImportError> {
/// let mut log = DiveLog::new();
/// // Databases, containers, DL7 and native files are recognized by signature.
/// let stats = import_from_path("trip.sde", &mut log, &ImportOptions::default())?;
/// println!("dives={}", stats.dives);
/// # Ok(())
/// # }
/// ```
///
/// ## Delimited text with an explicit mapping
///
/// ```no_run
/// use divelog_ingest::ingestion::{import_from_path, FieldMapping, ImportFormat, ImportOptions};
/// use divelog_ingest::model::DiveLog;
///
/// # fn main() -> Result<(), divelog_ingest::ImportError> {
/// let mapping = FieldMapping {
///     number: Some(0),
///     date: Some(1),
///     duration: Some(2),
///     ..Default::default()
/// };
/// let opts = ImportOptions {
///     format: Some(ImportFormat::ManualCsv),
///     mapping: Some(mapping),
///     ..Default::default()
/// };
///
/// let mut log = DiveLog::new();
/// let stats = import_from_path("dives.csv", &mut log, &opts)?;
/// println!("dives={}", stats.dives);
/// # Ok(())
/// # }
/// ```
///
/// ## Observability (stderr logging + alert threshold)
///
/// ```no_run
/// use std::sync::Arc;
///
/// use divelog_ingest::ingestion::{
///     import_from_path, ImportOptions, ImportSeverity, StdErrObserver,
/// };
/// use divelog_ingest::model::DiveLog;
///
/// # fn main() -> Result<(), divelog_ingest::ImportError> {
/// let opts = ImportOptions {
///     observer: Some(Arc::new(StdErrObserver)),
///     alert_at_or_above: ImportSeverity::Critical,
///     ..Default::default()
/// };
///
/// let mut log = DiveLog::new();
/// // Missing files are Critical and trigger `on_alert` at this threshold.
/// let _err = import_from_path("does_not_exist.sde", &mut log, &opts).unwrap_err();
/// # Ok(())
/// # }
/// ```
pub fn import_from_path(
    path: impl AsRef<Path>,
    log: &mut DiveLog,
    options: &ImportOptions,
) -> ImportResult<ImportStats> {
    let path = path.as_ref();

    let auto_detected = options.format.is_none();
    let resolved = match options.format {
        Some(f) => Ok(f),
        None => detect_format(path),
    };

    let ctx = ImportContext {
        path: path.to_path_buf(),
        format: resolved.as_ref().ok().copied(),
    };

    let sites_before = log.sites.len();
    let result = resolved
        .and_then(|fmt| dispatch(path, fmt, log, options))
        .map(|dives| ImportStats {
            dives,
            sites: log.sites.len().saturating_sub(sites_before),
        });

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(stats) => {
                if auto_detected {
                    obs.on_notice(&ctx, ImportSeverity::Info, "format inferred from content");
                }
                obs.on_success(&ctx, *stats);
                if stats.dives == 0 {
                    obs.on_notice(&ctx, ImportSeverity::Warning, "input contributed no dives");
                }
            }
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

fn dispatch(
    path: &Path,
    fmt: ImportFormat,
    log: &mut DiveLog,
    options: &ImportOptions,
) -> ImportResult<usize> {
    match fmt {
        ImportFormat::Container => container::parse_container(&fs::read(path)?, log),
        ImportFormat::Native => native::parse_native_into(&fs::read_to_string(path)?, log),
        ImportFormat::Dm4 => db::dm4::parse_dm4_file(path, &DbImportOptions::default(), log),
        ImportFormat::Dm5 => db::dm5::parse_dm5_file(path, &DbImportOptions::default(), log),
        ImportFormat::DivingLog => {
            db::divinglog::parse_divinglog_file(path, &DbImportOptions::default(), log)
        }
        ImportFormat::Dl7 => {
            let mapping = options.mapping.clone().unwrap_or_else(dl7::default_mapping);
            dl7::parse_dl7(&fs::read(path)?, &mapping, log)
        }
        ImportFormat::Seabear => seabear::parse_log(&fs::read_to_string(path)?, log),
        ImportFormat::ManualCsv => {
            let mapping = require_mapping(path, options)?;
            tabular::parse_manual(&fs::read_to_string(path)?, mapping, log)
        }
        ImportFormat::ProfileCsv => {
            let mapping = require_mapping(path, options)?;
            tabular::parse_profile(&fs::read_to_string(path)?, mapping, log)
        }
    }
}

fn detect_format(path: &Path) -> ImportResult<ImportFormat> {
    detect::detect_path(path)?
        .ok_or_else(|| ImportError::NotRecognized(path.display().to_string()))
}

fn require_mapping<'a>(path: &Path, options: &'a ImportOptions) -> ImportResult<&'a FieldMapping> {
    options.mapping.as_ref().ok_or_else(|| ImportError::MappingRequired {
        message: format!(
            "delimited-text import requires a field mapping ({})",
            path.display()
        ),
    })
}

fn severity_for_error(e: &ImportError) -> ImportSeverity {
    match e {
        ImportError::Io(_) => ImportSeverity::Critical,
        ImportError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => ImportSeverity::Critical,
            _ => ImportSeverity::Error,
        },
        _ => ImportSeverity::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_debug_hides_observer() {
        let opts = ImportOptions {
            observer: Some(Arc::new(super::super::observability::StdErrObserver)),
            ..Default::default()
        };
        let dbg = format!("{opts:?}");
        assert!(dbg.contains("observer_set: true"));
    }

    #[test]
    fn missing_file_is_critical() {
        let err = ImportError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(severity_for_error(&err), ImportSeverity::Critical);
    }
}
