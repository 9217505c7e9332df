//! Import entrypoints and format adapters.
//!
//! Most callers should use [`import_from_path`] (from [`unified`]) which:
//!
//! - auto-detects the format by content signature (or you can override via
//!   [`ImportOptions`])
//! - appends decoded dives and sites to an in-memory
//!   [`crate::model::DiveLog`] session
//! - optionally reports success/failure/alerts to an [`ImportObserver`]
//!
//! Format-specific functions are also available under:
//! - [`tabular`] (delimited text through a [`FieldMapping`])
//! - [`seabear`] (Seabear CSV logs)
//! - [`db`] (Suunto DM4/DM5 and DivingLog sqlite stores)
//! - [`dl7`] (DAN DL7 transfer files)
//! - [`container`] (zip archives of importable members)

pub mod container;
pub mod db;
pub mod detect;
pub mod dl7;
pub mod observability;
pub mod seabear;
pub mod tabular;
pub mod unified;

pub use detect::{detect_buffer, detect_path, ImportFormat};
pub use observability::{
    CompositeObserver, FileObserver, ImportContext, ImportObserver, ImportSeverity, ImportStats,
    StdErrObserver,
};
pub use tabular::{FieldMapping, Separator};
pub use unified::{import_from_path, ImportOptions};
