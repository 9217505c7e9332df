use thiserror::Error;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned by import, merge and serialization functions.
///
/// This is a single error enum shared across all adapters (native XML, tabular
/// CSV, embedded SQLite schemas, DL7 transfer files, DLD containers).
///
/// Failure policy: row-level problems degrade individual fields to absent and
/// never surface here; everything in this enum is a file-level failure that
/// aborts the import with the destination table left untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV-layer error from the delimited-text engine.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite-layer error from an embedded-database adapter.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// ZIP-layer error from the container extractor.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML-layer error from the native-format parser or writer.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The format detector could not classify the input and no explicit
    /// format or field mapping was supplied by the caller.
    #[error("format not recognized ({0})")]
    NotRecognized(String),

    /// A database adapter was selected but a required table is missing.
    /// Distinguishable from [`ImportError::StoreUnreadable`] so the detector
    /// can try a different vendor adapter on schema ambiguity.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The embedded store or container cannot be opened at all.
    #[error("store unreadable: {message}")]
    StoreUnreadable { message: String },

    /// A record could not be decoded at all (as opposed to a single bad cell,
    /// which degrades to field-absent).
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// A field mapping references a column index that the input does not have.
    #[error("field mapping invalid: '{field}' maps to column {index} but input has {columns} columns")]
    FieldMappingInvalid {
        field: &'static str,
        index: usize,
        columns: usize,
    },

    /// A delimited-text format was selected without the field mapping it
    /// needs. A caller configuration problem, distinct from
    /// [`ImportError::FieldMappingInvalid`]: the mapping is absent, not wrong.
    #[error("field mapping required: {message}")]
    MappingRequired { message: String },

    /// A binary or container payload ended mid-record.
    #[error("truncated input at record {record}")]
    Truncated { record: usize },
}
