use thiserror::Error;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error while parsing {source_name}: {details}")]
    Parse { source_name: String, details: String },

    #[error("schema registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("could not find schema for {kind}")]
    MissingSchema { kind: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("concurrent task failed: {0}")]
    Concurrency(String),
}

/// Failure of a single schema source.
///
/// The resolver branches on `is_not_found()`: a definitive not-found lets the
/// chain fall through to the next source, while every other variant is
/// terminal for that resolution.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no schema at {location}")]
    NotFound { location: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} failed: {details}")]
    Request { url: String, details: String },

    #[error("failed reading {path}: {details}")]
    Io { path: String, details: String },

    #[error("invalid schema from {location}: {details}")]
    InvalidSchema { location: String, details: String },
}

impl RegistryError {
    /// True when the source definitively confirms it has no such schema
    /// (missing file, HTTP 404), as opposed to a transient or structural
    /// failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;
