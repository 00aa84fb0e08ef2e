use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EdnaError {
    #[error("marker not recognized in dataset name: {0}")]
    UnknownMarker(String),

    #[error("site not recognized in dataset name: {0}")]
    UnknownSite(String),

    #[error("invalid AphiaID: {0}")]
    InvalidAphiaId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("pipeline results not found: {0}")]
    MissingResults(String),

    #[error("failed to read table {path}: {message}")]
    TableRead { path: String, message: String },

    #[error("failed to write table {path}: {message}")]
    TableWrite { path: String, message: String },

    #[error("failed to parse annotations {path}: {message}")]
    AnnotationParse { path: String, message: String },

    #[error("failed to read reference table {path}: {message}")]
    ReferenceData { path: String, message: String },

    #[error("WoRMS request failed: {0}")]
    RegistryHttp(String),

    #[error("WoRMS returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("registry returned {received} records for a batch of {requested}")]
    BatchMismatch { requested: usize, received: usize },

    #[error("registry has no record for AphiaID {0}")]
    MissingTaxon(u64),

    #[error("sample tracker request failed: {0}")]
    TrackerHttp(String),

    #[error("sample tracker returned status {status}: {message}")]
    TrackerStatus { status: u16, message: String },

    #[error("invalid sample tracker document: {0}")]
    TrackerParse(String),

    #[error("invalid species list: {0}")]
    SpeciesListParse(String),

    #[error("species list request failed: {0}")]
    SpeciesListHttp(String),

    #[error("species list returned status {status}: {message}")]
    SpeciesListStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to package {0}")]
    Package(String),
}
