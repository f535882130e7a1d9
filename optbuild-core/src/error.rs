//! Error types for the optbuild-core crate.

use thiserror::Error;

/// Top-level error type for configuration, optimization and build operations.
#[derive(Debug, Error)]
pub enum OptbuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecognized config type: {0}")]
    UnrecognizedConfig(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Optimization error: {0}")]
    Optimization(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration layering error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl OptbuildError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unrecognized(msg: impl Into<String>) -> Self {
        Self::UnrecognizedConfig(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn descriptor(msg: impl Into<String>) -> Self {
        Self::Descriptor(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn optimization(msg: impl Into<String>) -> Self {
        Self::Optimization(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OptbuildError>;
