//! Error types
//!
//! Missing required data is an ordinary outcome, not an error. Everything
//! here aborts classification of the affected cluster.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the time-series store
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("series {series} has more than one value in {year}")]
    DuplicateYear { series: String, year: i32 },

    #[error("failed to decode scenario data: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures while loading cluster definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("malformed rule '{key}': {reason}")]
    MalformedRule { key: String, reason: String },

    #[error("malformed required-data entry in {path}: {reason}")]
    MalformedRequirement { path: PathBuf, reason: String },

    #[error("no rule catalog found for cluster '{cluster}' in {dir}")]
    MissingCatalog { cluster: String, dir: PathBuf },
}

/// Failures during a classification pass
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("share of '{variable}' in '{denominator}' does not align on (region, year)")]
    MisalignedDerivedRatio { variable: String, denominator: String },
}
