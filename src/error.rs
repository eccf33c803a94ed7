// src/error.rs

use thiserror::Error;

/// Failures raised while normalizing one external dataset into typed rows.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP archive unreadable: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{endpoint} reported failure: {message}")]
    Api { endpoint: String, message: String },

    #[error("archive contains no entries")]
    EmptyArchive,

    #[error("binding #{row} is missing variable ?{var}")]
    MalformedBinding { var: String, row: usize },

    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("no knowledge-base mapping for unit code {code}")]
    MissingMapping { code: String },
}

impl ProviderError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        ProviderError::InvalidField {
            field,
            value: value.into(),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("identifier {0:?} cannot be used in a composite key")]
    InvalidIdentifier(String),
}
