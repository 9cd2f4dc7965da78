use thiserror::Error;

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(format!("I/O error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Unknown audit category: {0}")]
    UnknownCategory(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

impl AuditError {
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Missing field names, if this is a validation failure
    pub fn missing_fields(&self) -> Option<&[String]> {
        match self {
            Self::MissingFields(fields) => Some(fields),
            _ => None,
        }
    }
}
