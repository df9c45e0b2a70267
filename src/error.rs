//! Error handling and custom error types
//!
//! Every adapter maps its transport failures into [`Error::Provider`] so that no
//! vendor error type leaks past the storage boundary.

use thiserror::Error;

/// Input problems detected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type '{mime_type}'. Allowed types: {}", .allowed.join(", "))]
    InvalidType {
        mime_type: String,
        allowed: Vec<String>,
    },

    #[error("File size of {size} bytes exceeds maximum allowed size of {}MB", format_mib(.max))]
    FileTooLarge { size: u64, max: u64 },

    #[error("{0}")]
    MissingFile(String),
}

fn format_mib(bytes: &u64) -> String {
    let bytes = *bytes;
    let whole = bytes / (1024 * 1024);
    let rem = bytes % (1024 * 1024);
    if rem == 0 {
        whole.to_string()
    } else {
        format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage is not configured: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to {operation}: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    #[error("Failed to upload files: {0}")]
    BatchUpload(Box<Error>),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn provider(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Provider {
            operation,
            message: cause.to_string(),
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::MissingFile(message.into()))
    }

    /// Name of the provider operation that failed, if this is a provider error.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Provider { operation, .. } => Some(operation),
            Self::BatchUpload(inner) => inner.operation(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_too_large_message_uses_megabytes() {
        let err = ValidationError::FileTooLarge {
            size: 10 * 1024 * 1024 + 1,
            max: 10 * 1024 * 1024,
        };
        assert!(err.to_string().ends_with("maximum allowed size of 10MB"));
    }

    #[test]
    fn test_invalid_type_lists_allowed_types() {
        let err = ValidationError::InvalidType {
            mime_type: "text/html".to_string(),
            allowed: vec!["image/png".to_string(), "image/jpeg".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid file type 'text/html'. Allowed types: image/png, image/jpeg"
        );
    }

    #[test]
    fn test_batch_error_keeps_operation_of_first_failure() {
        let err = Error::BatchUpload(Box::new(Error::provider("upload file", "timeout")));
        assert_eq!(err.operation(), Some("upload file"));
        assert!(err.to_string().contains("timeout"));
    }
}
