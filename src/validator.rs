//! Pre-flight checks on incoming files.

use crate::error::ValidationError;
use crate::models::UploadRequest;

/// Checks MIME type and size against the configured allow-lists.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: u64,
    allowed_file_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: u64, allowed_file_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_file_types,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate `file` against `allowed_types`, or the configured file types
    /// when no explicit list is given. A size equal to the limit passes.
    pub fn validate(
        &self,
        file: &UploadRequest,
        allowed_types: Option<&[String]>,
    ) -> Result<(), ValidationError> {
        if file.buffer.is_empty() {
            return Err(ValidationError::MissingFile("No file provided".to_string()));
        }

        let types = allowed_types.unwrap_or(&self.allowed_file_types);
        if !types.iter().any(|t| t == &file.mime_type) {
            return Err(ValidationError::InvalidType {
                mime_type: file.mime_type.clone(),
                allowed: types.to_vec(),
            });
        }

        if file.byte_size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: file.byte_size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }
}
