//! Data models and structures
//!
//! Provider-agnostic request and result types. Adapters translate their
//! vendor's response shapes into these before returning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A provider's classification of a stored object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Image,
    Video,
    Raw,
    /// Let the provider decide.
    Auto,
}

impl ResourceType {
    /// Infer the resource type from a MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else if mime_type == "application/pdf" {
            Self::Raw
        } else {
            Self::Auto
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "raw" => Ok(Self::Raw),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "Unknown resource type '{}'. Expected image, video, raw or auto",
                other
            )),
        }
    }
}

/// Provider-side transformation directives encoded into generated URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub gravity: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            crop: Some("fill".to_string()),
            quality: Some("auto".to_string()),
            format: Some("auto".to_string()),
            gravity: Some("auto".to_string()),
        }
    }
}

impl TransformOptions {
    /// No directives at all, not even the defaults.
    pub fn empty() -> Self {
        Self {
            width: None,
            height: None,
            crop: None,
            quality: None,
            format: None,
            gravity: None,
        }
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Optional per-upload directives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadOptions {
    /// Overrides MIME-based resource type inference.
    pub resource_type: Option<ResourceType>,
    pub tags: Vec<String>,
    pub context: BTreeMap<String, String>,
    /// Eager transformation applied by providers that support one.
    pub transformation: Option<TransformOptions>,
}

impl UploadOptions {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }
}

/// A file handed over by the request layer, already decoded into memory.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub buffer: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,
}

impl UploadRequest {
    pub fn new(
        buffer: Vec<u8>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let byte_size = buffer.len() as u64;
        Self {
            buffer,
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            byte_size,
        }
    }
}

/// One transfer as seen by an adapter: identifier and folder are already resolved.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub buffer: Vec<u8>,
    pub folder: String,
    pub public_id: String,
    pub mime_type: String,
    pub resource_type: ResourceType,
    pub options: UploadOptions,
}

impl UploadItem {
    /// Full path of the object within the provider namespace.
    pub fn full_id(&self) -> String {
        if self.folder.is_empty() {
            self.public_id.clone()
        } else {
            format!("{}/{}", self.folder, self.public_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub byte_size: u64,
    pub resource_type: ResourceType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    NotFound,
    /// The provider refused or could not delete this identifier.
    Failed,
}

/// Per-identifier outcome of a delete call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionResult {
    pub deleted: BTreeMap<String, DeleteStatus>,
}

impl DeletionResult {
    pub fn single(public_id: impl Into<String>, status: DeleteStatus) -> Self {
        let mut result = Self::default();
        result.deleted.insert(public_id.into(), status);
        result
    }

    pub fn insert(&mut self, public_id: impl Into<String>, status: DeleteStatus) {
        self.deleted.insert(public_id.into(), status);
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted
            .values()
            .filter(|s| **s == DeleteStatus::Deleted)
            .count()
    }

    pub fn status_of(&self, public_id: &str) -> Option<DeleteStatus> {
        self.deleted.get(public_id).copied()
    }

    /// Identifiers the provider failed to delete.
    pub fn failed(&self) -> Vec<&str> {
        self.deleted
            .iter()
            .filter(|(_, s)| **s == DeleteStatus::Failed)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub public_id: String,
    pub url: String,
    pub format: String,
    pub resource_type: ResourceType,
    pub byte_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub files: Vec<FileInfo>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub max_results: u32,
    pub cursor: Option<String>,
    pub resource_type: ResourceType,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_results: 100,
            cursor: None,
            resource_type: ResourceType::Image,
        }
    }
}

/// Public description of the active storage limits.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub provider: String,
    pub configured: bool,
    pub max_file_size: u64,
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: f64,
    pub allowed_image_types: Vec<String>,
    pub allowed_file_types: Vec<String>,
}
