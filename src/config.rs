//! Process-wide storage configuration
//!
//! Loaded once at startup from the environment (and `.env` when present).
//! Nothing here changes after the facade is built.

use tracing::warn;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_FOLDER: &str = "media";
const DEFAULT_IMAGE_TYPES: &str = "image/jpeg,image/jpg,image/png,image/webp";
const DEFAULT_FILE_TYPES: &str = "image/jpeg,image/jpg,image/png,image/webp,application/pdf";
const PLACEHOLDER_CLOUD_NAME: &str = "your-cloud-name-here";

/// The closed set of supported storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    ObjectStore,
    MediaCdn,
}

impl ProviderKind {
    pub const DEFAULT: ProviderKind = ProviderKind::MediaCdn;

    /// Resolve a configured provider name. Unknown names fall back to
    /// [`ProviderKind::DEFAULT`] with a warning.
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "object-store" | "s3" => Self::ObjectStore,
            "media-cdn" | "cloudinary" => Self::MediaCdn,
            other => {
                warn!(
                    "Unknown storage provider '{}', defaulting to {}",
                    other,
                    Self::DEFAULT.name()
                );
                Self::DEFAULT
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ObjectStore => "object-store",
            Self::MediaCdn => "media-cdn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCdnCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreCredentials {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible stores (MinIO, Spaces, R2).
    pub endpoint: Option<String>,
    /// Base URL objects are publicly served from.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub provider: ProviderKind,
    pub media_cdn: Option<MediaCdnCredentials>,
    pub object_store: Option<ObjectStoreCredentials>,
    pub folder: String,
    pub max_file_size: u64,
    pub allowed_image_types: Vec<String>,
    pub allowed_file_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::DEFAULT,
            media_cdn: None,
            object_store: None,
            folder: DEFAULT_FOLDER.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_image_types: split_list(DEFAULT_IMAGE_TYPES),
            allowed_file_types: split_list(DEFAULT_FILE_TYPES),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// Missing credentials are not an error here: the facade starts
    /// unconfigured and reports [`crate::Error::Configuration`] per operation.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = var("STORAGE_PROVIDER")
            .map(|name| ProviderKind::resolve(&name))
            .unwrap_or(ProviderKind::DEFAULT);

        let max_file_size = match var("MAX_FILE_SIZE") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                crate::Error::Configuration(format!(
                    "MAX_FILE_SIZE must be a byte count, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        let media_cdn = match (
            var("MEDIA_CLOUD_NAME"),
            var("MEDIA_API_KEY"),
            var("MEDIA_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret))
                if cloud_name != PLACEHOLDER_CLOUD_NAME =>
            {
                Some(MediaCdnCredentials {
                    cloud_name,
                    api_key,
                    api_secret,
                })
            }
            _ => None,
        };

        let object_store = match (
            var("OBJECT_STORE_BUCKET"),
            var("OBJECT_STORE_ACCESS_KEY_ID"),
            var("OBJECT_STORE_SECRET_ACCESS_KEY"),
        ) {
            (Some(bucket), Some(access_key_id), Some(secret_access_key)) => {
                Some(ObjectStoreCredentials {
                    bucket,
                    region: var("OBJECT_STORE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    access_key_id,
                    secret_access_key,
                    endpoint: var("OBJECT_STORE_ENDPOINT"),
                    public_base_url: var("OBJECT_STORE_PUBLIC_URL"),
                })
            }
            _ => None,
        };

        Ok(Self {
            provider,
            media_cdn,
            object_store,
            folder: var("STORAGE_FOLDER")
                .map(|f| f.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            max_file_size,
            allowed_image_types: split_list(
                &var("ALLOWED_IMAGE_TYPES").unwrap_or_else(|| DEFAULT_IMAGE_TYPES.to_string()),
            ),
            allowed_file_types: split_list(
                &var("ALLOWED_FILE_TYPES").unwrap_or_else(|| DEFAULT_FILE_TYPES.to_string()),
            ),
        })
    }

    /// Whether credentials for the selected provider are present.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            ProviderKind::MediaCdn => self.media_cdn.is_some(),
            ProviderKind::ObjectStore => self.object_store.is_some(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
