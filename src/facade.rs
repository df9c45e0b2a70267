//! Provider-agnostic storage API.
//!
//! The facade is built once by the composition root and shared by reference.
//! It validates input, names the object, and hands the transfer to the single
//! adapter chosen at construction.

use crate::config::{ProviderKind, StorageConfig};
use crate::filename::FilenameGenerator;
use crate::models::{
    DeletionResult, FileInfo, FilePage, ListOptions, ResourceType, StorageInfo, TransformOptions,
    UploadItem, UploadOptions, UploadRequest, UploadResult,
};
use crate::provider::{MediaAdapter, ObjectStoreAdapter, StorageProvider};
use crate::validator::FileValidator;
use crate::{Error, Result};
use tracing::{debug, error, info, warn};

pub const AVATAR_FOLDER: &str = "profiles";

pub struct StorageFacade {
    provider: Option<Box<dyn StorageProvider>>,
    kind: ProviderKind,
    namespace: String,
    validator: FileValidator,
    filenames: FilenameGenerator,
    allowed_image_types: Vec<String>,
    allowed_file_types: Vec<String>,
}

impl StorageFacade {
    /// Build a facade around an already constructed adapter.
    ///
    /// This is what tests and embedding applications use to inject a provider.
    pub fn with_provider(provider: Box<dyn StorageProvider>, config: &StorageConfig) -> Self {
        Self::build(Some(provider), config)
    }

    /// A facade with no active adapter. Every network operation fails with
    /// [`Error::Configuration`]; URL helpers degrade to empty results.
    pub fn unconfigured(config: &StorageConfig) -> Self {
        Self::build(None, config)
    }

    fn build(provider: Option<Box<dyn StorageProvider>>, config: &StorageConfig) -> Self {
        Self {
            provider,
            kind: config.provider,
            namespace: config.folder.clone(),
            validator: FileValidator::new(
                config.max_file_size,
                config.allowed_file_types.clone(),
            ),
            filenames: FilenameGenerator::new(),
            allowed_image_types: config.allowed_image_types.clone(),
            allowed_file_types: config.allowed_file_types.clone(),
        }
    }

    /// Resolve the adapter named by `config.provider`. Missing credentials
    /// leave the facade unconfigured rather than failing startup.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let provider: Option<Box<dyn StorageProvider>> = match config.provider {
            ProviderKind::MediaCdn => config
                .media_cdn
                .clone()
                .map(|creds| Box::new(MediaAdapter::new(creds)) as Box<dyn StorageProvider>),
            ProviderKind::ObjectStore => match config.object_store.clone() {
                Some(creds) => Some(
                    Box::new(ObjectStoreAdapter::new(creds).await?) as Box<dyn StorageProvider>
                ),
                None => None,
            },
        };

        match &provider {
            Some(_) => info!(
                "Using storage provider: {} (folder prefix: {})",
                config.provider.name(),
                config.folder
            ),
            None => warn!(
                "{} storage not configured. File upload features will be disabled.",
                config.provider.name()
            ),
        }

        Ok(Self::build(provider, config))
    }

    fn provider(&self) -> Result<&dyn StorageProvider> {
        self.provider.as_deref().ok_or_else(|| {
            Error::Configuration(format!(
                "{} credentials are missing. Please check your environment variables.",
                self.kind.name()
            ))
        })
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn max_file_size(&self) -> u64 {
        self.validator.max_file_size()
    }

    pub fn allowed_image_types(&self) -> &[String] {
        &self.allowed_image_types
    }

    pub fn allowed_file_types(&self) -> &[String] {
        &self.allowed_file_types
    }

    pub fn storage_info(&self) -> StorageInfo {
        StorageInfo {
            provider: self.provider_name().to_string(),
            configured: self.is_configured(),
            max_file_size: self.max_file_size(),
            max_file_size_mb: self.max_file_size() as f64 / 1024.0 / 1024.0,
            allowed_image_types: self.allowed_image_types().to_vec(),
            allowed_file_types: self.allowed_file_types().to_vec(),
        }
    }

    pub fn validate_file(
        &self,
        file: &UploadRequest,
        allowed_types: Option<&[String]>,
    ) -> Result<()> {
        Ok(self.validator.validate(file, allowed_types)?)
    }

    /// Validate and name a file. Never touches the network.
    fn prepare(
        &self,
        file: UploadRequest,
        folder_path: &str,
        options: &UploadOptions,
        allowed_types: Option<&[String]>,
    ) -> Result<UploadItem> {
        self.validate_file(&file, allowed_types)?;

        let resource_type = options
            .resource_type
            .unwrap_or_else(|| ResourceType::from_mime(&file.mime_type));

        Ok(UploadItem {
            public_id: self.filenames.generate(&file.original_name),
            folder: folder_path.to_string(),
            mime_type: file.mime_type,
            resource_type,
            buffer: file.buffer,
            options: options.clone(),
        })
    }

    async fn upload_validated(
        &self,
        file: UploadRequest,
        folder: &str,
        options: &UploadOptions,
        allowed_types: Option<&[String]>,
    ) -> Result<UploadResult> {
        let provider = self.provider()?;
        let folder_path = self.filenames.folder_path(&self.namespace, folder);
        let item = self.prepare(file, &folder_path, options, allowed_types)?;

        provider.upload(item).await.map_err(|e| {
            error!("{} upload error: {}", self.provider_name(), e);
            e
        })
    }

    pub async fn upload_file(
        &self,
        file: UploadRequest,
        folder: &str,
        options: &UploadOptions,
    ) -> Result<UploadResult> {
        self.upload_validated(file, folder, options, None).await
    }

    /// Upload a profile picture into the avatar folder, images only.
    pub async fn upload_avatar(&self, file: UploadRequest) -> Result<UploadResult> {
        self.upload_validated(
            file,
            AVATAR_FOLDER,
            &UploadOptions::default(),
            Some(self.allowed_image_types.as_slice()),
        )
        .await
    }

    /// All-or-nothing concurrent upload.
    ///
    /// Every file is validated before any transfer starts. Transfers run
    /// concurrently and all of them complete; if any failed, the first
    /// failure in input order fails the whole call with
    /// [`Error::BatchUpload`]. Objects that did upload stay on the provider
    /// and are not reported back.
    pub async fn upload_multiple_files(
        &self,
        files: Vec<UploadRequest>,
        folder: &str,
        options: &UploadOptions,
    ) -> Result<Vec<UploadResult>> {
        let provider = self.provider()?;
        if files.is_empty() {
            return Err(Error::missing("No files provided"));
        }

        let folder_path = self.filenames.folder_path(&self.namespace, folder);
        let count = files.len();
        let items = files
            .into_iter()
            .map(|file| self.prepare(file, &folder_path, options, None))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::BatchUpload(Box::new(e)))?;

        let results = provider.upload_many(items).await.map_err(|e| {
            error!("{} multiple upload error: {}", self.provider_name(), e);
            Error::BatchUpload(Box::new(e))
        })?;

        info!("Uploaded {} files to {}", count, folder_path);
        Ok(results)
    }

    pub async fn delete_file(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let provider = self.provider()?;
        if public_id.trim().is_empty() {
            return Err(Error::missing("Public ID is required"));
        }

        provider.delete(public_id, resource_type).await.map_err(|e| {
            error!("{} delete error: {}", self.provider_name(), e);
            e
        })
    }

    pub async fn delete_multiple_files(
        &self,
        public_ids: &[String],
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let provider = self.provider()?;
        if public_ids.is_empty() || public_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::missing("No public IDs provided"));
        }

        provider
            .delete_many(public_ids, resource_type)
            .await
            .map_err(|e| {
                error!("{} multiple delete error: {}", self.provider_name(), e);
                e
            })
    }

    /// Delivery URL with transformations. Returns an empty string when the
    /// facade is unconfigured so page rendering never fails on it.
    pub fn get_optimized_url(&self, public_id: &str, transform: &TransformOptions) -> String {
        match &self.provider {
            Some(provider) => provider.build_url(public_id, ResourceType::Image, transform),
            None => {
                debug!("Storage unconfigured, no URL for {}", public_id);
                String::new()
            }
        }
    }

    pub fn get_video_thumbnail_url(&self, public_id: &str) -> Option<String> {
        self.provider
            .as_ref()
            .and_then(|provider| provider.thumbnail_url(public_id))
    }

    pub async fn get_file_info(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<FileInfo> {
        let provider = self.provider()?;
        provider.info(public_id, resource_type).await.map_err(|e| {
            if !e.is_not_found() {
                error!("{} get file info error: {}", self.provider_name(), e);
            }
            e
        })
    }

    /// List files under `folder` within the namespace; an empty folder lists
    /// the whole namespace.
    pub async fn list_files(&self, folder: &str, options: &ListOptions) -> Result<FilePage> {
        let provider = self.provider()?;
        let prefix = if folder.trim_matches('/').is_empty() {
            format!("{}/", self.namespace)
        } else {
            format!("{}/", self.filenames.folder_path(&self.namespace, folder))
        };

        provider.list(&prefix, options).await.map_err(|e| {
            error!("{} list files error: {}", self.provider_name(), e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::provider::MockStorageProvider;
    use pretty_assertions::assert_eq;

    fn config() -> StorageConfig {
        StorageConfig {
            max_file_size: 1024,
            ..StorageConfig::default()
        }
    }

    fn png(name: &str) -> UploadRequest {
        UploadRequest::new(vec![0x89, 0x50, 0x4E, 0x47], name, "image/png")
    }

    fn facade(provider: &MockStorageProvider) -> StorageFacade {
        StorageFacade::with_provider(Box::new(provider.clone()), &config())
    }

    #[tokio::test]
    async fn test_upload_file_is_namespaced() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let result = storage
            .upload_file(png("Beach House.png"), "properties", &UploadOptions::default())
            .await
            .unwrap();

        assert!(result.public_id.starts_with("media/properties/beach-house-"));
        assert_eq!(result.resource_type, ResourceType::Image);
        assert_eq!(provider.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_validation_fails_before_provider_call() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let mut big = png("big.png");
        big.byte_size = 1025;
        let err = storage
            .upload_file(big, "uploads", &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert_eq!(provider.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_avatar_rejects_documents() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let pdf = UploadRequest::new(b"%PDF".to_vec(), "cv.pdf", "application/pdf");
        let err = storage.upload_avatar(pdf).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidType { .. })
        ));

        let avatar = storage.upload_avatar(png("me.png")).await.unwrap();
        assert!(avatar.public_id.starts_with("media/profiles/me-"));
    }

    #[tokio::test]
    async fn test_resource_type_override() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let options = UploadOptions::default().with_resource_type(ResourceType::Raw);
        let result = storage
            .upload_file(png("plan.png"), "docs", &options)
            .await
            .unwrap();
        assert_eq!(result.resource_type, ResourceType::Raw);
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let results = storage
            .upload_multiple_files(
                vec![png("first.png"), png("second.png")],
                "gallery",
                &UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].public_id.starts_with("media/gallery/first-"));
        assert!(results[1].public_id.starts_with("media/gallery/second-"));
    }

    #[tokio::test]
    async fn test_batch_with_invalid_file_uploads_nothing() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        let bad = UploadRequest::new(b"<html>".to_vec(), "page.html", "text/html");
        let err = storage
            .upload_multiple_files(
                vec![png("a.png"), bad, png("c.png")],
                "gallery",
                &UploadOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            Error::BatchUpload(inner) => assert!(matches!(*inner, Error::Validation(_))),
            other => panic!("expected batch error, got {:?}", other),
        }
        assert_eq!(provider.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_provider_failure_fails_whole_call() {
        let provider = MockStorageProvider::new().failing_uploads_matching("broken");
        let storage = facade(&provider);

        let err = storage
            .upload_multiple_files(
                vec![png("ok.png"), png("broken.png")],
                "gallery",
                &UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BatchUpload(_)));
        assert_eq!(err.operation(), Some("upload file"));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let storage = facade(&MockStorageProvider::new());
        let err = storage
            .upload_multiple_files(Vec::new(), "gallery", &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingFile(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_identifiers() {
        let storage = facade(&MockStorageProvider::new());

        assert!(storage.delete_file("  ", ResourceType::Image).await.is_err());
        assert!(storage
            .delete_multiple_files(&[], ResourceType::Image)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_facade() {
        let storage = StorageFacade::unconfigured(&config());

        assert_eq!(
            storage.get_optimized_url("anything", &TransformOptions::default()),
            ""
        );
        assert!(storage.get_video_thumbnail_url("clip").is_none());

        let err = storage
            .upload_file(png("a.png"), "uploads", &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = storage
            .get_file_info("x", ResourceType::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!storage.storage_info().configured);
    }

    #[tokio::test]
    async fn test_from_config_without_credentials_is_unconfigured() {
        let storage = StorageFacade::from_config(&config()).await.unwrap();
        assert!(!storage.is_configured());
        assert_eq!(storage.provider_name(), "media-cdn");
    }

    #[tokio::test]
    async fn test_list_files_uses_namespace() {
        let provider = MockStorageProvider::new();
        let storage = facade(&provider);

        storage
            .upload_file(png("a.png"), "gallery", &UploadOptions::default())
            .await
            .unwrap();
        storage
            .upload_file(png("b.png"), "other", &UploadOptions::default())
            .await
            .unwrap();

        let gallery = storage
            .list_files("gallery", &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(gallery.files.len(), 1);

        let all = storage.list_files("", &ListOptions::default()).await.unwrap();
        assert_eq!(all.files.len(), 2);
    }

    #[test]
    fn test_storage_info() {
        let storage = StorageFacade::unconfigured(&StorageConfig::default());
        let info = storage.storage_info();

        assert_eq!(info.provider, "media-cdn");
        assert_eq!(info.max_file_size, 10 * 1024 * 1024);
        assert_eq!(info.max_file_size_mb, 10.0);
        assert_eq!(info.allowed_image_types, storage.allowed_image_types());
        assert!(!storage
            .allowed_image_types()
            .contains(&"application/pdf".to_string()));
        assert!(storage
            .allowed_file_types()
            .contains(&"application/pdf".to_string()));
    }
}
