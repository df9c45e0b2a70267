use super::StorageProvider;
use crate::mime::extension_for_mime;
use crate::models::{
    DeleteStatus, DeletionResult, FileInfo, FilePage, ListOptions, ResourceType,
    TransformOptions, UploadItem, UploadResult,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory provider for tests and dry runs.
#[derive(Clone)]
pub struct MockStorageProvider {
    files: Arc<Mutex<BTreeMap<String, FileInfo>>>,
    base_url: String,
    fail_uploads_matching: Option<String>,
    upload_delay: Option<Duration>,
    upload_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
}

impl MockStorageProvider {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            base_url: "https://mock-storage.example.com".to_string(),
            fail_uploads_matching: None,
            upload_delay: None,
            upload_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Make uploads whose public id contains `needle` fail with a provider error.
    pub fn failing_uploads_matching(mut self, needle: impl Into<String>) -> Self {
        self.fail_uploads_matching = Some(needle.into());
        self
    }

    /// Delay successful uploads, to simulate slow transfers.
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> BTreeMap<String, FileInfo> {
        self.files.lock().unwrap().clone()
    }

    fn url_for(&self, public_id: &str) -> String {
        format!("{}/{}", self.base_url, public_id)
    }
}

impl Default for MockStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MockStorageProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload(&self, item: UploadItem) -> Result<UploadResult> {
        *self.upload_count.lock().unwrap() += 1;

        let public_id = item.full_id();
        if let Some(needle) = &self.fail_uploads_matching {
            if public_id.contains(needle.as_str()) {
                return Err(Error::provider(
                    "upload file",
                    format!("mock rejected {}", public_id),
                ));
            }
        }

        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }

        let result = UploadResult {
            url: self.url_for(&public_id),
            public_id: public_id.clone(),
            format: extension_for_mime(&item.mime_type).to_string(),
            width: None,
            height: None,
            byte_size: item.buffer.len() as u64,
            resource_type: item.resource_type,
            created_at: Utc::now(),
        };

        self.files.lock().unwrap().insert(
            public_id,
            FileInfo {
                public_id: result.public_id.clone(),
                url: result.url.clone(),
                format: result.format.clone(),
                resource_type: result.resource_type,
                byte_size: result.byte_size,
                width: None,
                height: None,
                created_at: Some(result.created_at),
            },
        );

        Ok(result)
    }

    async fn delete(
        &self,
        public_id: &str,
        _resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        *self.delete_count.lock().unwrap() += 1;

        let status = match self.files.lock().unwrap().remove(public_id) {
            Some(_) => DeleteStatus::Deleted,
            None => DeleteStatus::NotFound,
        };
        Ok(DeletionResult::single(public_id, status))
    }

    async fn delete_many(
        &self,
        public_ids: &[String],
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let mut result = DeletionResult::default();
        for public_id in public_ids {
            result
                .deleted
                .extend(self.delete(public_id, resource_type).await?.deleted);
        }
        Ok(result)
    }

    async fn info(&self, public_id: &str, _resource_type: ResourceType) -> Result<FileInfo> {
        self.files
            .lock()
            .unwrap()
            .get(public_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(public_id.to_string()))
    }

    async fn list(&self, prefix: &str, options: &ListOptions) -> Result<FilePage> {
        let files = self.files.lock().unwrap();
        let start = options.cursor.as_deref().unwrap_or("");

        let mut matching = files
            .range::<str, _>((std::ops::Bound::Excluded(start), std::ops::Bound::Unbounded))
            .filter(|(id, _)| id.starts_with(prefix))
            .map(|(_, info)| info.clone());

        let page: Vec<FileInfo> = matching
            .by_ref()
            .take(options.max_results as usize)
            .collect();
        let next_cursor = match matching.next() {
            Some(_) => page.last().map(|f| f.public_id.clone()),
            None => None,
        };

        Ok(FilePage {
            files: page,
            next_cursor,
        })
    }

    fn build_url(
        &self,
        public_id: &str,
        _resource_type: ResourceType,
        _transform: &TransformOptions,
    ) -> String {
        self.url_for(public_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadOptions;

    fn item(public_id: &str) -> UploadItem {
        UploadItem {
            buffer: b"data".to_vec(),
            folder: "media/uploads".to_string(),
            public_id: public_id.to_string(),
            mime_type: "image/png".to_string(),
            resource_type: ResourceType::Image,
            options: UploadOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_mock_upload_and_info() {
        let provider = MockStorageProvider::new();

        let result = provider.upload(item("a")).await.unwrap();

        assert_eq!(result.public_id, "media/uploads/a");
        assert_eq!(result.url, "https://mock-storage.example.com/media/uploads/a");
        assert_eq!(result.format, "png");
        assert_eq!(provider.get_upload_count(), 1);

        let info = provider
            .info("media/uploads/a", ResourceType::Image)
            .await
            .unwrap();
        assert_eq!(info.byte_size, 4);
    }

    #[tokio::test]
    async fn test_mock_custom_base_url() {
        let provider =
            MockStorageProvider::new().with_base_url("https://files.test".to_string());

        let result = provider.upload(item("a")).await.unwrap();
        assert_eq!(result.url, "https://files.test/media/uploads/a");
        assert_eq!(
            provider.build_url("x", ResourceType::Image, &TransformOptions::default()),
            "https://files.test/x"
        );
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let provider = MockStorageProvider::new().failing_uploads_matching("bad");

        let err = provider.upload(item("bad-one")).await.unwrap_err();
        assert_eq!(err.operation(), Some("upload file"));
        assert!(provider.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_mock_delete_reports_missing() {
        let provider = MockStorageProvider::new();
        provider.upload(item("a")).await.unwrap();

        let ids = vec!["media/uploads/a".to_string(), "media/uploads/b".to_string()];
        let result = provider.delete_many(&ids, ResourceType::Image).await.unwrap();

        assert_eq!(result.status_of("media/uploads/a"), Some(DeleteStatus::Deleted));
        assert_eq!(result.status_of("media/uploads/b"), Some(DeleteStatus::NotFound));
        assert_eq!(provider.get_delete_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_list_pages() {
        let provider = MockStorageProvider::new();
        for id in ["a", "b", "c"] {
            provider.upload(item(id)).await.unwrap();
        }

        let options = ListOptions {
            max_results: 2,
            ..ListOptions::default()
        };
        let first = provider.list("media/", &options).await.unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("media/uploads/b"));

        let options = ListOptions {
            cursor: first.next_cursor,
            ..options
        };
        let second = provider.list("media/", &options).await.unwrap();
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].public_id, "media/uploads/c");
        assert!(second.next_cursor.is_none());
    }
}
