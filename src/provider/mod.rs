//! Storage provider adapters
//!
//! Each backend implements [`StorageProvider`]. The facade holds exactly one
//! of them, chosen at startup, and never sees vendor types or errors.

pub mod media;
pub mod mock;
pub mod object_store;

pub use media::MediaAdapter;
pub use mock::MockStorageProvider;
pub use object_store::ObjectStoreAdapter;

use crate::models::{
    DeletionResult, FileInfo, FilePage, ListOptions, ResourceType, TransformOptions, UploadItem,
    UploadResult,
};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(&self, item: UploadItem) -> Result<UploadResult>;

    /// Upload every item concurrently. Results keep the input order.
    ///
    /// Every transfer runs to completion before the call returns; the first
    /// error in input order is then reported for the whole batch.
    async fn upload_many(&self, items: Vec<UploadItem>) -> Result<Vec<UploadResult>> {
        join_all(items.into_iter().map(|item| self.upload(item)))
            .await
            .into_iter()
            .collect()
    }

    async fn delete(&self, public_id: &str, resource_type: ResourceType)
        -> Result<DeletionResult>;

    /// Per-identifier outcome; keys the provider refused are marked failed.
    async fn delete_many(
        &self,
        public_ids: &[String],
        resource_type: ResourceType,
    ) -> Result<DeletionResult>;

    /// Metadata for a stored object, or [`crate::Error::NotFound`].
    async fn info(&self, public_id: &str, resource_type: ResourceType) -> Result<FileInfo>;

    async fn list(&self, prefix: &str, options: &ListOptions) -> Result<FilePage>;

    /// Pure URL construction; never touches the network.
    fn build_url(
        &self,
        public_id: &str,
        resource_type: ResourceType,
        transform: &TransformOptions,
    ) -> String;

    /// Poster-frame URL for a stored video, for providers that derive one.
    fn thumbnail_url(&self, _public_id: &str) -> Option<String> {
        None
    }
}
