use super::StorageProvider;
use crate::config::ObjectStoreCredentials;
use crate::mime::{extension_for_mime, mime_from_extension};
use crate::models::{
    DeleteStatus, DeletionResult, FileInfo, FilePage, ListOptions, ResourceType,
    TransformOptions, UploadItem, UploadResult,
};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::{config::Region, Client as S3Client};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

/// S3 caps `DeleteObjects` at 1000 keys per request.
const DELETE_BATCH_SIZE: usize = 1000;

/// Bucket/key store (AWS S3, MinIO, DigitalOcean Spaces, R2).
pub struct ObjectStoreAdapter {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl ObjectStoreAdapter {
    pub async fn new(credentials: ObjectStoreCredentials) -> Result<Self> {
        let ObjectStoreCredentials {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
            public_base_url,
        } = credentials;

        let sdk_credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "media-storage",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(sdk_credentials)
            .region(Region::new(region.clone()));
        if let Some(endpoint) = &endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints rarely support virtual-hosted buckets.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        let public_base_url = public_base_url.unwrap_or_else(|| match &endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        });

        Ok(Self::from_client(
            S3Client::from_conf(s3_config),
            bucket,
            public_base_url,
        ))
    }

    pub fn from_client(client: S3Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn file_info(
        &self,
        key: &str,
        size: Option<i64>,
        content_type: Option<&str>,
        last_modified: Option<&S3DateTime>,
    ) -> FileInfo {
        let format = format_of(key);
        let mime = content_type
            .map(str::to_string)
            .or_else(|| mime_from_extension(Path::new(key)).map(str::to_string))
            .unwrap_or_default();

        FileInfo {
            public_id: key.to_string(),
            url: self.get_public_url(key),
            format,
            resource_type: ResourceType::from_mime(&mime),
            byte_size: size.unwrap_or(0).max(0) as u64,
            width: None,
            height: None,
            created_at: last_modified.and_then(to_chrono),
        }
    }
}

/// Object key: `<folder>/<public_id>.<ext>`.
pub fn object_key(item: &UploadItem) -> String {
    format!(
        "{}.{}",
        item.full_id(),
        extension_for_mime(&item.mime_type)
    )
}

fn format_of(key: &str) -> String {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn to_chrono(dt: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl StorageProvider for ObjectStoreAdapter {
    fn name(&self) -> &'static str {
        "object-store"
    }

    async fn upload(&self, item: UploadItem) -> Result<UploadResult> {
        let key = object_key(&item);
        let byte_size = item.buffer.len() as u64;

        let mut metadata: HashMap<String, String> =
            item.options.context.clone().into_iter().collect();
        if !item.options.tags.is_empty() {
            metadata.insert("tags".to_string(), item.options.tags.join(","));
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(item.buffer))
            .content_type(&item.mime_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| {
                error!("Object store upload of {} failed: {}", key, DisplayErrorContext(&e));
                Error::provider("upload file", DisplayErrorContext(&e))
            })?;

        info!("Uploaded {} to bucket {}", key, self.bucket);

        Ok(UploadResult {
            url: self.get_public_url(&key),
            format: format_of(&key),
            public_id: key,
            width: None,
            height: None,
            byte_size,
            resource_type: item.resource_type,
            created_at: Utc::now(),
        })
    }

    async fn delete(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        // S3 deletes are idempotent, so probe first to report missing keys.
        match self.info(public_id, resource_type).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                return Ok(DeletionResult::single(public_id, DeleteStatus::NotFound))
            }
            Err(e) => return Err(e),
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| {
                error!("Object store delete of {} failed: {}", public_id, DisplayErrorContext(&e));
                Error::provider("delete file", DisplayErrorContext(&e))
            })?;

        info!("Deleted {} from bucket {}", public_id, self.bucket);
        Ok(DeletionResult::single(public_id, DeleteStatus::Deleted))
    }

    async fn delete_many(
        &self,
        public_ids: &[String],
        _resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let mut result = DeletionResult::default();

        for chunk in public_ids.chunks(DELETE_BATCH_SIZE) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::provider("delete files", e))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(false)
                .build()
                .map_err(|e| Error::provider("delete files", e))?;

            let output = match self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
            {
                Ok(output) => output,
                // Nothing deleted yet: surface the failure as is.
                Err(e) if result.deleted.is_empty() => {
                    error!("Object store bulk delete failed: {}", DisplayErrorContext(&e));
                    return Err(Error::provider("delete files", DisplayErrorContext(&e)));
                }
                Err(e) => {
                    error!(
                        "Object store bulk delete of {} keys failed: {}",
                        chunk.len(),
                        DisplayErrorContext(&e)
                    );
                    for key in chunk {
                        result.insert(key.as_str(), DeleteStatus::Failed);
                    }
                    continue;
                }
            };

            for deleted in output.deleted() {
                if let Some(key) = deleted.key() {
                    result.insert(key, DeleteStatus::Deleted);
                }
            }
            for failure in output.errors() {
                if let Some(key) = failure.key() {
                    warn!(
                        "Object store could not delete {}: {}",
                        key,
                        failure.message().unwrap_or("unknown error")
                    );
                    result.insert(key, DeleteStatus::Failed);
                }
            }
        }

        info!(
            "Deleted {} objects from bucket {}",
            result.deleted_count(),
            self.bucket
        );
        Ok(result)
    }

    async fn info(&self, public_id: &str, _resource_type: ResourceType) -> Result<FileInfo> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Error::NotFound(public_id.to_string())
                } else {
                    error!("Object store head of {} failed: {}", public_id, DisplayErrorContext(&e));
                    Error::provider("get file info", DisplayErrorContext(&e))
                }
            })?;

        Ok(self.file_info(
            public_id,
            output.content_length(),
            output.content_type(),
            output.last_modified(),
        ))
    }

    async fn list(&self, prefix: &str, options: &ListOptions) -> Result<FilePage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(options.max_results.clamp(1, 1000) as i32)
            .set_continuation_token(options.cursor.clone())
            .send()
            .await
            .map_err(|e| {
                error!("Object store listing of {} failed: {}", prefix, DisplayErrorContext(&e));
                Error::provider("list files", DisplayErrorContext(&e))
            })?;

        let files = output
            .contents()
            .iter()
            .filter_map(|object| {
                object
                    .key()
                    .map(|key| self.file_info(key, object.size(), None, object.last_modified()))
            })
            .collect();

        Ok(FilePage {
            files,
            next_cursor: output.next_continuation_token().map(str::to_string),
        })
    }

    /// Plain public URL; the store has no transformation grammar.
    fn build_url(
        &self,
        public_id: &str,
        _resource_type: ResourceType,
        _transform: &TransformOptions,
    ) -> String {
        self.get_public_url(public_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadOptions;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(endpoint: Option<String>) -> ObjectStoreCredentials {
        ObjectStoreCredentials {
            bucket: "uploads".to_string(),
            region: "eu-west-1".to_string(),
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            endpoint,
            public_base_url: None,
        }
    }

    fn pdf_item() -> UploadItem {
        UploadItem {
            buffer: b"%PDF-1.7".to_vec(),
            folder: "media/documents".to_string(),
            public_id: "lease-1700000000000-abc".to_string(),
            mime_type: "application/pdf".to_string(),
            resource_type: ResourceType::Raw,
            options: UploadOptions::default(),
        }
    }

    #[test]
    fn test_object_key_carries_extension() {
        assert_eq!(
            object_key(&pdf_item()),
            "media/documents/lease-1700000000000-abc.pdf"
        );
    }

    #[tokio::test]
    async fn test_default_public_url_is_virtual_hosted() {
        let adapter = ObjectStoreAdapter::new(credentials(None)).await.unwrap();
        assert_eq!(
            adapter.build_url("media/a.png", ResourceType::Image, &TransformOptions::default()),
            "https://uploads.s3.eu-west-1.amazonaws.com/media/a.png"
        );
    }

    #[tokio::test]
    async fn test_upload_then_missing_info() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/uploads/media/documents/lease-1700000000000-abc.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/uploads/media/documents/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = ObjectStoreAdapter::new(credentials(Some(server.uri())))
            .await
            .unwrap();

        let result = adapter.upload(pdf_item()).await.unwrap();
        assert_eq!(
            result.public_id,
            "media/documents/lease-1700000000000-abc.pdf"
        );
        assert_eq!(
            result.url,
            format!(
                "{}/uploads/media/documents/lease-1700000000000-abc.pdf",
                server.uri()
            )
        );
        assert_eq!(result.format, "pdf");
        assert_eq!(result.byte_size, 8);

        let err = adapter
            .info("media/documents/missing.pdf", ResourceType::Raw)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    async fn adapter(server: &MockServer) -> ObjectStoreAdapter {
        ObjectStoreAdapter::new(credentials(Some(server.uri())))
            .await
            .unwrap()
    }

    fn xml(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/xml")
    }

    #[tokio::test]
    async fn test_delete_existing_object() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/uploads/media/a.pdf"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/uploads/media/a.pdf"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server)
            .await
            .delete("media/a.pdf", ResourceType::Raw)
            .await
            .unwrap();
        assert_eq!(result.status_of("media/a.pdf"), Some(DeleteStatus::Deleted));
    }

    #[tokio::test]
    async fn test_delete_missing_object_skips_delete_call() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/uploads/media/gone.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let result = adapter(&server)
            .await
            .delete("media/gone.pdf", ResourceType::Raw)
            .await
            .unwrap();
        assert_eq!(
            result.status_of("media/gone.pdf"),
            Some(DeleteStatus::NotFound)
        );
    }

    #[tokio::test]
    async fn test_bulk_delete_keeps_partial_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/uploads"))
            .and(query_param("delete", ""))
            .respond_with(xml(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Deleted><Key>media/a.png</Key></Deleted>
  <Error><Key>media/b.png</Key><Code>AccessDenied</Code><Message>Access Denied</Message></Error>
</DeleteResult>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let ids = vec!["media/a.png".to_string(), "media/b.png".to_string()];
        let result = adapter(&server)
            .await
            .delete_many(&ids, ResourceType::Image)
            .await
            .unwrap();

        assert_eq!(result.status_of("media/a.png"), Some(DeleteStatus::Deleted));
        assert_eq!(result.status_of("media/b.png"), Some(DeleteStatus::Failed));
        assert_eq!(result.deleted_count(), 1);
        assert_eq!(result.failed(), vec!["media/b.png"]);
    }

    #[tokio::test]
    async fn test_list_returns_continuation_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/uploads"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "media/"))
            .and(query_param("continuation-token", "page-1"))
            .respond_with(xml(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>uploads</Name>
  <Prefix>media/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <ContinuationToken>page-1</ContinuationToken>
  <NextContinuationToken>page-2</NextContinuationToken>
  <Contents>
    <Key>media/uploads/a.png</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
    <Size>42</Size>
  </Contents>
</ListBucketResult>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let options = ListOptions {
            max_results: 1,
            cursor: Some("page-1".to_string()),
            ..ListOptions::default()
        };
        let page = adapter(&server)
            .await
            .list("media/", &options)
            .await
            .unwrap();

        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        assert_eq!(page.files.len(), 1);
        let file = &page.files[0];
        assert_eq!(file.public_id, "media/uploads/a.png");
        assert_eq!(file.byte_size, 42);
        assert_eq!(file.format, "png");
        assert_eq!(file.resource_type, ResourceType::Image);
        assert_eq!(
            file.created_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );
    }
}
