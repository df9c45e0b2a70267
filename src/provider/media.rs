//! Transform-capable media CDN (Cloudinary-style REST API).
//!
//! Uploads and destroys are signed with the API secret; bulk delete, resource
//! lookups and listings go through the admin API with basic auth. Delivery
//! URLs are built locally from the URL grammar, without a network call.

use super::StorageProvider;
use crate::config::MediaCdnCredentials;
use crate::models::{
    DeleteStatus, DeletionResult, FileInfo, FilePage, ListOptions, ResourceType,
    TransformOptions, UploadItem, UploadResult,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_API_BASE_URL: &str = "https://api.cloudinary.com";
const DEFAULT_DELIVERY_BASE_URL: &str = "https://res.cloudinary.com";
/// Admin API limit on public ids per bulk delete request.
const DELETE_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    public_id: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    resource_type: Option<ResourceType>,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct BulkDeleteResponse {
    #[serde(default)]
    deleted: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    resources: Vec<ResourceResponse>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct MediaAdapter {
    client: Client,
    credentials: MediaCdnCredentials,
    api_base_url: String,
    delivery_base_url: String,
}

impl MediaAdapter {
    pub fn new(credentials: MediaCdnCredentials) -> Self {
        Self::new_with_client(credentials, Client::new())
    }

    pub fn new_with_client(credentials: MediaCdnCredentials, client: Client) -> Self {
        Self {
            client,
            credentials,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            delivery_base_url: DEFAULT_DELIVERY_BASE_URL.to_string(),
        }
    }

    /// Point the API calls at another host (self-hosted gateway, test server).
    pub fn with_api_base_url(mut self, base_url: String) -> Self {
        self.api_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_delivery_base_url(mut self, base_url: String) -> Self {
        self.delivery_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.api_base_url, self.credentials.cloud_name, path
        )
    }

    /// Hex SHA-256 over the alphabetically sorted `key=value` pairs followed
    /// by the API secret. Empty values are not signed.
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.credentials.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn signed_params<'a>(
        &self,
        mut params: BTreeMap<&'a str, String>,
    ) -> BTreeMap<&'a str, String> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = self.sign(&params);
        params.retain(|_, v| !v.is_empty());
        params.insert("signature", signature);
        params.insert("signature_algorithm", "sha256".to_string());
        params.insert("api_key", self.credentials.api_key.clone());
        params
    }

    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            &self.credentials.api_key,
            Some(&self.credentials.api_secret),
        )
    }

    /// Send a request and decode its JSON body. A 404 becomes
    /// [`Error::NotFound`] when `missing_id` is given.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        missing_id: Option<&str>,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            error!("Failed to send {} request to media CDN: {}", operation, e);
            Error::provider(operation, e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = missing_id {
                return Err(Error::NotFound(id.to_string()));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(operation, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!("Media CDN {} error (status {}): {}", operation, status, message);
            return Err(Error::provider(
                operation,
                format!("status {}: {}", status, message),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse media CDN response: {}\nBody: {}", e, body);
            Error::provider(operation, format!("unexpected response: {}", e))
        })
    }

    fn to_file_info(&self, resource: ResourceResponse, fallback: ResourceType) -> FileInfo {
        let resource_type = resource.resource_type.unwrap_or(fallback);
        let url = resource.secure_url.unwrap_or_else(|| {
            self.build_url(&resource.public_id, resource_type, &TransformOptions::empty())
        });

        FileInfo {
            url,
            format: resource.format.unwrap_or_default(),
            resource_type,
            byte_size: resource.bytes,
            width: resource.width,
            height: resource.height,
            created_at: resource.created_at,
            public_id: resource.public_id,
        }
    }
}

/// Transformation segment, components sorted by short key.
pub fn transformation_string(transform: &TransformOptions) -> String {
    let mut parts = Vec::new();
    if let Some(crop) = transform.crop.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("c_{}", crop));
    }
    if let Some(format) = transform.format.as_deref().filter(|f| !f.is_empty()) {
        parts.push(format!("f_{}", format));
    }
    if let Some(gravity) = transform.gravity.as_deref().filter(|g| !g.is_empty()) {
        parts.push(format!("g_{}", gravity));
    }
    if let Some(height) = transform.height {
        parts.push(format!("h_{}", height));
    }
    if let Some(quality) = transform.quality.as_deref().filter(|q| !q.is_empty()) {
        parts.push(format!("q_{}", quality));
    }
    if let Some(width) = transform.width {
        parts.push(format!("w_{}", width));
    }
    parts.join(",")
}

fn addressable(resource_type: ResourceType) -> ResourceType {
    match resource_type {
        ResourceType::Auto => ResourceType::Image,
        other => other,
    }
}

#[async_trait]
impl StorageProvider for MediaAdapter {
    fn name(&self) -> &'static str {
        "media-cdn"
    }

    async fn upload(&self, item: UploadItem) -> Result<UploadResult> {
        let operation = "upload file";
        let resource_type = item.resource_type;

        let mut params = BTreeMap::new();
        params.insert("public_id", item.public_id.clone());
        params.insert("folder", item.folder.clone());
        params.insert("tags", item.options.tags.join(","));
        params.insert(
            "context",
            item.options
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("|"),
        );
        params.insert(
            "transformation",
            item.options
                .transformation
                .as_ref()
                .map(transformation_string)
                .unwrap_or_default(),
        );
        let params = self.signed_params(params);

        let file_part = multipart::Part::bytes(item.buffer)
            .file_name(item.public_id.clone())
            .mime_str(&item.mime_type)
            .map_err(|e| Error::provider(operation, e))?;

        let form = params
            .into_iter()
            .fold(multipart::Form::new(), |form, (k, v)| form.text(k, v))
            .part("file", file_part);

        debug!(
            "Uploading {}/{} as {}",
            item.folder, item.public_id, resource_type
        );

        let url = self.endpoint(&format!("{}/upload", resource_type));
        let resource: ResourceResponse = self
            .execute(operation, self.client.post(url).multipart(form), None)
            .await?;

        info!("Uploaded {} to media CDN", resource.public_id);

        let info = self.to_file_info(resource, addressable(resource_type));
        Ok(UploadResult {
            url: info.url,
            public_id: info.public_id,
            format: info.format,
            width: info.width,
            height: info.height,
            byte_size: info.byte_size,
            resource_type: info.resource_type,
            created_at: info.created_at.unwrap_or_else(Utc::now),
        })
    }

    async fn delete(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        let params = self.signed_params(params);

        let url = self.endpoint(&format!("{}/destroy", addressable(resource_type)));
        let response: DestroyResponse = self
            .execute("delete file", self.client.post(url).form(&params), None)
            .await?;

        let status = match response.result.as_str() {
            "ok" => DeleteStatus::Deleted,
            "not found" => DeleteStatus::NotFound,
            other => {
                return Err(Error::provider(
                    "delete file",
                    format!("unexpected destroy result '{}'", other),
                ))
            }
        };
        info!("Deleted {} from media CDN ({:?})", public_id, status);
        Ok(DeletionResult::single(public_id, status))
    }

    async fn delete_many(
        &self,
        public_ids: &[String],
        resource_type: ResourceType,
    ) -> Result<DeletionResult> {
        let url = self.endpoint(&format!(
            "resources/{}/upload",
            addressable(resource_type)
        ));
        let mut result = DeletionResult::default();

        for chunk in public_ids.chunks(DELETE_BATCH_SIZE) {
            let query: Vec<(&str, &str)> =
                chunk.iter().map(|id| ("public_ids[]", id.as_str())).collect();
            let response: BulkDeleteResponse = self
                .execute(
                    "delete files",
                    self.admin(self.client.delete(&url).query(&query)),
                    None,
                )
                .await?;

            for (id, outcome) in response.deleted {
                let status = match outcome.as_str() {
                    "deleted" => DeleteStatus::Deleted,
                    "not_found" => DeleteStatus::NotFound,
                    other => {
                        warn!("Media CDN could not delete {}: {}", id, other);
                        DeleteStatus::Failed
                    }
                };
                result.insert(id, status);
            }
        }

        info!(
            "Deleted {} of {} files from media CDN",
            result.deleted_count(),
            public_ids.len()
        );
        Ok(result)
    }

    async fn info(&self, public_id: &str, resource_type: ResourceType) -> Result<FileInfo> {
        let resource_type = addressable(resource_type);
        let url = self.endpoint(&format!("resources/{}/upload/{}", resource_type, public_id));
        let resource: ResourceResponse = self
            .execute(
                "get file info",
                self.admin(self.client.get(url)),
                Some(public_id),
            )
            .await?;
        Ok(self.to_file_info(resource, resource_type))
    }

    async fn list(&self, prefix: &str, options: &ListOptions) -> Result<FilePage> {
        let resource_type = addressable(options.resource_type);
        let url = self.endpoint(&format!("resources/{}/upload", resource_type));

        let mut query = vec![
            ("prefix", prefix.to_string()),
            ("max_results", options.max_results.to_string()),
        ];
        if let Some(cursor) = &options.cursor {
            query.push(("next_cursor", cursor.clone()));
        }

        let response: ListResponse = self
            .execute(
                "list files",
                self.admin(self.client.get(url).query(&query)),
                None,
            )
            .await?;

        Ok(FilePage {
            files: response
                .resources
                .into_iter()
                .map(|r| self.to_file_info(r, resource_type))
                .collect(),
            next_cursor: response.next_cursor,
        })
    }

    fn build_url(
        &self,
        public_id: &str,
        resource_type: ResourceType,
        transform: &TransformOptions,
    ) -> String {
        let transformation = transformation_string(transform);
        let mut url = format!(
            "{}/{}/{}/upload/",
            self.delivery_base_url,
            self.credentials.cloud_name,
            addressable(resource_type)
        );
        if !transformation.is_empty() {
            url.push_str(&transformation);
            url.push('/');
        }
        url.push_str(public_id);
        url
    }

    fn thumbnail_url(&self, public_id: &str) -> Option<String> {
        Some(format!(
            "{}/{}/video/upload/so_0/{}.jpg",
            self.delivery_base_url, self.credentials.cloud_name, public_id
        ))
    }
}
