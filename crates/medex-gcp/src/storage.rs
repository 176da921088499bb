use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use medex_core::error::{MedexError, Result};
use medex_core::{ObjectStore, OutputArtifact};

use crate::auth::ServiceAccountTokenSource;
use crate::ensure_success;

const STORAGE_API_URL: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_API_URL: &str = "https://storage.googleapis.com/upload/storage/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    bucket: String,
    #[serde(default)]
    content_type: Option<String>,
    /// uint64 encoded as a string.
    #[serde(default)]
    size: Option<String>,
}

impl From<ObjectResource> for OutputArtifact {
    fn from(object: ObjectResource) -> Self {
        OutputArtifact {
            bucket: object.bucket,
            name: object.name,
            content_type: object.content_type,
            size: object.size.and_then(|s| s.parse().ok()),
        }
    }
}

/// Cloud Storage over the JSON API. Uploads go to one default bucket.
pub struct GcsObjectStore {
    client: Client,
    auth: Arc<ServiceAccountTokenSource>,
    bucket: String,
}

impl GcsObjectStore {
    pub fn new(client: Client, auth: Arc<ServiceAccountTokenSource>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            auth,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(bucket: &str, name: &str) -> String {
        format!(
            "{STORAGE_API_URL}/b/{}/o/{}",
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        if key.is_empty() {
            return Err(MedexError::Storage("Object key must not be empty".to_string()));
        }

        let size = bytes.len();
        let token = self.auth.token().await?;
        let url = format!("{UPLOAD_API_URL}/b/{}/o", urlencoding::encode(&self.bucket));

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        ensure_success(response, "storage").await?;

        let uri = format!("gs://{}/{}", self.bucket, key);
        info!(uri = %uri, size, "File uploaded");
        Ok(uri)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<OutputArtifact>> {
        let url = format!("{STORAGE_API_URL}/b/{}/o", urlencoding::encode(bucket));
        let mut artifacts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.token().await?;
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(token)
                .query(&[("prefix", prefix)]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = ensure_success(request.send().await?, "storage").await?;
            let page: ListResponse = response.json().await?;
            artifacts.extend(page.items.into_iter().map(OutputArtifact::from));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(bucket, prefix, count = artifacts.len(), "Listed objects");
        Ok(artifacts)
    }

    async fn download(&self, artifact: &OutputArtifact) -> Result<Vec<u8>> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(Self::object_url(&artifact.bucket, &artifact.name))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let response = ensure_success(response, "storage").await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, artifact: &OutputArtifact) -> Result<()> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .delete(Self::object_url(&artifact.bucket, &artifact.name))
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(response, "storage").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_are_percent_encoded() {
        assert_eq!(
            GcsObjectStore::object_url("records", "results/123/0/doc-0.json"),
            "https://storage.googleapis.com/storage/v1/b/records/o/results%2F123%2F0%2Fdoc-0.json"
        );
    }

    #[test]
    fn list_response_maps_to_artifacts() {
        let json = r#"{
            "kind": "storage#objects",
            "nextPageToken": "abc",
            "items": [
                {"kind": "storage#object", "name": "results/1/0/a-0.json", "bucket": "records",
                 "contentType": "application/json", "size": "2048", "generation": "1"},
                {"name": "results/1/0/notes.txt", "bucket": "records", "contentType": "text/plain"}
            ]
        }"#;

        let page: ListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let artifacts: Vec<OutputArtifact> = page.items.into_iter().map(Into::into).collect();
        assert_eq!(artifacts[0].size, Some(2048));
        assert!(artifacts[0].has_content_type("application/json"));
        assert_eq!(artifacts[1].size, None);
    }

    #[test]
    fn empty_listing_has_no_items() {
        let page: ListResponse = serde_json::from_str(r#"{"kind": "storage#objects"}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
