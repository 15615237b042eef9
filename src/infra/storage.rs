//! Supabase Storage adapter for the public image bucket.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::info;
use url::Url;

use crate::{
    application::repos::{ObjectStore, StorageError, StoredObject},
    infra::error::InfraError,
    presentation::media::{IMAGE_BUCKET, public_object_url},
    util::text::truncate_to_char_boundary,
};

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone)]
pub struct SupabaseStorage {
    http: Client,
    base: Url,
    api_key: String,
}

impl SupabaseStorage {
    pub fn new(
        supabase_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let base = Url::parse(supabase_url)
            .map_err(|err| InfraError::configuration(format!("invalid supabase url: {err}")))?;
        let http = Client::builder()
            .user_agent(concat!("glitchwire/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            http,
            base,
            api_key: api_key.into(),
        })
    }

    fn object_url(&self, name: &str) -> Result<Url, StorageError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::Transport("supabase url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", IMAGE_BUCKET, name]);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<StoredObject, StorageError> {
        let url = self.object_url(name)?;
        let size = bytes.len();

        let response = self
            .http
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_duplicate(status, &body) {
                return Err(StorageError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body: truncate_to_char_boundary(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }

        info!(
            target = "infra::storage",
            bucket = IMAGE_BUCKET,
            object = name,
            bytes = size,
            "Object uploaded"
        );

        Ok(StoredObject {
            name: name.to_string(),
            public_url: public_object_url(self.base.as_str(), name),
        })
    }
}

/// Storage reports an existing object either as 409 or as a 400 whose body
/// names the duplicate.
fn is_duplicate(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("\"Duplicate\"") || body.contains("already exists")))
}
