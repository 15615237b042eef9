//! Client for the Generative Language `generateContent` endpoint.
//!
//! Serves both text generation and the multimodal image path, which returns
//! base64 `inlineData` parts.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use metrics::histogram;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::{
    application::generation::{
        GenerationError, ImageArtifact, ImageGenerator, ImageRequest, ResponseFormat,
        TextGenerator,
    },
    infra::error::InfraError,
    util::text::truncate_to_char_boundary,
};

pub const METRIC_GENERATION_MS: &str = "glitchwire_generation_ms";

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let base = Url::parse(base_url)
            .map_err(|err| InfraError::configuration(format!("invalid gemini base url: {err}")))?;
        let http = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            http,
            base,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url, GenerationError> {
        let action = format!("{model}:generateContent");
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| GenerationError::transport("gemini base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1beta", "models", action.as_str()]);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &Value,
        kind: &'static str,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let url = self.endpoint(model)?;
        let started = Instant::now();

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(GenerationError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_to_char_boundary(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(GenerationError::decode)?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_GENERATION_MS, "kind" => kind).record(elapsed_ms);
        debug!(
            target = "infra::gemini",
            model,
            kind,
            elapsed_ms,
            "generateContent completed"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, GenerationError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if format == ResponseFormat::Json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        let response = self.generate_content(model, &body, "text").await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageArtifact, GenerationError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });

        let response = self
            .generate_content(&request.backend, &body, "image")
            .await?;
        let data = response
            .inline_image()
            .ok_or(GenerationError::EmptyResponse)?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(GenerationError::decode)?;

        ImageArtifact::from_bytes(Bytes::from(bytes))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    /// Text parts of the first candidate, concatenated.
    fn text(&self) -> String {
        self.parts()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn inline_image(&self) -> Option<&str> {
        self.parts()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|data| {
                data.mime_type
                    .as_deref()
                    .is_none_or(|mime| mime.starts_with("image/"))
            })
            .map(|data| data.data.as_str())
    }
}

fn user_agent() -> &'static str {
    concat!("glitchwire/", env!("CARGO_PKG_VERSION"))
}
