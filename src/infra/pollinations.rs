//! Image backend that fetches rendered bytes from the Pollinations prompt endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use tracing::debug;

use crate::{
    application::generation::{GenerationError, ImageArtifact, ImageGenerator, ImageRequest},
    infra::{error::InfraError, gemini::METRIC_GENERATION_MS},
    presentation::media::pollinations_image_url,
    util::text::truncate_to_char_boundary,
};

const ERROR_BODY_LIMIT: usize = 256;

#[derive(Clone)]
pub struct PollinationsClient {
    http: Client,
    base: String,
}

impl PollinationsClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, InfraError> {
        let http = Client::builder()
            .user_agent(concat!("glitchwire/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            http,
            base: base.into(),
        })
    }
}

#[async_trait]
impl ImageGenerator for PollinationsClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageArtifact, GenerationError> {
        let url = pollinations_image_url(
            &self.base,
            &request.prompt,
            request.width,
            request.height,
            &request.backend,
        );
        let started = Instant::now();

        let response = self
            .http
            .get(&url)
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

        let bytes = response.bytes().await.map_err(GenerationError::transport)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_GENERATION_MS, "kind" => "pollinations").record(elapsed_ms);
        debug!(
            target = "infra::pollinations",
            backend = %request.backend,
            bytes = bytes.len(),
            elapsed_ms,
            "Image fetched"
        );

        ImageArtifact::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generation::test_support::png_header;
    use httpmock::MockServer;

    fn request(backend: &str) -> ImageRequest {
        ImageRequest {
            backend: backend.to_string(),
            prompt: "neon-static".to_string(),
            width: 1280,
            height: 720,
        }
    }

    fn client(server: &MockServer) -> PollinationsClient {
        PollinationsClient::new(server.url("/prompt/"), Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn fetches_image_with_backend_and_size() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/prompt/neon-static")
                .query_param("model", "turbo")
                .query_param("width", "1280")
                .query_param("height", "720")
                .query_param("nologo", "true");
            then.status(200)
                .header("content-type", "image/png")
                .body(png_header(1280, 720));
        });

        let artifact = client(&server)
            .generate_image(&request("turbo"))
            .await
            .expect("image");

        mock.assert();
        assert_eq!(artifact.dimensions(), (1280, 720));
    }

    #[tokio::test]
    async fn non_image_body_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html>busy</html>");
        });

        let err = client(&server)
            .generate_image(&request("flux"))
            .await
            .expect_err("not an image");
        assert!(!matches!(err, GenerationError::Status { .. }));
    }

    #[tokio::test]
    async fn server_errors_carry_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET");
            then.status(502).body("bad gateway");
        });

        let err = client(&server)
            .generate_image(&request("flux"))
            .await
            .expect_err("status");
        assert!(matches!(err, GenerationError::Status { status: 502, .. }));
    }
}
