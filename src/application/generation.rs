//! Seams to the external generative services.

use async_trait::async_trait;
use bytes::Bytes;
use imagesize::ImageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation service returned no usable output")]
    EmptyResponse,
    #[error("generation output could not be decoded: {0}")]
    Decode(String),
    #[error("generated payload is not an image: {0}")]
    NotAnImage(String),
}

impl GenerationError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Output shape requested from a text model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Markdown,
    Json,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Backend model identifier, e.g. `flux`.
    pub backend: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageArtifact, GenerationError>;
}

/// Raw image bytes that were confirmed to decode as a known image format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    bytes: Bytes,
    width: usize,
    height: usize,
}

impl ImageArtifact {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, GenerationError> {
        if bytes.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        let size = match imagesize::blob_size(&bytes) {
            Ok(size) => size,
            Err(ImageError::NotSupported) => {
                return Err(GenerationError::NotAnImage(
                    "unrecognised image format".to_string(),
                ));
            }
            Err(ImageError::CorruptedImage) => {
                return Err(GenerationError::NotAnImage("corrupted image".to_string()));
            }
            Err(ImageError::IoError(err)) => return Err(GenerationError::decode(err)),
        };
        if size.width == 0 || size.height == 0 {
            return Err(GenerationError::NotAnImage(
                "image has zero dimensions".to_string(),
            ));
        }
        Ok(Self {
            bytes,
            width: size.width,
            height: size.height,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::png_header;
    use super::*;

    #[test]
    fn accepts_png_bytes() {
        let artifact = ImageArtifact::from_bytes(Bytes::from(png_header(1280, 720))).expect("png");
        assert_eq!(artifact.dimensions(), (1280, 720));
    }

    #[test]
    fn rejects_html_and_empty_bodies() {
        assert!(matches!(
            ImageArtifact::from_bytes(Bytes::new()),
            Err(GenerationError::EmptyResponse)
        ));
        assert!(
            ImageArtifact::from_bytes(Bytes::from_static(b"<html>rate limited</html>")).is_err()
        );
    }
}
