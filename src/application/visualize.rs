//! Visualization pipeline.
//!
//! Picks posts that still lack an image, directs a prompt per post, generates
//! an image, uploads it and links it back. Posts are processed strictly one
//! after another with a cool-down in between. A failure leaves the post's
//! image reference untouched so the next run picks it up again.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    application::{
        generation::{
            GenerationError, ImageArtifact, ImageGenerator, ImageRequest, ResponseFormat,
            TextGenerator,
        },
        prompts::{fallback_visual_prompt, visual_director_prompt},
        repos::{ObjectStore, PostsRepo, PostsWriteRepo, RepoError, StorageError},
        retry::RetryPolicy,
    },
    domain::entities::PostRecord,
};

pub const METRIC_IMAGE_ATTEMPTS: &str = "glitchwire_image_attempts_total";
pub const METRIC_IMAGE_FAILURES: &str = "glitchwire_image_failures_total";

pub const DEFAULT_BATCH_SIZE: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_DIRECTOR_MODEL: &str = "gemini-2.0-flash";
pub const IMAGE_CONTENT_TYPE: &str = "image/png";
const IMAGE_WIDTH: u32 = 1280;
const IMAGE_HEIGHT: u32 = 720;
const MIN_DIRECTED_PROMPT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum VisualizeError {
    #[error("failed to select posts awaiting images: {0}")]
    Selection(#[source] RepoError),
    #[error("image generation exhausted after {attempts} attempt(s): {last}")]
    Generation {
        attempts: usize,
        #[source]
        last: GenerationError,
    },
    #[error("image upload failed: {0}")]
    Upload(#[from] StorageError),
    #[error("failed to link image to post: {0}")]
    Link(#[source] RepoError),
}

/// Which generation path produces image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// HTTP image endpoint driven by the retry policy.
    #[default]
    Pollinations,
    /// Single multimodal call returning inline image data.
    Gemini,
}

/// What gets written into `image_url` after upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    #[default]
    PublicUrl,
    Filename,
}

#[derive(Debug, Clone)]
pub struct VisualizeOptions {
    pub batch_size: u32,
    pub cooldown: Duration,
    pub mode: GenerationMode,
    pub link_mode: LinkMode,
    pub retry: RetryPolicy,
    pub director_model: String,
    /// Model identifier used for the single-attempt multimodal path.
    pub direct_model: String,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cooldown: DEFAULT_COOLDOWN,
            mode: GenerationMode::default(),
            link_mode: LinkMode::default(),
            retry: RetryPolicy::default(),
            director_model: DEFAULT_DIRECTOR_MODEL.to_string(),
            direct_model: "gemini-2.0-flash-preview-image-generation".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedPost {
    pub id: i64,
    pub slug: String,
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPost {
    pub id: i64,
    pub slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedPost>,
    pub failed: Vec<FailedPost>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct VisualizePipeline {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    director: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
    store: Arc<dyn ObjectStore>,
    options: VisualizeOptions,
}

impl VisualizePipeline {
    /// `images` must match `options.mode`: the retrying HTTP backend for
    /// [`GenerationMode::Pollinations`], the multimodal client otherwise.
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        director: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageGenerator>,
        store: Arc<dyn ObjectStore>,
        options: VisualizeOptions,
    ) -> Self {
        Self {
            posts,
            writer,
            director,
            images,
            store,
            options,
        }
    }

    pub async fn run_batch(&self) -> Result<BatchReport, VisualizeError> {
        let batch_size = self.options.batch_size.max(1);
        let pending = self
            .posts
            .list_missing_image(batch_size)
            .await
            .map_err(VisualizeError::Selection)?;

        info!(
            target = "application::visualize",
            pending = pending.len(),
            batch_size,
            mode = ?self.options.mode,
            "Starting visualize batch"
        );

        let mut report = BatchReport::default();
        for (index, post) in pending.iter().enumerate() {
            if index > 0 && !self.options.cooldown.is_zero() {
                tokio::time::sleep(self.options.cooldown).await;
            }

            match self.process_post(post).await {
                Ok(image_ref) => {
                    info!(
                        target = "application::visualize",
                        post_id = post.id,
                        slug = %post.slug,
                        image_ref = %image_ref,
                        "Image linked"
                    );
                    report.processed.push(ProcessedPost {
                        id: post.id,
                        slug: post.slug.clone(),
                        image_ref,
                    });
                }
                Err(err) => {
                    counter!(METRIC_IMAGE_FAILURES).increment(1);
                    error!(
                        target = "application::visualize",
                        post_id = post.id,
                        slug = %post.slug,
                        error = %err,
                        "Visualization failed; post left pending"
                    );
                    report.failed.push(FailedPost {
                        id: post.id,
                        slug: post.slug.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn process_post(&self, post: &PostRecord) -> Result<String, VisualizeError> {
        let prompt = self.direct_prompt(post).await;
        let artifact = self.generate(&prompt).await?;

        let name = object_name(&post.slug, OffsetDateTime::now_utc());
        let (width, height) = artifact.dimensions();
        info!(
            target = "application::visualize",
            post_id = post.id,
            object = %name,
            bytes = artifact.len(),
            width,
            height,
            "Uploading image"
        );
        let stored = self
            .store
            .upload(&name, IMAGE_CONTENT_TYPE, artifact.into_bytes())
            .await?;

        let image_ref = match self.options.link_mode {
            LinkMode::PublicUrl => stored.public_url,
            LinkMode::Filename => stored.name,
        };
        self.writer
            .update_image_url(post.id, &image_ref)
            .await
            .map_err(VisualizeError::Link)?;

        Ok(image_ref)
    }

    async fn direct_prompt(&self, post: &PostRecord) -> String {
        let request = visual_director_prompt(&post.summary, &post.ai_writer);
        match self
            .director
            .generate_text(&self.options.director_model, &request, ResponseFormat::Markdown)
            .await
        {
            Ok(prompt) if prompt.trim().len() >= MIN_DIRECTED_PROMPT_LEN => prompt.trim().to_string(),
            Ok(prompt) => {
                warn!(
                    target = "application::visualize",
                    post_id = post.id,
                    returned = %prompt.trim(),
                    "Visual director returned too little; using fallback prompt"
                );
                fallback_visual_prompt(&post.summary, &post.ai_writer)
            }
            Err(err) => {
                warn!(
                    target = "application::visualize",
                    post_id = post.id,
                    error = %err,
                    "Visual director failed; using fallback prompt"
                );
                fallback_visual_prompt(&post.summary, &post.ai_writer)
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<ImageArtifact, VisualizeError> {
        match self.options.mode {
            GenerationMode::Gemini => {
                counter!(METRIC_IMAGE_ATTEMPTS, "backend" => "gemini").increment(1);
                let request = ImageRequest {
                    backend: self.options.direct_model.clone(),
                    prompt: prompt.to_string(),
                    width: IMAGE_WIDTH,
                    height: IMAGE_HEIGHT,
                };
                self.images
                    .generate_image(&request)
                    .await
                    .map_err(|last| VisualizeError::Generation { attempts: 1, last })
            }
            GenerationMode::Pollinations => self.generate_with_retry(prompt).await,
        }
    }

    async fn generate_with_retry(&self, prompt: &str) -> Result<ImageArtifact, VisualizeError> {
        let mut attempts = 0usize;
        let mut last = GenerationError::EmptyResponse;

        for step in self.options.retry.schedule() {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            attempts += 1;
            counter!(METRIC_IMAGE_ATTEMPTS, "backend" => step.backend.to_string()).increment(1);

            let request = ImageRequest {
                backend: step.backend.to_string(),
                prompt: prompt.to_string(),
                width: IMAGE_WIDTH,
                height: IMAGE_HEIGHT,
            };
            match self.images.generate_image(&request).await {
                Ok(artifact) => return Ok(artifact),
                Err(err) => {
                    warn!(
                        target = "application::visualize",
                        backend = step.backend,
                        attempt = step.attempt,
                        max_attempts = self.options.retry.max_attempts().get(),
                        error = %err,
                        "Image attempt failed"
                    );
                    last = err;
                }
            }
        }

        Err(VisualizeError::Generation { attempts, last })
    }
}

/// `{slug}-{unix_millis}.png`
pub fn object_name(slug: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{slug}-{millis}.png")
}
