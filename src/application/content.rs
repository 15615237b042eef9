//! Writer and editor pipeline.
//!
//! One run drafts an article in a persona's voice, asks the editorial model to
//! structure it, normalises the result and persists it. Nothing is written to
//! the store unless every preceding step succeeded.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::{
    application::{
        generation::{GenerationError, ResponseFormat, TextGenerator},
        prompts::{EditorBrief, WriterBrief, editor_prompt, writer_prompt},
        repos::{PostsRepo, PostsWriteRepo, RepoError},
    },
    domain::{
        editorial::{Adjustment, EditorialContext, EditorialError, parse_editorial_response},
        entities::{NewPost, PostRecord},
        error::DomainError,
        personas::{self, DEFAULT_PERSONA_KEY, Persona},
        slug::{SlugAsyncError, generate_unique_slug_async},
    },
    util::text::truncate_to_char_boundary,
};

pub const METRIC_POSTS_GENERATED: &str = "glitchwire_posts_generated_total";

pub const DEFAULT_HISTORY_LIMIT: u32 = 5;
pub const DEFAULT_EDITOR_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_EDITOR_IDENTITY: &str = "SENTINEL v3";
const STYLE_MEMORY_POSTS: usize = 2;
const STYLE_MEMORY_BYTES: usize = 600;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("unknown writer persona `{key}`; valid keys: {}", .valid.join(", "))]
    UnknownPersona {
        key: String,
        valid: Vec<&'static str>,
    },
    #[error("{stage} generation failed: {source}")]
    Generation {
        stage: &'static str,
        #[source]
        source: GenerationError,
    },
    #[error("editorial response rejected: {0}")]
    Parse(#[from] EditorialError),
    #[error("could not allocate a unique slug: {0}")]
    Slug(String),
    #[error("post failed validation: {0}")]
    Invalid(#[from] DomainError),
    #[error("failed to persist post: {0}")]
    Persistence(#[source] RepoError),
}

impl ContentError {
    /// Usage errors are the operator's fault and happen before any side effect.
    pub fn is_usage(&self) -> bool {
        matches!(self, ContentError::UnknownPersona { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ContentOptions {
    pub history_limit: u32,
    pub publish_offset_days: i64,
    pub pinned_date: Option<Date>,
    pub editor_model: String,
    pub editor_identity: String,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            publish_offset_days: 0,
            pinned_date: None,
            editor_model: DEFAULT_EDITOR_MODEL.to_string(),
            editor_identity: DEFAULT_EDITOR_IDENTITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    pub writer: Option<String>,
    pub topic: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub enum WriteOutcome {
    DryRun(NewPost),
    Published(PostRecord),
}

#[derive(Clone)]
pub struct ContentPipeline {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    text: Arc<dyn TextGenerator>,
    options: ContentOptions,
}

impl ContentPipeline {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        text: Arc<dyn TextGenerator>,
        options: ContentOptions,
    ) -> Self {
        Self {
            posts,
            writer,
            text,
            options,
        }
    }

    pub async fn run(&self, request: WriteRequest) -> Result<WriteOutcome, ContentError> {
        self.run_at(request, OffsetDateTime::now_utc()).await
    }

    /// Run the pipeline as if the current time were `now`.
    pub async fn run_at(
        &self,
        request: WriteRequest,
        now: OffsetDateTime,
    ) -> Result<WriteOutcome, ContentError> {
        let persona = select_persona(request.writer.as_deref())?;
        info!(
            target = "application::content",
            persona = persona.key,
            writer = persona.full_name,
            dry_run = request.dry_run,
            "Starting write run"
        );

        let history = self.fetch_history(persona).await;
        let recent_titles: Vec<String> = history.iter().map(|post| post.title.clone()).collect();
        let style_memory: Vec<String> = history
            .iter()
            .take(STYLE_MEMORY_POSTS)
            .map(|post| truncate_to_char_boundary(&post.content, STYLE_MEMORY_BYTES).to_string())
            .collect();

        let pinned_date = self.options.pinned_date.unwrap_or_else(|| now.date());
        let draft_prompt = writer_prompt(&WriterBrief {
            persona,
            pinned_date,
            topic: request.topic.as_deref(),
            recent_titles: &recent_titles,
            style_memory: &style_memory,
        });
        let draft = self
            .text
            .generate_text(persona.model, &draft_prompt, ResponseFormat::Markdown)
            .await
            .map_err(|source| ContentError::Generation {
                stage: "draft",
                source,
            })?;
        info!(
            target = "application::content",
            model = persona.model,
            draft_bytes = draft.len(),
            "Draft received"
        );

        let edit_prompt = editor_prompt(&EditorBrief {
            persona,
            editor_identity: &self.options.editor_identity,
            draft: &draft,
        });
        let raw = self
            .text
            .generate_text(&self.options.editor_model, &edit_prompt, ResponseFormat::Json)
            .await
            .map_err(|source| ContentError::Generation {
                stage: "editorial",
                source,
            })?;

        let record = parse_editorial_response(&raw)?;
        let published_at = now + Duration::days(self.options.publish_offset_days);
        let (mut post, adjustments) = record.into_new_post(EditorialContext {
            persona,
            editor_identity: &self.options.editor_identity,
            published_at,
        })?;
        log_adjustments(persona, &adjustments);

        post.slug = self.unique_slug(&post.slug).await?;
        post.validate()?;

        if request.dry_run {
            info!(
                target = "application::content",
                slug = %post.slug,
                "Dry run complete; nothing persisted"
            );
            return Ok(WriteOutcome::DryRun(post));
        }

        let stored = self
            .writer
            .create_post(post)
            .await
            .map_err(ContentError::Persistence)?;
        counter!(METRIC_POSTS_GENERATED, "writer" => persona.key).increment(1);
        info!(
            target = "application::content",
            post_id = stored.id,
            slug = %stored.slug,
            "Post published"
        );

        Ok(WriteOutcome::Published(stored))
    }

    async fn fetch_history(&self, persona: &Persona) -> Vec<PostRecord> {
        match self
            .posts
            .list_recent_by_writer(persona.full_name, self.options.history_limit)
            .await
        {
            Ok(posts) => posts,
            Err(err) => {
                warn!(
                    target = "application::content",
                    writer = persona.full_name,
                    error = %err,
                    "History lookup failed; continuing without recent posts"
                );
                Vec::new()
            }
        }
    }

    async fn unique_slug(&self, candidate: &str) -> Result<String, ContentError> {
        let posts = Arc::clone(&self.posts);
        generate_unique_slug_async(candidate, |slug| {
            let posts = Arc::clone(&posts);
            let slug = slug.to_string();
            async move { posts.slug_exists(&slug).await.map(|exists| !exists) }
        })
        .await
        .map_err(|err: SlugAsyncError<RepoError>| ContentError::Slug(err.to_string()))
    }
}

/// Resolve the requested persona key, or the default when none was given.
pub fn select_persona(key: Option<&str>) -> Result<&'static Persona, ContentError> {
    let key = key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(DEFAULT_PERSONA_KEY);
    personas::find(key).ok_or_else(|| ContentError::UnknownPersona {
        key: key.to_string(),
        valid: personas::keys(),
    })
}

fn log_adjustments(persona: &Persona, adjustments: &[Adjustment]) {
    for adjustment in adjustments {
        match adjustment {
            Adjustment::Category { returned } => warn!(
                target = "application::content",
                expected = persona.category,
                returned = %returned,
                "Editorial pass changed the category; restoring persona category"
            ),
            Adjustment::Writer { returned } => warn!(
                target = "application::content",
                expected = persona.full_name,
                returned = %returned,
                "Editorial pass changed the writer; restoring persona name"
            ),
            Adjustment::Editor { returned } => info!(
                target = "application::content",
                returned = %returned,
                "Editorial identity overridden"
            ),
            Adjustment::SlugRederived { returned } => info!(
                target = "application::content",
                returned = ?returned,
                "Slug derived from title"
            ),
            Adjustment::AlertComposed => info!(
                target = "application::content",
                "System alert composed from structured fields"
            ),
        }
    }
}
