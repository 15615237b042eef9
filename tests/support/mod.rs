#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use glitchwire::application::generation::{
    GenerationError, ImageArtifact, ImageGenerator, ImageRequest, ResponseFormat, TextGenerator,
};
use glitchwire::application::repos::{
    ObjectStore, PostsRepo, PostsWriteRepo, RepoError, StorageError, StoredObject,
};
use glitchwire::domain::entities::{NewPost, PostRecord};
use glitchwire::domain::types::PostStatus;

pub const STORAGE_BASE: &str = "https://abcd.supabase.co";

/// In-memory posts table that counts every write.
#[derive(Default)]
pub struct MemoryPosts {
    posts: Mutex<Vec<PostRecord>>,
    inserts: AtomicUsize,
    image_updates: Mutex<Vec<(i64, String)>>,
    fail_history: bool,
    fail_image_updates: bool,
}

impl MemoryPosts {
    pub fn with_posts(posts: Vec<PostRecord>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Default::default()
        }
    }

    pub fn failing_history() -> Self {
        Self {
            fail_history: true,
            ..Default::default()
        }
    }

    pub fn failing_image_updates(posts: Vec<PostRecord>) -> Self {
        Self {
            posts: Mutex::new(posts),
            fail_image_updates: true,
            ..Default::default()
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub async fn image_updates(&self) -> Vec<(i64, String)> {
        self.image_updates.lock().await.clone()
    }

    pub async fn snapshot(&self) -> Vec<PostRecord> {
        self.posts.lock().await.clone()
    }
}

#[async_trait]
impl PostsRepo for MemoryPosts {
    async fn list_recent_by_writer(
        &self,
        writer: &str,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        if self.fail_history {
            return Err(RepoError::Timeout);
        }
        let mut posts: Vec<PostRecord> = self
            .posts
            .lock()
            .await
            .iter()
            .filter(|post| post.ai_writer == writer)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_missing_image(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .lock()
            .await
            .iter()
            .filter(|post| post.image_url.is_none())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_published(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .lock()
            .await
            .iter()
            .filter(|post| {
                post.status == PostStatus::Published
                    && post.published_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .await
            .iter()
            .find(|post| post.slug == slug)
            .cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        Ok(self.posts.lock().await.iter().any(|post| post.slug == slug))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryPosts {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord, RepoError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut posts = self.posts.lock().await;
        if posts.iter().any(|existing| existing.slug == post.slug) {
            return Err(RepoError::Duplicate {
                constraint: "posts_slug_key".to_string(),
            });
        }

        let record = PostRecord {
            id: posts.len() as i64 + 1,
            title: post.title,
            slug: post.slug,
            summary: post.summary,
            content: post.content,
            category: post.category,
            image_url: None,
            source_url: post.source_url,
            status: post.status,
            ai_writer: post.ai_writer,
            ai_editor: post.ai_editor,
            system_alert: post.system_alert,
            integrity_scan: post.integrity_scan,
            fact_check: post.fact_check,
            editorial_action: post.editorial_action,
            editorial_note: post.editorial_note,
            seo_keywords: post.seo_keywords,
            published_at: post.published_at,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        posts.push(record.clone());
        Ok(record)
    }

    async fn update_image_url(&self, id: i64, image_url: &str) -> Result<(), RepoError> {
        if self.fail_image_updates {
            return Err(RepoError::Timeout);
        }
        let mut posts = self.posts.lock().await;
        let post = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.image_url = Some(image_url.to_string());
        post.updated_at = Some(OffsetDateTime::now_utc());
        self.image_updates
            .lock()
            .await
            .push((id, image_url.to_string()));
        Ok(())
    }
}

/// Text generator replaying canned responses in order.
#[derive(Default)]
pub struct ScriptedText {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<(String, ResponseFormat)>>,
}

impl ScriptedText {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub async fn calls(&self) -> Vec<(String, ResponseFormat)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_text(
        &self,
        model: &str,
        _prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, GenerationError> {
        self.calls.lock().await.push((model.to_string(), format));
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Image generator that records requests and fails for prompts containing
/// `fail_marker`. An empty marker fails every prompt.
pub struct StubImages {
    fail_marker: Option<String>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl StubImages {
    pub fn working() -> Self {
        Self {
            fail_marker: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self::failing_for("")
    }

    pub fn failing_for(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageArtifact, GenerationError> {
        self.requests.lock().await.push(request.clone());
        match self.fail_marker.as_deref() {
            Some(marker) if request.prompt.contains(marker) => Err(GenerationError::Status {
                status: 503,
                body: "backend overloaded".to_string(),
            }),
            _ => ImageArtifact::from_bytes(Bytes::from(png_header(request.width, request.height))),
        }
    }
}

/// Object store that records uploads and refuses duplicates.
#[derive(Default)]
pub struct RecordingStore {
    uploads: Mutex<Vec<(String, String, usize)>>,
    reject_all: bool,
}

impl RecordingStore {
    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Default::default()
        }
    }

    pub async fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().await.clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<StoredObject, StorageError> {
        if self.reject_all {
            return Err(StorageError::Rejected {
                status: 403,
                body: "new row violates row-level security policy".to_string(),
            });
        }
        let mut uploads = self.uploads.lock().await;
        if uploads.iter().any(|(existing, _, _)| existing == name) {
            return Err(StorageError::AlreadyExists {
                name: name.to_string(),
            });
        }
        uploads.push((name.to_string(), content_type.to_string(), bytes.len()));
        Ok(StoredObject {
            name: name.to_string(),
            public_url: format!("{STORAGE_BASE}/storage/v1/object/public/blog-images/{name}"),
        })
    }
}

pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

/// A stored post with sensible defaults for the read side.
pub fn stored_post(id: i64, slug: &str, writer: &str) -> PostRecord {
    PostRecord {
        id,
        title: format!("Transmission {id}"),
        slug: slug.to_string(),
        summary: "Static on every channel.".to_string(),
        content: "# Static\n\nThe **signal** drops.".to_string(),
        category: "Security".to_string(),
        image_url: None,
        source_url: None,
        status: PostStatus::Published,
        ai_writer: writer.to_string(),
        ai_editor: "SENTINEL v3".to_string(),
        system_alert: None,
        integrity_scan: None,
        fact_check: None,
        editorial_action: None,
        editorial_note: None,
        seo_keywords: Vec::new(),
        published_at: Some(OffsetDateTime::UNIX_EPOCH + time::Duration::days(id)),
        created_at: OffsetDateTime::UNIX_EPOCH + time::Duration::days(id),
        updated_at: None,
    }
}
