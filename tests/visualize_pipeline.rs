mod support;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use glitchwire::application::generation::{GenerationError, ImageGenerator, TextGenerator};
use glitchwire::application::prompts::fallback_visual_prompt;
use glitchwire::application::repos::{ObjectStore, PostsRepo, PostsWriteRepo};
use glitchwire::application::retry::RetryPolicy;
use glitchwire::application::visualize::{
    GenerationMode, IMAGE_CONTENT_TYPE, LinkMode, VisualizeError, VisualizeOptions,
    VisualizePipeline,
};

use support::{MemoryPosts, RecordingStore, STORAGE_BASE, ScriptedText, StubImages, stored_post};

const DIRECTED: &str = "A relay tower wrapped in teal static, amber scanlines, long exposure.";
const CURSED: &str = "A cursed antenna farm drowning in magenta static, overexposed.";

fn options(mode: GenerationMode, link_mode: LinkMode) -> VisualizeOptions {
    let attempts = NonZeroU32::new(2).expect("non-zero");
    VisualizeOptions {
        batch_size: 3,
        cooldown: Duration::ZERO,
        mode,
        link_mode,
        retry: RetryPolicy::new(
            vec!["flux".to_string(), "turbo".to_string()],
            attempts,
            Duration::ZERO,
        ),
        ..VisualizeOptions::default()
    }
}

struct Harness {
    posts: Arc<MemoryPosts>,
    director: Arc<ScriptedText>,
    images: Arc<StubImages>,
    store: Arc<RecordingStore>,
}

impl Harness {
    fn new(posts: MemoryPosts, director: ScriptedText, images: StubImages) -> Self {
        Self {
            posts: Arc::new(posts),
            director: Arc::new(director),
            images: Arc::new(images),
            store: Arc::new(RecordingStore::default()),
        }
    }

    fn with_store(mut self, store: RecordingStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn pipeline(&self, options: VisualizeOptions) -> VisualizePipeline {
        let read: Arc<dyn PostsRepo> = self.posts.clone();
        let write: Arc<dyn PostsWriteRepo> = self.posts.clone();
        let director: Arc<dyn TextGenerator> = self.director.clone();
        let images: Arc<dyn ImageGenerator> = self.images.clone();
        let store: Arc<dyn ObjectStore> = self.store.clone();
        VisualizePipeline::new(read, write, director, images, store, options)
    }
}

#[tokio::test]
async fn pending_post_gets_exactly_one_image_update() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![stored_post(1, "dead-air", "Cipher Vance")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::working(),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    assert!(report.is_success());
    assert_eq!(report.processed.len(), 1);

    let updates = harness.posts.image_updates().await;
    assert_eq!(updates.len(), 1);
    let (id, image_ref) = &updates[0];
    assert_eq!(*id, 1);
    assert!(image_ref.starts_with(&format!(
        "{STORAGE_BASE}/storage/v1/object/public/blog-images/dead-air-"
    )));
    assert!(image_ref.ends_with(".png"));

    let uploads = harness.store.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, IMAGE_CONTENT_TYPE);

    let requests = harness.images.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].backend, "flux");
    assert_eq!(requests[0].prompt, DIRECTED);
}

#[tokio::test]
async fn exhausted_retries_leave_post_pending() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![stored_post(1, "dead-air", "Cipher Vance")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::broken(),
    );
    let options = options(GenerationMode::Pollinations, LinkMode::PublicUrl);
    let expected_attempts = options.retry.total_attempts();

    let report = harness
        .pipeline(options)
        .run_batch()
        .await
        .expect("batch completes");

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].slug, "dead-air");
    assert!(harness.posts.image_updates().await.is_empty());
    assert!(harness.store.uploads().await.is_empty());

    let backends: Vec<String> = harness
        .images
        .requests()
        .await
        .into_iter()
        .map(|request| request.backend)
        .collect();
    assert_eq!(backends.len(), expected_attempts);
    assert_eq!(backends, ["flux", "flux", "turbo", "turbo"]);

    let pending = harness
        .posts
        .list_missing_image(10)
        .await
        .expect("pending list");
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn posts_with_images_are_not_selected() {
    let mut illustrated = stored_post(1, "already-lit", "Nova Reyes");
    illustrated.image_url = Some("already-lit-1.png".to_string());
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![illustrated, stored_post(2, "dark", "Nova Reyes")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::working(),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].slug, "dark");
    let updates = harness.posts.image_updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, 2);
}

#[tokio::test]
async fn director_failure_falls_back_to_default_prompt() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![
            stored_post(1, "first", "Cipher Vance"),
            stored_post(2, "second", "Echo Lindqvist"),
        ]),
        ScriptedText::new(vec![
            Ok(DIRECTED.to_string()),
            Err(GenerationError::EmptyResponse),
        ]),
        StubImages::working(),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::Filename))
        .run_batch()
        .await
        .expect("batch");

    assert_eq!(report.processed.len(), 2);
    let updates = harness.posts.image_updates().await;
    assert_eq!(updates.len(), 2);
    for (_, image_ref) in &updates {
        assert!(!image_ref.starts_with("http"), "{image_ref}");
        assert!(image_ref.ends_with(".png"));
    }

    let requests = harness.images.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].prompt, DIRECTED);
    assert_eq!(
        requests[1].prompt,
        fallback_visual_prompt("Static on every channel.", "Cipher Vance")
    );
}

#[tokio::test]
async fn image_failure_on_one_post_does_not_stop_the_next() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![
            stored_post(1, "first", "Cipher Vance"),
            stored_post(2, "second", "Echo Lindqvist"),
        ]),
        // Newest first: "second" is directed before "first".
        ScriptedText::replying(&[DIRECTED, CURSED]),
        StubImages::failing_for("cursed"),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    let processed: Vec<i64> = report.processed.iter().map(|post| post.id).collect();
    let failed: Vec<i64> = report.failed.iter().map(|post| post.id).collect();
    assert_eq!(processed, [2]);
    assert_eq!(failed, [1]);

    let updates = harness.posts.image_updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, 2);
    assert_eq!(harness.store.uploads().await.len(), 1);

    let pending = harness
        .posts
        .list_missing_image(10)
        .await
        .expect("pending list");
    let pending: Vec<i64> = pending.iter().map(|post| post.id).collect();
    assert_eq!(pending, [1]);
}

#[tokio::test]
async fn rejected_upload_leaves_post_pending() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![stored_post(1, "dead-air", "Cipher Vance")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::working(),
    )
    .with_store(RecordingStore::rejecting());

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("403"), "{}", report.failed[0].error);
    assert!(harness.posts.image_updates().await.is_empty());
    assert_eq!(harness.images.requests().await.len(), 1);

    let pending = harness
        .posts
        .list_missing_image(10)
        .await
        .expect("pending list");
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn link_failure_leaves_post_pending() {
    let harness = Harness::new(
        MemoryPosts::failing_image_updates(vec![stored_post(1, "dead-air", "Cipher Vance")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::working(),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    assert!(!report.is_success());
    assert_eq!(report.failed[0].slug, "dead-air");
    assert_eq!(harness.store.uploads().await.len(), 1);

    let pending = harness
        .posts
        .list_missing_image(10)
        .await
        .expect("pending list");
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn gemini_mode_makes_a_single_attempt() {
    let harness = Harness::new(
        MemoryPosts::with_posts(vec![stored_post(1, "dead-air", "Cipher Vance")]),
        ScriptedText::replying(&[DIRECTED]),
        StubImages::broken(),
    );
    let options = options(GenerationMode::Gemini, LinkMode::PublicUrl);
    let direct_model = options.direct_model.clone();

    let report = harness.pipeline(options).run_batch().await.expect("batch");

    assert_eq!(report.failed.len(), 1);
    let requests = harness.images.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].backend, direct_model);
    assert!(harness.posts.image_updates().await.is_empty());
}

#[tokio::test]
async fn empty_queue_is_a_successful_no_op() {
    let harness = Harness::new(
        MemoryPosts::default(),
        ScriptedText::default(),
        StubImages::working(),
    );

    let report = harness
        .pipeline(options(GenerationMode::Pollinations, LinkMode::PublicUrl))
        .run_batch()
        .await
        .expect("batch");

    assert!(report.is_success());
    assert!(report.processed.is_empty());
    assert!(harness.images.requests().await.is_empty());
}

#[test]
fn generation_error_reports_attempt_count() {
    let err = VisualizeError::Generation {
        attempts: 4,
        last: GenerationError::EmptyResponse,
    };
    assert!(err.to_string().contains("4 attempt"));
}
