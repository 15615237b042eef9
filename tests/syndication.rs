mod support;

use std::sync::Arc;

use time::{Duration, OffsetDateTime, macros::datetime};

use glitchwire::application::render::markdown_renderer;
use glitchwire::application::repos::PostsRepo;
use glitchwire::application::syndication::{FeedChannel, SyndicationService};
use glitchwire::domain::types::PostStatus;
use glitchwire::presentation::media::{DEFAULT_POLLINATIONS_BASE, ImageResolver};

use support::{MemoryPosts, STORAGE_BASE, stored_post};

fn service(posts: MemoryPosts, limit: u32) -> SyndicationService {
    let posts: Arc<dyn PostsRepo> = Arc::new(posts);
    SyndicationService::new(
        posts,
        markdown_renderer(),
        ImageResolver::new(Some(STORAGE_BASE), DEFAULT_POLLINATIONS_BASE),
        FeedChannel {
            site_url: "https://glitch.example/".to_string(),
            title: "GLITCHWIRE & Co".to_string(),
            description: "Dispatches from the noise floor.".to_string(),
            limit,
        },
    )
}

#[tokio::test]
async fn feed_contains_only_visible_posts_newest_first() {
    let now = datetime!(2025-01-01 00:00 UTC);

    let older = stored_post(1, "older", "Cipher Vance");
    let mut newer = stored_post(2, "newer", "Nova Reyes");
    newer.image_url = Some("newer-1700000000000.png".to_string());
    newer.seo_keywords = vec!["signal".to_string(), "r&d".to_string()];
    let mut scheduled = stored_post(3, "scheduled", "Echo Lindqvist");
    scheduled.published_at = Some(now + Duration::days(30));
    let mut draft = stored_post(4, "draft", "Atlas Okafor");
    draft.status = PostStatus::Draft;

    let xml = service(MemoryPosts::with_posts(vec![older, newer, scheduled, draft]), 50)
        .rss_feed_at(now)
        .await
        .expect("feed");

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<title>GLITCHWIRE &amp; Co</title>"));
    assert!(xml.contains("<link>https://glitch.example/</link>"));

    let newer_at = xml.find("https://glitch.example/posts/newer").expect("newer item");
    let older_at = xml.find("https://glitch.example/posts/older").expect("older item");
    assert!(newer_at < older_at);
    assert!(!xml.contains("posts/scheduled"));
    assert!(!xml.contains("posts/draft"));

    assert!(xml.contains(&format!(
        "<enclosure url=\"{STORAGE_BASE}/storage/v1/object/public/blog-images/newer-1700000000000.png\" length=\"0\" type=\"image/png\"/>"
    )));
    assert!(xml.contains("<category>r&amp;d</category>"));
    assert!(xml.contains("<dc:creator>Nova Reyes</dc:creator>"));
    assert!(xml.contains("<dc:creator>SENTINEL v3</dc:creator>"));
    assert!(xml.contains("<content:encoded><![CDATA[<h1>Static</h1>"));
}

#[tokio::test]
async fn posts_without_images_fall_back_to_generated_url() {
    let xml = service(
        MemoryPosts::with_posts(vec![stored_post(1, "bare", "Cipher Vance")]),
        50,
    )
    .rss_feed_at(OffsetDateTime::now_utc())
    .await
    .expect("feed");

    assert!(xml.contains("<enclosure url=\"https://image.pollinations.ai/prompt/"));
    assert!(xml.contains("type=\"image/jpeg\""));
}

#[tokio::test]
async fn limit_caps_item_count() {
    let posts = (1..=5)
        .map(|id| stored_post(id, &format!("post-{id}"), "Cipher Vance"))
        .collect();

    let xml = service(MemoryPosts::with_posts(posts), 2)
        .rss_feed_at(OffsetDateTime::now_utc())
        .await
        .expect("feed");

    assert_eq!(xml.matches("<item>").count(), 2);
    assert!(xml.contains("posts/post-5"));
    assert!(xml.contains("posts/post-4"));
}
