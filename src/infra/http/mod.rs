//! Read-only HTTP surface: the RSS feed, JSON post views and a health probe.

mod middleware;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    application::{
        error::{AppError, ErrorReport},
        render::MarkdownRenderer,
        repos::{PostsRepo, RepoError},
        syndication::SyndicationService,
    },
    domain::{entities::PostRecord, types::PostStatus},
    infra::{db::PostgresRepositories, db::map_sqlx_error, error::InfraError},
    presentation::{media::ImageResolver, views::PostView},
};

use middleware::{log_responses, set_request_context};

/// Liveness of the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), RepoError>;
}

#[async_trait]
impl HealthCheck for PostgresRepositories {
    async fn check(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<dyn PostsRepo>,
    pub syndication: SyndicationService,
    pub renderer: Arc<MarkdownRenderer>,
    pub resolver: ImageResolver,
    pub health: Arc<dyn HealthCheck>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/rss.xml", get(rss_feed))
        .route("/posts/{slug}", get(post_detail))
        .route("/_health", get(health))
        .fallback(fallback)
        .with_state(state)
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

pub async fn serve_http(addr: SocketAddr, state: HttpState) -> Result<(), InfraError> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        target = "glitchwire::serve",
        addr = %addr,
        "HTTP listener bound"
    );
    axum::serve(listener, build_router(state).into_make_service()).await?;
    Ok(())
}

async fn rss_feed(State(state): State<HttpState>) -> Result<Response, AppError> {
    let body = state.syndication.rss_feed().await?;
    Ok(xml_response(body, "application/rss+xml"))
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<PostView>, AppError> {
    let post = state
        .posts
        .find_by_slug(&slug)
        .await?
        .filter(|post| is_visible(post, OffsetDateTime::now_utc()))
        .ok_or(AppError::NotFound)?;

    let view = PostView::build(&post, &state.renderer, &state.resolver)?;
    Ok(Json(view))
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.health.check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn fallback() -> AppError {
    AppError::NotFound
}

/// Drafts and scheduled posts stay hidden until their publish time passes.
fn is_visible(post: &PostRecord, now: OffsetDateTime) -> bool {
    post.status == PostStatus::Published && post.published_at.is_some_and(|at| at <= now)
}

fn xml_response(body: String, content_type: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&format!("{content_type}; charset=utf-8"))
            .unwrap_or_else(|_| HeaderValue::from_static("application/xml")),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        render::markdown_renderer,
        syndication::{DEFAULT_FEED_LIMIT, FeedChannel},
    };
    use crate::presentation::views::test_support::post;
    use axum::body::to_bytes;
    use axum::http::Request;
    use time::Duration;
    use tower::ServiceExt;

    struct StaticPosts(Vec<PostRecord>);

    #[async_trait]
    impl PostsRepo for StaticPosts {
        async fn list_recent_by_writer(
            &self,
            _writer: &str,
            _limit: u32,
        ) -> Result<Vec<PostRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn list_missing_image(&self, _limit: u32) -> Result<Vec<PostRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn list_published(
            &self,
            now: OffsetDateTime,
            _limit: u32,
        ) -> Result<Vec<PostRecord>, RepoError> {
            Ok(self
                .0
                .iter()
                .filter(|post| is_visible(post, now))
                .cloned()
                .collect())
        }

        async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
            Ok(self.0.iter().find(|post| post.slug == slug).cloned())
        }

        async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
            Ok(self.0.iter().any(|post| post.slug == slug))
        }
    }

    struct Health(bool);

    #[async_trait]
    impl HealthCheck for Health {
        async fn check(&self) -> Result<(), RepoError> {
            if self.0 {
                Ok(())
            } else {
                Err(RepoError::Timeout)
            }
        }
    }

    fn router(posts: Vec<PostRecord>, healthy: bool) -> Router {
        let posts: Arc<dyn PostsRepo> = Arc::new(StaticPosts(posts));
        let renderer = markdown_renderer();
        let resolver = ImageResolver::default();
        let syndication = SyndicationService::new(
            Arc::clone(&posts),
            Arc::clone(&renderer),
            resolver.clone(),
            FeedChannel {
                site_url: "https://glitch.example".to_string(),
                title: "GLITCHWIRE".to_string(),
                description: "noise".to_string(),
                limit: DEFAULT_FEED_LIMIT,
            },
        );
        build_router(HttpState {
            posts,
            syndication,
            renderer,
            resolver,
            health: Arc::new(Health(healthy)),
        })
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn rss_lists_published_posts() {
        let response = get(router(vec![post(1, "dead-air")], true), "/rss.xml").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/rss+xml; charset=utf-8"
        );
        let body = body_string(response).await;
        assert!(body.contains("<link>https://glitch.example/posts/dead-air</link>"));
    }

    #[tokio::test]
    async fn post_view_is_served_as_json() {
        let response = get(router(vec![post(1, "dead-air")], true), "/posts/dead-air").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json");
        assert_eq!(value["slug"], "dead-air");
        assert_eq!(value["writer"], "Cipher Vance");
    }

    #[tokio::test]
    async fn future_and_missing_posts_are_not_found() {
        let mut scheduled = post(2, "tomorrow");
        scheduled.published_at = Some(OffsetDateTime::now_utc() + Duration::days(1));

        let router = router(vec![scheduled], true);
        assert_eq!(
            get(router.clone(), "/posts/tomorrow").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get(router.clone(), "/posts/nothing").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get(router, "/admin").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reflects_store() {
        assert_eq!(
            get(router(Vec::new(), true), "/_health").await.status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            get(router(Vec::new(), false), "/_health").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
