use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use super::PostgresRepositories;
use crate::application::repos::{PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::{NewPost, PostRecord};
use crate::domain::types::PostStatus;
use crate::infra::db::map_sqlx_error;

const POST_COLUMNS: &str = "id, title, slug, summary, content, category, image_url, source_url, \
    status, ai_writer, ai_editor, system_alert, integrity_scan, fact_check, editorial_action, \
    editorial_note, seo_keywords, published_at, created_at, updated_at";

#[derive(FromRow)]
struct PostRow {
    id: i64,
    title: String,
    slug: String,
    summary: String,
    content: String,
    category: String,
    image_url: Option<String>,
    source_url: Option<String>,
    status: PostStatus,
    ai_writer: String,
    ai_editor: String,
    system_alert: Option<String>,
    integrity_scan: Option<f64>,
    fact_check: Option<String>,
    editorial_action: Option<String>,
    editorial_note: Option<String>,
    seo_keywords: Option<Vec<String>>,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: Option<OffsetDateTime>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            summary: row.summary,
            content: row.content,
            category: row.category,
            image_url: row.image_url,
            source_url: row.source_url,
            status: row.status,
            ai_writer: row.ai_writer,
            ai_editor: row.ai_editor,
            system_alert: row.system_alert,
            integrity_scan: row.integrity_scan,
            fact_check: row.fact_check,
            editorial_action: row.editorial_action,
            editorial_note: row.editorial_note,
            seo_keywords: row.seo_keywords.unwrap_or_default(),
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn select_sql(tail: &str) -> String {
    format!("SELECT {POST_COLUMNS} FROM posts {tail}")
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_recent_by_writer(
        &self,
        writer: &str,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let sql = select_sql(
            "WHERE ai_writer = $1 \
             ORDER BY published_at DESC NULLS LAST, id DESC \
             LIMIT $2",
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(writer)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_missing_image(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let sql = select_sql(
            "WHERE image_url IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_published(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let sql = select_sql(
            "WHERE status = $1 AND published_at IS NOT NULL AND published_at <= $2 \
             ORDER BY published_at DESC, id DESC \
             LIMIT $3",
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(PostStatus::Published)
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let sql = select_sql("WHERE slug = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord, RepoError> {
        let NewPost {
            title,
            slug,
            summary,
            content,
            category,
            source_url,
            status,
            ai_writer,
            ai_editor,
            system_alert,
            integrity_scan,
            fact_check,
            editorial_action,
            editorial_note,
            seo_keywords,
            published_at,
        } = post;

        let keywords = (!seo_keywords.is_empty()).then_some(seo_keywords);
        let sql = format!(
            "INSERT INTO posts (\
                 title, slug, summary, content, category, source_url, status, ai_writer, \
                 ai_editor, system_alert, integrity_scan, fact_check, editorial_action, \
                 editorial_note, seo_keywords, published_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(title)
            .bind(slug)
            .bind(summary)
            .bind(content)
            .bind(category)
            .bind(source_url)
            .bind(status)
            .bind(ai_writer)
            .bind(ai_editor)
            .bind(system_alert)
            .bind(integrity_scan)
            .bind(fact_check)
            .bind(editorial_action)
            .bind(editorial_note)
            .bind(keywords)
            .bind(published_at)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_image_url(&self, id: i64, image_url: &str) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE posts SET image_url = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(image_url)
            .bind(OffsetDateTime::now_utc())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
