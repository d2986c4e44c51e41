use std::time::Duration;

use async_trait::async_trait;
use blog_shared::Body;
use sqlx::types::Json;

use crate::db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Read access to stored post bodies, used to rebuild the search index when a
/// write does not carry the body inline.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Body of the newest revision of a post, preferring the draft over the
    /// published revision. `None` when the post doesn't exist or has no body.
    async fn find_draft(
        &self,
        document_id: &str,
        locale: Option<&str>,
    ) -> Result<Option<Body>, StoreError>;
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: DbPool,
}

impl PgDocumentStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_draft(
        &self,
        document_id: &str,
        locale: Option<&str>,
    ) -> Result<Option<Body>, StoreError> {
        let row: Option<(Json<Body>,)> = sqlx::query_as(
            r#"
            SELECT body
            FROM posts
            WHERE document_id = $1
              AND ($2::text IS NULL OR locale = $2)
              AND body IS NOT NULL
            ORDER BY (status = 'draft') DESC, updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(document_id)
        .bind(locale)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(Json(body),)| body))
    }
}
