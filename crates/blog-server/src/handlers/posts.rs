use axum::{
    extract::{Path, Query, State},
    Json,
};
use blog_shared::{
    api::{CreatePostRequest, LocaleParams, SlugListResponse, UpdatePostRequest},
    Body, Post, PostStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::{MatchCriteria, PostPayload};
use crate::routes::AppState;

const MAX_SLUGS: i64 = 100;

const POST_COLUMNS: &str = "id, document_id, locale, status, title, slug, date, thumbnail, body, \
                            searchable_content, created_at, updated_at, published_at";

type PostRow = (
    i64,                   // id
    String,                // document_id
    String,                // locale
    PostStatus,            // status
    String,                // title
    String,                // slug
    Option<NaiveDate>,     // date
    Option<Value>,         // thumbnail
    Option<SqlJson<Body>>, // body
    Option<String>,        // searchable_content
    DateTime<Utc>,         // created_at
    DateTime<Utc>,         // updated_at
    Option<DateTime<Utc>>, // published_at
);

fn row_to_post(row: PostRow) -> Post {
    Post {
        id: row.0,
        document_id: row.1,
        locale: row.2,
        status: row.3,
        title: row.4,
        slug: row.5,
        date: row.6,
        thumbnail: row.7,
        body: row.8.map(|SqlJson(body)| body),
        searchable_content: row.9,
        created_at: row.10,
        updated_at: row.11,
        published_at: row.12,
    }
}

/// Generate URL-safe slug from title
fn generate_slug(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn resolve_slug(slug: Option<&str>, title: &str) -> Result<String, AppError> {
    let slug = generate_slug(slug.unwrap_or(title));
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Slug must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

/// Payload for a brand-new draft. No `document_id` is handed to the hooks:
/// nothing is stored under it yet, so a draft lookup could never succeed.
fn new_draft_payload(req: CreatePostRequest, locale: String, slug: String) -> PostPayload {
    PostPayload {
        document_id: None,
        locale: Some(locale),
        title: Some(req.title),
        slug: Some(slug),
        date: req.date,
        thumbnail: req.thumbnail,
        body: req.body,
        searchable_content: None,
    }
}

/// Blocks an update only references by `__component` and `id` are filled
/// from the stored draft, so a relation-only write never drops content.
fn merge_update_body(incoming: Option<Body>, stored: Option<&Body>) -> Option<Body> {
    match (incoming, stored) {
        (Some(body), Some(stored)) => Some(body.resolve_references(stored)),
        (body, _) => body,
    }
}

fn locale_or_default(state: &AppState, locale: Option<String>) -> String {
    locale
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.default_locale.clone())
}

/// Helper to reject a slug already used by another post in the same locale
async fn ensure_slug_available(
    state: &AppState,
    slug: &str,
    locale: &str,
    document_id: &str,
) -> Result<(), AppError> {
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM posts WHERE slug = $1 AND locale = $2 AND document_id <> $3 LIMIT 1",
    )
    .bind(slug)
    .bind(locale)
    .bind(document_id)
    .fetch_optional(&state.db)
    .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "A post with this slug already exists".to_string(),
        ));
    }
    Ok(())
}

async fn find_revision(
    state: &AppState,
    document_id: &str,
    locale: &str,
    status: PostStatus,
) -> Result<Option<Post>, AppError> {
    let query = format!(
        "SELECT {} FROM posts WHERE document_id = $1 AND locale = $2 AND status = $3",
        POST_COLUMNS
    );
    let row: Option<PostRow> = sqlx::query_as(&query)
        .bind(document_id)
        .bind(locale)
        .bind(status)
        .fetch_optional(&state.db)
        .await?;

    Ok(row.map(row_to_post))
}

/// GET /api/posts/slugs
pub async fn list_slugs(
    State(state): State<AppState>,
    Query(params): Query<LocaleParams>,
) -> Result<Json<SlugListResponse>, AppError> {
    let locale = locale_or_default(&state, params.locale);

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT slug
        FROM posts
        WHERE status = 'published' AND locale = $1
        ORDER BY date DESC NULLS LAST, id DESC
        LIMIT $2
        "#,
    )
    .bind(&locale)
    .bind(MAX_SLUGS)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(SlugListResponse {
        data: rows.into_iter().map(|(slug,)| slug).collect(),
    }))
}

/// GET /api/posts/:slug
pub async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<LocaleParams>,
) -> Result<Json<Post>, AppError> {
    let locale = locale_or_default(&state, params.locale);

    let query = format!(
        "SELECT {} FROM posts WHERE slug = $1 AND locale = $2 AND status = 'published'",
        POST_COLUMNS
    );
    let row: PostRow = sqlx::query_as(&query)
        .bind(&slug)
        .bind(&locale)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(row_to_post(row)))
}

/// GET /api/admin/posts/:document_id
pub async fn get_draft(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<LocaleParams>,
) -> Result<Json<Post>, AppError> {
    let locale = locale_or_default(&state, params.locale);

    find_revision(&state, &document_id, &locale, PostStatus::Draft)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// POST /api/admin/posts
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Post title is required".to_string()));
    }

    let document_id = Uuid::new_v4().to_string();
    let locale = locale_or_default(&state, req.locale.clone());
    let slug = resolve_slug(req.slug.as_deref(), &req.title)?;

    ensure_slug_available(&state, &slug, &locale, &document_id).await?;

    let mut payload = new_draft_payload(req, locale.clone(), slug);
    state.lifecycle.on_before_create(&mut payload).await;

    let now = Utc::now();
    let query = format!(
        r#"
        INSERT INTO posts (document_id, locale, status, title, slug, date, thumbnail, body,
                           searchable_content, created_at, updated_at)
        VALUES ($1, $2, 'draft', $3, $4, $5, $6, $7, $8, $9, $9)
        RETURNING {}
        "#,
        POST_COLUMNS
    );
    let row: PostRow = sqlx::query_as(&query)
        .bind(&document_id)
        .bind(&locale)
        .bind(&payload.title)
        .bind(&payload.slug)
        .bind(payload.date)
        .bind(&payload.thumbnail)
        .bind(payload.body.map(SqlJson))
        .bind(&payload.searchable_content)
        .bind(now)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("Created post {} ({})", document_id, locale);

    Ok(Json(row_to_post(row)))
}

/// PUT /api/admin/posts/:document_id
pub async fn update_post(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<LocaleParams>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let locale = locale_or_default(&state, req.locale.or(params.locale));

    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Post title cannot be empty".to_string()));
        }
    }

    let draft = find_revision(&state, &document_id, &locale, PostStatus::Draft)
        .await?
        .ok_or(AppError::NotFound)?;

    let slug = match req.slug.as_deref() {
        Some(slug) => {
            let slug = resolve_slug(Some(slug), "")?;
            ensure_slug_available(&state, &slug, &locale, &document_id).await?;
            Some(slug)
        }
        None => None,
    };

    let mut payload = PostPayload {
        document_id: Some(document_id.clone()),
        locale: Some(locale.clone()),
        title: req.title,
        slug,
        date: req.date,
        thumbnail: req.thumbnail,
        body: merge_update_body(req.body, draft.body.as_ref()),
        searchable_content: None,
    };
    let criteria = MatchCriteria {
        document_id: document_id.clone(),
        locale: Some(locale.clone()),
    };
    state.lifecycle.on_before_update(&mut payload, &criteria).await;

    let query = format!(
        r#"
        UPDATE posts
        SET title = COALESCE($1, title),
            slug = COALESCE($2, slug),
            date = COALESCE($3, date),
            thumbnail = COALESCE($4, thumbnail),
            body = COALESCE($5, body),
            searchable_content = COALESCE($6, searchable_content),
            updated_at = $7
        WHERE document_id = $8 AND locale = $9 AND status = 'draft'
        RETURNING {}
        "#,
        POST_COLUMNS
    );
    let row: PostRow = sqlx::query_as(&query)
        .bind(&payload.title)
        .bind(&payload.slug)
        .bind(payload.date)
        .bind(&payload.thumbnail)
        .bind(payload.body.map(SqlJson))
        .bind(&payload.searchable_content)
        .bind(Utc::now())
        .bind(&document_id)
        .bind(&locale)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(row_to_post(row)))
}

/// POST /api/admin/posts/:document_id/publish
///
/// Copies the draft into the published revision. The write carries no inline
/// body, so the search index is rebuilt from the draft by the lifecycle hooks.
pub async fn publish_post(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<LocaleParams>,
) -> Result<Json<Post>, AppError> {
    let locale = locale_or_default(&state, params.locale);

    let draft = find_revision(&state, &document_id, &locale, PostStatus::Draft)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_slug_available(&state, &draft.slug, &locale, &document_id).await?;

    let published = find_revision(&state, &document_id, &locale, PostStatus::Published).await?;

    let mut payload = PostPayload {
        document_id: Some(document_id.clone()),
        locale: Some(locale.clone()),
        ..Default::default()
    };
    let now = Utc::now();

    let row: PostRow = match published {
        Some(_) => {
            let criteria = MatchCriteria {
                document_id: document_id.clone(),
                locale: Some(locale.clone()),
            };
            state.lifecycle.on_before_update(&mut payload, &criteria).await;

            sqlx::query_as(
                r#"
                UPDATE posts AS p
                SET title = d.title,
                    slug = d.slug,
                    date = d.date,
                    thumbnail = d.thumbnail,
                    body = d.body,
                    searchable_content = COALESCE($3, p.searchable_content),
                    updated_at = $4,
                    published_at = $4
                FROM posts AS d
                WHERE p.document_id = $1 AND p.locale = $2 AND p.status = 'published'
                  AND d.document_id = $1 AND d.locale = $2 AND d.status = 'draft'
                RETURNING p.id, p.document_id, p.locale, p.status, p.title, p.slug, p.date,
                          p.thumbnail, p.body, p.searchable_content, p.created_at,
                          p.updated_at, p.published_at
                "#,
            )
            .bind(&document_id)
            .bind(&locale)
            .bind(&payload.searchable_content)
            .bind(now)
            .fetch_one(&state.db)
            .await?
        }
        None => {
            state.lifecycle.on_before_create(&mut payload).await;

            let query = format!(
                r#"
                INSERT INTO posts (document_id, locale, status, title, slug, date, thumbnail,
                                   body, searchable_content, created_at, updated_at, published_at)
                SELECT document_id, locale, 'published'::post_status, title, slug, date, thumbnail,
                       body, $3, $4, $4, $4
                FROM posts
                WHERE document_id = $1 AND locale = $2 AND status = 'draft'
                RETURNING {}
                "#,
                POST_COLUMNS
            );
            sqlx::query_as(&query)
                .bind(&document_id)
                .bind(&locale)
                .bind(&payload.searchable_content)
                .bind(now)
                .fetch_one(&state.db)
                .await?
        }
    };

    tracing::info!("Published post {} ({})", document_id, locale);

    Ok(Json(row_to_post(row)))
}

/// POST /api/admin/posts/:document_id/unpublish
pub async fn unpublish_post(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<LocaleParams>,
) -> Result<(), AppError> {
    let locale = locale_or_default(&state, params.locale);

    let result = sqlx::query(
        "DELETE FROM posts WHERE document_id = $1 AND locale = $2 AND status = 'published'",
    )
    .bind(&document_id)
    .bind(&locale)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(())
}

/// DELETE /api/admin/posts/:document_id
///
/// Removes every revision; restricted to one locale when `locale` is given.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<LocaleParams>,
) -> Result<(), AppError> {
    let result =
        sqlx::query("DELETE FROM posts WHERE document_id = $1 AND ($2::text IS NULL OR locale = $2)")
            .bind(&document_id)
            .bind(&params.locale)
            .execute(&state.db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(())
}
