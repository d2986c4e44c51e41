use axum::{
    extract::{Query, State},
    Json,
};
use blog_shared::{
    api::{Pagination, PostListParams, PostListResponse},
    PostSummary,
};
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::AppError;
use crate::routes::AppState;

const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 100;
const EXCERPT_RADIUS: usize = 80;

type SummaryRow = (
    i64,               // id
    String,            // document_id
    String,            // title
    String,            // slug
    Option<NaiveDate>, // date
    Option<Value>,     // thumbnail
    Option<String>,    // searchable_content
);

/// Returns `(page, page_size, offset)` with the page clamped to >= 1 and the
/// size to `1..=MAX_PAGE_SIZE`.
fn page_window(page: Option<u32>, page_size: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(page_size);
    (page, page_size, offset)
}

fn page_count(total: i64, page_size: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    let size = i64::from(page_size);
    u32::try_from((total + size - 1) / size).unwrap_or(u32::MAX)
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Byte range of the first case-insensitive match, compared char by char
/// so non-ASCII letters fold the way `ILIKE` does.
fn find_ignore_case(text: &str, query: &str) -> Option<(usize, usize)> {
    let query: Vec<char> = query.chars().collect();
    text.char_indices().find_map(|(start, _)| {
        let mut chars = text[start..].char_indices();
        for q in &query {
            let (_, c) = chars.next()?;
            if !c.to_lowercase().eq(q.to_lowercase()) {
                return None;
            }
        }
        let end = chars.next().map_or(text.len(), |(i, _)| start + i);
        Some((start, end))
    })
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Snippet of `text` around the first match of `query`, with the match
/// wrapped in `<<`/`>>` markers.
fn highlight_excerpt(text: &str, query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }

    let (start, end) = find_ignore_case(text, query)?;
    let from = floor_char_boundary(text, start.saturating_sub(EXCERPT_RADIUS));
    let to = ceil_char_boundary(text, (end + EXCERPT_RADIUS).min(text.len()));

    let mut excerpt = String::with_capacity(to - from + 10);
    if from > 0 {
        excerpt.push_str("...");
    }
    excerpt.push_str(&text[from..start]);
    excerpt.push_str("<<");
    excerpt.push_str(&text[start..end]);
    excerpt.push_str(">>");
    excerpt.push_str(&text[end..to]);
    if to < text.len() {
        excerpt.push_str("...");
    }
    Some(excerpt)
}

/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> Result<Json<PostListResponse>, AppError> {
    let (page, page_size, offset) = page_window(params.page, params.page_size);
    let locale = params
        .locale
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.default_locale.clone());
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let pattern = query.map(|q| format!("%{}%", escape_like(q)));

    let mut conditions = vec!["status = 'published'", "locale = $1"];
    if pattern.is_some() {
        conditions.push("(searchable_content ILIKE $2 OR title ILIKE $2)");
    }
    let where_clause = conditions.join(" AND ");
    let limit_idx = if pattern.is_some() { 3 } else { 2 };

    // Count total
    let count_query = format!("SELECT COUNT(*) FROM posts WHERE {}", where_clause);
    let mut count_builder = sqlx::query_as::<_, (i64,)>(&count_query).bind(&locale);
    if let Some(pattern) = &pattern {
        count_builder = count_builder.bind(pattern);
    }
    let (total,) = count_builder.fetch_one(&state.db).await?;

    let list_query = format!(
        r#"
        SELECT id, document_id, title, slug, date, thumbnail, searchable_content
        FROM posts
        WHERE {}
        ORDER BY date DESC NULLS LAST, id DESC
        LIMIT ${} OFFSET ${}
        "#,
        where_clause,
        limit_idx,
        limit_idx + 1
    );
    let mut list_builder = sqlx::query_as::<_, SummaryRow>(&list_query).bind(&locale);
    if let Some(pattern) = &pattern {
        list_builder = list_builder.bind(pattern);
    }
    let rows = list_builder
        .bind(i64::from(page_size))
        .bind(i64::from(offset))
        .fetch_all(&state.db)
        .await?;

    let data = rows
        .into_iter()
        .map(|row| PostSummary {
            id: row.0,
            document_id: row.1,
            title: row.2,
            slug: row.3,
            date: row.4,
            thumbnail: row.5,
            excerpt: query.and_then(|q| highlight_excerpt(row.6.as_deref()?, q)),
        })
        .collect();

    Ok(Json(PostListResponse {
        data,
        pagination: Pagination {
            page,
            page_size,
            page_count: page_count(total, page_size),
            total,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None, None), (1, DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page_window(Some(0), Some(10)), (1, 10, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page_window(Some(2), Some(1000)), (2, MAX_PAGE_SIZE, MAX_PAGE_SIZE));
        assert_eq!(page_window(Some(1), Some(0)), (1, 1, 0));
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 25), 0);
        assert_eq!(page_count(1, 25), 1);
        assert_eq!(page_count(25, 25), 1);
        assert_eq!(page_count(26, 25), 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("rust"), "rust");
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
    }

    #[test]
    fn test_excerpt_short_text() {
        assert_eq!(
            highlight_excerpt("Learning Rust the hard way", "rust").as_deref(),
            Some("Learning <<Rust>> the hard way")
        );
    }

    #[test]
    fn test_excerpt_folds_non_ascii_case() {
        assert_eq!(
            highlight_excerpt("Café ÉCOLE notes", "école").as_deref(),
            Some("Café <<ÉCOLE>> notes")
        );
        assert_eq!(
            highlight_excerpt("Straße und STRASSE", "straße").as_deref(),
            Some("<<Straße>> und STRASSE")
        );
    }

    #[test]
    fn test_excerpt_no_match() {
        assert_eq!(highlight_excerpt("Nothing here", "rust"), None);
        assert_eq!(highlight_excerpt("Anything", ""), None);
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let text = format!("{}needle{}", "a".repeat(200), "b".repeat(200));
        let excerpt = highlight_excerpt(&text, "NEEDLE").unwrap();

        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.contains("<<needle>>"));
        assert_eq!(excerpt.len(), 3 + EXCERPT_RADIUS + "<<needle>>".len() + EXCERPT_RADIUS + 3);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = format!("{}match{}", "é".repeat(100), "ü".repeat(100));
        let excerpt = highlight_excerpt(&text, "match").unwrap();

        assert!(excerpt.contains("<<match>>"));
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("..."));
    }
}
