//! Write hooks for posts.
//!
//! Every create and update passes its payload through [`PostLifecycle`]
//! before the row is written. The hooks keep `searchable_content` in sync
//! with the post body and never fail the write: when the payload carries no
//! inline body they fall back to the stored draft, and any error on that
//! path is logged and dropped.

use std::time::Duration;

use blog_shared::Body;
use chrono::NaiveDate;
use serde_json::Value;

use crate::extract::flatten;
use crate::store::{DocumentStore, StoreError};

/// Fields of a post write, as they will be persisted.
#[derive(Debug, Clone, Default)]
pub struct PostPayload {
    pub document_id: Option<String>,
    pub locale: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub date: Option<NaiveDate>,
    pub thumbnail: Option<Value>,
    pub body: Option<Body>,
    pub searchable_content: Option<String>,
}

/// Identifies the stored post an update applies to.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub document_id: String,
    pub locale: Option<String>,
}

pub struct PostLifecycle<S> {
    store: S,
    fetch_timeout: Duration,
}

impl<S: DocumentStore> PostLifecycle<S> {
    pub fn new(store: S, fetch_timeout: Duration) -> Self {
        Self {
            store,
            fetch_timeout,
        }
    }

    pub async fn on_before_create(&self, payload: &mut PostPayload) {
        if let Some(body) = payload.body.as_ref().filter(|b| b.has_inline_content()) {
            payload.searchable_content = Some(flatten(Some(body)));
            return;
        }

        // Publishing inserts a revision that only references the draft.
        let Some(document_id) = payload.document_id.as_deref() else {
            return;
        };

        if let Some(text) = self
            .draft_text(document_id, payload.locale.as_deref())
            .await
        {
            payload.searchable_content = Some(text);
        }
    }

    pub async fn on_before_update(&self, payload: &mut PostPayload, criteria: &MatchCriteria) {
        if let Some(body) = payload.body.as_ref().filter(|b| b.has_inline_content()) {
            tracing::debug!(
                "Body modified for {}, indexing from payload",
                criteria.document_id
            );
            payload.searchable_content = Some(flatten(Some(body)));
            return;
        }

        let locale = payload.locale.as_deref().or(criteria.locale.as_deref());
        if let Some(text) = self.draft_text(&criteria.document_id, locale).await {
            payload.searchable_content = Some(text);
        }
    }

    /// Flattened draft body, or `None` if there is nothing better than what
    /// is already stored.
    async fn draft_text(&self, document_id: &str, locale: Option<&str>) -> Option<String> {
        let result = tokio::time::timeout(
            self.fetch_timeout,
            self.store.find_draft(document_id, locale),
        )
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout(self.fetch_timeout)));

        match result {
            Ok(Some(body)) => {
                let text = flatten(Some(&body));
                if text.is_empty() {
                    tracing::debug!("Draft for {} has no text, keeping index", document_id);
                    return None;
                }
                tracing::info!(
                    "Rebuilt searchable content for {} ({} chars)",
                    document_id,
                    text.len()
                );
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to fetch draft for {}: {}", document_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use blog_shared::{ContentBlock, ContentNode, SINGLE_IMAGE_BLOCK, TEXT_BLOCK};

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        drafts: Mutex<HashMap<String, Body>>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MemoryStore {
        fn with_draft(document_id: &str, body: Body) -> Self {
            let store = Self::default();
            store
                .drafts
                .lock()
                .unwrap()
                .insert(document_id.to_string(), body);
            store
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn find_draft(
            &self,
            document_id: &str,
            _locale: Option<&str>,
        ) -> Result<Option<Body>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.drafts.lock().unwrap().get(document_id).cloned())
        }
    }

    fn lifecycle(store: MemoryStore) -> PostLifecycle<MemoryStore> {
        PostLifecycle::new(store, Duration::from_secs(1))
    }

    fn text_body(text: &str) -> Body {
        Body::new(vec![ContentBlock::rich_text(vec![ContentNode::element(
            "paragraph",
            vec![ContentNode::text(text)],
        )])])
    }

    fn reference_body() -> Body {
        Body::new(vec![
            ContentBlock::reference(TEXT_BLOCK, 1),
            ContentBlock::reference(SINGLE_IMAGE_BLOCK, 2),
        ])
    }

    fn criteria(document_id: &str) -> MatchCriteria {
        MatchCriteria {
            document_id: document_id.to_string(),
            locale: Some("en".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_indexes_inline_body() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", text_body("stale")));
        let mut payload = PostPayload {
            document_id: Some("doc-1".into()),
            body: Some(text_body("Fresh words")),
            ..Default::default()
        };

        hooks.on_before_create(&mut payload).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("Fresh words"));
        assert_eq!(hooks.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_create_without_body_leaves_field_unset() {
        let hooks = lifecycle(MemoryStore::default());
        let mut payload = PostPayload {
            title: Some("Untitled".into()),
            ..Default::default()
        };

        hooks.on_before_create(&mut payload).await;

        assert_eq!(payload.searchable_content, None);
        assert_eq!(hooks.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_create_falls_back_to_draft() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", text_body("From draft")));
        let mut payload = PostPayload {
            document_id: Some("doc-1".into()),
            body: Some(reference_body()),
            ..Default::default()
        };

        hooks.on_before_create(&mut payload).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("From draft"));
    }

    #[tokio::test]
    async fn test_create_fetch_failure_is_swallowed() {
        let hooks = lifecycle(MemoryStore::failing());
        let mut payload = PostPayload {
            document_id: Some("doc-1".into()),
            title: Some("Still saved".into()),
            ..Default::default()
        };

        hooks.on_before_create(&mut payload).await;

        assert_eq!(payload.searchable_content, None);
        assert_eq!(payload.title.as_deref(), Some("Still saved"));
        assert_eq!(hooks.store.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_slow_fetch_times_out() {
        let store = MemoryStore {
            delay: Some(Duration::from_secs(5)),
            ..MemoryStore::with_draft("doc-1", text_body("too late"))
        };
        let hooks = PostLifecycle::new(store, Duration::from_millis(20));
        let mut payload = PostPayload {
            document_id: Some("doc-1".into()),
            body: Some(reference_body()),
            ..Default::default()
        };

        hooks.on_before_create(&mut payload).await;

        assert_eq!(payload.searchable_content, None);
        assert!(payload.body.is_some());
    }

    #[tokio::test]
    async fn test_update_with_content_skips_fetch() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", text_body("stale")));
        let mut payload = PostPayload {
            body: Some(Body::new(vec![
                ContentBlock::reference(SINGLE_IMAGE_BLOCK, 4),
                ContentBlock::markdown("new text"),
            ])),
            ..Default::default()
        };

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("new text"));
        assert_eq!(hooks.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_with_references_uses_draft() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", text_body("Draft body")));
        let mut payload = PostPayload {
            body: Some(reference_body()),
            ..Default::default()
        };

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("Draft body"));
        assert_eq!(hooks.store.calls(), 1);
    }

    #[tokio::test]
    async fn test_update_without_body_uses_draft() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", text_body("Draft body")));
        let mut payload = PostPayload {
            title: Some("Renamed".into()),
            ..Default::default()
        };

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("Draft body"));
    }

    #[tokio::test]
    async fn test_update_keeps_existing_when_draft_is_empty() {
        let hooks = lifecycle(MemoryStore::with_draft("doc-1", reference_body()));
        let mut payload = PostPayload {
            searchable_content: Some("previous index".into()),
            ..Default::default()
        };

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("previous index"));
    }

    #[tokio::test]
    async fn test_update_keeps_existing_when_draft_missing() {
        let hooks = lifecycle(MemoryStore::default());
        let mut payload = PostPayload::default();

        hooks.on_before_update(&mut payload, &criteria("missing")).await;

        assert_eq!(payload.searchable_content, None);
        assert_eq!(hooks.store.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_swallowed() {
        let hooks = lifecycle(MemoryStore::failing());
        let mut payload = PostPayload {
            title: Some("Still saved".into()),
            searchable_content: Some("previous index".into()),
            ..Default::default()
        };

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content.as_deref(), Some("previous index"));
        assert_eq!(payload.title.as_deref(), Some("Still saved"));
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let store = MemoryStore {
            delay: Some(Duration::from_secs(5)),
            ..MemoryStore::with_draft("doc-1", text_body("too late"))
        };
        let hooks = PostLifecycle::new(store, Duration::from_millis(20));
        let mut payload = PostPayload::default();

        hooks.on_before_update(&mut payload, &criteria("doc-1")).await;

        assert_eq!(payload.searchable_content, None);
    }
}
