use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{posts as post_handlers, search as search_handlers};
use crate::lifecycle::PostLifecycle;
use crate::store::PgDocumentStore;
use crate::{Config, DbPool};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub lifecycle: Arc<PostLifecycle<PgDocumentStore>>,
}

pub fn create_router(db: DbPool, config: Config) -> Router {
    let lifecycle = PostLifecycle::new(PgDocumentStore::new(db.clone()), config.draft_fetch_timeout);
    let state = AppState {
        db,
        config,
        lifecycle: Arc::new(lifecycle),
    };

    // Public read routes, published revisions only
    let public_routes = Router::new()
        .route("/", get(search_handlers::list_posts))
        .route("/slugs", get(post_handlers::list_slugs))
        .route("/:slug", get(post_handlers::get_post_by_slug));

    // Editing routes, operate on drafts
    let admin_routes = Router::new()
        .route("/", post(post_handlers::create_post))
        .route(
            "/:document_id",
            get(post_handlers::get_draft)
                .put(post_handlers::update_post)
                .delete(post_handlers::delete_post),
        )
        .route("/:document_id/publish", post(post_handlers::publish_post))
        .route("/:document_id/unpublish", post(post_handlers::unpublish_post));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/posts", public_routes)
        .nest("/api/admin/posts", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
