//! A small blogging API: accounts, articles with tags, and comments.
//!
//! Handlers receive their stores through [`AppState`], so the file-backed stores used in
//! production and the in-memory ones used in tests are interchangeable.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod slug;
pub mod storage;
pub mod telemetry;
pub mod user_models;
pub mod user_storage;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::Config;
use storage::{ContentStorage, ContentStore};
use user_storage::{UserStorage, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub content: Arc<dyn ContentStore>,
    /// Held by mutating handlers across their check-then-act sequence.
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, users: Arc<dyn UserStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            config: Arc::new(config),
            users,
            content,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open the file-backed stores under `config.data_dir` (in memory when unset).
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let dir = config.data_dir.clone();
        let users = UserStorage::open(dir.as_deref())?;
        let content = ContentStorage::open(dir.as_deref())?;
        Ok(Self::new(config, Arc::new(users), Arc::new(content)))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(handlers::users::register))
        .route("/users/user", get(handlers::users::current_user))
        .route("/users/login", post(handlers::users::login))
        .route(
            "/articles",
            get(handlers::articles::list_articles).post(handlers::articles::create_article),
        )
        .route(
            "/articles/:slug",
            get(handlers::articles::get_articles_by_slug)
                .put(handlers::articles::update_article)
                .delete(handlers::articles::delete_article),
        )
        .route(
            "/articles/:slug/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )
        .route("/articles/:slug/comments/:id", delete(handlers::comments::delete_comment))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
