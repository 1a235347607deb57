use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::{article_view, find_article, load_user, non_blank, required, slug_for};
use crate::auth::{self, BearerToken};
use crate::errors::Error;
use crate::models::{
    parse_tag_list, Article, ArticleEnvelope, ArticleListResponse, CreateArticleRequest, MessageResponse,
    UpdateArticleRequest,
};
use crate::AppState;

/// `GET /articles`
pub async fn list_articles(State(state): State<AppState>) -> Result<Json<ArticleListResponse>, Error> {
    let mut articles = Vec::new();
    for article in state.content.list_articles().await? {
        articles.push(article_view(&state, article).await?);
    }
    Ok(Json(ArticleListResponse { articles }))
}

/// `GET /articles/:slug`
///
/// List-shaped: an unknown slug yields an empty list rather than a 404.
pub async fn get_articles_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleListResponse>, Error> {
    let articles = match state.content.find_article_by_slug(&slug).await? {
        Some(article) => vec![article_view(&state, article).await?],
        None => Vec::new(),
    };
    Ok(Json(ArticleListResponse { articles }))
}

/// `POST /articles`
pub async fn create_article(
    State(state): State<AppState>,
    token: BearerToken,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<Json<ArticleEnvelope>, Error> {
    let Json(payload) = payload?;
    let username = non_blank(payload.username).ok_or_else(|| Error::bad_request("Username must be present"))?;

    let _guard = state.write_lock.lock().await;

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| Error::bad_request("User not found"))?;
    auth::require_owner(token.as_deref(), &user, &state.config)?;

    let title = required(payload.title, "title")?;
    let slug = slug_for(&title)?;
    let tags = payload.tags.as_deref().map(parse_tag_list).unwrap_or_default();
    let article = state
        .content
        .create_article(
            Article::new(
                slug,
                title,
                payload.description.unwrap_or_default(),
                payload.body.unwrap_or_default(),
                user.id,
            ),
            &tags,
        )
        .await?;

    info!(slug = %article.slug, owner = %user.username, tags = tags.len(), "Article created");
    let article = article_view(&state, article).await?;
    Ok(Json(ArticleEnvelope { article }))
}

/// `PUT /articles/:slug`
///
/// Only fields present in the payload change. A new title re-derives the slug; a `tags` field
/// replaces the tag set, and its absence leaves the tags alone.
pub async fn update_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    token: BearerToken,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ArticleEnvelope>), Error> {
    let Json(payload) = payload?;

    let _guard = state.write_lock.lock().await;

    let mut article = find_article(&state, &slug).await?;
    let username = non_blank(payload.username).ok_or_else(|| Error::bad_request("Username must be present"))?;
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| Error::bad_request("User not found"))?;
    auth::require_owner(token.as_deref(), &user, &state.config)?;
    if user.id != article.owner_user_id {
        return Err(Error::Unauthenticated);
    }

    if let Some(title) = non_blank(payload.title) {
        article.slug = slug_for(&title)?;
        article.title = title;
    }
    if let Some(description) = payload.description.filter(|d| !d.is_empty()) {
        article.description = description;
    }
    if let Some(body) = payload.body.filter(|b| !b.is_empty()) {
        article.body = body;
    }
    article.updated_at = Utc::now();

    let tags = payload.tags.as_deref().map(parse_tag_list);
    let article = state.content.update_article(article, tags.as_deref()).await?;

    info!(old_slug = %slug, slug = %article.slug, "Article updated");
    let article = article_view(&state, article).await?;
    Ok((StatusCode::CREATED, Json(ArticleEnvelope { article })))
}

/// `DELETE /articles/:slug`
pub async fn delete_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    token: BearerToken,
) -> Result<Json<MessageResponse>, Error> {
    let _guard = state.write_lock.lock().await;

    let article = find_article(&state, &slug).await?;
    let owner = load_user(&state, article.owner_user_id).await?;
    auth::require_owner(token.as_deref(), &owner, &state.config)?;

    state.content.delete_article(article.id).await?;

    info!(slug = %slug, "Article deleted");
    Ok(Json(MessageResponse::new("Article deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleView;
    use crate::test_utils::{bearer, create_test_server, create_test_state, create_test_user};
    use axum::http::header::AUTHORIZATION;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::future::IntoFuture;

    async fn post_article(server: &TestServer, token: &str, username: &str, title: &str, tags: &str) -> ArticleView {
        let response = server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(token))
            .json(&json!({
                "title": title,
                "description": "A description",
                "body": "The body",
                "username": username,
                "tags": tags,
            }))
            .await;
        response.assert_status_ok();
        response.json::<ArticleEnvelope>().article
    }

    async fn articles_at(server: &TestServer, slug: &str) -> Vec<ArticleView> {
        let response = server.get(&format!("/articles/{slug}")).await;
        response.assert_status_ok();
        response.json::<ArticleListResponse>().articles
    }

    #[tokio::test]
    async fn test_create_article_derives_slug_and_tags() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let server = create_test_server(state);

        let article = post_article(&server, &jane.token, "jane", "Hello World!", "rust, web,rust").await;

        assert_eq!(article.slug, "hello-world");
        assert_eq!(article.tags, vec!["rust", "web"]);
        assert_eq!(article.author.username, "jane");
        assert!(article.comments.is_empty());
    }

    #[tokio::test]
    async fn test_create_article_rejections() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let mallory = create_test_user(&state, "mallory").await;
        let server = create_test_server(state);
        let body = json!({ "title": "Hello", "description": "d", "body": "b", "username": "jane" });

        // Someone else's token
        server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(&mallory.token))
            .json(&body)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // No token at all
        server.post("/articles").json(&body).await.assert_status(StatusCode::UNAUTHORIZED);

        // Unknown owner
        let response = server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "title": "Hello", "username": "ghost" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "User not found");

        // Title without any slug characters
        server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "title": "?!?", "username": "jane" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert!(articles_at(&server, "hello").await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "Same Title", "").await;

        let response = server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "title": "same title!", "username": "jane" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "slug must be unique");
    }

    #[tokio::test]
    async fn test_unknown_slug_is_empty_list() {
        let server = create_test_server(create_test_state());
        assert!(articles_at(&server, "nothing-here").await.is_empty());
    }

    #[tokio::test]
    async fn test_update_article_retitles_and_keeps_tags() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "First Draft", "a,b").await;

        let response = server
            .put("/articles/first-draft")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "username": "jane", "title": "Final Version", "body": "" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let updated = response.json::<ArticleEnvelope>().article;
        assert_eq!(updated.slug, "final-version");
        assert_eq!(updated.title, "Final Version");
        assert_eq!(updated.body, "The body");
        assert_eq!(updated.tags, vec!["a", "b"]);
        assert!(articles_at(&server, "first-draft").await.is_empty());
    }

    #[tokio::test]
    async fn test_update_article_replaces_tags() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "Tagged", "a,b").await;

        for _ in 0..2 {
            server
                .put("/articles/tagged")
                .add_header(AUTHORIZATION, bearer(&jane.token))
                .json(&json!({ "username": "jane", "tags": "b,c" }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let articles = articles_at(&server, "tagged").await;
        assert_eq!(articles[0].tags, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_update_article_rejections() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let mallory = create_test_user(&state, "mallory").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "Mine", "").await;

        // Mallory acting as herself
        server
            .put("/articles/mine")
            .add_header(AUTHORIZATION, bearer(&mallory.token))
            .json(&json!({ "username": "mallory", "title": "Hijacked" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Mallory claiming to be jane
        server
            .put("/articles/mine")
            .add_header(AUTHORIZATION, bearer(&mallory.token))
            .json(&json!({ "username": "jane", "title": "Hijacked" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .put("/articles/mine")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "title": "No username" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "Username must be present");

        server
            .put("/articles/missing")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .json(&json!({ "username": "jane" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        assert_eq!(articles_at(&server, "mine").await[0].title, "Mine");
    }

    #[tokio::test]
    async fn test_delete_article() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let mallory = create_test_user(&state, "mallory").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "Short Lived", "x").await;

        server
            .delete("/articles/short-lived")
            .add_header(AUTHORIZATION, bearer(&mallory.token))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .delete("/articles/short-lived")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["message"], "Article deleted");

        server
            .delete("/articles/short-lived")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_succeed_once() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "Raced", "x").await;

        let first = server
            .delete("/articles/raced")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .into_future();
        let second = server
            .delete("/articles/raced")
            .add_header(AUTHORIZATION, bearer(&jane.token))
            .into_future();
        let (first, second) = tokio::join!(first, second);

        let mut statuses = vec![first.status_code(), second.status_code()];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::NOT_FOUND]);
        assert!(articles_at(&server, "raced").await.is_empty());
    }

    #[tokio::test]
    async fn test_list_articles_joins_owner_tags_and_comments() {
        let state = create_test_state();
        let jane = create_test_user(&state, "jane").await;
        let bob = create_test_user(&state, "bob").await;
        let server = create_test_server(state);
        post_article(&server, &jane.token, "jane", "One", "t1").await;
        post_article(&server, &bob.token, "bob", "Two", "").await;
        server
            .post("/articles/one/comments")
            .add_header(AUTHORIZATION, bearer(&bob.token))
            .json(&json!({ "body": "Nice" }))
            .await
            .assert_status_ok();

        let response = server.get("/articles").await;
        response.assert_status_ok();
        let articles = response.json::<ArticleListResponse>().articles;
        assert_eq!(articles.len(), 2);

        let one = articles.iter().find(|a| a.slug == "one").unwrap();
        assert_eq!(one.author.username, "jane");
        assert_eq!(one.tags, vec!["t1"]);
        assert_eq!(one.comments.len(), 1);
        assert_eq!(one.comments[0].author.username, "bob");
    }
}
