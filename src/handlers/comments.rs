use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::{authenticate, comment_view, comment_views, find_article, load_user, required};
use crate::auth::{self, BearerToken};
use crate::errors::Error;
use crate::models::{ArticleRef, Comment, CommentEnvelope, CommentListResponse, CreateCommentRequest, MessageResponse};
use crate::AppState;

/// `GET /articles/:slug/comments`
pub async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CommentListResponse>, Error> {
    let article = find_article(&state, &slug).await?;
    let comments = comment_views(&state, &article).await?;
    Ok(Json(CommentListResponse { comments }))
}

/// `POST /articles/:slug/comments`
///
/// Any user holding a valid token may comment on any article.
pub async fn create_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    token: BearerToken,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<Json<CommentEnvelope>, Error> {
    let Json(payload) = payload?;

    let _guard = state.write_lock.lock().await;

    let author = authenticate(&state, token.as_deref()).await?;
    let article = find_article(&state, &slug).await?;
    let body = required(payload.body, "body")?;

    let comment = state
        .content
        .create_comment(Comment::new(body, article.id, author.id))
        .await?;

    info!(comment_id = %comment.id, slug = %article.slug, author = %author.username, "Comment created");
    let comment = comment_view(&state, comment, ArticleRef::from(&article)).await?;
    Ok(Json(CommentEnvelope { comment }))
}

/// `DELETE /articles/:slug/comments/:id`
///
/// Only the comment's author may delete it; the article's owner may not.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, String)>,
    token: BearerToken,
) -> Result<Json<MessageResponse>, Error> {
    let _guard = state.write_lock.lock().await;

    let article = find_article(&state, &slug).await?;
    // An id that is not a UUID cannot name any comment.
    let comment_id = Uuid::parse_str(&id).map_err(|_| Error::NotFound { resource: "Comment" })?;
    let comment = state
        .content
        .find_comment(article.id, comment_id)
        .await?
        .ok_or(Error::NotFound { resource: "Comment" })?;

    let author = load_user(&state, comment.author_user_id).await?;
    auth::require_owner(token.as_deref(), &author, &state.config)?;

    state.content.delete_comment(comment.id).await?;

    info!(comment_id = %comment.id, slug = %article.slug, "Comment deleted");
    Ok(Json(MessageResponse::new("Comment deleted")))
}
