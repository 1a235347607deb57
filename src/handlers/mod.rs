//! HTTP handlers, one module per resource.

pub mod articles;
pub mod comments;
pub mod users;

use uuid::Uuid;

use crate::errors::Error;
use crate::models::{Article, ArticleRef, ArticleView, Comment, CommentView};
use crate::slug::derive_slug;
use crate::user_models::{Profile, User};
use crate::{auth, AppState};

/// Trimmed value of an optional field, `None` when absent or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    non_blank(value).ok_or_else(|| Error::bad_request(format!("{field} cannot be blank")))
}

pub(crate) fn slug_for(title: &str) -> Result<String, Error> {
    let slug = derive_slug(title);
    if slug.is_empty() {
        return Err(Error::bad_request("Title must contain at least one letter or digit"));
    }
    Ok(slug)
}

pub(crate) async fn find_article(state: &AppState, slug: &str) -> Result<Article, Error> {
    state
        .content
        .find_article_by_slug(slug)
        .await?
        .ok_or(Error::NotFound { resource: "Article" })
}

/// Resolve the user holding `token`, after checking the token itself.
pub(crate) async fn authenticate(state: &AppState, token: Option<&str>) -> Result<User, Error> {
    let token = token.ok_or(Error::Unauthenticated)?;
    auth::verify_token(token, &state.config)?;
    state.users.find_by_token(token).await?.ok_or(Error::Unauthenticated)
}

pub(crate) async fn load_user(state: &AppState, id: Uuid) -> Result<User, Error> {
    state.users.find_by_id(id).await?.ok_or_else(|| Error::Internal {
        operation: format!("load user {id} referenced by content"),
    })
}

pub(crate) async fn comment_view(state: &AppState, comment: Comment, article: ArticleRef) -> Result<CommentView, Error> {
    let author = load_user(state, comment.author_user_id).await?;
    Ok(CommentView {
        id: comment.id,
        body: comment.body,
        article,
        author: Profile::from(&author),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    })
}

pub(crate) async fn comment_views(state: &AppState, article: &Article) -> Result<Vec<CommentView>, Error> {
    let article_ref = ArticleRef::from(article);
    let mut views = Vec::new();
    for comment in state.content.comments_for_article(article.id).await? {
        views.push(comment_view(state, comment, article_ref.clone()).await?);
    }
    Ok(views)
}

/// Join an article with its tags, owner profile and comments.
pub(crate) async fn article_view(state: &AppState, article: Article) -> Result<ArticleView, Error> {
    let owner = load_user(state, article.owner_user_id).await?;
    let tags = state
        .content
        .tags_for_article(article.id)
        .await?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    let comments = comment_views(state, &article).await?;

    Ok(ArticleView {
        id: article.id,
        slug: article.slug,
        title: article.title,
        description: article.description,
        body: article.body,
        tags,
        author: Profile::from(&owner),
        comments,
        created_at: article.created_at,
        updated_at: article.updated_at,
    })
}
