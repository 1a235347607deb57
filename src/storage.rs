use crate::models::{Article, Comment, Tag};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

const ARTICLES_FILE: &str = "articles.json";
const TAGS_FILE: &str = "tags.json";
const COMMENTS_FILE: &str = "comments.json";

/// Error type for store operations that handlers can act on
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Entity not found")]
    NotFound,

    #[error("{message}")]
    UniqueViolation { field: &'static str, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn unique(field: &'static str) -> Self {
        StoreError::UniqueViolation {
            field,
            message: format!("{field} must be unique"),
        }
    }
}

/// Articles, their tags and their comments.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores the article together with its tag set. Fails with a unique violation if the
    /// slug is taken; on any failure neither the article nor its tags are stored.
    async fn create_article(&self, article: Article, tags: &[String]) -> Result<Article, StoreError>;

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError>;

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError>;

    /// Replaces the stored article with the same id. `Some(tags)` also replaces its tag set.
    async fn update_article(&self, article: Article, tags: Option<&[String]>) -> Result<Article, StoreError>;

    /// Removes the article together with its tags and comments.
    async fn delete_article(&self, id: Uuid) -> Result<(), StoreError>;

    async fn tags_for_article(&self, article_id: Uuid) -> Result<Vec<Tag>, StoreError>;

    async fn create_comment(&self, comment: Comment) -> Result<Comment, StoreError>;

    async fn comments_for_article(&self, article_id: Uuid) -> Result<Vec<Comment>, StoreError>;

    /// Looks a comment up by id within one article.
    async fn find_comment(&self, article_id: Uuid, comment_id: Uuid) -> Result<Option<Comment>, StoreError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), StoreError>;
}

/// JSON-file backed content store. With no directory it lives in memory only.
pub struct ContentStorage {
    dir: Option<PathBuf>,
    articles: RwLock<Vec<Article>>,
    tags: RwLock<Vec<Tag>>,
    comments: RwLock<Vec<Comment>>,
}

impl ContentStorage {
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        let (articles, tags, comments) = match dir {
            Some(dir) => {
                fs::create_dir_all(dir).context("Failed to create data directory")?;
                (
                    load_collection(&dir.join(ARTICLES_FILE))?,
                    load_collection(&dir.join(TAGS_FILE))?,
                    load_collection(&dir.join(COMMENTS_FILE))?,
                )
            }
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        Ok(Self {
            dir: dir.map(Path::to_path_buf),
            articles: RwLock::new(articles),
            tags: RwLock::new(tags),
            comments: RwLock::new(comments),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            dir: None,
            articles: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
            comments: RwLock::new(Vec::new()),
        }
    }

    fn save<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        match &self.dir {
            Some(dir) => save_collection(&dir.join(file), items),
            None => Ok(()),
        }
    }

    /// Writes the article collection and, when given, the tag collection. Tags go first; if
    /// the article write then fails the previous tag file is put back.
    fn save_articles_with_tags(&self, articles: &[Article], tags: Option<(&[Tag], &[Tag])>) -> Result<()> {
        let Some((next_tags, previous_tags)) = tags else {
            return self.save(ARTICLES_FILE, articles);
        };
        self.save(TAGS_FILE, next_tags)?;
        if let Err(e) = self.save(ARTICLES_FILE, articles) {
            if let Err(restore) = self.save(TAGS_FILE, previous_tags) {
                warn!("Failed to restore {TAGS_FILE}: {restore:#}");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// The tag set for one article: `names` in order, duplicates dropped.
fn tag_set(article_id: Uuid, names: &[String]) -> Vec<Tag> {
    let mut created: Vec<Tag> = Vec::with_capacity(names.len());
    for name in names {
        if created.iter().any(|t| &t.name == name) {
            continue;
        }
        created.push(Tag::new(name.clone(), article_id));
    }
    created
}

#[async_trait]
impl ContentStore for ContentStorage {
    async fn create_article(&self, article: Article, names: &[String]) -> Result<Article, StoreError> {
        let mut articles = self.articles.write().await;

        if articles.iter().any(|a| a.slug == article.slug) {
            return Err(StoreError::unique("slug"));
        }

        let mut tags = self.tags.write().await;
        let mut next_tags = tags.clone();
        next_tags.extend(tag_set(article.id, names));
        let mut next_articles = articles.clone();
        next_articles.push(article.clone());

        self.save_articles_with_tags(&next_articles, Some((next_tags.as_slice(), tags.as_slice())))?;
        *articles = next_articles;
        *tags = next_tags;
        Ok(article)
    }

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let articles = self.articles.read().await;
        let mut all = articles.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|a| a.slug == slug).cloned())
    }

    async fn update_article(&self, article: Article, names: Option<&[String]>) -> Result<Article, StoreError> {
        let mut articles = self.articles.write().await;

        if articles.iter().any(|a| a.slug == article.slug && a.id != article.id) {
            return Err(StoreError::unique("slug"));
        }

        let mut next_articles = articles.clone();
        let stored = next_articles
            .iter_mut()
            .find(|a| a.id == article.id)
            .ok_or(StoreError::NotFound)?;
        *stored = article.clone();

        let mut tags = self.tags.write().await;
        let next_tags = names.map(|names| {
            let mut next: Vec<Tag> = tags.iter().filter(|t| t.article_id != article.id).cloned().collect();
            next.extend(tag_set(article.id, names));
            next
        });

        self.save_articles_with_tags(&next_articles, next_tags.as_deref().map(|next| (next, tags.as_slice())))?;
        *articles = next_articles;
        if let Some(next_tags) = next_tags {
            *tags = next_tags;
        }
        Ok(article)
    }

    /// The article file write is the commit point. Tags and comments left behind on disk by a
    /// later failed write belong to no article and are never read back.
    async fn delete_article(&self, id: Uuid) -> Result<(), StoreError> {
        let mut articles = self.articles.write().await;
        if !articles.iter().any(|a| a.id == id) {
            return Err(StoreError::NotFound);
        }
        let next_articles: Vec<Article> = articles.iter().filter(|a| a.id != id).cloned().collect();
        self.save(ARTICLES_FILE, &next_articles)?;
        *articles = next_articles;

        let mut tags = self.tags.write().await;
        tags.retain(|t| t.article_id != id);
        if let Err(e) = self.save(TAGS_FILE, &tags) {
            warn!(article_id = %id, "Failed to drop tags of deleted article: {e:#}");
        }
        let mut comments = self.comments.write().await;
        comments.retain(|c| c.article_id != id);
        if let Err(e) = self.save(COMMENTS_FILE, &comments) {
            warn!(article_id = %id, "Failed to drop comments of deleted article: {e:#}");
        }
        Ok(())
    }

    async fn tags_for_article(&self, article_id: Uuid) -> Result<Vec<Tag>, StoreError> {
        let tags = self.tags.read().await;
        Ok(tags.iter().filter(|t| t.article_id == article_id).cloned().collect())
    }

    async fn create_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        let mut comments = self.comments.write().await;
        let mut next = comments.clone();
        next.push(comment.clone());
        self.save(COMMENTS_FILE, &next)?;
        *comments = next;
        Ok(comment)
    }

    async fn comments_for_article(&self, article_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let comments = self.comments.read().await;
        Ok(comments.iter().filter(|c| c.article_id == article_id).cloned().collect())
    }

    async fn find_comment(&self, article_id: Uuid, comment_id: Uuid) -> Result<Option<Comment>, StoreError> {
        let comments = self.comments.read().await;
        Ok(comments
            .iter()
            .find(|c| c.id == comment_id && c.article_id == article_id)
            .cloned())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), StoreError> {
        let mut comments = self.comments.write().await;
        if !comments.iter().any(|c| c.id == id) {
            return Err(StoreError::NotFound);
        }
        let next: Vec<Comment> = comments.iter().filter(|c| c.id != id).cloned().collect();
        self.save(COMMENTS_FILE, &next)?;
        *comments = next;
        Ok(())
    }
}

pub(crate) fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

pub(crate) fn save_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(items).context("Failed to serialize collection")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
