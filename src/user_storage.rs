use crate::storage::{load_collection, save_collection, StoreError};
use crate::user_models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

const USERS_FILE: &str = "users.json";

/// Registered accounts, unique by email, username and token.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Exact match against the stored bearer token.
    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    async fn update_token(&self, id: Uuid, token: String) -> Result<User, StoreError>;
}

pub struct UserStorage {
    dir: Option<PathBuf>,
    users: RwLock<Vec<User>>,
}

impl UserStorage {
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        let users = match dir {
            Some(dir) => {
                fs::create_dir_all(dir).context("Failed to create data directory")?;
                load_collection(&dir.join(USERS_FILE))?
            }
            None => Vec::new(),
        };

        Ok(Self {
            dir: dir.map(Path::to_path_buf),
            users: RwLock::new(users),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            dir: None,
            users: RwLock::new(Vec::new()),
        }
    }

    fn save_users_to_disk(&self, users: &[User]) -> Result<()> {
        match &self.dir {
            Some(dir) => save_collection(&dir.join(USERS_FILE), users),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserStore for UserStorage {
    async fn create_user(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::unique("email"));
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::unique("username"));
        }
        if users.iter().any(|u| u.token == user.token) {
            return Err(StoreError::unique("token"));
        }

        let mut next = users.clone();
        next.push(user.clone());
        self.save_users_to_disk(&next)?;
        *users = next;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.token == token).cloned())
    }

    async fn update_token(&self, id: Uuid, token: String) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.token == token && u.id != id) {
            return Err(StoreError::unique("token"));
        }

        let mut next = users.clone();
        let user = next.iter_mut().find(|u| u.id == id).ok_or(StoreError::NotFound)?;
        user.token = token;
        user.updated_at = Utc::now();
        let updated = user.clone();

        self.save_users_to_disk(&next)?;
        *users = next;
        Ok(updated)
    }
}
