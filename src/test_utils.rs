//! Helpers shared by handler and integration tests.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;
use uuid::Uuid;

use crate::auth::{hash_password, issue_token};
use crate::config::{AuthConfig, Config};
use crate::storage::ContentStorage;
use crate::user_models::{NewUser, User};
use crate::user_storage::UserStorage;
use crate::{build_router, AppState};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        },
    }
}

/// An in-memory user record with a valid token, not yet stored anywhere.
pub fn test_user(username: &str, config: &Config) -> User {
    let id = Uuid::new_v4();
    let email = format!("{username}@example.com");
    let token = issue_token(id, &email, config).expect("Failed to issue test token");
    let password_hash = hash_password("password123", config).expect("Failed to hash test password");
    User::new(
        id,
        NewUser {
            firstname: format!("{username}-first"),
            lastname: format!("{username}-last"),
            username: username.to_string(),
            email,
            bio: None,
            image: None,
        },
        password_hash,
        token,
    )
}

pub fn create_test_state() -> AppState {
    AppState::new(
        create_test_config(),
        Arc::new(UserStorage::in_memory()),
        Arc::new(ContentStorage::in_memory()),
    )
}

pub fn create_test_server(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Failed to create test server")
}

/// Store a fresh test user directly, bypassing registration.
pub async fn create_test_user(state: &AppState, username: &str) -> User {
    state
        .users
        .create_user(test_user(username, &state.config))
        .await
        .expect("Failed to create test user")
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value")
}
