use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::ValidateEmail;

use super::required;
use crate::auth::{self, BearerToken};
use crate::errors::Error;
use crate::user_models::{LoginRequest, NewUser, RegisterRequest, User, UserEnvelope};
use crate::AppState;

/// `POST /users`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), Error> {
    let Json(payload) = payload?;

    let registration = NewUser {
        firstname: required(payload.firstname, "firstname")?,
        lastname: required(payload.lastname, "lastname")?,
        username: required(payload.username, "username")?,
        email: required(payload.email, "email")?,
        bio: payload.bio,
        image: payload.image,
    };
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::bad_request("password cannot be blank"))?;

    if !registration.email.validate_email() {
        return Err(Error::bad_request("Validation isEmail on email failed"));
    }

    let id = Uuid::new_v4();
    let token = auth::issue_token(id, &registration.email, &state.config)?;
    let password_hash = auth::hash_password(&password, &state.config)?;

    let user = state
        .users
        .create_user(User::new(id, registration, password_hash, token))
        .await?;

    info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

/// `GET /users/user`
pub async fn current_user(State(state): State<AppState>, token: BearerToken) -> Result<Json<UserEnvelope>, Error> {
    let token = token.as_deref().ok_or(Error::Unauthenticated)?;
    auth::verify_token(token, &state.config)?;

    let user = state
        .users
        .find_by_token(token)
        .await?
        .ok_or(Error::NotFound { resource: "User" })?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

/// `POST /users/login`
///
/// Hands back the stored token. A new one is issued only once the stored token has expired.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, Error> {
    let Json(payload) = payload?;
    let email = required(payload.email, "email")?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::bad_request("password cannot be blank"))?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(Error::NotFound { resource: "User" })?;

    if !auth::verify_password(&password, &user.password_hash)? {
        return Err(Error::bad_request("Invalid password"));
    }

    let user = match auth::verify_token(&user.token, &state.config) {
        Ok(_) => user,
        Err(Error::Unauthenticated) => {
            let _guard = state.write_lock.lock().await;
            let token = auth::issue_token(user.id, &user.email, &state.config)?;
            let refreshed = state.users.update_token(user.id, token).await?;
            info!(user_id = %refreshed.id, "Expired token replaced on login");
            refreshed
        }
        Err(e) => return Err(e),
    };

    Ok(Json(UserEnvelope { user: user.into() }))
}
