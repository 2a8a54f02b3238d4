use std::sync::Arc;

use axum::extract::{Path, State};
use serde_json::Value;

use crate::auth::{CurrentUser, PasswordHasher, RequireRoot, generate_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, UpdateUserRequest, UserCredentialResponse};
use crate::server::response::{ApiError, Envelope, JsonBody, StoreOptionExt, StoreResultExt};
use crate::server::validation::{parse_id, validate_username};
use crate::types::{ACCESS_PASSWORD, DEFAULT_ADMIN_ID, User};

fn hash_password(password: &str) -> Result<String, ApiError> {
    PasswordHasher::new()
        .hash(password)
        .api_err("failed to hash password")
}

pub async fn list_users(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Envelope<Vec<User>>, ApiError> {
    let users = state.store.list_users().api_err("failed to list users")?;
    Ok(Envelope::success(users))
}

/// Creates a password account and returns its generated password once.
pub async fn create_user(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<Envelope<UserCredentialResponse>, ApiError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;

    let password = generate_password();
    let nickname = if req.nickname.trim().is_empty() {
        username.clone()
    } else {
        req.nickname.trim().to_string()
    };
    let user = User {
        username: username.clone(),
        nickname,
        email: req.email,
        password: hash_password(&password)?,
        access: ACCESS_PASSWORD.to_string(),
        ..Default::default()
    };

    let id = state.store.create_user(&user).map_err(|e| match e {
        Error::AlreadyExists => ApiError::conflict("user already exists"),
        e => {
            tracing::error!(error = %e, "failed to create user");
            ApiError::internal("failed to create user")
        }
    })?;

    tracing::info!(target: "logdeck::audit", admin = admin.uid, uid = id, %username, "user created");
    Ok(Envelope::success(UserCredentialResponse {
        id,
        username,
        password,
    }))
}

pub async fn update_user(
    RequireRoot(_admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Envelope<User>, ApiError> {
    let id = parse_id(&id)?;
    let mut user = state
        .store
        .get_user(id)
        .api_err("failed to load user")?
        .or_not_found("user not found")?;

    if let Some(nickname) = req.nickname {
        user.nickname = nickname;
    }
    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(avatar) = req.avatar {
        user.avatar = avatar;
    }

    state
        .store
        .update_user_profile(&user)
        .api_err("failed to update user")?;
    Ok(Envelope::success(user))
}

pub async fn delete_user(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Envelope<Value>, ApiError> {
    let id = parse_id(&id)?;
    if id == DEFAULT_ADMIN_ID {
        return Err(ApiError::bad_request(
            "the default administrator cannot be deleted",
        ));
    }

    let deleted = state
        .store
        .soft_delete_user(id)
        .api_err("failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("user not found"));
    }

    tracing::info!(target: "logdeck::audit", admin = admin.uid, uid = id, "user deleted");
    Ok(Envelope::ok())
}

pub async fn reset_password(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Envelope<UserCredentialResponse>, ApiError> {
    let id = parse_id(&id)?;
    let user = state
        .store
        .get_user(id)
        .api_err("failed to load user")?
        .or_not_found("user not found")?;

    let password = generate_password();
    state
        .store
        .update_user_password(id, &hash_password(&password)?)
        .api_err("failed to reset password")?;

    tracing::info!(target: "logdeck::audit", admin = admin.uid, uid = id, "password reset");
    Ok(Envelope::success(UserCredentialResponse {
        id,
        username: user.username,
        password,
    }))
}
