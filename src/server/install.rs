use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde_json::Value;

use crate::auth::{CurrentUser, PasswordHasher};
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{ApiError, Envelope, StoreResultExt};
use crate::types::{
    ACCESS_PASSWORD, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, User,
};

pub fn install_router() -> Router<Arc<AppState>> {
    Router::new().route("/install", get(status).post(install))
}

pub fn migration_router() -> Router<Arc<AppState>> {
    Router::new().route("/migration", post(migration))
}

/// `1` once the default administrator exists, `0` before.
async fn status(State(state): State<Arc<AppState>>) -> Result<Envelope<i32>, ApiError> {
    let installed = state
        .store
        .get_user(DEFAULT_ADMIN_ID)
        .api_err("failed to check install status")?
        .is_some();
    Ok(Envelope::success(i32::from(installed)))
}

async fn install(State(state): State<Arc<AppState>>) -> Result<Envelope<Value>, ApiError> {
    state.store.initialize().api_err("failed to initialize schema")?;

    let hash = PasswordHasher::new()
        .hash(DEFAULT_ADMIN_PASSWORD)
        .api_err("failed to hash password")?;
    let admin = User {
        id: DEFAULT_ADMIN_ID,
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        nickname: DEFAULT_ADMIN_USERNAME.to_string(),
        password: hash,
        access: ACCESS_PASSWORD.to_string(),
        ..Default::default()
    };
    match state.store.create_user_with_id(&admin) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::bad_request("already installed")),
        Err(e) => {
            tracing::error!(error = %e, "failed to create default admin");
            return Err(ApiError::internal("install failed"));
        }
    }

    state
        .permissions
        .add_root_user(DEFAULT_ADMIN_ID)
        .api_err("failed to seed root users")?;

    tracing::info!(target: "logdeck::audit", "installed");
    Ok(Envelope::ok())
}

/// Seeds the default administrator into the root set, then re-runs schema setup.
/// Both steps are idempotent.
async fn migration(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Envelope<Value>, ApiError> {
    state
        .permissions
        .add_root_user(DEFAULT_ADMIN_ID)
        .api_err("failed to seed root users")?;
    state.permissions.is_root_user(user.uid)?;
    state.store.initialize().api_err("failed to migrate schema")?;

    tracing::info!(target: "logdeck::audit", uid = user.uid, "migration");
    Ok(Envelope::ok())
}
