use std::sync::Arc;

use axum::extract::State;
use serde_json::Value;

use crate::auth::RequireRoot;
use crate::server::AppState;
use crate::server::dto::RootUsersRequest;
use crate::server::response::{ApiError, Envelope, JsonBody, StoreResultExt};

pub async fn list_root_users(
    _admin: RequireRoot,
    State(state): State<Arc<AppState>>,
) -> Result<Envelope<Vec<i64>>, ApiError> {
    let ids = state
        .permissions
        .root_user_ids()
        .api_err("failed to list root users")?;
    Ok(Envelope::success(ids))
}

/// Replaces the root set. Every id must name an active user, and the set
/// cannot be emptied.
pub async fn replace_root_users(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RootUsersRequest>,
) -> Result<Envelope<Value>, ApiError> {
    if req.user_ids.is_empty() {
        return Err(ApiError::bad_request("root user list cannot be empty"));
    }
    for &uid in &req.user_ids {
        let exists = state
            .store
            .get_user(uid)
            .api_err("failed to load user")?
            .is_some();
        if !exists {
            return Err(ApiError::bad_request(format!("user {uid} does not exist")));
        }
    }

    state
        .permissions
        .grant_root_users(&req.user_ids)
        .api_err("failed to replace root users")?;

    tracing::info!(target: "logdeck::audit", admin = admin.uid, "root users replaced via api");
    Ok(Envelope::ok())
}
