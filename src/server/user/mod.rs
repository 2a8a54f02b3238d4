mod account;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::server::AppState;

/// Login and logout; reachable without a resolved identity.
pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/login", post(account::login))
        .route("/user/logout", post(account::logout))
}

/// Routes for the signed-in caller.
pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/info", get(account::info))
        .route("/users/{uid}/password", patch(account::update_password))
}
