use std::sync::Arc;

use axum::extract::{Path, State};
use axum_extra::extract::CookieJar;
use serde_json::Value;

use crate::auth::{
    CurrentUser, PasswordHasher, SESSION_COOKIE_NAME, check_password_length, removal_cookie,
    session_cookie, start_session,
};
use crate::server::AppState;
use crate::server::dto::{LoginRequest, UpdatePasswordRequest, UserInfoResponse};
use crate::server::response::{ApiError, Envelope, JsonBody, StoreOptionExt, StoreResultExt};
use crate::server::validation::parse_id;
use crate::types::Identity;

const LOGIN_FAILED: &str = "account or password error";

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Envelope<Identity>), ApiError> {
    let user = state
        .store
        .get_user_by_username(req.username.trim())
        .api_err("failed to load user")?
        .ok_or_else(|| ApiError::bad_request(LOGIN_FAILED))?;

    let verified = PasswordHasher::new()
        .verify(&req.password, &user.password)
        .api_err("failed to verify password")?;
    if !verified {
        tracing::info!(target: "logdeck::audit", username = %user.username, "login rejected");
        return Err(ApiError::bad_request(LOGIN_FAILED));
    }

    let identity = Identity::from(&user);
    let ttl = state.config.auth.session_ttl_secs;
    let session_id =
        start_session(&*state.store, &identity, ttl).api_err("failed to create session")?;

    tracing::info!(target: "logdeck::audit", uid = identity.uid, "login");
    let jar = jar.add(session_cookie(session_id, ttl, state.config.auth.secure_cookie));
    Ok((jar, Envelope::success(identity)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Envelope<Value>), ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state
            .store
            .delete_session(cookie.value())
            .api_err("failed to end session")?;
    }
    Ok((jar.remove(removal_cookie()), Envelope::ok()))
}

pub async fn info(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Envelope<UserInfoResponse>, ApiError> {
    let is_root = state
        .store
        .is_root_user(user.uid)
        .api_err("failed to check root user")?;
    Ok(Envelope::success(UserInfoResponse { user, is_root }))
}

/// Changes a password. Callers may change their own; root users may change anyone's.
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(uid): Path<String>,
    JsonBody(req): JsonBody<UpdatePasswordRequest>,
) -> Result<Envelope<Value>, ApiError> {
    if state.config.app.is_demo() {
        return Err(ApiError::bad_request(
            "password changes are disabled in demo mode",
        ));
    }

    let uid = parse_id(&uid)?;
    let is_self = uid == caller.uid;
    if !is_self {
        state.permissions.is_root_user(caller.uid)?;
    }

    if req.new_password != req.confirm_new {
        return Err(ApiError::bad_request(
            "the new password does not match the confirmation",
        ));
    }
    check_password_length(&req.new_password).map_err(ApiError::bad_request)?;

    let user = state
        .store
        .get_user(uid)
        .api_err("failed to load user")?
        .or_not_found("user not found")?;

    let hasher = PasswordHasher::new();
    if is_self {
        let verified = hasher
            .verify(&req.password, &user.password)
            .api_err("failed to verify password")?;
        if !verified {
            return Err(ApiError::bad_request("password error"));
        }
    }

    let hash = hasher
        .hash(&req.new_password)
        .api_err("failed to hash password")?;
    state
        .store
        .update_user_password(uid, &hash)
        .api_err("failed to update password")?;

    tracing::info!(target: "logdeck::audit", caller = caller.uid, uid, "password changed");
    Ok(Envelope::ok())
}
