use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::password::generate_session_id;
use crate::error::Result;
use crate::store::Store;
use crate::types::Identity;

pub const SESSION_COOKIE_NAME: &str = "logdeck_session";
pub const SESSION_VERSION: u32 = 1;

/// Server-side session document. Only `SESSION_VERSION` payloads are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub version: u32,
    pub user: Identity,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionDecodeError {
    #[error("malformed session payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported session version {0}")]
    UnsupportedVersion(u32),

    #[error("session payload has an empty username")]
    EmptyUsername,
}

impl SessionPayload {
    #[must_use]
    pub fn new(user: Identity) -> Self {
        Self {
            version: SESSION_VERSION,
            user,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> std::result::Result<Self, SessionDecodeError> {
        let payload: SessionPayload = serde_json::from_str(text)?;
        if payload.version != SESSION_VERSION {
            return Err(SessionDecodeError::UnsupportedVersion(payload.version));
        }
        if payload.user.username.is_empty() {
            return Err(SessionDecodeError::EmptyUsername);
        }
        Ok(payload)
    }
}

/// Persists a new session for `user` and returns its id.
pub fn start_session(store: &dyn Store, user: &Identity, ttl_secs: i64) -> Result<String> {
    let id = generate_session_id();
    let payload = SessionPayload::new(user.clone()).encode()?;
    store.create_session(&id, user.uid, &payload, Utc::now().timestamp() + ttl_secs)?;
    Ok(id)
}

#[must_use]
pub fn session_cookie(id: String, ttl_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, id))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs))
        .build()
}

#[must_use]
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build()
}
