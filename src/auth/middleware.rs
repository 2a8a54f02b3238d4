use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::password::PasswordHasher;
use super::resolver::RequestCredentials;
use super::session::SESSION_COOKIE_NAME;
use crate::server::AppState;
use crate::server::response::{ApiError, CODE_DANGER_PASSWORD};
use crate::types::{DEFAULT_ADMIN_ID, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, Identity};

const DANGER_PASSWORD_NOTICE: &str =
    "Click on the upper right corner to change the default password";

/// Resolves the caller and stores the `Identity` in request extensions.
/// Unresolved requests get the login redirect envelope.
pub async fn auth_checker(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let session_id = jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string());

    let identity = state.resolver.resolve(&RequestCredentials {
        headers: request.headers(),
        session_id: session_id.as_deref(),
    });

    match identity {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => ApiError::redirect(state.config.login_url()).into_response(),
    }
}

/// Blocks the default administrator until the install-time password is changed.
pub async fn danger_password_checker(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let is_default_admin = request
        .extensions()
        .get::<Identity>()
        .is_some_and(|i| i.uid == DEFAULT_ADMIN_ID && i.username == DEFAULT_ADMIN_USERNAME);

    if is_default_admin && uses_default_password(&state) {
        return ApiError::new(CODE_DANGER_PASSWORD, DANGER_PASSWORD_NOTICE)
            .with_data(DANGER_PASSWORD_NOTICE)
            .into_response();
    }

    next.run(request).await
}

fn uses_default_password(state: &AppState) -> bool {
    let user = match state.store.get_user(DEFAULT_ADMIN_ID) {
        Ok(Some(user)) => user,
        Ok(None) => return false,
        Err(e) => {
            tracing::error!(error = %e, "failed to load default admin");
            return false;
        }
    };

    PasswordHasher::new()
        .verify(DEFAULT_ADMIN_PASSWORD, &user.password)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to verify default admin password");
            false
        })
}

/// The identity placed by `auth_checker`.
pub struct CurrentUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::bad_request("session user is nil"))
    }
}

/// Extractor that requires a member of the root user set.
pub struct RequireRoot(pub Identity);

impl FromRequestParts<Arc<AppState>> for RequireRoot {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        state.permissions.is_root_user(identity.uid)?;
        Ok(RequireRoot(identity))
    }
}
