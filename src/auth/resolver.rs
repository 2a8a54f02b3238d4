use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;

use super::session::SessionPayload;
use crate::config::{AuthConfig, ProxyConfig};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{ACCESS_PROXY, Identity, User};

/// What a strategy may look at when resolving the caller.
pub struct RequestCredentials<'a> {
    pub headers: &'a HeaderMap,
    pub session_id: Option<&'a str>,
}

impl<'a> RequestCredentials<'a> {
    fn header(&self, name: &str) -> Option<&'a str> {
        if name.is_empty() {
            return None;
        }
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// One way of turning a request into an identity. Returning `None` hands
/// the request to the next strategy.
pub trait IdentityStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_resolve(&self, req: &RequestCredentials<'_>) -> Option<Identity>;
}

/// Identity previously stored by a password login.
pub struct CookieSession {
    store: Arc<dyn Store>,
}

impl CookieSession {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

impl IdentityStrategy for CookieSession {
    fn name(&self) -> &'static str {
        "session"
    }

    fn try_resolve(&self, req: &RequestCredentials<'_>) -> Option<Identity> {
        let id = req.session_id?;
        let text = match self.store.get_session(id, Utc::now().timestamp()) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(error = %e, "failed to load session");
                return None;
            }
        };

        let payload = match SessionPayload::decode(&text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unusable session");
                return None;
            }
        };

        // The owner may have been deleted since login.
        match self.store.get_user(payload.user.uid) {
            Ok(Some(_)) => Some(payload.user),
            Ok(None) => {
                tracing::warn!(uid = payload.user.uid, "session owner is no longer active");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load session owner");
                None
            }
        }
    }
}

/// Identity asserted by a trusted reverse proxy header. Unknown usernames
/// are provisioned on first sight.
pub struct ProxyHeader {
    store: Arc<dyn Store>,
    config: ProxyConfig,
}

impl ProxyHeader {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ProxyConfig) -> Self {
        Self { store, config }
    }

    fn find_or_create(&self, username: &str, nickname: &str) -> Result<User> {
        if let Some(user) = self.store.get_user_by_username(username)? {
            return Ok(user);
        }

        let user = User {
            username: username.to_string(),
            nickname: nickname.to_string(),
            access: ACCESS_PROXY.to_string(),
            ..Default::default()
        };
        match self.store.create_user(&user) {
            Ok(id) => {
                tracing::info!(target: "logdeck::audit", uid = id, username, "provisioned proxy user");
                Ok(User { id, ..user })
            }
            // Lost a race with a concurrent request for the same name.
            Err(Error::AlreadyExists) => self
                .store
                .get_user_by_username(username)?
                .ok_or(Error::NotFound),
            Err(e) => Err(e),
        }
    }

    fn root_token_matches(&self, req: &RequestCredentials<'_>) -> bool {
        !self.config.root_token_value.is_empty()
            && req.header(&self.config.root_token_key) == Some(self.config.root_token_value.as_str())
    }
}

impl IdentityStrategy for ProxyHeader {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn try_resolve(&self, req: &RequestCredentials<'_>) -> Option<Identity> {
        let username = req.header(&self.config.header_name)?;
        let nickname = req.header(&self.config.header_nickname).unwrap_or(username);

        let user = match self.find_or_create(username, nickname) {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, username, "failed to resolve proxy user");
                return None;
            }
        };

        if self.root_token_matches(req) {
            match self.store.add_root_user(user.id) {
                Ok(true) => {
                    tracing::info!(target: "logdeck::audit", uid = user.id, "granted root via proxy token");
                }
                Ok(false) => {}
                Err(e) => tracing::error!(error = %e, uid = user.id, "failed to grant root"),
            }
        }

        Some(Identity::from(&user))
    }
}

/// Fixed pseudo-user, never persisted.
pub struct Anonymous;

impl IdentityStrategy for Anonymous {
    fn name(&self) -> &'static str {
        "anonymous"
    }

    fn try_resolve(&self, _req: &RequestCredentials<'_>) -> Option<Identity> {
        Some(Identity::anonymous())
    }
}

/// Tries each strategy in order; the first identity wins.
pub struct SessionResolver {
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn IdentityStrategy>>) -> Self {
        Self { strategies }
    }

    /// Session first, then proxy header, then anonymous, each only when enabled.
    #[must_use]
    pub fn from_config(store: Arc<dyn Store>, config: &AuthConfig) -> Self {
        let mut strategies: Vec<Box<dyn IdentityStrategy>> =
            vec![Box::new(CookieSession::new(store.clone()))];
        if config.proxy.enabled {
            strategies.push(Box::new(ProxyHeader::new(store, config.proxy.clone())));
        }
        if config.anonymous.enabled {
            strategies.push(Box::new(Anonymous));
        }
        Self::new(strategies)
    }

    pub fn resolve(&self, req: &RequestCredentials<'_>) -> Option<Identity> {
        self.strategies.iter().find_map(|s| {
            let identity = s.try_resolve(req)?;
            tracing::debug!(strategy = s.name(), uid = identity.uid, "resolved identity");
            Some(identity)
        })
    }
}
