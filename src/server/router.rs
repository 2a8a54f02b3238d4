use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::base::base_router;
use super::install::{install_router, migration_router};
use super::storage::storage_router;
use super::user::{account_router, session_router};
use crate::auth::{SessionResolver, auth_checker, danger_password_checker};
use crate::config::AppConfig;
use crate::engine::InstanceManager;
use crate::permission::PermissionManager;
use crate::service::StorageService;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub permissions: PermissionManager,
    pub resolver: SessionResolver,
    pub storage: StorageService,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: AppConfig, instances: Arc<dyn InstanceManager>) -> Self {
        let permissions = PermissionManager::with_grant_policy(store.clone());
        let resolver = SessionResolver::from_config(store.clone(), &config.auth);
        let storage = StorageService::new(store.clone(), instances);
        Self {
            store,
            config,
            permissions,
            resolver,
            storage,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let v1 = session_router().merge(install_router()).merge(
        account_router()
            .merge(migration_router())
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_checker)),
    );

    // Layers run outermost-last: identity is resolved before the password check.
    let v2 = storage_router()
        .merge(base_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            danger_password_checker,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_checker));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1)
        .nest("/api/v2", v2)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
