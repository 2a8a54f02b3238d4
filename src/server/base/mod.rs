mod grants;
mod instances;
mod roots;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::server::AppState;

pub fn base_router() -> Router<Arc<AppState>> {
    Router::new()
        // User routes
        .route("/base/users", get(users::list_users).post(users::create_user))
        .route(
            "/base/users/{id}",
            patch(users::update_user).delete(users::delete_user),
        )
        .route(
            "/base/users/{id}/password-reset",
            patch(users::reset_password),
        )
        // Grant routes
        .route(
            "/base/users/{id}/grants",
            get(grants::list_grants)
                .put(grants::upsert_grant)
                .delete(grants::delete_grant),
        )
        // Root user routes
        .route(
            "/base/root-users",
            get(roots::list_root_users).put(roots::replace_root_users),
        )
        // Instance and database routes
        .route(
            "/base/instances",
            get(instances::list_instances).post(instances::create_instance),
        )
        .route(
            "/base/databases",
            get(instances::list_databases).post(instances::create_database),
        )
}
