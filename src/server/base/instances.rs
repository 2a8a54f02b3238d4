use std::sync::Arc;

use axum::extract::{Query, State};

use crate::auth::{CurrentUser, RequireRoot};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    CreateDatabaseRequest, CreateInstanceRequest, CreatedResponse, DatabaseListQuery,
};
use crate::server::response::{ApiError, Envelope, JsonBody, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_database_name, validate_instance_name};
use crate::types::{Database, Instance};

fn map_create_err(entity: &'static str) -> impl FnOnce(Error) -> ApiError {
    move |e| match e {
        Error::AlreadyExists => ApiError::conflict(format!("{entity} already exists")),
        e => {
            tracing::error!(error = %e, entity, "create failed");
            ApiError::internal(format!("failed to create {entity}"))
        }
    }
}

pub async fn list_instances(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Envelope<Vec<Instance>>, ApiError> {
    let instances = state
        .store
        .list_instances()
        .api_err("failed to list instances")?;
    Ok(Envelope::success(instances))
}

pub async fn create_instance(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateInstanceRequest>,
) -> Result<Envelope<CreatedResponse>, ApiError> {
    validate_instance_name(&req.name)?;
    if req.url.trim().is_empty() {
        return Err(ApiError::bad_request("instance url cannot be empty"));
    }

    let instance = Instance {
        name: req.name,
        url: req.url.trim().to_string(),
        username: req.username,
        password: req.password,
        cluster: req.cluster,
        desc: req.desc,
        ..Default::default()
    };
    let id = state
        .store
        .create_instance(&instance)
        .map_err(map_create_err("instance"))?;

    tracing::info!(target: "logdeck::audit", admin = admin.uid, iid = id, name = %instance.name, "instance created");
    Ok(Envelope::success(CreatedResponse { id }))
}

pub async fn list_databases(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DatabaseListQuery>,
) -> Result<Envelope<Vec<Database>>, ApiError> {
    let databases = state
        .store
        .list_databases(query.iid)
        .api_err("failed to list databases")?;
    Ok(Envelope::success(databases))
}

/// Registers an existing engine database under an instance.
pub async fn create_database(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateDatabaseRequest>,
) -> Result<Envelope<CreatedResponse>, ApiError> {
    validate_database_name(&req.name)?;
    let instance = state
        .store
        .get_instance(req.iid)
        .api_err("failed to load instance")?
        .or_not_found("instance not found")?;

    let database = Database {
        iid: instance.id,
        name: req.name,
        cluster: if req.cluster.is_empty() {
            instance.cluster
        } else {
            req.cluster
        },
        desc: req.desc,
        uid: admin.uid,
        ..Default::default()
    };
    let id = state
        .store
        .create_database(&database)
        .map_err(map_create_err("database"))?;

    tracing::info!(target: "logdeck::audit", admin = admin.uid, did = id, iid = database.iid, name = %database.name, "database created");
    Ok(Envelope::success(CreatedResponse { id }))
}
