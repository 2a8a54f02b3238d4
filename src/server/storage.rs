use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::auth::CurrentUser;
use crate::permission::{DOMAIN_DATABASE, DOMAIN_TABLE, PermissionRequest};
use crate::server::AppState;
use crate::server::dto::{CreatedResponse, KafkaJsonMappingRequest, KafkaJsonMappingResponse};
use crate::server::response::{ApiError, CODE_ERR, Envelope, JsonBody};
use crate::server::validation::parse_id;
use crate::service::storage::{
    AgentTemplate, AnalysisFields, EgoTemplate, ILogtailTemplate, StorageCreate, StorageUpdate,
};
use crate::service::{StorageError, StorageTemplate, kafka_json_mapping};
use crate::types::{Acts, CREATE_TYPE_JSON_EACH_ROW, Database, Identity, Table};

pub fn storage_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/storage", post(create))
        .route("/storage/mapping-json", post(mapping_json))
        .route(
            "/storage/{id}",
            get(get_storage).patch(update).post(create_by_template),
        )
        .route("/storage/{id}/analysis-fields", get(analysis_fields))
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Update { step, .. } => {
                tracing::warn!(error = %e, step = step.as_str(), "storage update failed");
                ApiError::new(CODE_ERR, e.to_string()).with_data(json!({ "step": step }))
            }
            StorageError::Mapping(e) => ApiError::invalid_parameter(e),
            StorageError::Engine(_) => {
                tracing::error!(error = %e, "engine ddl failed");
                ApiError::internal(e.to_string())
            }
            StorageError::Store(ref inner) => {
                tracing::error!(error = %inner, "storage metadata failed");
                ApiError::internal("storage operation failed")
            }
            StorageError::Invalid(_)
            | StorageError::DatabaseNotFound
            | StorageError::TableNotFound
            | StorageError::TableRepeat
            | StorageError::UnknownTemplate => ApiError::bad_request(e.to_string()),
        }
    }
}

fn check_table(
    state: &AppState,
    user: &Identity,
    acts: Acts,
    database: &Database,
    table: &Table,
) -> Result<(), ApiError> {
    state
        .permissions
        .check_normal_permission(&PermissionRequest::instance_log(
            user.uid,
            database.iid,
            acts,
            DOMAIN_TABLE,
            table.id,
        ))
        .map_err(ApiError::from)
}

fn check_database(state: &AppState, user: &Identity, database: &Database) -> Result<(), ApiError> {
    state
        .permissions
        .check_normal_permission(&PermissionRequest::instance_log(
            user.uid,
            database.iid,
            Acts::EDIT,
            DOMAIN_DATABASE,
            database.id,
        ))
        .map_err(ApiError::from)
}

fn template_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(ApiError::invalid_parameter)
}

async fn get_storage(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Envelope<Table>, ApiError> {
    let id = parse_id(&id)?;
    let (table, database) = state.storage.table(id)?;
    check_table(&state, &user, Acts::VIEW, &database, &table)?;
    Ok(Envelope::success(table))
}

async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<StorageUpdate>,
) -> Result<Envelope<Value>, ApiError> {
    let id = parse_id(&id)?;
    let (table, database) = state.storage.table(id)?;
    check_table(&state, &user, Acts::EDIT, &database, &table)?;

    state.storage.update(user.uid, &table, &database, &req).await?;
    Ok(Envelope::ok())
}

async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<StorageCreate>,
) -> Result<Envelope<CreatedResponse>, ApiError> {
    let database = state.storage.database(req.database_id)?;
    check_database(&state, &user, &database)?;

    let id = state
        .storage
        .create(user.uid, &database, &req, CREATE_TYPE_JSON_EACH_ROW)
        .await?;
    Ok(Envelope::success(CreatedResponse { id }))
}

async fn create_by_template(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(template): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Envelope<Value>, ApiError> {
    let template: StorageTemplate = template.parse()?;
    let database_id = body.get("databaseId").and_then(Value::as_i64).unwrap_or_default();
    let database = state.storage.database(database_id)?;
    check_database(&state, &user, &database)?;

    match template {
        StorageTemplate::Ego => {
            let req: EgoTemplate = template_body(body)?;
            state
                .storage
                .create_by_ego_template(user.uid, &database, &req)
                .await?;
        }
        StorageTemplate::ILogtail => {
            let req: ILogtailTemplate = template_body(body)?;
            state
                .storage
                .create_by_ilogtail_template(user.uid, &database, &req)
                .await?;
        }
        StorageTemplate::Agent => {
            let req: AgentTemplate = template_body(body)?;
            state.storage.create_by_agent_template(user.uid, &database, &req)?;
        }
    }
    Ok(Envelope::ok())
}

async fn mapping_json(
    CurrentUser(_user): CurrentUser,
    JsonBody(req): JsonBody<KafkaJsonMappingRequest>,
) -> Result<Envelope<KafkaJsonMappingResponse>, ApiError> {
    let data = kafka_json_mapping(&req.data).map_err(StorageError::from)?;
    Ok(Envelope::success(KafkaJsonMappingResponse { data }))
}

async fn analysis_fields(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Envelope<AnalysisFields>, ApiError> {
    let id = parse_id(&id)?;
    let (table, database) = state.storage.table(id)?;
    check_table(&state, &user, Acts::VIEW, &database, &table)?;
    Ok(Envelope::success(state.storage.analysis_fields(id)?))
}
