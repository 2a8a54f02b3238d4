use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::mapping::{MappingError, infer_fields};
use crate::engine::{
    CreateStorage, EngineError, InstanceManager, KafkaSettings, SourceField, TableTarget,
    TimeFieldType,
    ddl::{RAW_LOG_FIELD, TIME_NANOSECOND_FIELD, TIME_SECOND_FIELD},
};
use crate::error::Error;
use crate::store::Store;
use crate::types::{
    CREATE_TYPE_TEMPLATE, Database, FieldType, Index, IndexKind, Table, TableUpdate, TraceTableType,
};

const DEFAULT_TEMPLATE_DAYS: i32 = 14;
const MAX_TABLE_NAME_LEN: usize = 64;

/// Fields every agent-collected storage starts with.
const AGENT_BASE_FIELDS: &[(&str, FieldType)] = &[
    (TIME_SECOND_FIELD, FieldType::DateTime),
    (TIME_NANOSECOND_FIELD, FieldType::DateTime),
    ("_host_", FieldType::String),
    ("_namespace_", FieldType::String),
    ("_container_", FieldType::String),
    ("_pod_", FieldType::String),
];

const AGENT_LOG_FIELDS: &[(&str, FieldType)] = &[
    (RAW_LOG_FIELD, FieldType::String),
    ("_level_", FieldType::String),
    ("_source_", FieldType::String),
];

/// Container stdout record as shipped by fluent-bit.
const STDOUT_SAMPLE: &str = r#"{"_time_":"2022-11-08T10:35:58.837927084Z","_log_":"","_source_":"stdout","_pod_name_":"app-0","_namespace_":"default","_node_name_":"node-1","_container_name_":"app","_cluster_":"k8s","_log_agent_":"fluent-bit","_node_ip_":"10.0.0.1"}"#;
const STDOUT_TIME_FIELD: &str = "_time_";
const STDOUT_RAW_LOG_FIELD: &str = "_log_";

const ILOGTAIL_SAMPLE: &str = r#"{"contents":{"content":""},"tags":{"host.ip":"10.0.0.1","host.name":"node-1"},"time":1664239979}"#;
const ILOGTAIL_TIME_FIELD: &str = "time";
const ILOGTAIL_RAW_LOG_FIELD: &str = "contents";

/// Step of the update workflow, reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStep {
    Instance,
    Retention,
    Kafka,
    TraceCreate,
    TraceDrop,
    Metadata,
}

impl UpdateStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Retention => "retention",
            Self::Kafka => "kafka",
            Self::TraceCreate => "trace_create",
            Self::TraceDrop => "trace_drop",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid parameter: {0}")]
    Invalid(String),

    #[error("database not found")]
    DatabaseNotFound,

    #[error("table not found")]
    TableNotFound,

    #[error("table is repeat")]
    TableRepeat,

    #[error("template error")]
    UnknownTemplate,

    #[error("update failed at {step}: {message}")]
    Update { step: UpdateStep, message: String },

    #[error("create failed: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Store(#[from] Error),
}

impl StorageError {
    fn update(step: UpdateStep, e: impl fmt::Display) -> Self {
        Self::Update {
            step,
            message: e.to_string(),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageUpdate {
    #[serde(rename = "mergeTreeTTL")]
    pub merge_tree_ttl: i32,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_consumer_num: i32,
    pub kafka_skip_broken_messages: i32,
    pub desc: String,
    pub v3_table_type: TraceTableType,
}

impl StorageUpdate {
    fn kafka(&self) -> KafkaSettings {
        KafkaSettings {
            brokers: self.kafka_brokers.clone(),
            topic: self.kafka_topic.clone(),
            consumer_num: self.kafka_consumer_num,
            skip_broken_messages: self.kafka_skip_broken_messages,
        }
    }

    fn kafka_changed(&self, table: &Table) -> bool {
        self.kafka_skip_broken_messages != table.kafka_skip_broken_messages
            || self.kafka_brokers != table.brokers
            || self.kafka_consumer_num != table.consumer_num
            || self.kafka_topic != table.topic
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageCreate {
    pub table_name: String,
    /// Encoding of the time field, see `TimeFieldType`.
    pub typ: i32,
    pub days: i32,
    pub brokers: String,
    pub topics: String,
    pub consumers: i32,
    pub kafka_skip_broken_messages: i32,
    /// JSON sample of one message on the topic.
    pub source: String,
    pub database_id: i64,
    pub time_field: String,
    pub raw_log_field: String,
    pub desc: String,
    pub v3_table_type: TraceTableType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EgoTemplate {
    pub name: String,
    pub brokers: String,
    pub database_id: i64,
    pub topics_app: String,
    pub topics_ego: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ILogtailTemplate {
    pub name: String,
    pub brokers: String,
    pub database_id: i64,
    pub topic: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentTemplate {
    pub name: String,
    pub database_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTemplate {
    Ego,
    ILogtail,
    Agent,
}

impl FromStr for StorageTemplate {
    type Err = StorageError;

    fn from_str(s: &str) -> StorageResult<Self> {
        match s.trim() {
            "ego" => Ok(Self::Ego),
            "ilogtail" => Ok(Self::ILogtail),
            "agent" => Ok(Self::Agent),
            _ => Err(StorageError::UnknownTemplate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisField {
    pub id: i64,
    pub tid: i64,
    pub field: String,
    pub root_name: String,
    pub typ: i32,
    pub hash_typ: i32,
    pub alias: String,
    pub ctime: i64,
    pub utime: i64,
}

impl AnalysisField {
    fn order_key(&self) -> String {
        format!("{}.{}", self.root_name, self.field)
    }
}

impl From<Index> for AnalysisField {
    fn from(i: Index) -> Self {
        Self {
            id: i.id,
            tid: i.tid,
            field: i.field,
            root_name: i.root_name,
            typ: i.typ,
            hash_typ: i.hash_typ,
            alias: i.alias,
            ctime: i.ctime,
            utime: i.utime,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFields {
    pub base_fields: Vec<AnalysisField>,
    pub log_fields: Vec<AnalysisField>,
}

/// Groups index rows by kind, each group ordered by `rootName.field`.
pub fn analysis_fields(indexes: Vec<Index>) -> AnalysisFields {
    let mut res = AnalysisFields::default();
    for index in indexes {
        match index.kind {
            IndexKind::Base => res.base_fields.push(index.into()),
            IndexKind::Log => res.log_fields.push(index.into()),
        }
    }
    res.base_fields.sort_by_cached_key(AnalysisField::order_key);
    res.log_fields.sort_by_cached_key(AnalysisField::order_key);
    res
}

pub fn validate_table_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::Invalid("table name cannot be empty".to_string()));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(StorageError::Invalid(format!(
            "table name cannot exceed {MAX_TABLE_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StorageError::Invalid(
            "table name can only contain alphanumeric characters and underscores".to_string(),
        ));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(StorageError::Invalid(
            "table name cannot start with a digit".to_string(),
        ));
    }
    Ok(())
}

/// Source keys become engine column names: they may not shadow the generated
/// columns and are limited to `[A-Za-z0-9_.]`.
pub fn validate_source_fields(fields: &[SourceField]) -> StorageResult<()> {
    for field in fields {
        if [TIME_SECOND_FIELD, TIME_NANOSECOND_FIELD, RAW_LOG_FIELD].contains(&field.name.as_str()) {
            return Err(StorageError::Invalid(format!(
                "source field `{}` is reserved",
                field.name
            )));
        }
        if !field
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(StorageError::Invalid(format!(
                "source field `{}` can only contain alphanumeric characters, underscores and periods",
                field.name
            )));
        }
    }
    Ok(())
}

fn validate_days(days: i32) -> StorageResult<()> {
    if days <= 0 {
        return Err(StorageError::Invalid("days must be positive".to_string()));
    }
    Ok(())
}

fn target(database: &Database, table: &str) -> TableTarget {
    TableTarget {
        database: database.name.clone(),
        cluster: database.cluster.clone(),
        table: table.to_string(),
    }
}

fn index_rows(fields: &[(&str, FieldType)], kind: IndexKind) -> impl Iterator<Item = Index> {
    fields.iter().map(move |(name, typ)| Index {
        field: (*name).to_string(),
        typ: typ.code(),
        kind,
        ..Default::default()
    })
}

/// Storage lifecycle: metadata in the store, DDL through the instance operator.
pub struct StorageService {
    store: Arc<dyn Store>,
    instances: Arc<dyn InstanceManager>,
}

impl StorageService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, instances: Arc<dyn InstanceManager>) -> Self {
        Self { store, instances }
    }

    pub fn database(&self, did: i64) -> StorageResult<Database> {
        self.store
            .get_database(did)?
            .ok_or(StorageError::DatabaseNotFound)
    }

    /// Loads a table together with its owning database.
    pub fn table(&self, id: i64) -> StorageResult<(Table, Database)> {
        let table = self.store.get_table(id)?.ok_or(StorageError::TableNotFound)?;
        let database = self.database(table.did)?;
        Ok((table, database))
    }

    pub fn analysis_fields(&self, tid: i64) -> StorageResult<AnalysisFields> {
        Ok(analysis_fields(self.store.list_indexes(tid)?))
    }

    /// Applies `req` to a stored table. Each DDL step runs only when its
    /// settings differ; the metadata row is written once every step succeeded.
    /// A failing step leaves earlier DDL in place.
    pub async fn update(
        &self,
        uid: i64,
        table: &Table,
        database: &Database,
        req: &StorageUpdate,
    ) -> StorageResult<()> {
        validate_days(req.merge_tree_ttl)?;
        let op = self
            .instances
            .load(database.iid)
            .map_err(|e| StorageError::update(UpdateStep::Instance, e))?;
        let target = target(database, &table.name);

        if req.merge_tree_ttl != table.days {
            op.update_merge_tree_ttl(&target, req.merge_tree_ttl)
                .await
                .map_err(|e| StorageError::update(UpdateStep::Retention, e))?;
        }

        let mut sql_stream = None;
        if req.kafka_changed(table) {
            let sql = op
                .create_kafka_table(&target, &table.sql_stream, &req.kafka())
                .await
                .map_err(|e| StorageError::update(UpdateStep::Kafka, e))?;
            sql_stream = Some(sql);
        }

        if req.v3_table_type != table.v3_table_type {
            if req.v3_table_type == TraceTableType::JaegerJson {
                op.create_trace_jaeger_dependencies(&target, table.days)
                    .await
                    .map_err(|e| StorageError::update(UpdateStep::TraceCreate, e))?;
            } else {
                op.delete_trace_jaeger_dependencies(&target)
                    .await
                    .map_err(|e| StorageError::update(UpdateStep::TraceDrop, e))?;
            }
        }

        let update = TableUpdate {
            uid,
            days: req.merge_tree_ttl,
            topic: req.kafka_topic.clone(),
            brokers: req.kafka_brokers.clone(),
            consumer_num: req.kafka_consumer_num,
            desc: req.desc.clone(),
            kafka_skip_broken_messages: req.kafka_skip_broken_messages,
            v3_table_type: req.v3_table_type,
            sql_stream,
        };
        self.store
            .update_table(table.id, &update)
            .map_err(|e| StorageError::update(UpdateStep::Metadata, e))?;

        tracing::info!(target: "logdeck::audit", uid, tid = table.id, "storage updated");
        Ok(())
    }

    /// Creates a storage from a JSON sample: engine tables first, then the
    /// metadata row with its index rows.
    pub async fn create(
        &self,
        uid: i64,
        database: &Database,
        req: &StorageCreate,
        create_type: i32,
    ) -> StorageResult<i64> {
        validate_table_name(&req.table_name)?;
        validate_days(req.days)?;
        let time_field_type = TimeFieldType::from_code(req.typ)
            .ok_or_else(|| StorageError::Invalid(format!("unknown time field type {}", req.typ)))?;

        let fields = infer_fields(&req.source)?;
        validate_source_fields(&fields)?;
        if !fields.iter().any(|f| f.name == req.time_field) {
            return Err(StorageError::Invalid(format!(
                "time field `{}` is not in the source",
                req.time_field
            )));
        }
        if !req.raw_log_field.is_empty() && !fields.iter().any(|f| f.name == req.raw_log_field) {
            return Err(StorageError::Invalid(format!(
                "raw log field `{}` is not in the source",
                req.raw_log_field
            )));
        }

        if self
            .store
            .get_table_by_name(database.id, &req.table_name)?
            .is_some()
        {
            return Err(StorageError::TableRepeat);
        }

        let op = self.instances.load(database.iid)?;
        let target = target(database, &req.table_name);
        let sql = op
            .create_storage(&CreateStorage {
                target: target.clone(),
                days: req.days,
                kafka: KafkaSettings {
                    brokers: req.brokers.clone(),
                    topic: req.topics.clone(),
                    consumer_num: req.consumers,
                    skip_broken_messages: req.kafka_skip_broken_messages,
                },
                time_field: req.time_field.clone(),
                time_field_type,
                raw_log_field: req.raw_log_field.clone(),
                fields: fields.clone(),
            })
            .await?;

        if req.v3_table_type == TraceTableType::JaegerJson {
            op.create_trace_jaeger_dependencies(&target, req.days).await?;
        }

        let table = Table {
            did: database.id,
            name: req.table_name.clone(),
            typ: req.typ,
            days: req.days,
            brokers: req.brokers.clone(),
            topic: req.topics.clone(),
            consumer_num: req.consumers.max(1),
            kafka_skip_broken_messages: req.kafka_skip_broken_messages,
            desc: req.desc.clone(),
            sql_data: sql.data,
            sql_stream: sql.stream,
            sql_view: sql.view,
            time_field: req.time_field.clone(),
            raw_log_field: req.raw_log_field.clone(),
            create_type,
            v3_table_type: req.v3_table_type,
            uid,
            ..Default::default()
        };

        let mut indexes: Vec<Index> = index_rows(
            &[
                (TIME_SECOND_FIELD, FieldType::DateTime),
                (TIME_NANOSECOND_FIELD, FieldType::DateTime),
            ],
            IndexKind::Base,
        )
        .collect();
        indexes.extend(fields.iter().filter(|f| f.name != req.time_field).map(|f| Index {
            field: f.name.clone(),
            typ: f.typ.code(),
            kind: IndexKind::Log,
            ..Default::default()
        }));

        let tid = self
            .store
            .create_table_with_indexes(&table, &indexes)
            .map_err(|e| match e {
                Error::AlreadyExists => StorageError::TableRepeat,
                e => StorageError::Store(e),
            })?;

        tracing::info!(target: "logdeck::audit", uid, tid, did = database.id, name = %table.name, "storage created");
        Ok(tid)
    }

    pub async fn create_by_ego_template(
        &self,
        uid: i64,
        database: &Database,
        req: &EgoTemplate,
    ) -> StorageResult<()> {
        for (suffix, topic) in [("app_stdout", &req.topics_app), ("ego_stdout", &req.topics_ego)] {
            let create = StorageCreate {
                table_name: format!("{}_{suffix}", req.name),
                typ: 0,
                days: DEFAULT_TEMPLATE_DAYS,
                brokers: req.brokers.clone(),
                topics: topic.clone(),
                consumers: 1,
                source: STDOUT_SAMPLE.to_string(),
                database_id: database.id,
                time_field: STDOUT_TIME_FIELD.to_string(),
                raw_log_field: STDOUT_RAW_LOG_FIELD.to_string(),
                ..Default::default()
            };
            self.create(uid, database, &create, CREATE_TYPE_TEMPLATE).await?;
        }
        Ok(())
    }

    pub async fn create_by_ilogtail_template(
        &self,
        uid: i64,
        database: &Database,
        req: &ILogtailTemplate,
    ) -> StorageResult<i64> {
        let create = StorageCreate {
            table_name: req.name.clone(),
            typ: 1,
            days: DEFAULT_TEMPLATE_DAYS,
            brokers: req.brokers.clone(),
            topics: req.topic.clone(),
            consumers: 1,
            source: ILOGTAIL_SAMPLE.to_string(),
            database_id: database.id,
            time_field: ILOGTAIL_TIME_FIELD.to_string(),
            raw_log_field: ILOGTAIL_RAW_LOG_FIELD.to_string(),
            ..Default::default()
        };
        self.create(uid, database, &create, CREATE_TYPE_TEMPLATE).await
    }

    /// Registers a storage whose engine tables are managed by the collecting
    /// agent. The table row and its default index rows are written in one
    /// transaction.
    pub fn create_by_agent_template(
        &self,
        uid: i64,
        database: &Database,
        req: &AgentTemplate,
    ) -> StorageResult<i64> {
        validate_table_name(&req.name)?;

        let table = Table {
            did: database.id,
            name: req.name.clone(),
            create_type: CREATE_TYPE_TEMPLATE,
            uid,
            ..Default::default()
        };
        let indexes: Vec<Index> = index_rows(AGENT_BASE_FIELDS, IndexKind::Base)
            .chain(index_rows(AGENT_LOG_FIELDS, IndexKind::Log))
            .collect();

        let tid = self
            .store
            .create_table_with_indexes(&table, &indexes)
            .map_err(|e| match e {
                Error::AlreadyExists => StorageError::TableRepeat,
                e => StorageError::Store(e),
            })?;

        tracing::info!(target: "logdeck::audit", uid, tid, did = database.id, name = %req.name, "agent storage created");
        Ok(tid)
    }
}
