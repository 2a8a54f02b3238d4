pub mod ddl;
mod clickhouse;

use std::sync::Arc;

use async_trait::async_trait;

pub use self::clickhouse::{ClickhouseInstances, ClickhouseOperator};
pub use ddl::{CreateStorage, KafkaSettings, SourceField, StorageSql, TableTarget, TimeFieldType};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("clickhouse: {0}")]
    Clickhouse(#[from] ::clickhouse::error::Error),

    #[error("instance {0} not found")]
    InstanceNotFound(i64),

    #[error("stored stream sql has no column list")]
    InvalidStreamSql,

    #[error(transparent)]
    Store(#[from] crate::error::Error),
}

/// DDL operations against one analytical engine instance.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Creates the data table, Kafka stream table and materialized view.
    async fn create_storage(&self, req: &CreateStorage) -> Result<StorageSql, EngineError>;

    async fn update_merge_tree_ttl(&self, target: &TableTarget, days: i32) -> Result<(), EngineError>;

    /// Drops and recreates the Kafka stream table with new settings, keeping
    /// the columns of `stream_sql`. Returns the new stream statement.
    async fn create_kafka_table(
        &self,
        target: &TableTarget,
        stream_sql: &str,
        kafka: &KafkaSettings,
    ) -> Result<String, EngineError>;

    async fn create_trace_jaeger_dependencies(
        &self,
        target: &TableTarget,
        days: i32,
    ) -> Result<(), EngineError>;

    async fn delete_trace_jaeger_dependencies(&self, target: &TableTarget) -> Result<(), EngineError>;
}

/// Hands out the operator for an instance id.
pub trait InstanceManager: Send + Sync {
    fn load(&self, iid: i64) -> Result<Arc<dyn Operator>, EngineError>;
}
