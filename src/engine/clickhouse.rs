use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ::clickhouse::Client;

use super::ddl::{self, CreateStorage, KafkaSettings, StorageSql, TableTarget};
use super::{EngineError, InstanceManager, Operator};
use crate::store::Store;
use crate::types::Instance;

/// Executes rendered DDL over the ClickHouse HTTP interface.
pub struct ClickhouseOperator {
    client: Client,
}

impl ClickhouseOperator {
    #[must_use]
    pub fn new(instance: &Instance) -> Self {
        let mut client = Client::default().with_url(&instance.url);
        if !instance.username.is_empty() {
            client = client.with_user(&instance.username);
        }
        if !instance.password.is_empty() {
            client = client.with_password(&instance.password);
        }
        Self { client }
    }

    async fn execute(&self, sql: &str) -> Result<(), EngineError> {
        tracing::debug!(sql, "executing ddl");
        self.client.query(sql).execute().await.map_err(|e| {
            tracing::warn!(error = %e, sql, "ddl failed");
            EngineError::from(e)
        })
    }
}

#[async_trait]
impl Operator for ClickhouseOperator {
    async fn create_storage(&self, req: &CreateStorage) -> Result<StorageSql, EngineError> {
        let sql = ddl::create_storage(req);
        self.execute(&sql.data).await?;
        self.execute(&sql.stream).await?;
        self.execute(&sql.view).await?;
        Ok(sql)
    }

    async fn update_merge_tree_ttl(&self, target: &TableTarget, days: i32) -> Result<(), EngineError> {
        self.execute(&ddl::alter_ttl(target, days)).await
    }

    async fn create_kafka_table(
        &self,
        target: &TableTarget,
        stream_sql: &str,
        kafka: &KafkaSettings,
    ) -> Result<String, EngineError> {
        let columns = ddl::column_block(stream_sql).ok_or(EngineError::InvalidStreamSql)?;
        let create = ddl::create_stream(target, columns, kafka);

        self.execute(&ddl::drop_stream(target)).await?;
        self.execute(&create).await?;
        Ok(create)
    }

    async fn create_trace_jaeger_dependencies(
        &self,
        target: &TableTarget,
        days: i32,
    ) -> Result<(), EngineError> {
        self.execute(&ddl::create_jaeger_dependencies(target, days)).await
    }

    async fn delete_trace_jaeger_dependencies(&self, target: &TableTarget) -> Result<(), EngineError> {
        self.execute(&ddl::drop_jaeger_dependencies(target)).await
    }
}

/// Builds one `ClickhouseOperator` per instance row and keeps it for reuse.
pub struct ClickhouseInstances {
    store: Arc<dyn Store>,
    cache: Mutex<HashMap<i64, Arc<dyn Operator>>>,
}

impl ClickhouseInstances {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<dyn Operator>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl InstanceManager for ClickhouseInstances {
    fn load(&self, iid: i64) -> Result<Arc<dyn Operator>, EngineError> {
        if let Some(op) = self.cache().get(&iid) {
            return Ok(op.clone());
        }

        let instance = self
            .store
            .get_instance(iid)?
            .ok_or(EngineError::InstanceNotFound(iid))?;
        let op: Arc<dyn Operator> = Arc::new(ClickhouseOperator::new(&instance));

        self.cache().insert(iid, op.clone());
        tracing::debug!(iid, url = %instance.url, "loaded clickhouse operator");
        Ok(op)
    }
}
