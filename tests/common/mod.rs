#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use logdeck::auth::PasswordHasher;
use logdeck::config::AppConfig;
use logdeck::engine::ddl;
use logdeck::engine::{
    CreateStorage, EngineError, InstanceManager, KafkaSettings, Operator, StorageSql, TableTarget,
};
use logdeck::server::{AppState, create_router};
use logdeck::store::{SqliteStore, Store};
use logdeck::types::{ACCESS_PASSWORD, Database, Instance, User};

pub const SAMPLE_SOURCE: &str =
    r#"{"ts":"2024-01-01 00:00:00","level":"info","msg":"hello","code":200,"ctx":{"a":1}}"#;

/// One DDL operation seen by the fake operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateStorage(String),
    UpdateTtl(String, i32),
    CreateKafka(String, String),
    CreateTraceDeps(String, i32),
    DropTraceDeps(String),
}

/// Records DDL requests instead of executing them. `fail_on` makes the named
/// operation fail after it has been recorded.
#[derive(Default)]
pub struct RecordingOperator {
    calls: Mutex<Vec<Call>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl RecordingOperator {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_on(&self, op: &'static str) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    fn record(&self, op: &'static str, call: Call) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(op) {
            return Err(EngineError::InvalidStreamSql);
        }
        Ok(())
    }
}

#[async_trait]
impl Operator for RecordingOperator {
    async fn create_storage(&self, req: &CreateStorage) -> Result<StorageSql, EngineError> {
        self.record("create_storage", Call::CreateStorage(req.target.table.clone()))?;
        Ok(ddl::create_storage(req))
    }

    async fn update_merge_tree_ttl(&self, target: &TableTarget, days: i32) -> Result<(), EngineError> {
        self.record("ttl", Call::UpdateTtl(target.table.clone(), days))
    }

    async fn create_kafka_table(
        &self,
        target: &TableTarget,
        stream_sql: &str,
        kafka: &KafkaSettings,
    ) -> Result<String, EngineError> {
        self.record(
            "kafka",
            Call::CreateKafka(target.table.clone(), kafka.topic.clone()),
        )?;
        let columns = ddl::column_block(stream_sql).ok_or(EngineError::InvalidStreamSql)?;
        Ok(ddl::create_stream(target, columns, kafka))
    }

    async fn create_trace_jaeger_dependencies(
        &self,
        target: &TableTarget,
        days: i32,
    ) -> Result<(), EngineError> {
        self.record(
            "trace_create",
            Call::CreateTraceDeps(target.table.clone(), days),
        )
    }

    async fn delete_trace_jaeger_dependencies(&self, target: &TableTarget) -> Result<(), EngineError> {
        self.record("trace_drop", Call::DropTraceDeps(target.table.clone()))
    }
}

pub struct RecordingInstances {
    operator: Arc<RecordingOperator>,
}

impl InstanceManager for RecordingInstances {
    fn load(&self, _iid: i64) -> Result<Arc<dyn Operator>, EngineError> {
        let operator: Arc<dyn Operator> = self.operator.clone();
        Ok(operator)
    }
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<dyn Store>,
    pub operator: Arc<RecordingOperator>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(mut config: AppConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        config.server.data_dir = temp_dir.path().to_path_buf();
        config.app.root_url = "http://logdeck.test".to_string();

        let store = SqliteStore::new(config.server.db_path()).expect("open store");
        store.initialize().expect("initialize store");
        let store: Arc<dyn Store> = Arc::new(store);

        let operator = Arc::new(RecordingOperator::default());
        let instances = Arc::new(RecordingInstances {
            operator: operator.clone(),
        });
        let state = Arc::new(AppState::new(store.clone(), config, instances));

        Self {
            temp_dir,
            store,
            operator,
            router: create_router(state),
        }
    }

    /// Creates a password account directly in the store.
    pub fn create_user(&self, username: &str, password: &str, root: bool) -> i64 {
        let user = User {
            username: username.to_string(),
            nickname: username.to_string(),
            password: PasswordHasher::new().hash(password).unwrap(),
            access: ACCESS_PASSWORD.to_string(),
            ..Default::default()
        };
        let id = self.store.create_user(&user).unwrap();
        if root {
            self.store.add_root_user(id).unwrap();
        }
        id
    }

    /// A root user with a session cookie.
    pub async fn root_session(&self) -> (i64, String) {
        let id = self.create_user("root-user", "root-pass", true);
        (id, self.login("root-user", "root-pass").await)
    }

    pub fn seed_database(&self) -> Database {
        let iid = self
            .store
            .create_instance(&Instance {
                name: "local".to_string(),
                url: "http://127.0.0.1:8123".to_string(),
                ..Default::default()
            })
            .unwrap();
        let did = self
            .store
            .create_database(&Database {
                iid,
                name: "logs".to_string(),
                ..Default::default()
            })
            .unwrap();
        self.store.get_database(did).unwrap().unwrap()
    }

    /// Creates a storage through the api and forgets the DDL it issued.
    pub async fn seed_storage(&self, cookie: &str, did: i64, name: &str, days: i32) -> i64 {
        let body = self
            .request(
                Method::POST,
                "/api/v2/storage",
                Some(cookie),
                Some(json!({
                    "tableName": name,
                    "typ": 0,
                    "days": days,
                    "brokers": "kafka:9092",
                    "topics": "app-logs",
                    "consumers": 1,
                    "source": SAMPLE_SOURCE,
                    "databaseId": did,
                    "timeField": "ts",
                    "rawLogField": "msg",
                })),
            )
            .await;
        assert_eq!(body["code"], 0, "seed storage failed: {body}");
        self.operator.clear();
        body["data"]["id"].as_i64().unwrap()
    }

    /// Logs in and returns the `name=value` session cookie.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/api/v1/user/login",
                None,
                &[],
                Some(json!({"username": username, "password": password})),
            )
            .await;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let body = body_json(response).await;
        assert_eq!(body["code"], 0, "login failed: {body}");
        cookie
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and returns the envelope. Every response is HTTP 200.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Value {
        let response = self.send(method, uri, cookie, &[], body).await;
        body_json(response).await
    }

    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: &str,
    ) -> Value {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie.unwrap_or_default())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        body_json(self.router.clone().oneshot(request).await.unwrap()).await
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
