mod common;

use axum::http::Method;
use serde_json::{Value, json};

use common::{Call, TestApp};
use logdeck::types::{Acts, GrantTarget, PermissionGrant, TraceTableType};

fn update_body(days: i32, topic: &str, trace: i32) -> Value {
    json!({
        "mergeTreeTTL": days,
        "kafkaBrokers": "kafka:9092",
        "kafkaTopic": topic,
        "kafkaConsumerNum": 1,
        "kafkaSkipBrokenMessages": 0,
        "desc": "updated",
        "v3TableType": trace,
    })
}

#[tokio::test]
async fn test_create_storage_records_ddl_and_fields() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage",
            Some(&cookie),
            Some(json!({
                "tableName": "app",
                "typ": 0,
                "days": 7,
                "brokers": "kafka:9092",
                "topics": "app-logs",
                "consumers": 2,
                "source": common::SAMPLE_SOURCE,
                "databaseId": db.id,
                "timeField": "ts",
                "rawLogField": "msg",
                "desc": "application logs",
            })),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    let id = body["data"]["id"].as_i64().unwrap();

    assert_eq!(
        app.operator.calls(),
        vec![Call::CreateStorage("app".to_string())]
    );

    let table = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(table.days, 7);
    assert_eq!(table.consumer_num, 2);
    assert!(table.sql_stream.contains("ENGINE = Kafka"));
    assert!(table.sql_data.contains("MergeTree"));

    let body = app
        .request(
            Method::GET,
            &format!("/api/v2/storage/{id}/analysis-fields"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(body["code"], 0);
    let logs: Vec<&str> = body["data"]["logFields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(logs, vec!["code", "ctx", "level", "msg"]);
    let base: Vec<&str> = body["data"]["baseFields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(base, vec!["_time_nanosecond_", "_time_second_"]);
}

#[tokio::test]
async fn test_create_storage_duplicate_name() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    app.seed_storage(&cookie, db.id, "app", 7).await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage",
            Some(&cookie),
            Some(json!({
                "tableName": "app",
                "days": 7,
                "source": common::SAMPLE_SOURCE,
                "databaseId": db.id,
                "timeField": "ts",
            })),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "table is repeat");
    assert!(app.operator.calls().is_empty());
}

#[tokio::test]
async fn test_update_without_changes_runs_no_ddl() {
    let app = TestApp::new();
    let (uid, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/storage/{id}"),
            Some(&cookie),
            Some(update_body(7, "app-logs", 0)),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert!(app.operator.calls().is_empty());

    let table = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(table.desc, "updated");
    assert_eq!(table.uid, uid);
}

#[tokio::test]
async fn test_update_retention_only() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;
    let before = app.store.get_table(id).unwrap().unwrap();

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/storage/{id}"),
            Some(&cookie),
            Some(update_body(14, "app-logs", 0)),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        app.operator.calls(),
        vec![Call::UpdateTtl("app".to_string(), 14)]
    );

    let after = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(after.days, 14);
    assert_eq!(after.sql_stream, before.sql_stream);
}

#[tokio::test]
async fn test_update_kafka_regenerates_stream_sql() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/storage/{id}"),
            Some(&cookie),
            Some(update_body(7, "app-logs-v2", 0)),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        app.operator.calls(),
        vec![Call::CreateKafka("app".to_string(), "app-logs-v2".to_string())]
    );

    let table = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(table.topic, "app-logs-v2");
    assert!(table.sql_stream.contains("kafka_topic_list = 'app-logs-v2'"));
    assert!(table.sql_stream.contains("`level` String"));
}

#[tokio::test]
async fn test_failed_step_keeps_metadata_and_earlier_ddl() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;
    app.operator.fail_on("kafka");

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/storage/{id}"),
            Some(&cookie),
            Some(update_body(14, "other-topic", 0)),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["data"]["step"], "kafka");
    assert!(body["msg"].as_str().unwrap().starts_with("update failed at kafka"));

    // Retention already ran and is not undone.
    assert_eq!(
        app.operator.calls(),
        vec![
            Call::UpdateTtl("app".to_string(), 14),
            Call::CreateKafka("app".to_string(), "other-topic".to_string()),
        ]
    );
    let table = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(table.days, 7);
    assert_eq!(table.topic, "app-logs");
}

#[tokio::test]
async fn test_trace_toggle_uses_stored_days() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;
    let uri = format!("/api/v2/storage/{id}");

    let body = app
        .request(Method::PATCH, &uri, Some(&cookie), Some(update_body(14, "app-logs", 1)))
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        app.operator.calls(),
        vec![
            Call::UpdateTtl("app".to_string(), 14),
            Call::CreateTraceDeps("app".to_string(), 7),
        ]
    );
    let table = app.store.get_table(id).unwrap().unwrap();
    assert_eq!(table.v3_table_type, TraceTableType::JaegerJson);

    app.operator.clear();
    let body = app
        .request(Method::PATCH, &uri, Some(&cookie), Some(update_body(14, "app-logs", 0)))
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        app.operator.calls(),
        vec![Call::DropTraceDeps("app".to_string())]
    );
}

#[tokio::test]
async fn test_update_rejects_bad_input() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;

    let body = app
        .request(Method::PATCH, "/api/v2/storage/0", Some(&cookie), Some(update_body(7, "t", 0)))
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "invalid parameter");

    let body = app
        .request(Method::PATCH, "/api/v2/storage/404", Some(&cookie), Some(update_body(7, "t", 0)))
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "table not found");

    let body = app
        .request_raw(Method::PATCH, "/api/v2/storage/1", Some(&cookie), "{not json")
        .await;
    assert_eq!(body["code"], 1);
    assert!(body["msg"].as_str().unwrap().starts_with("invalid parameter: "));
}

#[tokio::test]
async fn test_update_without_retention_is_rejected() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&cookie, db.id, "app", 7).await;

    let mut body = update_body(7, "app-logs", 0);
    body.as_object_mut().unwrap().remove("mergeTreeTTL");
    let res = app
        .request(
            Method::PATCH,
            &format!("/api/v2/storage/{id}"),
            Some(&cookie),
            Some(body),
        )
        .await;
    assert_eq!(res["code"], 1);
    assert_eq!(res["msg"], "invalid parameter: days must be positive");
    assert!(app.operator.calls().is_empty());
    assert_eq!(app.store.get_table(id).unwrap().unwrap().days, 7);
}

#[tokio::test]
async fn test_create_storage_rejects_reserved_source_field() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage",
            Some(&cookie),
            Some(json!({
                "tableName": "app",
                "days": 7,
                "source": r#"{"ts":"2024-01-01 00:00:00","_raw_log_":"x"}"#,
                "databaseId": db.id,
                "timeField": "ts",
            })),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(
        body["msg"],
        "invalid parameter: source field `_raw_log_` is reserved"
    );
    assert!(app.operator.calls().is_empty());
    assert!(app.store.get_table_by_name(db.id, "app").unwrap().is_none());
}

#[tokio::test]
async fn test_update_requires_permission() {
    let app = TestApp::new();
    let (_, root_cookie) = app.root_session().await;
    let db = app.seed_database();
    let id = app.seed_storage(&root_cookie, db.id, "app", 7).await;

    let uid = app.create_user("bob", "bob-pass", false);
    let cookie = app.login("bob", "bob-pass").await;
    let uri = format!("/api/v2/storage/{id}");

    let body = app
        .request(Method::PATCH, &uri, Some(&cookie), Some(update_body(14, "app-logs", 0)))
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "permission verification failed");
    assert!(body["data"].as_str().unwrap().contains("edit"));
    assert!(app.operator.calls().is_empty());

    app.store
        .upsert_grant(&PermissionGrant {
            user_id: uid,
            target: GrantTarget {
                object_type: "instance".to_string(),
                object_idx: db.iid.to_string(),
                sub_resource: "log".to_string(),
                domain_type: "*".to_string(),
                domain_id: "*".to_string(),
            },
            allow_bits: Acts::EDIT,
            deny_bits: Acts::default(),
            ctime: 0,
            utime: 0,
        })
        .unwrap();

    let body = app
        .request(Method::PATCH, &uri, Some(&cookie), Some(update_body(14, "app-logs", 0)))
        .await;
    assert_eq!(body["code"], 0, "{body}");
}

#[tokio::test]
async fn test_agent_template_collision_writes_nothing() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();
    let agent_body = json!({"name": "agent_logs", "databaseId": db.id});

    let body = app
        .request(Method::POST, "/api/v2/storage/agent", Some(&cookie), Some(agent_body.clone()))
        .await;
    assert_eq!(body["code"], 0, "{body}");
    let first = app
        .store
        .get_table_by_name(db.id, "agent_logs")
        .unwrap()
        .unwrap();
    let indexes = app.store.list_indexes(first.id).unwrap();
    assert_eq!(indexes.len(), 9);

    let body = app
        .request(Method::POST, "/api/v2/storage/agent", Some(&cookie), Some(agent_body))
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "table is repeat");

    let still = app
        .store
        .get_table_by_name(db.id, "agent_logs")
        .unwrap()
        .unwrap();
    assert_eq!(still.id, first.id);
    assert_eq!(app.store.list_indexes(first.id).unwrap().len(), 9);
    assert!(app.store.get_table(first.id + 1).unwrap().is_none());
    assert!(app.operator.calls().is_empty());
}

#[tokio::test]
async fn test_ego_template_creates_two_storages() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage/ego",
            Some(&cookie),
            Some(json!({
                "name": "svc",
                "brokers": "kafka:9092",
                "databaseId": db.id,
                "topicsApp": "svc-app",
                "topicsEgo": "svc-ego",
            })),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        app.operator.calls(),
        vec![
            Call::CreateStorage("svc_app_stdout".to_string()),
            Call::CreateStorage("svc_ego_stdout".to_string()),
        ]
    );

    let app_table = app
        .store
        .get_table_by_name(db.id, "svc_app_stdout")
        .unwrap()
        .unwrap();
    assert_eq!(app_table.topic, "svc-app");
    assert_eq!(app_table.days, 14);
}

#[tokio::test]
async fn test_ilogtail_template() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage/ilogtail",
            Some(&cookie),
            Some(json!({"name": "nodes", "brokers": "kafka:9092", "databaseId": db.id, "topic": "node-logs"})),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");

    let table = app.store.get_table_by_name(db.id, "nodes").unwrap().unwrap();
    assert_eq!(table.time_field, "time");
    assert_eq!(table.raw_log_field, "contents");
}

#[tokio::test]
async fn test_unknown_template() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let db = app.seed_database();

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage/fluentd",
            Some(&cookie),
            Some(json!({"name": "x", "databaseId": db.id})),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "template error");
}

#[tokio::test]
async fn test_mapping_json() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage/mapping-json",
            Some(&cookie),
            Some(json!({"data": r#"{"zeta": 1, "alpha": "a", "ratio": 0.5, "ok": false, "nested": {"k": 1}}"#})),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(
        body["data"]["data"],
        json!([
            {"key": "zeta", "value": "Int64"},
            {"key": "alpha", "value": "String"},
            {"key": "ratio", "value": "Float64"},
            {"key": "ok", "value": "UInt8"},
            {"key": "nested", "value": "String"},
        ])
    );

    let body = app
        .request(
            Method::POST,
            "/api/v2/storage/mapping-json",
            Some(&cookie),
            Some(json!({"data": "[1, 2]"})),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert!(body["msg"].as_str().unwrap().starts_with("invalid parameter"));
}
