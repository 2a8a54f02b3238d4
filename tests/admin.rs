mod common;

use axum::http::Method;
use serde_json::json;

use common::TestApp;
use logdeck::config::AppConfig;
use logdeck::types::DEFAULT_ADMIN_ID;

#[tokio::test]
async fn test_install_flow() {
    let app = TestApp::new();

    let body = app.request(Method::GET, "/api/v1/install", None, None).await;
    assert_eq!(body["data"], 0);

    let body = app.request(Method::POST, "/api/v1/install", None, None).await;
    assert_eq!(body["code"], 0, "{body}");

    let body = app.request(Method::GET, "/api/v1/install", None, None).await;
    assert_eq!(body["data"], 1);

    let body = app.request(Method::POST, "/api/v1/install", None, None).await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "already installed");
    assert_eq!(app.store.list_root_users().unwrap(), vec![DEFAULT_ADMIN_ID]);
}

#[tokio::test]
async fn test_migration_twice_keeps_admin_once() {
    let app = TestApp::new();
    app.request(Method::POST, "/api/v1/install", None, None).await;
    let cookie = app.login("logdeck", "logdeck").await;

    for _ in 0..2 {
        let body = app
            .request(Method::POST, "/api/v1/migration", Some(&cookie), None)
            .await;
        assert_eq!(body["code"], 0, "{body}");
    }
    assert_eq!(app.store.list_root_users().unwrap(), vec![DEFAULT_ADMIN_ID]);
}

#[tokio::test]
async fn test_migration_requires_root() {
    let app = TestApp::new();
    app.request(Method::POST, "/api/v1/install", None, None).await;
    app.create_user("bob", "bob-pass", false);
    let cookie = app.login("bob", "bob-pass").await;

    let body = app
        .request(Method::POST, "/api/v1/migration", Some(&cookie), None)
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(
        body["msg"],
        "administrator privileges are required to access this api"
    );
    assert!(body["data"].as_str().unwrap().starts_with("IsRootUser: "));
}

#[tokio::test]
async fn test_password_change_rules() {
    let app = TestApp::new();
    let uid = app.create_user("alice", "alice-pass", false);
    let other = app.create_user("bob", "bob-pass", false);
    let cookie = app.login("alice", "alice-pass").await;
    let uri = format!("/api/v1/users/{uid}/password");

    let cases = [
        (
            ("alice-pass", "abcdef", "abcdeg"),
            "the new password does not match the confirmation",
        ),
        (
            ("alice-pass", "abc", "abc"),
            "password length should be between 5 and 32",
        ),
        (("wrong", "abcdef", "abcdef"), "password error"),
    ];
    for ((password, new_password, confirm), msg) in cases {
        let body = json!({
            "password": password,
            "newPassword": new_password,
            "confirmNew": confirm,
        });
        let res = app
            .request(Method::PATCH, &uri, Some(&cookie), Some(body))
            .await;
        assert_eq!(res["code"], 1);
        assert_eq!(res["msg"], msg);
    }

    // Changing someone else's password needs root.
    let res = app
        .request(
            Method::PATCH,
            &format!("/api/v1/users/{other}/password"),
            Some(&cookie),
            Some(json!({"password": "", "newPassword": "abcdef", "confirmNew": "abcdef"})),
        )
        .await;
    assert_eq!(res["msg"], "administrator privileges are required to access this api");

    let res = app
        .request(
            Method::PATCH,
            &uri,
            Some(&cookie),
            Some(json!({"password": "alice-pass", "newPassword": "abcdef", "confirmNew": "abcdef"})),
        )
        .await;
    assert_eq!(res["code"], 0, "{res}");
    app.login("alice", "abcdef").await;
}

#[tokio::test]
async fn test_password_change_disabled_in_demo_mode() {
    let mut config = AppConfig::default();
    config.app.mode = "demo".to_string();
    let app = TestApp::with_config(config);
    let uid = app.create_user("alice", "alice-pass", false);
    let cookie = app.login("alice", "alice-pass").await;

    let res = app
        .request(
            Method::PATCH,
            &format!("/api/v1/users/{uid}/password"),
            Some(&cookie),
            Some(json!({"password": "alice-pass", "newPassword": "abcdef", "confirmNew": "abcdef"})),
        )
        .await;
    assert_eq!(res["code"], 1);
    assert_eq!(res["msg"], "password changes are disabled in demo mode");
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/users",
            Some(&cookie),
            Some(json!({"username": "erin", "email": "erin@example.com"})),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    let id = body["data"]["id"].as_i64().unwrap();
    let password = body["data"]["password"].as_str().unwrap().to_string();
    app.login("erin", &password).await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/users",
            Some(&cookie),
            Some(json!({"username": "erin"})),
        )
        .await;
    assert_eq!(body["msg"], "user already exists");

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/base/users/{id}"),
            Some(&cookie),
            Some(json!({"nickname": "Erin E"})),
        )
        .await;
    assert_eq!(body["data"]["nickname"], "Erin E");
    assert_eq!(body["data"]["email"], "erin@example.com");
    assert!(body["data"].get("password").is_none());

    let body = app
        .request(
            Method::PATCH,
            &format!("/api/v2/base/users/{id}/password-reset"),
            Some(&cookie),
            None,
        )
        .await;
    let reset = body["data"]["password"].as_str().unwrap().to_string();
    assert_ne!(reset, password);
    app.login("erin", &reset).await;

    let body = app
        .request(
            Method::DELETE,
            &format!("/api/v2/base/users/{id}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(body["code"], 0);
    assert!(app.store.get_user(id).unwrap().is_none());

    let body = app
        .request(
            Method::DELETE,
            &format!("/api/v2/base/users/{DEFAULT_ADMIN_ID}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(body["msg"], "the default administrator cannot be deleted");
}

#[tokio::test]
async fn test_deleted_root_user_loses_access() {
    let app = TestApp::new();
    let (_, admin_cookie) = app.root_session().await;
    let bob = app.create_user("bob", "bob-pass", true);
    let bob_cookie = app.login("bob", "bob-pass").await;

    let body = app
        .request(
            Method::DELETE,
            &format!("/api/v2/base/users/{bob}"),
            Some(&admin_cookie),
            None,
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert!(!app.store.is_root_user(bob).unwrap());

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/users",
            Some(&bob_cookie),
            Some(json!({"username": "mallory"})),
        )
        .await;
    assert_eq!(body["code"], 302);
    assert!(app.store.get_user_by_username("mallory").unwrap().is_none());
}

#[tokio::test]
async fn test_non_root_cannot_manage_users() {
    let app = TestApp::new();
    app.create_user("bob", "bob-pass", false);
    let cookie = app.login("bob", "bob-pass").await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/users",
            Some(&cookie),
            Some(json!({"username": "mallory"})),
        )
        .await;
    assert_eq!(body["code"], 1);
    assert_eq!(
        body["msg"],
        "administrator privileges are required to access this api"
    );

    // Listing is open to every signed-in user.
    let body = app
        .request(Method::GET, "/api/v2/base/users", Some(&cookie), None)
        .await;
    assert_eq!(body["code"], 0);
}

#[tokio::test]
async fn test_root_user_replacement() {
    let app = TestApp::new();
    let (root, cookie) = app.root_session().await;
    let bob = app.create_user("bob", "bob-pass", false);

    let body = app
        .request(
            Method::PUT,
            "/api/v2/base/root-users",
            Some(&cookie),
            Some(json!({"userIds": [bob, root, bob]})),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");

    let body = app
        .request(Method::GET, "/api/v2/base/root-users", Some(&cookie), None)
        .await;
    assert_eq!(body["data"], json!([root, bob]));

    for ids in [json!([]), json!([4242])] {
        let body = app
            .request(
                Method::PUT,
                "/api/v2/base/root-users",
                Some(&cookie),
                Some(json!({"userIds": ids})),
            )
            .await;
        assert_eq!(body["code"], 1);
    }
    assert_eq!(app.store.list_root_users().unwrap(), vec![root, bob]);
}

#[tokio::test]
async fn test_grant_management() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;
    let bob = app.create_user("bob", "bob-pass", false);
    let uri = format!("/api/v2/base/users/{bob}/grants");
    let target = json!({
        "objectType": "instance",
        "objectIdx": "1",
        "subResource": "log",
        "domainType": "database",
        "domainId": "*",
    });

    let mut grant = target.clone();
    grant["allow"] = json!(["view", "edit"]);
    let body = app
        .request(Method::PUT, &uri, Some(&cookie), Some(grant))
        .await;
    assert_eq!(body["code"], 0, "{body}");
    assert_eq!(body["data"][0]["allow"], json!(["view", "edit"]));
    assert_eq!(body["data"][0]["domainType"], "database");

    let mut bad = target.clone();
    bad["allow"] = json!(["own"]);
    let body = app.request(Method::PUT, &uri, Some(&cookie), Some(bad)).await;
    assert_eq!(body["code"], 1);

    let body = app
        .request(Method::DELETE, &uri, Some(&cookie), Some(target.clone()))
        .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], json!([]));

    let body = app
        .request(Method::DELETE, &uri, Some(&cookie), Some(target))
        .await;
    assert_eq!(body["msg"], "grant not found");
}

#[tokio::test]
async fn test_instances_and_databases() {
    let app = TestApp::new();
    let (_, cookie) = app.root_session().await;

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/instances",
            Some(&cookie),
            Some(json!({"name": "ch-main", "url": "http://ch:8123", "password": "secret"})),
        )
        .await;
    assert_eq!(body["code"], 0, "{body}");
    let iid = body["data"]["id"].as_i64().unwrap();

    let body = app
        .request(Method::GET, "/api/v2/base/instances", Some(&cookie), None)
        .await;
    assert_eq!(body["data"][0]["name"], "ch-main");
    assert!(body["data"][0].get("password").is_none());

    let db = json!({"iid": iid, "name": "logs"});
    let body = app
        .request(Method::POST, "/api/v2/base/databases", Some(&cookie), Some(db.clone()))
        .await;
    assert_eq!(body["code"], 0, "{body}");

    let body = app
        .request(Method::POST, "/api/v2/base/databases", Some(&cookie), Some(db))
        .await;
    assert_eq!(body["msg"], "database already exists");

    let body = app
        .request(
            Method::POST,
            "/api/v2/base/databases",
            Some(&cookie),
            Some(json!({"iid": iid + 1, "name": "other"})),
        )
        .await;
    assert_eq!(body["msg"], "instance not found");

    let body = app
        .request(
            Method::GET,
            &format!("/api/v2/base/databases?iid={iid}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "logs");
}
