use std::sync::Arc;

use flatbase_auth::{AuthManager, TokenLifetimes};
use flatbase_client::Client;
use flatbase_engine::Catalog;
use flatbase_server::{router, AppState};
use tokio::net::TcpListener;

/// Boots a real server on an OS-assigned loopback port with a small
/// `shop` database and returns its base URL together with the
/// `TempDir`/task guards that must outlive the test.
async fn spawn_server() -> (String, tempfile::TempDir, tokio::task::JoinHandle<()>) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("shop")).unwrap();
    std::fs::write(
        root.join("shop/metadata.json"),
        r#"{"shop": {"products": [
            {"name": "id", "type": "integer"},
            {"name": "name", "type": "string"},
            {"name": "price", "type": "float"}
        ]}}"#,
    )
    .unwrap();
    std::fs::write(
        root.join("shop/products.csv"),
        "id,name,price\n1,Widget,9.99\n2,Gadget,19.5\n3,Sprocket,4.25\n",
    )
    .unwrap();

    let catalog = Catalog::load(root).await.unwrap();
    let auth = AuthManager::new(
        root.join("user.csv"),
        b"round-trip-secret".to_vec(),
        TokenLifetimes::default(),
    )
    .await
    .unwrap();
    let state = AppState {
        catalog: Arc::new(catalog),
        auth: Arc::new(auth),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), dir, handle)
}

async fn create_user(base_url: &str, user_name: &str, password: &str) {
    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{base_url}/auth/sigin"))
        .json(&serde_json::json!({"user_name": user_name, "password": password}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn connect_execute_and_fetch_all() {
    let (base_url, _dir, _server) = spawn_server().await;
    create_user(&base_url, "alice", "hunter2ispassword").await;

    let client = Client::connect(&base_url, "alice", "hunter2ispassword", "shop")
        .await
        .unwrap();
    let mut cursor = client
        .execute("SELECT name, price FROM products WHERE price > 5")
        .await
        .unwrap();
    let rows = cursor.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Widget");
    assert_eq!(rows[1]["name"], "Gadget");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn fetch_one_and_fetch_many_paginate_the_same_result_set() {
    let (base_url, _dir, _server) = spawn_server().await;
    create_user(&base_url, "bob", "hunter2ispassword").await;

    let client = Client::connect(&base_url, "bob", "hunter2ispassword", "shop")
        .await
        .unwrap();
    let mut cursor = client.execute("SELECT * FROM products").await.unwrap();

    let first = cursor.fetch_one().await.unwrap().unwrap();
    assert_eq!(first["id"], 1);
    assert!(cursor.has_delivered_rows());

    let rest = cursor.fetch_many(10).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0]["id"], 2);
    assert_eq!(rest[1]["id"], 3);

    assert_eq!(cursor.fetch_one().await.unwrap(), None);
}

#[tokio::test]
async fn unknown_column_surfaces_as_programming_error() {
    let (base_url, _dir, _server) = spawn_server().await;
    create_user(&base_url, "carol", "hunter2ispassword").await;

    let client = Client::connect(&base_url, "carol", "hunter2ispassword", "shop")
        .await
        .unwrap();
    let err = client.execute("SELECT bogus FROM products").await.unwrap_err();
    assert!(matches!(err, flatbase_client::ClientError::Programming(_)));
}

#[tokio::test]
async fn second_connect_without_disconnect_is_a_database_error() {
    let (base_url, _dir, _server) = spawn_server().await;
    create_user(&base_url, "dave", "hunter2ispassword").await;

    let _first = Client::connect(&base_url, "dave", "hunter2ispassword", "shop")
        .await
        .unwrap();
    let err = Client::connect(&base_url, "dave", "hunter2ispassword", "shop")
        .await
        .unwrap_err();
    assert!(matches!(err, flatbase_client::ClientError::Database(_)));
}
