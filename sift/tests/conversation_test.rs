mod common;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::MockServer;

use common::{mount_embeddings, spawn_app, API_KEY, DIMS};
use sift::config::DatabaseConfig;
use sift::db::{ConversationStore, Database, LibSqlBackend};
use sift::models::TurnRole;

#[tokio::test]
async fn search_turns_are_readable_through_the_history_endpoint() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;
    let app = spawn_app(&embed_server, vec![]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(app.url("/api/v1/search"))
        .header("Authorization", format!("Bearer {API_KEY}"))
        .json(&json!({"q": "release checklist", "requester": "alice", "conversationId": "conv-1"}))
        .send()
        .await
        .expect("search request");
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(app.url("/api/v1/conversations/conv-1"))
        .header("Authorization", format!("Bearer {API_KEY}"))
        .send()
        .await
        .expect("history request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("json");

    let turns = body["data"]["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2, "one user turn and one assistant turn");
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["content"], "release checklist");
    assert_eq!(turns[1]["role"], "assistant");
}

#[tokio::test]
async fn history_is_shared_between_serving_processes() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("shared.db");
    let config = DatabaseConfig {
        url: format!("file:{}", db_path.to_str().unwrap()),
        auth_token: None,
        local_path: None,
    };

    // Two independent backends over the same database file stand in for two
    // serving processes.
    let writer = Arc::new(LibSqlBackend::new(
        Database::new(&config, DIMS).await.expect("writer db"),
    ));
    let reader = Arc::new(LibSqlBackend::new(
        Database::new(&config, DIMS).await.expect("reader db"),
    ));

    writer
        .append_turn("conv-9", TurnRole::User, "what broke the deploy?", 3600)
        .await
        .expect("append");

    let history = reader.get_history("conv-9").await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "what broke the deploy?");
}

#[tokio::test]
async fn expired_turns_disappear_and_purge_removes_them() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("ttl.db");
    let config = DatabaseConfig {
        url: format!("file:{}", db_path.to_str().unwrap()),
        auth_token: None,
        local_path: None,
    };
    let backend = LibSqlBackend::new(Database::new(&config, DIMS).await.expect("db"));

    backend
        .append_turn("conv-ttl", TurnRole::User, "ephemeral question", 0)
        .await
        .expect("append expired");
    backend
        .append_turn("conv-live", TurnRole::User, "durable question", 3600)
        .await
        .expect("append live");

    assert!(
        backend
            .get_history("conv-ttl")
            .await
            .expect("history")
            .is_empty(),
        "expired conversation reads as empty, not as an error"
    );
    assert_eq!(backend.get_history("conv-live").await.unwrap().len(), 1);

    let purged = backend.purge_expired().await.expect("purge");
    assert_eq!(purged, 1);
    assert_eq!(backend.get_history("conv-live").await.unwrap().len(), 1);
}

#[tokio::test]
async fn appends_are_append_only_and_ordered() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("order.db");
    let config = DatabaseConfig {
        url: format!("file:{}", db_path.to_str().unwrap()),
        auth_token: None,
        local_path: None,
    };
    let backend = LibSqlBackend::new(Database::new(&config, DIMS).await.expect("db"));

    for i in 0..4 {
        let role = if i % 2 == 0 {
            TurnRole::User
        } else {
            TurnRole::Assistant
        };
        backend
            .append_turn("conv-seq", role, &format!("turn {i}"), 3600)
            .await
            .expect("append");
    }

    let history = backend.get_history("conv-seq").await.expect("history");
    assert_eq!(history.len(), 4);
    let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["turn 0", "turn 1", "turn 2", "turn 3"]);
}
