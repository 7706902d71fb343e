mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{mount_embeddings, raw_item_json, spawn_app, EmbeddingResponder};
use sift::config::SourceEndpoint;
use sift::ingest::IngestWindow;
use sift::models::Source;

fn chat_endpoint(source_server: &MockServer) -> SourceEndpoint {
    SourceEndpoint {
        source: Source::Chat,
        base_url: format!("{}/chat", source_server.uri()),
        token: None,
    }
}

fn issue_endpoint(source_server: &MockServer) -> SourceEndpoint {
    SourceEndpoint {
        source: Source::Issue,
        base_url: format!("{}/issue", source_server.uri()),
        token: None,
    }
}

#[tokio::test]
async fn ingest_is_idempotent_across_overlapping_runs() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;

    let source_server = MockServer::start().await;
    let now = Utc::now();
    // Short page (1 item < batch_size 2) ends the window on every run.
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-1", "the staging deploy failed on friday", now, None),
        ])))
        .mount(&source_server)
        .await;

    let app = spawn_app(&embed_server, vec![chat_endpoint(&source_server)]).await;

    let first = app
        .pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("first run");
    assert_eq!(first.fetched, 1);
    assert_eq!(first.upserted, 1);
    assert_eq!(first.skipped, 0);
    assert!(first.run_error.is_none());

    // The mock keeps returning the same item; the second run must skip it
    // by content hash and leave the index unchanged.
    let second = app
        .pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("second run");
    assert_eq!(second.upserted, 0);
    assert_eq!(second.skipped, 1);

    let stats = app.backend.stats().await.expect("stats");
    assert_eq!(stats.total_documents, 1);
}

#[tokio::test]
async fn ingest_advances_watermark_and_reports_freshness() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;

    let source_server = MockServer::start().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-1", "incident channel is quiet today", now, None),
        ])))
        .mount(&source_server)
        .await;
    // The issue tracker is registered but never syncs.
    Mock::given(method("GET"))
        .and(path("/issue/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&source_server)
        .await;

    let app = spawn_app(
        &embed_server,
        vec![chat_endpoint(&source_server), issue_endpoint(&source_server)],
    )
    .await;

    app.pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("chat run");

    let state = app
        .backend
        .get_sync_state(Source::Chat)
        .await
        .expect("sync state")
        .expect("watermark present");
    assert!((state.last_sync_at - now).num_seconds().abs() <= 1);

    let status = app.pipeline.status().await.expect("status");
    let chat = status.iter().find(|s| s.source == Source::Chat).unwrap();
    let issue = status.iter().find(|s| s.source == Source::Issue).unwrap();
    assert!(!chat.stale);
    assert!(issue.stale, "a never-synced source must report stale");
}

#[tokio::test]
async fn unreachable_source_is_an_error_not_an_empty_run() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;

    let source_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issue/items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&source_server)
        .await;

    let app = spawn_app(&embed_server, vec![issue_endpoint(&source_server)]).await;

    let result = app
        .pipeline
        .ingest(Source::Issue, IngestWindow::Incremental)
        .await;
    assert!(matches!(
        result,
        Err(sift::error::SiftError::SourceUnavailable { .. })
    ));

    // A failed first page must not move the watermark.
    let state = app
        .backend
        .get_sync_state(Source::Issue)
        .await
        .expect("sync state");
    assert!(state.is_none());
}

#[tokio::test]
async fn embedding_outage_leaves_watermark_for_resume() {
    let embed_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&embed_server)
        .await;

    let source_server = MockServer::start().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-1", "postmortem draft for the outage", now, None),
        ])))
        .mount(&source_server)
        .await;

    let app = spawn_app(&embed_server, vec![chat_endpoint(&source_server)]).await;

    let failed = app
        .pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("run completes with an error recorded");
    assert!(failed.run_error.is_some());
    assert_eq!(failed.upserted, 0);
    assert!(
        app.backend
            .get_sync_state(Source::Chat)
            .await
            .expect("sync state")
            .is_none(),
        "watermark must not advance past unembedded items"
    );

    // Embeddings recover; the next run picks the same items up again.
    embed_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(&embed_server)
        .await;

    let resumed = app
        .pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("resumed run");
    assert!(resumed.run_error.is_none());
    assert_eq!(resumed.upserted, 1);
    assert!(app
        .backend
        .get_sync_state(Source::Chat)
        .await
        .expect("sync state")
        .is_some());
}

#[tokio::test]
async fn mid_run_fetch_failure_keeps_committed_pages() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;

    let source_server = MockServer::start().await;
    let now = Utc::now();
    let t1 = now - Duration::minutes(3);
    let t2 = now - Duration::minutes(2);
    let t3 = now - Duration::minutes(1);
    let t4 = now;

    // Two full pages (batch_size 2), then the source goes down mid-run.
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-1", "rollout started for the billing service", t1, None),
            raw_item_json("msg-2", "billing rollout reached the canary fleet", t2, None),
        ])))
        .up_to_n_times(1)
        .mount(&source_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-3", "canary error rates look clean", t3, None),
            raw_item_json("msg-4", "billing rollout promoted to full fleet", t4, None),
        ])))
        .up_to_n_times(1)
        .mount(&source_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&source_server)
        .await;

    let app = spawn_app(&embed_server, vec![chat_endpoint(&source_server)]).await;

    let result = app
        .pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("partial run still reports its committed work");

    assert_eq!(result.fetched, 4);
    assert_eq!(result.upserted, 4);
    assert!(
        result.run_error.is_some(),
        "a mid-run fetch failure must be surfaced, not swallowed"
    );

    // The watermark reflects exactly the pages that committed.
    let state = app
        .backend
        .get_sync_state(Source::Chat)
        .await
        .expect("sync state")
        .expect("watermark present");
    assert!((state.last_sync_at - t4).num_seconds().abs() <= 1);

    let stats = app.backend.stats().await.expect("stats");
    assert_eq!(stats.total_documents, 4);
}

#[tokio::test]
async fn backfill_range_does_not_rewind_watermark() {
    let embed_server = MockServer::start().await;
    mount_embeddings(&embed_server).await;

    let source_server = MockServer::start().await;
    let now = Utc::now();
    let old = now - Duration::days(10);
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-recent", "current release checklist", now, None),
        ])))
        .up_to_n_times(1)
        .mount(&source_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            raw_item_json("msg-old", "archived retro notes", old, None),
        ])))
        .mount(&source_server)
        .await;

    let app = spawn_app(&embed_server, vec![chat_endpoint(&source_server)]).await;

    app.pipeline
        .ingest(Source::Chat, IngestWindow::Incremental)
        .await
        .expect("incremental run");
    let watermark = app
        .backend
        .get_sync_state(Source::Chat)
        .await
        .unwrap()
        .unwrap()
        .last_sync_at;

    app.pipeline
        .ingest(
            Source::Chat,
            IngestWindow::Range {
                start: old - Duration::days(1),
                end: old + Duration::days(1),
            },
        )
        .await
        .expect("backfill run");

    let after = app
        .backend
        .get_sync_state(Source::Chat)
        .await
        .unwrap()
        .unwrap()
        .last_sync_at;
    assert_eq!(after, watermark, "backfill of old data must not move the watermark back");

    let stats = app.backend.stats().await.expect("stats");
    assert_eq!(stats.total_documents, 2);
}
