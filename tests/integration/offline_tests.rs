//! OfflineManager: optimistic writes, online delivery and cached reads

use crate::common::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tasksync::client::offline::{CacheKey, OfflineManager, Submission};
use tasksync::client::SyncError;
use tasksync::shared::{EntityId, Record};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn manager_for(server: &MockServer, online: bool) -> (watch::Sender<bool>, OfflineManager) {
    let (online_tx, online_rx) = watch::channel(online);
    let manager = OfflineManager::with_database(
        config_for(server),
        signed_in_database().await,
        online_rx,
        Arc::new(RecordingTelemetry::default()),
    )
    .unwrap();
    (online_tx, manager)
}

fn teams_key() -> CacheKey {
    CacheKey::Teams(TEST_USER.to_string())
}

#[tokio::test]
async fn test_online_create_is_delivered() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 9 })).await;
    let (_online_tx, manager) = manager_for(&server, true).await;

    let submission = manager
        .create_team(Record::new().with_field("name", "Ops"))
        .await
        .unwrap();

    assert_eq!(submission, Submission::Delivered { id: Some(9) });
    assert!(manager.queue().is_empty().await.unwrap());
    assert_eq!(
        manager.cache().read(&teams_key()).await,
        Some(vec![Record::new().with_id(9u64).with_field("name", "Ops")])
    );
}

#[tokio::test]
async fn test_online_rejection_is_not_queued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createProject"))
        .respond_with(ResponseTemplate::new(400).set_body_string("name required"))
        .mount(&server)
        .await;
    let (_online_tx, manager) = manager_for(&server, true).await;

    let result = manager.create_project(1u64, Record::new()).await;

    assert_matches!(result, Err(SyncError::Rejected { status: 400, .. }));
    assert!(manager.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_offline_creates_reconcile_after_sync() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 42 })).await;
    mount_post(&server, "/createProject", 200, json!({ "id": 7 })).await;
    let (_online_tx, manager) = manager_for(&server, false).await;

    let team = match manager.create_team(Record::new().with_field("name", "Ops")).await.unwrap() {
        Submission::Queued { placeholder: Some(placeholder), .. } => placeholder,
        other => panic!("expected a queued team, got {:?}", other),
    };
    let project = manager
        .create_project(team.clone(), Record::new().with_field("name", "Launch"))
        .await
        .unwrap();
    assert_matches!(project, Submission::Queued { placeholder: Some(_), .. });

    assert!(received(&server).await.is_empty());
    let pending_projects = CacheKey::Projects(EntityId::Pending(team.clone()));
    assert_eq!(manager.cache().read(&pending_projects).await.unwrap().len(), 1);

    let report = manager.process_queue().await.unwrap();
    assert!(report.is_complete());

    let teams = manager.cache().read(&teams_key()).await.unwrap();
    assert_eq!(teams[0].id, Some(EntityId::Confirmed(42)));
    assert_eq!(manager.cache().read(&pending_projects).await, None);

    let projects = manager
        .cache()
        .read(&CacheKey::Projects(EntityId::Confirmed(42)))
        .await
        .unwrap();
    assert_eq!(
        projects,
        vec![Record::new()
            .with_id(7u64)
            .with_team(42u64)
            .with_field("name", "Launch")]
    );
}

#[tokio::test]
async fn test_online_write_under_queued_team_waits_for_confirmation() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 42 })).await;
    mount_post(&server, "/createProject", 200, json!({ "id": 7 })).await;
    let (online_tx, manager) = manager_for(&server, false).await;

    let team = match manager.create_team(Record::new().with_field("name", "Ops")).await.unwrap() {
        Submission::Queued { placeholder: Some(placeholder), .. } => placeholder,
        other => panic!("expected a queued team, got {:?}", other),
    };

    // Back online, sync not run yet
    online_tx.send_replace(true);
    let project = manager
        .create_project(team.clone(), Record::new().with_field("name", "Launch"))
        .await
        .unwrap();

    assert_matches!(project, Submission::Queued { .. });
    assert!(received(&server).await.is_empty());
    assert_eq!(manager.queue().len().await.unwrap(), 2);

    let report = manager.process_queue().await.unwrap();
    assert!(report.is_complete());

    let requests = received(&server).await;
    assert_eq!(received_paths(&server).await, vec!["/createTeam", "/createProject"]);
    assert_eq!(json_body(&requests[1])["team_id"], json!(42));
    assert!(!String::from_utf8_lossy(&requests[1].body).contains(team.as_str()));
}

#[tokio::test]
async fn test_fetch_refreshes_cache_and_keeps_unconfirmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getTeams"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "name": "A" }])),
        )
        .mount(&server)
        .await;
    let (online_tx, manager) = manager_for(&server, false).await;

    manager.create_team(Record::new().with_field("name", "Draft")).await.unwrap();
    online_tx.send_replace(true);

    let teams = manager.fetch_collection(&teams_key(), "/getTeams").await.unwrap();

    assert_eq!(teams.len(), 2);
    assert_eq!(teams[0], Record::new().with_id(1u64).with_field("name", "A"));
    assert!(teams[1].id.as_ref().is_some_and(EntityId::is_pending));
    assert_eq!(manager.cache().read(&teams_key()).await, Some(teams));
}

#[tokio::test]
async fn test_fetch_failure_serves_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getTeams"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let (_online_tx, manager) = manager_for(&server, true).await;
    let cached = vec![Record::new().with_id(3u64)];
    manager.cache().write(&teams_key(), &cached).await.unwrap();

    let teams = manager.fetch_collection(&teams_key(), "/getTeams").await.unwrap();
    assert_eq!(teams, cached);
}
