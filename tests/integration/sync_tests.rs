//! Synchronizer passes against a mock API

use crate::common::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tasksync::client::local_db::LocalDatabase;
use tasksync::client::offline::{CacheKey, CacheStore};
use tasksync::client::{SyncError, SyncReport};
use tasksync::shared::{EntityId, PlaceholderId, QueuedMutation, Record};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn placeholder(value: &str) -> PlaceholderId {
    PlaceholderId::parse(value).unwrap()
}

#[tokio::test]
async fn test_replays_queue_in_enqueue_order() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTask", 200, json!({ "task_id": 1 })).await;

    let telemetry = Arc::new(RecordingTelemetry::default());
    let sync = synchronizer_for(&server, signed_in_database().await, telemetry.clone());
    for title in ["first", "second", "third"] {
        sync.queue()
            .enqueue(QueuedMutation::create_task(
                Record::new().with_project(5u64).with_field("title", title),
            ))
            .await
            .unwrap();
    }

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded.len(), 3);
    assert!(report.is_complete());
    assert!(sync.queue().is_empty().await.unwrap());

    let titles: Vec<_> = received(&server)
        .await
        .iter()
        .map(|request| json_body(request)["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("first"), json!("second"), json!("third")]);
    assert_eq!(telemetry.event_names(), vec!["task_created"; 3]);
}

#[tokio::test]
async fn test_project_is_sent_with_confirmed_team_id() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 42 })).await;
    mount_post(&server, "/createProject", 200, json!({ "id": 7 })).await;

    let team = placeholder("local-abc-1");
    let project = placeholder("local-p-1");
    let db = signed_in_database().await;
    let cache = CacheStore::new(db.clone());
    let teams_key = CacheKey::Teams(TEST_USER.to_string());
    let pending_projects = CacheKey::Projects(EntityId::Pending(team.clone()));

    cache
        .write(&teams_key, &[Record::new().with_id(team.clone()).with_field("name", "Ops")])
        .await
        .unwrap();
    cache
        .write(
            &pending_projects,
            &[Record::new().with_id(project.clone()).with_team(team.clone())],
        )
        .await
        .unwrap();

    let sync = synchronizer_for(&server, db, Arc::new(RecordingTelemetry::default()));
    sync.queue()
        .enqueue(QueuedMutation::create_team(
            Record::new().with_id(team.clone()).with_field("name", "Ops"),
        ))
        .await
        .unwrap();
    sync.queue()
        .enqueue(QueuedMutation::create_project(
            Record::new().with_id(project.clone()).with_team(team.clone()),
        ))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.confirmed, vec![(team, 42), (project, 7)]);
    assert!(sync.queue().is_empty().await.unwrap());

    let requests = received(&server).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(json_body(&requests[0])["id"], json!("local-abc-1"));
    assert_eq!(json_body(&requests[1])["team_id"], json!(42));

    assert_eq!(
        cache.read(&teams_key).await,
        Some(vec![Record::new().with_id(42u64).with_field("name", "Ops")])
    );
    assert_eq!(cache.read(&pending_projects).await, None);
    assert_eq!(
        cache.read(&CacheKey::Projects(EntityId::Confirmed(42))).await,
        Some(vec![Record::new().with_id(7u64).with_team(42u64)])
    );
}

#[tokio::test]
async fn test_empty_queue_sends_nothing() {
    let server = MockServer::start().await;
    let db = signed_in_database().await;
    let cache = CacheStore::new(db.clone());
    let key = CacheKey::Teams(TEST_USER.to_string());
    let snapshot = vec![Record::new().with_id(1u64).with_field("name", "A")];
    cache.write(&key, &snapshot).await.unwrap();

    let sync = synchronizer_for(&server, db, Arc::new(RecordingTelemetry::default()));
    let report = sync.process_queue().await.unwrap();

    assert_eq!(report, SyncReport::default());
    assert!(received(&server).await.is_empty());
    assert_eq!(cache.read(&key).await, Some(snapshot));
}

#[tokio::test]
async fn test_rejected_entry_stays_queued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTask"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 3 })).await;

    let telemetry = Arc::new(RecordingTelemetry::default());
    let sync = synchronizer_for(&server, signed_in_database().await, telemetry.clone());
    let first = sync
        .queue()
        .enqueue(QueuedMutation::create_task(Record::new().with_project(5u64)))
        .await
        .unwrap();
    let second = sync
        .queue()
        .enqueue(QueuedMutation::create_team(Record::new().with_field("name", "B")))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.succeeded, vec![second]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].seq, first);
    assert_contains!(report.failed[0].error, "500");

    let remaining = sync.queue().snapshot().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].seq, first);
    assert_eq!(remaining[0].attempts, 1);
    assert!(remaining[0].last_attempt.is_some());
    assert_contains!(remaining[0].last_error.clone().unwrap(), "boom");

    let errors = telemetry.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "sync.replay");
}

#[tokio::test]
async fn test_dependents_of_failed_create_are_held_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .and(body_partial_json(json!({ "name": "broken" })))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .and(body_partial_json(json!({ "name": "fine" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9 })))
        .mount(&server)
        .await;

    let team = placeholder("local-team-1");
    let project = placeholder("local-proj-1");
    let sync = synchronizer_for(
        &server,
        signed_in_database().await,
        Arc::new(RecordingTelemetry::default()),
    );
    let queue = sync.queue();

    queue
        .enqueue(QueuedMutation::create_team(
            Record::new().with_id(team.clone()).with_field("name", "broken"),
        ))
        .await
        .unwrap();
    let project_seq = queue
        .enqueue(QueuedMutation::create_project(
            Record::new().with_id(project.clone()).with_team(team.clone()),
        ))
        .await
        .unwrap();
    let task_seq = queue
        .enqueue(QueuedMutation::create_task(Record::new().with_project(project.clone())))
        .await
        .unwrap();
    queue
        .enqueue(QueuedMutation::create_team(Record::new().with_field("name", "fine")))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.blocked, vec![project_seq, task_seq]);
    assert_eq!(report.retained(), 3);
    assert_eq!(received_paths(&server).await, vec!["/createTeam", "/createTeam"]);

    let remaining = queue.snapshot().await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert_eq!(remaining[1].attempts, 0);
    assert_eq!(remaining[1].mutation.body.team_id, Some(EntityId::Pending(team)));
}

#[tokio::test]
async fn test_create_without_id_is_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let team = placeholder("local-team-1");
    let telemetry = Arc::new(RecordingTelemetry::default());
    let sync = synchronizer_for(&server, signed_in_database().await, telemetry.clone());
    let team_seq = sync
        .queue()
        .enqueue(QueuedMutation::create_team(Record::new().with_id(team.clone())))
        .await
        .unwrap();
    let project_seq = sync
        .queue()
        .enqueue(QueuedMutation::create_project(Record::new().with_team(team.clone())))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.succeeded, vec![team_seq]);
    assert_eq!(report.unresolved, vec![team]);
    assert_eq!(report.blocked, vec![project_seq]);
    assert!(!report.is_complete());
    assert_eq!(sync.queue().len().await.unwrap(), 1);
    assert!(telemetry
        .errors()
        .iter()
        .any(|(context, _)| context == "sync.missing_id"));
}

#[tokio::test]
async fn test_dependent_of_unresolved_create_stays_blocked_on_later_passes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    mount_post(&server, "/createProject", 200, json!({ "id": 7 })).await;

    let team = placeholder("local-team-1");
    let sync = synchronizer_for(
        &server,
        signed_in_database().await,
        Arc::new(RecordingTelemetry::default()),
    );
    sync.queue()
        .enqueue(QueuedMutation::create_team(Record::new().with_id(team.clone())))
        .await
        .unwrap();
    let project_seq = sync
        .queue()
        .enqueue(QueuedMutation::create_project(Record::new().with_team(team.clone())))
        .await
        .unwrap();

    let first = sync.process_queue().await.unwrap();
    assert_eq!(first.unresolved, vec![team.clone()]);
    assert_eq!(first.blocked, vec![project_seq]);

    let second = sync.process_queue().await.unwrap();
    assert_eq!(second.attempted, 0);
    assert_eq!(second.blocked, vec![project_seq]);
    assert!(second.succeeded.is_empty());
    assert_eq!(received_paths(&server).await, vec!["/createTeam"]);

    let remaining = sync.queue().snapshot().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].mutation.body.team_id, Some(EntityId::Pending(team)));
}

#[tokio::test]
async fn test_reference_to_unqueued_placeholder_is_not_sent() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTask", 200, json!({ "task_id": 1 })).await;

    let sync = synchronizer_for(
        &server,
        signed_in_database().await,
        Arc::new(RecordingTelemetry::default()),
    );
    let orphan = sync
        .queue()
        .enqueue(QueuedMutation::create_task(
            Record::new().with_project(placeholder("local-gone-1")),
        ))
        .await
        .unwrap();
    sync.queue()
        .enqueue(QueuedMutation::create_task(Record::new().with_project(5u64)))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();

    assert_eq!(report.blocked, vec![orphan]);
    assert_eq!(report.attempted, 1);
    assert_eq!(received(&server).await.len(), 1);
    assert_eq!(json_body(&received(&server).await[0])["project_id"], json!(5));
}

#[tokio::test]
async fn test_task_id_confirms_parent_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTask"))
        .and(body_partial_json(json!({ "title": "parent" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": 11 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createTask"))
        .and(body_partial_json(json!({ "title": "child" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": "12" })))
        .mount(&server)
        .await;

    let parent = placeholder("local-t-1");
    let child = placeholder("local-t-2");
    let db = signed_in_database().await;
    let cache = CacheStore::new(db.clone());
    let tasks = CacheKey::Tasks(EntityId::Confirmed(5));

    let parent_body = Record::new()
        .with_id(parent.clone())
        .with_project(5u64)
        .with_field("title", "parent");
    let child_body = Record::new()
        .with_id(child.clone())
        .with_project(5u64)
        .with_parent_task(parent.clone())
        .with_field("title", "child");
    cache
        .write(&tasks, &[parent_body.clone(), child_body.clone()])
        .await
        .unwrap();

    let sync = synchronizer_for(&server, db, Arc::new(RecordingTelemetry::default()));
    sync.queue().enqueue(QueuedMutation::create_task(parent_body)).await.unwrap();
    sync.queue().enqueue(QueuedMutation::create_task(child_body)).await.unwrap();

    let report = sync.process_queue().await.unwrap();
    assert_eq!(report.confirmed, vec![(parent, 11), (child, 12)]);

    let requests = received(&server).await;
    assert_eq!(json_body(&requests[1])["parent_task_id"], json!(11));

    let cached = cache.read(&tasks).await.unwrap();
    assert_eq!(cached[0].id, Some(EntityId::Confirmed(11)));
    assert_eq!(cached[1].id, Some(EntityId::Confirmed(12)));
    assert_eq!(cached[1].parent_task_id, Some(EntityId::Confirmed(11)));
    assert_eq!(cached[1].fields["title"], json!("child"));
}

#[tokio::test]
async fn test_stored_token_fills_missing_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .and(header("Authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .and(header("Authorization", "Bearer explicit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let sync = synchronizer_for(
        &server,
        signed_in_database().await,
        Arc::new(RecordingTelemetry::default()),
    );
    sync.queue()
        .enqueue(QueuedMutation::create_team(Record::new()))
        .await
        .unwrap();
    sync.queue()
        .enqueue(QueuedMutation::create_team(Record::new()).with_bearer("explicit"))
        .await
        .unwrap();

    let report = sync.process_queue().await.unwrap();
    assert_eq!(report.succeeded.len(), 2);
}

#[tokio::test]
async fn test_second_pass_while_running_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTeam"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 1 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let sync = Arc::new(synchronizer_for(
        &server,
        signed_in_database().await,
        Arc::new(RecordingTelemetry::default()),
    ));
    sync.queue()
        .enqueue(QueuedMutation::create_team(Record::new()))
        .await
        .unwrap();

    let running = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move { sync.process_queue().await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !sync.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first pass never started");

    assert_matches!(sync.process_queue().await, Err(SyncError::PassInProgress));

    let report = assert_ok!(running.await.unwrap());
    assert_eq!(report.succeeded.len(), 1);
    assert!(!sync.is_running());
}

#[tokio::test]
async fn test_queue_survives_reopen() {
    let server = MockServer::start().await;
    mount_post(&server, "/createTeam", 200, json!({ "id": 5 })).await;

    let (dir, db) = file_database().await;
    let path = dir.path().join("local.db");
    {
        let sync = synchronizer_for(&server, db, Arc::new(RecordingTelemetry::default()));
        sync.queue()
            .enqueue(QueuedMutation::create_team(Record::new().with_id(placeholder("local-x-1"))))
            .await
            .unwrap();
    }

    let reopened = LocalDatabase::open(&path).await.unwrap();
    let sync = synchronizer_for(&server, reopened, Arc::new(RecordingTelemetry::default()));
    assert_eq!(sync.queue().len().await.unwrap(), 1);

    let report = sync.process_queue().await.unwrap();
    assert_eq!(report.confirmed, vec![(placeholder("local-x-1"), 5)]);
    assert!(sync.queue().is_empty().await.unwrap());
}
