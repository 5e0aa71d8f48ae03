//! Tests for the migration controller.

use super::*;
use crate::error::Error;
use crate::events::RecordingEvents;
use crate::fakes::{recovering, FakeAdmin};

fn fast_poll(max_attempts: u32) -> PollConfig {
    PollConfig {
        interval_secs: 0,
        max_attempts,
    }
}

#[tokio::test]
async fn test_migrate_runs_steps_in_order() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 250);
    let relocation = RelocationConfig::default();
    let poll = fast_poll(5);
    let mut events = RecordingEvents::new();

    // Act
    let migrated = MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await
        .unwrap();

    // Assert
    assert_eq!(migrated.handle.name(), "logs");
    assert_eq!(migrated.handle.uuid(), "u-1");
    assert_eq!(migrated.doc_count, 250);
    assert_eq!(
        admin.calls(),
        vec![
            "open_index",
            "force_merge",
            "update_settings",
            "active_recoveries",
            "index_uuid",
            "doc_count"
        ]
    );
    assert!(events.events().contains(&PipelineEvent::RoutingUpdated {
        index: "logs".to_string(),
        key: "index.routing.allocation.require.eswire".to_string(),
        value: "yup".to_string(),
    }));
}

#[tokio::test]
async fn test_migrate_polls_until_settled() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 10).with_recoveries(vec![
        recovering("logs", &[0, 1]),
        recovering("logs", &[1]),
        recovering("logs", &[]),
    ]);
    let relocation = RelocationConfig::default();
    let poll = fast_poll(10);
    let mut events = RecordingEvents::new();

    // Act
    MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await
        .unwrap();

    // Assert
    assert_eq!(admin.count("active_recoveries"), 3);
    let pending: Vec<usize> = events
        .events()
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::RecoveryPending { active, .. } => Some(*active),
            _ => None,
        })
        .collect();
    assert_eq!(pending, vec![2, 1]);
    assert!(events.events().contains(&PipelineEvent::RecoverySettled {
        index: "logs".to_string(),
        attempts: 3,
    }));
}

#[tokio::test]
async fn test_migrate_times_out_when_never_settled() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 10).with_recoveries(vec![
        recovering("logs", &[0]),
        recovering("logs", &[0]),
        recovering("logs", &[0]),
        recovering("logs", &[0]),
    ]);
    let relocation = RelocationConfig::default();
    let poll = fast_poll(3);
    let mut events = RecordingEvents::new();

    // Act
    let result = MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await;

    // Assert
    assert!(matches!(result, Err(Error::Timeout { attempts: 3, .. })));
    assert_eq!(admin.count("active_recoveries"), 3);
    assert_eq!(admin.count("index_uuid"), 0);
}

#[tokio::test]
async fn test_explicit_reroute_follows_settings() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 0);
    let relocation = RelocationConfig {
        explicit_reroute: true,
        ..Default::default()
    };
    let poll = fast_poll(1);
    let mut events = RecordingEvents::new();

    // Act
    MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await
        .unwrap();

    // Assert
    let calls = admin.calls();
    assert_eq!(calls[2], "update_settings");
    assert_eq!(calls[3], "reroute");
    assert!(events.events().contains(&PipelineEvent::RerouteIssued));
}

#[tokio::test]
async fn test_open_failure_is_fatal_without_retry() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 0).failing_on("open_index");
    let relocation = RelocationConfig::default();
    let poll = fast_poll(5);
    let mut events = RecordingEvents::new();

    // Act
    let result = MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await;

    // Assert
    assert!(matches!(result, Err(Error::Cluster(_))));
    assert_eq!(admin.calls(), vec!["open_index"]);
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn test_force_merge_failure_stops_before_relocation() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 0).failing_on("force_merge");
    let relocation = RelocationConfig::default();
    let poll = fast_poll(5);
    let mut events = RecordingEvents::new();

    // Act
    let result = MigrationController::new(&admin, &relocation, &poll)
        .migrate("logs", &mut events)
        .await;

    // Assert
    assert!(result.is_err());
    assert_eq!(admin.count("update_settings"), 0);
}

#[tokio::test]
async fn test_close_for_read() {
    // Arrange
    let admin = FakeAdmin::new("u-1", 0);
    let handle = IndexHandle::new("logs", "u-1");
    let mut events = RecordingEvents::new();

    // Act
    let closed = close_for_read(&admin, &handle, &mut events).await.unwrap();

    // Assert
    assert_eq!(closed.handle().uuid(), "u-1");
    assert_eq!(admin.calls(), vec!["close_index"]);
    assert_eq!(
        events.events(),
        &[PipelineEvent::IndexClosed {
            index: "logs".to_string()
        }]
    );
}
