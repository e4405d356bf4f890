// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{agent, expired_lease_repo, queue_repo, queue_settings, seed, setup_db};
use matchq::config::settings::QueueSettings;
use matchq::domain::models::queue_entry::{AckMode, EntryState};
use matchq::domain::repositories::match_queue_repository::MatchQueueRepository;
use matchq::infrastructure::database::entities::match_queue;
use matchq::infrastructure::repositories::match_queue_repo_impl::MatchQueueRepositoryImpl;
use matchq::queue::prefetch_buffer::PrefetchBuffer;
use matchq::queue::QueueError;
use matchq::utils::retry_policy::RetryPolicy;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;

fn buffer(
    repo: &Arc<MatchQueueRepositoryImpl>,
    name: &str,
    settings: QueueSettings,
) -> PrefetchBuffer<MatchQueueRepositoryImpl> {
    PrefetchBuffer::new(repo.clone(), agent(name), settings, RetryPolicy::immediate(5))
}

#[tokio::test]
async fn test_first_load_claims_a_single_entry() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 10).await;
    let mut buffer = buffer(&repo, "A", queue_settings());

    let first = buffer.fetch_next_item().await.unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(buffer.buffered(), 0);
    assert_eq!(repo.stats().await.unwrap().leased, 1);

    let second = buffer.fetch_next_item().await.unwrap();
    assert_eq!(second.id, 2);
    assert_eq!(buffer.buffered(), 8);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.leased, 9);
}

#[tokio::test]
async fn test_previous_entry_is_acknowledged_on_next_fetch() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 5).await;
    let settings = QueueSettings {
        first_load_limit: 5,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    let e1 = buffer.fetch_next_item().await.unwrap();
    let stored = repo.find_by_id(e1.id).await.unwrap().unwrap();
    assert!(!stored.is_processed);
    assert_eq!(buffer.pending().map(|e| e.id), Some(e1.id));

    let e2 = buffer.fetch_next_item().await.unwrap();
    assert!(repo.find_by_id(e1.id).await.unwrap().unwrap().is_processed);
    assert!(!repo.find_by_id(e2.id).await.unwrap().unwrap().is_processed);

    let e3 = buffer.fetch_next_item().await.unwrap();
    assert!(repo.find_by_id(e2.id).await.unwrap().unwrap().is_processed);
    assert!(!repo.find_by_id(e3.id).await.unwrap().unwrap().is_processed);
    assert_eq!((e1.id, e2.id, e3.id), (1, 2, 3));

    let last = buffer.acknowledge_pending().await.unwrap().unwrap();
    assert_eq!(last.id, e3.id);
    assert!(repo.find_by_id(e3.id).await.unwrap().unwrap().is_processed);
}

#[tokio::test]
async fn test_starved_queue_is_fatal() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 2).await;
    let settings = QueueSettings {
        first_load_limit: 30,
        first_min_threshold: 5,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    let err = buffer.fetch_next_item().await.unwrap_err();

    assert!(matches!(
        err,
        QueueError::Starved {
            claimed: 2,
            required: 5
        }
    ));
    assert_eq!(buffer.buffered(), 0);
}

#[tokio::test]
async fn test_empty_queue_fails_fast_on_first_load() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let mut buffer = buffer(&repo, "A", queue_settings());

    let err = buffer.fetch_next_item().await.unwrap_err();

    assert!(matches!(
        err,
        QueueError::Starved {
            claimed: 0,
            required: 1
        }
    ));
}

#[tokio::test]
async fn test_replenishment_recovers_expired_leases() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 5).await;
    crashed.claim_batch(&agent("crashed"), 4).await.unwrap();

    let settings = QueueSettings {
        first_load_limit: 30,
        first_min_threshold: 5,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    let first = buffer.fetch_next_item().await.unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(buffer.buffered(), 4);
    assert!(repo.resume_leases(&agent("crashed"), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restarted_agent_resumes_its_leases() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 4).await;
    repo.claim_batch(&agent("A"), 2).await.unwrap();
    repo.claim_batch(&agent("B"), 1).await.unwrap();

    let settings = QueueSettings {
        first_load_limit: 3,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    let ids = vec![
        buffer.fetch_next_item().await.unwrap().id,
        buffer.fetch_next_item().await.unwrap().id,
        buffer.fetch_next_item().await.unwrap().id,
    ];

    assert_eq!(ids, vec![1, 2, 4]);
}

#[tokio::test]
async fn test_lost_lease_is_skipped() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 3).await;
    let settings = QueueSettings {
        first_load_limit: 3,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    assert_eq!(buffer.fetch_next_item().await.unwrap().id, 1);

    // entry 2 is taken over by another agent while it sits in the buffer
    match_queue::Entity::update_many()
        .col_expr(match_queue::Column::Agent, Expr::value(Some("B".to_string())))
        .filter(match_queue::Column::Id.eq(2))
        .exec(db.as_ref())
        .await
        .unwrap();

    assert_eq!(buffer.fetch_next_item().await.unwrap().id, 3);
    let taken = repo.find_by_id(2).await.unwrap().unwrap();
    assert_eq!(taken.agent.as_deref(), Some("B"));
    assert_eq!(taken.state(), EntryState::Leased);
}

#[tokio::test]
async fn test_on_lease_mode_removes_rows_when_loaded() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 4).await;
    let settings = QueueSettings {
        first_load_limit: 3,
        ack_mode: AckMode::OnLease,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "A", settings);

    let first = buffer.fetch_next_item().await.unwrap();
    assert_eq!(first.id, 1);
    assert!(buffer.pending().is_none());

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.unassigned, 1);

    assert_eq!(buffer.fetch_next_item().await.unwrap().id, 2);
    assert!(buffer.acknowledge_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn test_on_lease_recovers_rows_left_by_interrupted_load() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 3).await;
    // claimed but never removed, as if the agent died before take_leased
    crashed.claim_batch(&agent("crashed"), 3).await.unwrap();

    let settings = QueueSettings {
        first_load_limit: 3,
        ack_mode: AckMode::OnLease,
        ..queue_settings()
    };
    let mut buffer = buffer(&repo, "B", settings);

    assert_eq!(buffer.fetch_next_item().await.unwrap().id, 1);
    assert_eq!(buffer.buffered(), 2);
    assert_eq!(repo.stats().await.unwrap().total, 0);
}
