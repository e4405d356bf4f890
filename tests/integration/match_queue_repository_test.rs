// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    agent, expired_lease_repo, identifiers, queue_repo, sample_record, seed, setup_db,
    setup_file_db,
};
use futures::future::join_all;
use matchq::domain::models::queue_entry::{EntryState, QueueStats};
use matchq::domain::repositories::match_queue_repository::MatchQueueRepository;
use matchq::domain::repositories::match_repository::MatchRepository;
use matchq::infrastructure::repositories::match_repo_impl::MatchRepositoryImpl;
use matchq::queue::error::QueueError;
use matchq::queue::lease_manager::LeaseManager;
use matchq::utils::retry_policy::RetryPolicy;
use std::collections::HashSet;

#[tokio::test]
async fn test_claim_batch_takes_lowest_ids_then_remainder() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 3).await;

    let batch_a = repo.claim_batch(&agent("A"), 2).await.unwrap();
    assert_eq!(batch_a.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    for entry in &batch_a {
        assert!(entry.is_assigned);
        assert_eq!(entry.agent.as_deref(), Some("A"));
        assert!(entry.lease_expires_at.is_some());
        assert_eq!(entry.state(), EntryState::Leased);
    }

    let batch_b = repo.claim_batch(&agent("B"), 2).await.unwrap();
    assert_eq!(batch_b.len(), 1);
    assert_eq!(batch_b[0].id, 3);
    assert_eq!(batch_b[0].agent.as_deref(), Some("B"));

    let batch_c = repo.claim_batch(&agent("C"), 2).await.unwrap();
    assert!(batch_c.is_empty());
}

#[tokio::test]
async fn test_claim_batch_is_ordered_by_insertion() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let identifiers = seed(&repo, 10).await;

    let first = repo.claim_batch(&agent("A"), 4).await.unwrap();
    let second = repo.claim_batch(&agent("A"), 4).await.unwrap();

    let ids: Vec<i32> = first.iter().chain(second.iter()).map(|e| e.id).collect();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    assert_eq!(first[0].match_identifier, identifiers[0]);
}

#[tokio::test]
async fn test_concurrent_claims_never_overlap() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 50).await;

    let agents: Vec<_> = (0..5).map(|i| agent(&format!("agent-{}", i))).collect();
    let batches = join_all(agents.iter().map(|a| {
        let repo = repo.clone();
        async move { repo.claim_batch(a, 7).await.unwrap() }
    }))
    .await;

    let mut seen = HashSet::new();
    for (batch, owner) in batches.iter().zip(&agents) {
        assert_eq!(batch.len(), 7);
        for entry in batch {
            assert!(seen.insert(entry.id), "entry {} claimed twice", entry.id);
            assert_eq!(entry.agent.as_deref(), Some(owner.as_str()));
            assert_eq!(entry.state(), EntryState::Leased);
        }
    }
    assert_eq!(seen.len(), 35);
    assert_eq!(repo.stats().await.unwrap().unassigned, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_across_connections_are_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir.path().join("queue.db"), 8).await;
    let repo = queue_repo(&db);
    seed(&repo, 200).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let leases = LeaseManager::new(
                repo.clone(),
                agent(&format!("agent-{}", i)),
                RetryPolicy::immediate(1),
            );
            tokio::spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    let batch = leases.claim_batch(5).await?;
                    if batch.is_empty() {
                        return Ok::<_, QueueError>(claimed);
                    }
                    for entry in batch {
                        assert_eq!(entry.agent.as_deref(), Some(leases.agent().as_str()));
                        claimed.push(entry.id);
                    }
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in join_all(handles).await {
        let claimed = handle.unwrap().expect("claim failed under contention");
        for id in claimed {
            assert!(seen.insert(id), "entry {} claimed twice", id);
        }
    }

    assert_eq!(seen.len(), 200);
    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.leased, 200);
    assert_eq!(stats.unassigned, 0);
}

#[tokio::test]
async fn test_enqueue_handles_batches_above_parameter_limit() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let ids = seed(&repo, 12_000).await;

    let again = repo.enqueue_unique(&identifiers(12_001)).await.unwrap();
    assert_eq!(again.inserted, 1);
    assert_eq!(again.skipped.len(), 12_000);
    assert_eq!(again.skipped[11_999], ids[11_999]);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 12_001);
    assert_eq!(stats.unassigned, 12_001);
}

#[tokio::test]
async fn test_enqueue_skips_links_to_completed_matches() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let matches = MatchRepositoryImpl::new(db.clone());
    matches
        .save_match(&sample_record("7512345678"), &agent("A"))
        .await
        .unwrap();

    let link = "https://www.opendota.com/matches/7512345678".to_string();
    let report = repo
        .enqueue_unique(&[link.clone(), "7512345679".to_string()])
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, vec![link]);
}

#[tokio::test]
async fn test_duplicate_enqueue_is_skipped() {
    let db = setup_db().await;
    let repo = queue_repo(&db);

    let first = repo
        .enqueue_unique(&["7512345678".to_string(), "7512345678".to_string()])
        .await
        .unwrap();
    assert_eq!(first.inserted, 1);

    let second = repo
        .enqueue_unique(&["7512345678".to_string()])
        .await
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, vec!["7512345678".to_string()]);
    assert_eq!(repo.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn test_enqueue_skips_completed_matches() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let matches = MatchRepositoryImpl::new(db.clone());
    matches
        .save_match(&sample_record("7512345678"), &agent("A"))
        .await
        .unwrap();

    let report = repo
        .enqueue_unique(&["7512345678".to_string(), "7512345679".to_string()])
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, vec!["7512345678".to_string()]);
    let claimed = repo.claim_batch(&agent("A"), 5).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].match_identifier, "7512345679");
}

#[tokio::test]
async fn test_mark_processed_requires_lease_owner() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 2).await;
    let entry = repo.claim_batch(&agent("A"), 1).await.unwrap().remove(0);

    assert!(!repo.mark_processed(entry.id, &agent("B")).await.unwrap());
    assert!(repo.mark_processed(entry.id, &agent("A")).await.unwrap());
    assert!(!repo.mark_processed(entry.id, &agent("A")).await.unwrap());

    let stored = repo.find_by_id(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.state(), EntryState::Processed);

    // processed entries are never handed out again
    let next = repo.claim_batch(&agent("B"), 5).await.unwrap();
    assert_eq!(next.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_promote_stale_returns_expired_leases() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 3).await;
    crashed.claim_batch(&agent("crashed"), 3).await.unwrap();

    assert_eq!(repo.promote_stale(2).await.unwrap(), 2);

    for id in [1, 2] {
        let entry = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(entry.state(), EntryState::Unassigned);
        assert!(entry.agent.is_none());
        assert!(entry.lease_expires_at.is_none());
    }
    let still_held = repo.find_by_id(3).await.unwrap().unwrap();
    assert_eq!(still_held.agent.as_deref(), Some("crashed"));

    let batch = repo.claim_batch(&agent("B"), 5).await.unwrap();
    assert_eq!(batch.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);

    assert_eq!(repo.promote_stale(10).await.unwrap(), 1);
}

#[tokio::test]
async fn test_promote_stale_keeps_live_and_processed_entries() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 3).await;

    repo.claim_batch(&agent("A"), 1).await.unwrap();
    let expired = crashed.claim_batch(&agent("B"), 1).await.unwrap().remove(0);
    crashed.mark_processed(expired.id, &agent("B")).await.unwrap();

    assert_eq!(repo.promote_stale(10).await.unwrap(), 0);
    assert_eq!(
        repo.stats().await.unwrap(),
        QueueStats {
            total: 3,
            unassigned: 1,
            leased: 1,
            processed: 1,
        }
    );
}

#[tokio::test]
async fn test_renew_lease_fails_after_takeover() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 1).await;

    let entry = crashed.claim_batch(&agent("A"), 1).await.unwrap().remove(0);
    assert_eq!(repo.promote_stale(1).await.unwrap(), 1);
    repo.claim_batch(&agent("B"), 1).await.unwrap();

    assert!(!repo.renew_lease(entry.id, &agent("A")).await.unwrap());
    assert!(repo.renew_lease(entry.id, &agent("B")).await.unwrap());
    assert!(!repo.mark_processed(entry.id, &agent("A")).await.unwrap());
}

#[tokio::test]
async fn test_renew_lease_extends_expiry() {
    let db = setup_db().await;
    let crashed = expired_lease_repo(&db);
    let repo = queue_repo(&db);
    seed(&repo, 1).await;

    let entry = crashed.claim_batch(&agent("A"), 1).await.unwrap().remove(0);
    assert!(repo.renew_lease(entry.id, &agent("A")).await.unwrap());

    let renewed = repo.find_by_id(entry.id).await.unwrap().unwrap();
    assert!(renewed.lease_expires_at > entry.lease_expires_at);
    assert_eq!(repo.promote_stale(1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_resume_leases_returns_own_unprocessed_entries() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 5).await;

    let own = repo.claim_batch(&agent("A"), 3).await.unwrap();
    repo.claim_batch(&agent("B"), 2).await.unwrap();
    repo.mark_processed(own[0].id, &agent("A")).await.unwrap();

    let resumed = repo.resume_leases(&agent("A"), 10).await.unwrap();
    assert_eq!(resumed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(repo.resume_leases(&agent("A"), 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_take_leased_removes_only_own_rows() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 3).await;

    let own = repo.claim_batch(&agent("A"), 2).await.unwrap();
    let ids: Vec<i32> = own.iter().map(|e| e.id).chain([3]).collect();

    assert_eq!(repo.take_leased(&ids, &agent("A")).await.unwrap(), 2);
    assert!(repo.find_by_id(1).await.unwrap().is_none());
    assert!(repo.find_by_id(3).await.unwrap().is_some());
    assert_eq!(repo.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn test_zero_limits_are_noops() {
    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 2).await;

    assert!(repo.claim_batch(&agent("A"), 0).await.unwrap().is_empty());
    assert_eq!(repo.promote_stale(0).await.unwrap(), 0);
    assert_eq!(repo.enqueue_unique(&[]).await.unwrap().inserted, 0);
    assert_eq!(repo.stats().await.unwrap().unassigned, 2);
}
