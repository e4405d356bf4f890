// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    agent, match_json, provider_settings, queue_repo, queue_settings, seed, setup_db,
};
use matchq::config::settings::QueueSettings;
use matchq::domain::repositories::match_queue_repository::MatchQueueRepository;
use matchq::domain::repositories::match_repository::MatchRepository;
use matchq::engines::opendota::OpenDotaProcessor;
use matchq::engines::traits::EngineError;
use matchq::infrastructure::repositories::match_repo_impl::MatchRepositoryImpl;
use matchq::queue::prefetch_buffer::PrefetchBuffer;
use matchq::queue::QueueError;
use matchq::utils::errors::WorkerError;
use matchq::utils::retry_policy::RetryPolicy;
use matchq::workers::match_worker::MatchWorker;
use matchq::workers::Worker;
use std::sync::Arc;
use tokio::sync::watch;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[tokio::test]
async fn test_worker_drains_queue_until_starved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/matches/\d+$"))
        .respond_with(|request: &Request| {
            let match_id: u64 = request
                .url
                .path()
                .rsplit('/')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            ResponseTemplate::new(200).set_body_json(match_json(match_id, 0))
        })
        .expect(3)
        .mount(&server)
        .await;

    let db = setup_db().await;
    let repo = queue_repo(&db);
    let identifiers = vec![
        "7512345600".to_string(),
        "7512345601".to_string(),
        "7512345602".to_string(),
    ];
    repo.enqueue_unique(&identifiers).await.unwrap();

    let matches = Arc::new(MatchRepositoryImpl::new(db.clone()));
    let processor = OpenDotaProcessor::new(
        &provider_settings(&server.uri()),
        None,
        matches.clone(),
        agent("A"),
    )
    .unwrap();
    let settings = QueueSettings {
        min_threshold: 1,
        ..queue_settings()
    };
    let buffer = PrefetchBuffer::new(repo.clone(), agent("A"), settings, RetryPolicy::immediate(5));
    let worker = MatchWorker::new(buffer, Arc::new(processor));

    let (_tx, rx) = watch::channel(false);
    let result = worker.run(rx).await;

    assert!(matches!(
        result,
        Err(WorkerError::Queue(QueueError::Starved { claimed: 0, .. }))
    ));
    assert_eq!(repo.stats().await.unwrap().processed, 3);
    for identifier in &identifiers {
        assert!(matches.exists(identifier).await.unwrap());
    }
}

#[tokio::test]
async fn test_worker_stops_on_shutdown_signal() {
    let server = MockServer::start().await;
    let db = setup_db().await;
    let repo = queue_repo(&db);
    let matches = Arc::new(MatchRepositoryImpl::new(db.clone()));
    let processor = OpenDotaProcessor::new(
        &provider_settings(&server.uri()),
        None,
        matches,
        agent("A"),
    )
    .unwrap();
    let buffer = PrefetchBuffer::new(repo.clone(), agent("A"), queue_settings(), RetryPolicy::immediate(5));
    let worker = MatchWorker::new(buffer, Arc::new(processor));

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    assert!(worker.run(rx).await.is_ok());
    assert_eq!(repo.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_quota_exhaustion_stops_before_acknowledging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup_db().await;
    let repo = queue_repo(&db);
    seed(&repo, 6).await;
    let matches = Arc::new(MatchRepositoryImpl::new(db.clone()));
    let processor = OpenDotaProcessor::new(
        &provider_settings(&server.uri()),
        None,
        matches.clone(),
        agent("A"),
    )
    .unwrap();
    let buffer = PrefetchBuffer::new(repo.clone(), agent("A"), queue_settings(), RetryPolicy::immediate(5));
    let worker = MatchWorker::new(buffer, Arc::new(processor));

    let (_tx, rx) = watch::channel(false);
    let result = worker.run(rx).await;

    assert!(matches!(
        result,
        Err(WorkerError::Engine(EngineError::QuotaExhausted))
    ));
    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.leased, 1);

    // the held entry is picked up again by the next run of the same agent
    let resumed = repo.resume_leases(&agent("A"), 10).await.unwrap();
    assert_eq!(resumed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
}
