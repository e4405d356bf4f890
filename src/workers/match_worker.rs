// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::QueueEntry;
use crate::domain::repositories::match_queue_repository::MatchQueueRepository;
use crate::engines::traits::{EngineError, MatchProcessor};
use crate::queue::prefetch_buffer::PrefetchBuffer;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument, warn};

/// 比赛工作器
///
/// 代理主循环：从预取缓冲区取出条目，交给比赛处理器，再取下一个。
/// 上一个条目在取下一个条目时才被确认；处理器报告致命错误时
/// 立即退出，该条目保持租约状态，不会被确认。
pub struct MatchWorker<R, P>
where
    R: MatchQueueRepository + 'static,
    P: MatchProcessor + 'static,
{
    buffer: Mutex<PrefetchBuffer<R>>,
    processor: Arc<P>,
}

impl<R, P> MatchWorker<R, P>
where
    R: MatchQueueRepository + 'static,
    P: MatchProcessor + 'static,
{
    pub fn new(buffer: PrefetchBuffer<R>, processor: Arc<P>) -> Self {
        Self {
            buffer: Mutex::new(buffer),
            processor,
        }
    }

    #[instrument(skip(self, entry), fields(id = entry.id, match_identifier = %entry.match_identifier))]
    async fn process_entry(&self, entry: &QueueEntry) -> Result<(), EngineError> {
        let result = self.processor.process(entry).await;
        let outcome = match &result {
            Ok(true) => "success",
            Ok(false) => "failure",
            Err(_) => "fatal",
        };
        metrics::counter!("matchq_entries_processed_total", "outcome" => outcome).increment(1);

        match result {
            Ok(true) => info!("Match processed"),
            Ok(false) => warn!("Match processing failed, moving on to the next entry"),
            Err(e) => {
                error!("Stopping before the entry is acknowledged: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R, P> Worker for MatchWorker<R, P>
where
    R: MatchQueueRepository + 'static,
    P: MatchProcessor + 'static,
{
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        let mut buffer = self.buffer.lock().await;
        info!(
            agent = %buffer.agent(),
            processor = self.processor.name(),
            "Match worker started"
        );

        while !*shutdown.borrow() {
            let entry = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = buffer.fetch_next_item() => next?,
            };

            self.process_entry(&entry).await?;
        }

        if let Some(entry) = buffer.acknowledge_pending().await? {
            info!(id = entry.id, "Acknowledged last entry before stopping");
        }
        info!(agent = %buffer.agent(), "Match worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "match_worker"
    }
}
