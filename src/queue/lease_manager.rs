// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{AgentId, QueueEntry};
use crate::domain::repositories::match_queue_repository::MatchQueueRepository;
use crate::queue::error::QueueError;
use crate::utils::retry_policy::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, info};

/// 租约管理器
///
/// 以调用方代理的身份领取、续租和回收条目。
/// 所有存储操作都经过重试策略，重试耗尽时返回 `QueueError::RetriesExhausted`。
pub struct LeaseManager<R: MatchQueueRepository + ?Sized> {
    repository: Arc<R>,
    agent: AgentId,
    retry: RetryPolicy,
}

impl<R: MatchQueueRepository + ?Sized> LeaseManager<R> {
    /// 创建新的租约管理器实例
    ///
    /// # 参数
    ///
    /// * `repository` - 比赛队列仓库
    /// * `agent` - 调用方代理标识
    /// * `retry` - 存储操作重试策略
    pub fn new(repository: Arc<R>, agent: AgentId, retry: RetryPolicy) -> Self {
        Self {
            repository,
            agent,
            retry,
        }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// 领取最多 `limit` 个未分配条目，按 id 升序返回
    ///
    /// 条目不足 `limit` 个时返回较短的批次，这不是错误
    pub async fn claim_batch(&self, limit: u64) -> Result<Vec<QueueEntry>, QueueError> {
        let repository = &self.repository;
        let agent = &self.agent;

        let batch = self
            .retry
            .run("claim_batch", || repository.claim_batch(agent, limit))
            .await?;

        metrics::counter!("matchq_entries_claimed_total").increment(batch.len() as u64);
        debug!(agent = %self.agent, limit, claimed = batch.len(), "Claimed queue entries");
        Ok(batch)
    }

    /// 获取本代理已持有但尚未处理的条目
    pub async fn resume_leases(&self, limit: u64) -> Result<Vec<QueueEntry>, QueueError> {
        let repository = &self.repository;
        let agent = &self.agent;

        let entries = self
            .retry
            .run("resume_leases", || repository.resume_leases(agent, limit))
            .await?;

        if !entries.is_empty() {
            info!(agent = %self.agent, count = entries.len(), "Resuming held leases");
        }
        Ok(entries)
    }

    /// 续租，返回租约是否仍归本代理所有
    pub async fn renew_lease(&self, entry: &QueueEntry) -> Result<bool, QueueError> {
        let repository = &self.repository;
        let agent = &self.agent;
        let id = entry.id;

        Ok(self
            .retry
            .run("renew_lease", || repository.renew_lease(id, agent))
            .await?)
    }

    /// 删除已装载进内存的条目
    pub async fn take_leased(&self, entries: &[QueueEntry]) -> Result<u64, QueueError> {
        let repository = &self.repository;
        let agent = &self.agent;
        let ids: Vec<i32> = entries.iter().map(|e| e.id).collect();

        Ok(self
            .retry
            .run("take_leased", || repository.take_leased(&ids, agent))
            .await?)
    }

    /// 将最多 `limit` 个租约已过期的条目放回可领取状态
    pub async fn promote_stale(&self, limit: u64) -> Result<u64, QueueError> {
        let repository = &self.repository;

        let promoted = self
            .retry
            .run("promote_stale", || repository.promote_stale(limit))
            .await?;

        if promoted > 0 {
            metrics::counter!("matchq_leases_reclaimed_total").increment(promoted);
            info!(promoted, "Returned expired leases to the queue");
        }
        Ok(promoted)
    }
}
