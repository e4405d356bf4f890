// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{AckMode, AgentId, QueueEntry};
use crate::domain::repositories::match_queue_repository::MatchQueueRepository;
use crate::queue::error::QueueError;
use crate::utils::retry_policy::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, warn};

/// 完成追踪器
///
/// 延迟确认：条目交给处理函数时只记录为待确认，
/// 直到请求下一个条目时才把它标记为已处理。
pub struct CompletionTracker<R: MatchQueueRepository + ?Sized> {
    repository: Arc<R>,
    agent: AgentId,
    retry: RetryPolicy,
    ack_mode: AckMode,
    pending: Option<QueueEntry>,
}

impl<R: MatchQueueRepository + ?Sized> CompletionTracker<R> {
    pub fn new(repository: Arc<R>, agent: AgentId, retry: RetryPolicy, ack_mode: AckMode) -> Self {
        Self {
            repository,
            agent,
            retry,
            ack_mode,
            pending: None,
        }
    }

    /// 当前待确认的条目
    pub fn pending(&self) -> Option<&QueueEntry> {
        self.pending.as_ref()
    }

    /// 记录刚交给处理函数的条目
    pub fn track(&mut self, entry: QueueEntry) {
        if let Some(previous) = self.pending.replace(entry) {
            warn!(
                id = previous.id,
                "Tracking a new entry before the previous one was acknowledged"
            );
        }
    }

    /// 标记条目已处理
    ///
    /// 返回 `false` 表示条目已不归本代理所有（租约被回收或已确认过）。
    /// 租用即移除模式下条目行已删除，此操作不做任何事。
    pub async fn mark_processed(&self, entry: &QueueEntry) -> Result<bool, QueueError> {
        if self.ack_mode == AckMode::OnLease {
            return Ok(true);
        }

        let repository = &self.repository;
        let agent = &self.agent;
        let id = entry.id;

        let acknowledged = self
            .retry
            .run("mark_processed", || repository.mark_processed(id, agent))
            .await?;

        if acknowledged {
            debug!(id, match_identifier = %entry.match_identifier, "Entry marked processed");
        } else {
            warn!(
                id,
                match_identifier = %entry.match_identifier,
                "Lease was lost before the entry could be acknowledged"
            );
        }
        Ok(acknowledged)
    }

    /// 确认待确认的条目
    ///
    /// 确认失败时条目保留为待确认，下次调用会再次尝试
    pub async fn flush(&mut self) -> Result<Option<QueueEntry>, QueueError> {
        let Some(entry) = self.pending.as_ref() else {
            return Ok(None);
        };

        self.mark_processed(entry).await?;
        Ok(self.pending.take())
    }
}
