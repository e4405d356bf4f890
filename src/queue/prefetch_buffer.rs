// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QueueSettings;
use crate::domain::models::queue_entry::{AckMode, AgentId, QueueEntry};
use crate::domain::repositories::match_queue_repository::MatchQueueRepository;
use crate::queue::completion_tracker::CompletionTracker;
use crate::queue::error::QueueError;
use crate::queue::lease_manager::LeaseManager;
use crate::utils::retry_policy::RetryPolicy;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 内存预取缓冲区
///
/// 保存已租给本代理的一小批条目，减少每个条目的数据库往返。
/// 缓冲区为空时进入装载流程：安全窗口 → 恢复自身租约并领取新条目 →
/// 不足阈值时回收过期租约并重试一次 → 仍不足则报告饥饿。
pub struct PrefetchBuffer<R: MatchQueueRepository + ?Sized> {
    leases: LeaseManager<R>,
    tracker: CompletionTracker<R>,
    settings: QueueSettings,
    buffer: VecDeque<QueueEntry>,
    first_load: bool,
}

impl<R: MatchQueueRepository + ?Sized> PrefetchBuffer<R> {
    /// 创建新的预取缓冲区
    ///
    /// # 参数
    ///
    /// * `repository` - 比赛队列仓库
    /// * `agent` - 本代理标识
    /// * `settings` - 队列配置
    /// * `retry` - 存储操作重试策略
    pub fn new(
        repository: Arc<R>,
        agent: AgentId,
        settings: QueueSettings,
        retry: RetryPolicy,
    ) -> Self {
        let tracker = CompletionTracker::new(
            repository.clone(),
            agent.clone(),
            retry.clone(),
            settings.ack_mode,
        );
        Self {
            leases: LeaseManager::new(repository, agent, retry),
            tracker,
            settings,
            buffer: VecDeque::new(),
            first_load: true,
        }
    }

    pub fn agent(&self) -> &AgentId {
        self.leases.agent()
    }

    /// 缓冲区中尚未交出的条目数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 已交出但尚未确认的条目
    pub fn pending(&self) -> Option<&QueueEntry> {
        self.tracker.pending()
    }

    /// 获取下一个条目
    ///
    /// 先确认上一个交出的条目，再从缓冲区头部取出条目；
    /// 缓冲区为空时执行装载流程。交出前续租，租约已丢失的条目被跳过。
    ///
    /// # 返回值
    ///
    /// * `Ok(QueueEntry)` - 下一个要处理的条目
    /// * `Err(QueueError)` - 存储操作重试耗尽或队列饥饿，均为致命错误
    pub async fn fetch_next_item(&mut self) -> Result<QueueEntry, QueueError> {
        self.tracker.flush().await?;

        loop {
            if self.buffer.is_empty() {
                self.load().await?;
            }

            let Some(entry) = self.buffer.pop_front() else {
                return Err(QueueError::Starved {
                    claimed: 0,
                    required: 1,
                });
            };

            if self.settings.ack_mode == AckMode::OnLease {
                return Ok(entry);
            }

            if self.leases.renew_lease(&entry).await? {
                self.tracker.track(entry.clone());
                return Ok(entry);
            }

            warn!(
                id = entry.id,
                match_identifier = %entry.match_identifier,
                "Lease expired and was taken over, skipping entry"
            );
        }
    }

    /// 确认最后交出的条目，在代理正常停止时调用
    pub async fn acknowledge_pending(&mut self) -> Result<Option<QueueEntry>, QueueError> {
        self.tracker.flush().await
    }

    async fn load(&mut self) -> Result<(), QueueError> {
        let (limit, threshold) = if self.first_load {
            (
                self.settings.first_load_limit,
                self.settings.first_min_threshold,
            )
        } else {
            (self.settings.load_limit, self.settings.min_threshold)
        };

        let safety_delay = self.settings.safety_delay();
        if !safety_delay.is_zero() {
            info!(
                "Queue lock window open for {:?}, stop the agent now to abort safely",
                safety_delay
            );
            tokio::time::sleep(safety_delay).await;
            info!("Queue lock window closed, do not stop the agent");
        }
        tokio::time::sleep(self.settings.safety_grace()).await;

        let mut batch = self.collect(limit).await?;

        if batch.len() < threshold {
            warn!(
                claimed = batch.len(),
                threshold, "Not enough claimable entries, replenishing queue"
            );
            self.leases
                .promote_stale(self.settings.replenish_limit)
                .await?;
            batch = self.collect(limit).await?;

            if batch.len() < threshold {
                error!(
                    claimed = batch.len(),
                    threshold, "Queue is starved after replenishment"
                );
                return Err(QueueError::Starved {
                    claimed: batch.len(),
                    required: threshold,
                });
            }
        }

        if self.settings.ack_mode == AckMode::OnLease {
            self.leases.take_leased(&batch).await?;
        }

        info!(
            loaded = batch.len(),
            first_load = self.first_load,
            "Loaded entries into the prefetch buffer"
        );
        self.first_load = false;
        self.buffer.extend(batch);
        Ok(())
    }

    /// 先恢复本代理已持有的租约，再领取新条目补足 `limit`
    async fn collect(&self, limit: u64) -> Result<Vec<QueueEntry>, QueueError> {
        let mut batch = self.leases.resume_leases(limit).await?;
        let remaining = limit.saturating_sub(batch.len() as u64);
        if remaining > 0 {
            batch.extend(self.leases.claim_batch(remaining).await?);
        }
        batch.sort_by_key(|entry| entry.id);
        Ok(batch)
    }
}
