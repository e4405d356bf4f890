// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{AgentId, EnqueueReport, QueueEntry, QueueStats};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 比赛队列仓库特质
///
/// 定义持久化队列的数据访问接口。每个会修改租约状态的操作
/// 都是单条原子写语句，并对候选行加排他锁。
#[async_trait]
pub trait MatchQueueRepository: Send + Sync {
    /// 批量入队
    ///
    /// 已存在于队列或已完成比赛表中的标识会被跳过，不会产生重复行
    async fn enqueue_unique(&self, identifiers: &[String])
        -> Result<EnqueueReport, RepositoryError>;

    /// 为代理租用最多 `limit` 个未分配条目，按 id 升序返回
    async fn claim_batch(
        &self,
        agent: &AgentId,
        limit: u64,
    ) -> Result<Vec<QueueEntry>, RepositoryError>;

    /// 获取代理已持有但尚未处理的条目，按 id 升序返回
    async fn resume_leases(
        &self,
        agent: &AgentId,
        limit: u64,
    ) -> Result<Vec<QueueEntry>, RepositoryError>;

    /// 续租，只有条目仍由该代理持有且未处理时才成功
    async fn renew_lease(&self, id: i32, agent: &AgentId) -> Result<bool, RepositoryError>;

    /// 标记条目已处理，只有条目仍由该代理持有时才成功
    async fn mark_processed(&self, id: i32, agent: &AgentId) -> Result<bool, RepositoryError>;

    /// 删除代理已装载进内存的条目（租用即移除模式）
    async fn take_leased(&self, ids: &[i32], agent: &AgentId) -> Result<u64, RepositoryError>;

    /// 将最多 `limit` 个租约已过期且未处理的条目放回可领取状态
    async fn promote_stale(&self, limit: u64) -> Result<u64, RepositoryError>;

    /// 根据ID查找条目
    async fn find_by_id(&self, id: i32) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 队列统计
    async fn stats(&self) -> Result<QueueStats, RepositoryError>;
}
