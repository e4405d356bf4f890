// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::match_record::MatchRecord;
use crate::domain::models::queue_entry::AgentId;
use crate::domain::repositories::match_queue_repository::RepositoryError;
use async_trait::async_trait;

/// 已完成比赛仓库特质
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// 保存比赛及全部选手数据
    ///
    /// 在一个事务中写入，任意一行失败都会整体回滚。
    /// 比赛已存在时返回 `Ok(false)`。
    async fn save_match(&self, record: &MatchRecord, agent: &AgentId)
        -> Result<bool, RepositoryError>;

    /// 检查比赛是否已保存
    async fn exists(&self, match_id: &str) -> Result<bool, RepositoryError>;

    /// 统计某场比赛保存的选手行数
    async fn count_players(&self, match_id: &str) -> Result<u64, RepositoryError>;
}
