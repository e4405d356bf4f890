// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::match_record::MatchRecord;
use crate::domain::models::queue_entry::AgentId;
use crate::domain::repositories::match_queue_repository::RepositoryError;
use crate::domain::repositories::match_repository::MatchRepository;
use crate::infrastructure::database::entities::{match_players, matches};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::warn;

/// 已完成比赛仓库实现
#[derive(Clone)]
pub struct MatchRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl MatchRepositoryImpl {
    /// 创建新的比赛仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatchRepository for MatchRepositoryImpl {
    async fn save_match(
        &self,
        record: &MatchRecord,
        agent: &AgentId,
    ) -> Result<bool, RepositoryError> {
        if self.exists(&record.match_id).await? {
            return Ok(false);
        }

        let now: DateTime<FixedOffset> = Utc::now().into();
        let txn = self.db.begin().await?;

        let header = matches::ActiveModel {
            id: Set(record.match_id.clone()),
            start_time: Set(record.start_time),
            radiant_win: Set(record.radiant_win),
            duration: Set(record.duration),
            radiant_score: Set(record.radiant_score),
            dire_score: Set(record.dire_score),
            average_rank_tier: Set(record.average_rank_tier),
            agent: Set(agent.as_str().to_string()),
            created_at: Set(now),
        };

        if let Err(e) = matches::Entity::insert(header)
            .exec_without_returning(&txn)
            .await
        {
            txn.rollback().await?;
            return Err(e.into());
        }

        for player in &record.players {
            let row = match_players::ActiveModel {
                match_id: Set(record.match_id.clone()),
                player_slot: Set(player.player_slot),
                account_id: Set(player.account_id),
                hero_id: Set(player.hero_id),
                is_radiant: Set(player.is_radiant),
                kills: Set(player.kills),
                deaths: Set(player.deaths),
                assists: Set(player.assists),
                gold_per_min: Set(player.gold_per_min),
                xp_per_min: Set(player.xp_per_min),
                rank_tier: Set(player.rank_tier),
                ..Default::default()
            };

            if let Err(e) = match_players::Entity::insert(row)
                .exec_without_returning(&txn)
                .await
            {
                warn!(
                    match_id = %record.match_id,
                    player_slot = player.player_slot,
                    "Failed to insert player row, rolling back match: {}",
                    e
                );
                txn.rollback().await?;
                return Err(e.into());
            }
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn exists(&self, match_id: &str) -> Result<bool, RepositoryError> {
        let count = matches::Entity::find()
            .filter(matches::Column::Id.eq(match_id))
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn count_players(&self, match_id: &str) -> Result<u64, RepositoryError> {
        let count = match_players::Entity::find()
            .filter(match_players::Column::MatchId.eq(match_id))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
