// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::match_record::canonical_match_id;
use crate::domain::models::queue_entry::{AgentId, EnqueueReport, QueueEntry, QueueStats};
use crate::domain::repositories::match_queue_repository::{MatchQueueRepository, RepositoryError};
use crate::infrastructure::database::entities::{match_queue, matches};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType, OnConflict},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, Set,
};
use std::collections::HashSet;
use std::sync::Arc;

/// 单次入队查询和插入处理的标识数，低于 SQLite 与 Postgres 的绑定参数上限
const ENQUEUE_CHUNK_SIZE: usize = 500;

/// 比赛队列仓库实现
///
/// 基于SeaORM实现的持久化队列。领取和回收都是单条
/// `UPDATE ... WHERE id IN (SELECT ... FOR UPDATE SKIP LOCKED)` 语句，
/// 外层条件再次校验行状态。SQLite 没有行锁，单条写语句一开始就持有
/// 写锁，并发领取在忙等待后依次执行，不会出现读锁升级的死锁。
#[derive(Clone)]
pub struct MatchQueueRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
    /// 租约有效期
    lease_ttl: Duration,
}

impl MatchQueueRepositoryImpl {
    /// 创建新的比赛队列仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    /// * `lease_ttl` - 租约有效期
    ///
    /// # 返回值
    ///
    /// 返回新的比赛队列仓库实例
    pub fn new(db: Arc<DatabaseConnection>, lease_ttl: Duration) -> Self {
        Self { db, lease_ttl }
    }

    fn now() -> DateTime<FixedOffset> {
        Utc::now().into()
    }

    fn lease_deadline(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        now + self.lease_ttl
    }
}

impl From<match_queue::Model> for QueueEntry {
    fn from(model: match_queue::Model) -> Self {
        Self {
            id: model.id,
            match_identifier: model.match_identifier,
            is_assigned: model.is_assigned,
            agent: model.agent,
            is_processed: model.is_processed,
            leased_at: model.leased_at,
            lease_expires_at: model.lease_expires_at,
            created_at: model.created_at,
        }
    }
}

/// 去掉空白和重复的标识，保持原始顺序
fn normalize_identifiers(identifiers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl MatchQueueRepository for MatchQueueRepositoryImpl {
    async fn enqueue_unique(
        &self,
        identifiers: &[String],
    ) -> Result<EnqueueReport, RepositoryError> {
        let candidates = normalize_identifiers(identifiers);
        let mut report = EnqueueReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }

        let db = self.db.as_ref();
        let now = Self::now();

        for chunk in candidates.chunks(ENQUEUE_CHUNK_SIZE) {
            let in_queue: HashSet<String> = match_queue::Entity::find()
                .select_only()
                .column(match_queue::Column::MatchIdentifier)
                .filter(match_queue::Column::MatchIdentifier.is_in(chunk.to_vec()))
                .into_tuple::<String>()
                .all(db)
                .await?
                .into_iter()
                .collect();

            let match_ids: Vec<String> = chunk
                .iter()
                .filter_map(|identifier| canonical_match_id(identifier))
                .map(|match_id| match_id.to_string())
                .collect();
            let completed: HashSet<String> = if match_ids.is_empty() {
                HashSet::new()
            } else {
                matches::Entity::find()
                    .select_only()
                    .column(matches::Column::Id)
                    .filter(matches::Column::Id.is_in(match_ids))
                    .into_tuple::<String>()
                    .all(db)
                    .await?
                    .into_iter()
                    .collect()
            };

            let mut unique = Vec::with_capacity(chunk.len());
            for identifier in chunk {
                let is_completed = canonical_match_id(identifier)
                    .is_some_and(|match_id| completed.contains(&match_id.to_string()));
                if is_completed || in_queue.contains(identifier) {
                    report.skipped.push(identifier.clone());
                } else {
                    unique.push(identifier.clone());
                }
            }

            if unique.is_empty() {
                continue;
            }

            let models = unique.into_iter().map(|identifier| match_queue::ActiveModel {
                match_identifier: Set(identifier),
                is_assigned: Set(false),
                agent: Set(None),
                is_processed: Set(false),
                leased_at: Set(None),
                lease_expires_at: Set(None),
                created_at: Set(now),
                ..Default::default()
            });

            // A concurrent enqueue may have inserted the same identifier since the check
            report.inserted += match_queue::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(match_queue::Column::MatchIdentifier)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }

        Ok(report)
    }

    async fn claim_batch(
        &self,
        agent: &AgentId,
        limit: u64,
    ) -> Result<Vec<QueueEntry>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let candidates = match_queue::Entity::find()
            .select_only()
            .column(match_queue::Column::Id)
            .filter(match_queue::Column::IsAssigned.eq(false))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .order_by_asc(match_queue::Column::Id)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .into_query();

        let now = Self::now();
        let mut claimed = match_queue::Entity::update_many()
            .col_expr(match_queue::Column::IsAssigned, Expr::value(true))
            .col_expr(
                match_queue::Column::Agent,
                Expr::value(Some(agent.as_str().to_string())),
            )
            .col_expr(match_queue::Column::LeasedAt, Expr::value(Some(now)))
            .col_expr(
                match_queue::Column::LeaseExpiresAt,
                Expr::value(Some(self.lease_deadline(now))),
            )
            .filter(match_queue::Column::Id.in_subquery(candidates))
            .filter(match_queue::Column::IsAssigned.eq(false))
            .exec_with_returning(self.db.as_ref())
            .await?;

        claimed.sort_by_key(|model| model.id);
        Ok(claimed.into_iter().map(Into::into).collect())
    }

    async fn resume_leases(
        &self,
        agent: &AgentId,
        limit: u64,
    ) -> Result<Vec<QueueEntry>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let models = match_queue::Entity::find()
            .filter(match_queue::Column::IsAssigned.eq(true))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .filter(match_queue::Column::Agent.eq(agent.as_str()))
            .order_by_asc(match_queue::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn renew_lease(&self, id: i32, agent: &AgentId) -> Result<bool, RepositoryError> {
        let result = match_queue::Entity::update_many()
            .col_expr(
                match_queue::Column::LeaseExpiresAt,
                Expr::value(Some(self.lease_deadline(Self::now()))),
            )
            .filter(match_queue::Column::Id.eq(id))
            .filter(match_queue::Column::Agent.eq(agent.as_str()))
            .filter(match_queue::Column::IsAssigned.eq(true))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn mark_processed(&self, id: i32, agent: &AgentId) -> Result<bool, RepositoryError> {
        let result = match_queue::Entity::update_many()
            .col_expr(match_queue::Column::IsProcessed, Expr::value(true))
            .filter(match_queue::Column::Id.eq(id))
            .filter(match_queue::Column::Agent.eq(agent.as_str()))
            .filter(match_queue::Column::IsAssigned.eq(true))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn take_leased(&self, ids: &[i32], agent: &AgentId) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = match_queue::Entity::delete_many()
            .filter(match_queue::Column::Id.is_in(ids.to_vec()))
            .filter(match_queue::Column::Agent.eq(agent.as_str()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn promote_stale(&self, limit: u64) -> Result<u64, RepositoryError> {
        if limit == 0 {
            return Ok(0);
        }

        let now = Self::now();
        let threshold = now - self.lease_ttl;
        let stale = || {
            Condition::all()
                .add(match_queue::Column::IsAssigned.eq(true))
                .add(match_queue::Column::IsProcessed.eq(false))
                .add(
                    Condition::any()
                        .add(match_queue::Column::LeaseExpiresAt.lte(now))
                        .add(
                            Condition::all()
                                .add(match_queue::Column::LeaseExpiresAt.is_null())
                                .add(match_queue::Column::LeasedAt.lte(threshold)),
                        ),
                )
        };

        let candidates = match_queue::Entity::find()
            .select_only()
            .column(match_queue::Column::Id)
            .filter(stale())
            .order_by_asc(match_queue::Column::Id)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .into_query();

        let result = match_queue::Entity::update_many()
            .col_expr(match_queue::Column::IsAssigned, Expr::value(false))
            .col_expr(match_queue::Column::Agent, Expr::value(Option::<String>::None))
            .col_expr(
                match_queue::Column::LeasedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(
                match_queue::Column::LeaseExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .filter(match_queue::Column::Id.in_subquery(candidates))
            .filter(stale())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<QueueEntry>, RepositoryError> {
        let model = match_queue::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn stats(&self) -> Result<QueueStats, RepositoryError> {
        let db = self.db.as_ref();

        let total = match_queue::Entity::find().count(db).await?;
        let unassigned = match_queue::Entity::find()
            .filter(match_queue::Column::IsAssigned.eq(false))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .count(db)
            .await?;
        let leased = match_queue::Entity::find()
            .filter(match_queue::Column::IsAssigned.eq(true))
            .filter(match_queue::Column::IsProcessed.eq(false))
            .count(db)
            .await?;
        let processed = match_queue::Entity::find()
            .filter(match_queue::Column::IsProcessed.eq(true))
            .count(db)
            .await?;

        Ok(QueueStats {
            total,
            unassigned,
            leased,
            processed,
        })
    }
}
