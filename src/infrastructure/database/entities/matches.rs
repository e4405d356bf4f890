// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

/// 已完成比赛数据库实体模型
///
/// 对应数据库中的 matches 表，主键为队列中的比赛标识
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "matches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub start_time: i64,
    pub radiant_win: bool,
    pub duration: i32,
    pub radiant_score: i32,
    pub dire_score: i32,
    pub average_rank_tier: Option<i32>,
    pub agent: String,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::match_players::Entity")]
    MatchPlayers,
}

impl Related<super::match_players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MatchPlayers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
