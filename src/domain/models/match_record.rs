// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 一场比赛的标准人数
pub const PLAYERS_PER_MATCH: usize = 10;

/// 已完成的比赛记录
///
/// 由比赛处理器从数据源解析得到，与全部选手数据一起
/// 在一个事务中写入 matches / match_players 表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 数据源中的数字比赛ID，也是 matches 表主键
    pub match_id: String,
    /// 开始时间（Unix 秒）
    pub start_time: i64,
    /// 天辉是否获胜
    pub radiant_win: bool,
    /// 比赛时长（秒）
    pub duration: i32,
    pub radiant_score: i32,
    pub dire_score: i32,
    /// 选手段位的平均值
    pub average_rank_tier: Option<i32>,
    /// 选手数据
    pub players: Vec<PlayerStat>,
}

/// 单个选手在一场比赛中的数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub player_slot: i32,
    /// 匿名选手没有账号ID
    pub account_id: Option<i64>,
    pub hero_id: i32,
    pub is_radiant: bool,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
    pub gold_per_min: i32,
    pub xp_per_min: i32,
    pub rank_tier: Option<i32>,
}

/// 比赛记录校验错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchRecordError {
    #[error("expected {expected} players, found {found}")]
    PlayerCount { expected: usize, found: usize },

    #[error("anonymous players found: {0}")]
    AnonymousPlayers(usize),

    #[error("duplicate player slot {0}")]
    DuplicateSlot(i32),
}

/// 从队列标识中提取数字比赛ID
///
/// 标识可以是纯数字ID，也可以是以比赛ID结尾的链接，
/// 同一场比赛的两种写法得到相同的ID
pub fn canonical_match_id(match_identifier: &str) -> Option<u64> {
    match_identifier
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u64>().ok())
}

impl MatchRecord {
    /// 校验比赛记录是否可以入库
    ///
    /// 要求恰好十名选手、没有匿名选手、选手位置不重复
    pub fn validate(&self) -> Result<(), MatchRecordError> {
        if self.players.len() != PLAYERS_PER_MATCH {
            return Err(MatchRecordError::PlayerCount {
                expected: PLAYERS_PER_MATCH,
                found: self.players.len(),
            });
        }

        let anonymous = self
            .players
            .iter()
            .filter(|p| p.account_id.is_none())
            .count();
        if anonymous > 0 {
            return Err(MatchRecordError::AnonymousPlayers(anonymous));
        }

        let mut slots: Vec<i32> = self.players.iter().map(|p| p.player_slot).collect();
        slots.sort_unstable();
        if let Some(pair) = slots.windows(2).find(|w| w[0] == w[1]) {
            return Err(MatchRecordError::DuplicateSlot(pair[0]));
        }

        Ok(())
    }

    /// 计算已知段位选手的平均段位
    pub fn compute_average_rank_tier(players: &[PlayerStat]) -> Option<i32> {
        let tiers: Vec<i32> = players.iter().filter_map(|p| p.rank_tier).collect();
        if tiers.is_empty() {
            return None;
        }
        let sum: i64 = tiers.iter().map(|t| *t as i64).sum();
        Some((sum / tiers.len() as i64) as i32)
    }
}
