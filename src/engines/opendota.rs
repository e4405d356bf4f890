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

use crate::config::settings::ProviderSettings;
use crate::domain::models::match_record::{canonical_match_id, MatchRecord, PlayerStat};
use crate::domain::models::queue_entry::{AgentId, QueueEntry};
use crate::domain::repositories::match_repository::MatchRepository;
use crate::engines::traits::{EngineError, MatchProcessor};
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// 404 出现超过此次数后不再重试
const NOT_FOUND_LIMIT: u32 = 2;

/// 玩家位置 >= 128 属于夜魇
const DIRE_SLOT_OFFSET: i32 = 128;

#[derive(Debug, Deserialize)]
struct MatchDto {
    start_time: i64,
    radiant_win: bool,
    duration: i32,
    #[serde(default)]
    radiant_score: i32,
    #[serde(default)]
    dire_score: i32,
    #[serde(default)]
    players: Vec<PlayerDto>,
}

#[derive(Debug, Deserialize)]
struct PlayerDto {
    player_slot: i32,
    account_id: Option<i64>,
    hero_id: i32,
    #[serde(rename = "isRadiant")]
    is_radiant: Option<bool>,
    #[serde(default)]
    kills: i32,
    #[serde(default)]
    deaths: i32,
    #[serde(default)]
    assists: i32,
    #[serde(default)]
    gold_per_min: i32,
    #[serde(default)]
    xp_per_min: i32,
    rank_tier: Option<i32>,
}

impl PlayerDto {
    fn into_stat(self) -> PlayerStat {
        PlayerStat {
            player_slot: self.player_slot,
            account_id: self.account_id,
            hero_id: self.hero_id,
            is_radiant: self
                .is_radiant
                .unwrap_or(self.player_slot < DIRE_SLOT_OFFSET),
            kills: self.kills,
            deaths: self.deaths,
            assists: self.assists,
            gold_per_min: self.gold_per_min,
            xp_per_min: self.xp_per_min,
            rank_tier: self.rank_tier,
        }
    }
}

impl MatchDto {
    fn into_record(self, match_id: u64) -> MatchRecord {
        let players: Vec<PlayerStat> = self.players.into_iter().map(PlayerDto::into_stat).collect();
        MatchRecord {
            match_id: match_id.to_string(),
            start_time: self.start_time,
            radiant_win: self.radiant_win,
            duration: self.duration,
            radiant_score: self.radiant_score,
            dire_score: self.dire_score,
            average_rank_tier: MatchRecord::compute_average_rank_tier(&players),
            players,
        }
    }
}

/// 从队列条目中解析比赛ID
///
/// 条目可以是纯数字ID，也可以是以比赛ID结尾的链接
pub fn parse_match_id(match_identifier: &str) -> Result<u64, EngineError> {
    canonical_match_id(match_identifier)
        .ok_or_else(|| EngineError::InvalidIdentifier(match_identifier.to_string()))
}

/// OpenDota 比赛处理器
///
/// 通过 REST API 获取比赛数据，校验后与全部选手数据一起保存
pub struct OpenDotaProcessor<M: MatchRepository> {
    client: reqwest::Client,
    api_base_url: String,
    retry: RetryPolicy,
    matches: Arc<M>,
    agent: AgentId,
}

impl<M: MatchRepository> OpenDotaProcessor<M> {
    /// 创建新的 OpenDota 处理器
    ///
    /// # 参数
    ///
    /// * `settings` - 数据源配置
    /// * `proxy_server` - 可选的代理服务器地址
    /// * `matches` - 已完成比赛仓库
    /// * `agent` - 本代理标识
    ///
    /// # 返回值
    ///
    /// * `Ok(OpenDotaProcessor)` - 处理器实例
    /// * `Err(EngineError)` - 代理地址无效或客户端构建失败
    pub fn new(
        settings: &ProviderSettings,
        proxy_server: Option<&str>,
        matches: Arc<M>,
        agent: AgentId,
    ) -> Result<Self, EngineError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("matchq/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs));

        if let Some(proxy) = proxy_server.filter(|p| !p.trim().is_empty()) {
            let proxy_url = if proxy.contains("://") {
                proxy.to_string()
            } else {
                format!("http://{}", proxy)
            };
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::for_provider(settings),
            matches,
            agent,
        })
    }

    /// 获取比赛数据
    ///
    /// 可重试的错误按线性退避重试，404 多次出现时提前放弃。
    /// 429 说明当日配额已用完，立即返回；服务端错误重试耗尽时
    /// 返回 `ProviderUnavailable`，两者都是致命错误。
    pub async fn fetch_match(&self, match_id: u64) -> Result<MatchRecord, EngineError> {
        let url = format!("{}/matches/{}", self.api_base_url, match_id);
        let mut attempt = 0;
        let mut not_found = 0;

        loop {
            attempt += 1;
            let err = match self.request(&url).await {
                Ok(dto) => return Ok(dto.into_record(match_id)),
                Err(e) => e,
            };

            if let EngineError::Status(429) = err {
                warn!(match_id, "Provider request quota is used up");
                return Err(EngineError::QuotaExhausted);
            }

            if let EngineError::Status(404) = err {
                not_found += 1;
                if not_found > NOT_FOUND_LIMIT {
                    warn!(match_id, "Provider reported 404 repeatedly, giving up");
                    return Err(EngineError::NotFound(match_id.to_string()));
                }
            } else if !err.is_retryable() {
                return Err(err);
            }

            if !self.retry.should_retry(attempt) {
                let last = Box::new(err);
                return Err(if last.indicates_outage() {
                    EngineError::ProviderUnavailable {
                        attempts: attempt,
                        last,
                    }
                } else {
                    EngineError::RetriesExhausted {
                        attempts: attempt,
                        last,
                    }
                });
            }

            let backoff = self.retry.calculate_backoff(attempt);
            warn!(
                match_id,
                attempt,
                "Failed to get the response, retrying in {:?}: {}",
                backoff,
                err
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn request(&self, url: &str) -> Result<MatchDto, EngineError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(EngineError::Status(status.as_u16()));
        }
        Ok(response.json::<MatchDto>().await?)
    }

    /// 获取、校验并保存一场比赛
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 比赛已保存（包括之前已经保存过）
    /// * `Err(EngineError)` - 获取、校验或保存失败
    pub async fn fetch_and_store(&self, entry: &QueueEntry) -> Result<bool, EngineError> {
        let match_id = parse_match_id(&entry.match_identifier)?;

        if self.matches.exists(&match_id.to_string()).await? {
            info!(match_id, "Match already stored, nothing to do");
            return Ok(true);
        }

        let record = self.fetch_match(match_id).await?;
        record.validate()?;

        if !self.matches.save_match(&record, &self.agent).await? {
            debug!(match_id, "Match was stored concurrently by another agent");
        }
        Ok(true)
    }
}

#[async_trait]
impl<M: MatchRepository + 'static> MatchProcessor for OpenDotaProcessor<M> {
    #[instrument(skip(self, entry), fields(id = entry.id, match_identifier = %entry.match_identifier))]
    async fn process(&self, entry: &QueueEntry) -> Result<bool, EngineError> {
        match self.fetch_and_store(entry).await {
            Ok(stored) => Ok(stored),
            Err(e) if e.is_fatal() => {
                error!("Provider or storage failure, agent must stop: {}", e);
                Err(e)
            }
            Err(EngineError::Rejected(reason)) => {
                info!("Skipping match: {}", reason);
                Ok(false)
            }
            Err(e) => {
                warn!("Failed to process match: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "opendota"
    }
}
