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

use crate::domain::models::match_record::MatchRecordError;
use crate::domain::models::queue_entry::QueueEntry;
use crate::domain::repositories::match_queue_repository::RepositoryError;
use async_trait::async_trait;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 数据源返回非成功状态码
    #[error("Unexpected status code: {0}")]
    Status(u16),
    /// 数据源多次报告比赛不存在
    #[error("Match {0} not found")]
    NotFound(String),
    /// 队列条目无法解析出比赛ID
    #[error("Invalid match identifier: {0}")]
    InvalidIdentifier(String),
    /// 比赛数据不满足入库条件
    #[error("Match rejected: {0}")]
    Rejected(#[from] MatchRecordError),
    /// 保存比赛失败
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    /// 重试次数耗尽
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<EngineError>,
    },
    /// 数据源请求配额已用完（HTTP 429）
    #[error("Provider request quota exhausted")]
    QuotaExhausted,
    /// 数据源持续返回服务端错误或无法连接
    #[error("Provider unavailable after {attempts} attempts: {last}")]
    ProviderUnavailable {
        attempts: u32,
        last: Box<EngineError>,
    },
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Status(code) => *code != 429,
            _ => false,
        }
    }

    /// 判断错误是否说明数据源本身出了故障，而不是某一场比赛的问题
    pub fn indicates_outage(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// 判断错误是否致命
    ///
    /// 致命错误意味着继续处理后续条目也只会失败，代理必须停机，
    /// 且当前条目不能被确认
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::QuotaExhausted
                | EngineError::ProviderUnavailable { .. }
                | EngineError::Repository(_)
        )
    }
}

/// 比赛处理器特质
///
/// 队列只关心处理结果：给定一个条目，尝试处理后返回成功或失败，
/// 或者报告一个必须停机的致命错误
#[async_trait]
pub trait MatchProcessor: Send + Sync {
    /// 处理一个队列条目
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 比赛已保存
    /// * `Ok(false)` - 该条目处理失败，条目照常确认
    /// * `Err(EngineError)` - 致命错误，条目不会被确认
    async fn process(&self, entry: &QueueEntry) -> Result<bool, EngineError>;

    /// 处理器名称
    fn name(&self) -> &'static str;
}
