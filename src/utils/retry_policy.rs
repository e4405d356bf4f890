// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{ProviderSettings, RetrySettings};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// 退避方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 每次重试等待相同时间
    Fixed,
    /// 第 n 次重试等待 `initial_backoff * n`
    Linear,
}

/// 重试策略配置
///
/// 等待使用 `tokio::time::sleep`，丢弃 `run` 返回的 future 即可取消
/// 正在等待的重试，测试中可以配合 `start_paused` 跳过真实等待。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 基础退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避方式
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// 重试次数耗尽错误
#[derive(Error, Debug)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct RetriesExhausted<E: std::error::Error + 'static> {
    /// 操作名称
    pub operation: &'static str,
    /// 实际尝试次数
    pub attempts: u32,
    /// 最后一次失败的错误
    #[source]
    pub source: E,
}

impl RetryPolicy {
    /// 存储操作使用的固定间隔策略
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let delay = Duration::from_millis(settings.delay_ms);
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: delay,
            max_backoff: delay,
            backoff: Backoff::Fixed,
        }
    }

    /// 数据源请求使用的线性退避策略
    pub fn for_provider(settings: &ProviderSettings) -> Self {
        let delay = Duration::from_secs(settings.retry_delay_secs);
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_backoff: delay,
            max_backoff: delay.saturating_mul(settings.max_retries.max(1)),
            backoff: Backoff::Linear,
        }
    }

    /// 不等待的策略，用于测试
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// 计算第 `attempt` 次失败之后的退避时间（从 1 开始）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff = match self.backoff {
            Backoff::Fixed => self.initial_backoff,
            Backoff::Linear => self.initial_backoff.saturating_mul(attempt.max(1)),
        };
        backoff.min(self.max_backoff)
    }

    /// 是否应该再尝试一次
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 执行操作，失败时按策略重试
    ///
    /// # 参数
    ///
    /// * `operation` - 操作名称，用于日志和指标
    /// * `f` - 每次尝试都会重新调用的操作
    ///
    /// # 返回值
    ///
    /// * `Ok(T)` - 某次尝试成功的结果
    /// * `Err(RetriesExhausted)` - 所有尝试均失败
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut f: F,
    ) -> Result<T, RetriesExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Operation failed, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    metrics::counter!("matchq_store_retries_total", "operation" => operation)
                        .increment(1);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(RetriesExhausted {
                        operation,
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
