// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::match_queue_repository::RepositoryError;
use crate::utils::retry_policy::RetriesExhausted;
use thiserror::Error;

/// 队列错误类型
///
/// 两种错误都是致命的，需要交给停机动作处理
#[derive(Error, Debug)]
pub enum QueueError {
    /// 存储操作重试次数耗尽
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: RepositoryError,
    },

    /// 补充之后可领取的条目仍不足
    #[error("queue starved: {claimed} entries available, at least {required} required")]
    Starved { claimed: usize, required: usize },
}

impl From<RetriesExhausted<RepositoryError>> for QueueError {
    fn from(err: RetriesExhausted<RepositoryError>) -> Self {
        QueueError::RetriesExhausted {
            operation: err.operation,
            attempts: err.attempts,
            source: err.source,
        }
    }
}
