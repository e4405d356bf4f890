// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::EngineError;
use crate::queue::QueueError;
use thiserror::Error;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),

    #[error("引擎错误: {0}")]
    Engine(#[from] EngineError),

    #[error("工作器异常退出: {0}")]
    Panicked(String),
}
