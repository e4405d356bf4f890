// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

/// 致命错误时的退出码
pub const HALT_EXIT_CODE: u8 = 1;

/// 停机动作
///
/// 任何层级的致命错误都通过这个唯一的动作终止代理
#[async_trait]
pub trait HaltAction: Send + Sync {
    /// 报告致命错误并返回进程退出码
    async fn halt(&self, error: &WorkerError) -> u8;
}

/// 等待操作员确认的停机动作
///
/// 输出诊断信息，等待操作员按下回车后返回非零退出码
pub struct OperatorHalt;

#[async_trait]
impl HaltAction for OperatorHalt {
    async fn halt(&self, error: &WorkerError) -> u8 {
        error!("Agent halted, operator intervention required: {}", error);
        eprintln!("The agent stopped because of a fatal error: {error}");
        eprintln!("Press Enter to exit...");

        let mut line = String::new();
        if let Err(e) = BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            error!("Unable to read operator acknowledgement: {}", e);
        }
        HALT_EXIT_CODE
    }
}
