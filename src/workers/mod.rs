// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供代理主循环、进程监督和停机动作
pub mod halt;
pub mod match_worker;
pub mod supervisor;
pub mod worker;

pub use worker::Worker;
