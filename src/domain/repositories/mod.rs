// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// - 比赛队列仓库（match_queue_repository）：入队、租约领取、确认和回收
/// - 比赛仓库（match_repository）：已完成比赛的事务性保存
pub mod match_queue_repository;
pub mod match_repository;
