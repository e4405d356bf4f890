// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务概念，包括：
/// - 领域模型（models）：队列条目、代理标识、比赛记录
/// - 仓库接口（repositories）：队列和已完成比赛的持久化抽象接口
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
