// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含队列条目、比赛记录和仓库接口
pub mod domain;

/// 引擎模块
///
/// 实现把队列条目变成已保存比赛的比赛处理器
pub mod engines;

/// 基础设施模块
///
/// 提供数据库连接、实体和仓库实现
pub mod infrastructure;

/// 队列模块
///
/// 实现租约领取、预取缓冲和延迟确认
pub mod queue;

/// 工具模块
///
/// 提供重试策略、遥测和代理身份等辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现代理主循环、进程监督和停机动作
pub mod workers;
