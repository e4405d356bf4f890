// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置，包括数据库、队列、重试、数据源和进程监督等配置
pub mod settings;
