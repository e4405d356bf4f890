// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 引擎模块
///
/// 提供把队列条目变成已保存比赛记录的比赛处理器
pub mod opendota;
pub mod traits;
