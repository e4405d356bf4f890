// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 队列条目（queue_entry）：待处理的比赛工作单元及其租约状态
/// - 比赛记录（match_record）：处理完成后保存的比赛和选手数据
pub mod match_record;
pub mod queue_entry;
