// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 队列条目
///
/// 表示一个待处理的比赛工作单元。条目的生命周期为
/// 未分配 → 已分配(agent) → 已处理，状态只会向前推进。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 自增主键，同时代表插入顺序
    pub id: i32,
    /// 比赛标识，可以是比赛链接或比赛ID
    pub match_identifier: String,
    /// 是否已被租给某个代理
    pub is_assigned: bool,
    /// 持有租约的代理标识
    pub agent: Option<String>,
    /// 是否已确认处理完成
    pub is_processed: bool,
    /// 租约开始时间
    pub leased_at: Option<DateTime<FixedOffset>>,
    /// 租约到期时间，到期且未处理的条目可被回收
    pub lease_expires_at: Option<DateTime<FixedOffset>>,
    /// 入队时间
    pub created_at: DateTime<FixedOffset>,
}

impl QueueEntry {
    /// 当前状态
    pub fn state(&self) -> EntryState {
        match (self.is_assigned, self.is_processed) {
            (_, true) => EntryState::Processed,
            (true, false) => EntryState::Leased,
            (false, false) => EntryState::Unassigned,
        }
    }
}

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unassigned,
    Leased,
    Processed,
}

/// 确认模式
///
/// `Deferred` 在请求下一个条目时才标记上一个条目已处理；
/// `OnLease` 在条目装载进内存时直接删除数据库中的行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    #[default]
    Deferred,
    OnLease,
}

/// 代理标识
///
/// 默认为主机名；通过代理服务器运行时附加代理描述，
/// 使经由代理的租约与直连代理的租约可以区分。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 由主机名和可选的代理服务器地址组成代理标识
    pub fn from_host(host: &str, proxy_server: Option<&str>) -> Self {
        match proxy_server {
            Some(proxy) if !proxy.trim().is_empty() => Self(format!("{}:{}", host, proxy.trim())),
            _ => Self(host.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 队列统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: u64,
    pub unassigned: u64,
    pub leased: u64,
    pub processed: u64,
}

/// 批量入队结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// 新插入的条目数
    pub inserted: u64,
    /// 因已在队列或已完成而跳过的标识
    pub skipped: Vec<String>,
}

/// 解析标识列表文本
///
/// 每行一个标识，忽略空行和以 `#` 开头的注释行
pub fn parse_identifier_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
