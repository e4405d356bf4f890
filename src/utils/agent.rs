// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::AgentSettings;
use crate::domain::models::queue_entry::AgentId;
use sysinfo::System;
use tracing::warn;

const FALLBACK_HOST: &str = "localhost";

/// 解析本代理的身份标识
///
/// 配置了名称时使用名称，否则使用主机名；配置了代理服务器时附加代理地址
pub fn resolve_agent_id(settings: &AgentSettings) -> AgentId {
    let host = settings
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(System::host_name)
        .unwrap_or_else(|| {
            warn!("Unable to determine host name, using {}", FALLBACK_HOST);
            FALLBACK_HOST.to_string()
        });

    AgentId::from_host(host.trim(), settings.proxy_server.as_deref())
}
