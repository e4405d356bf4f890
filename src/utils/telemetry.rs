// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LoggingSettings;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::{Format, Json, JsonFields};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 默认日志过滤规则
pub const DEFAULT_FILTER: &str = "info,matchq=debug";

/// 初始化日志订阅器
///
/// `RUST_LOG` 存在时使用它，否则使用默认规则。
/// 配置了日志文件时，同样的事件以 JSON 行追加写入该文件。
///
/// # 返回值
///
/// * `Ok(())` - 订阅器已安装
/// * `Err(io::Error)` - 日志文件无法打开
pub fn init_telemetry(settings: &LoggingSettings) -> std::io::Result<()> {
    let file_layer = match &settings.file {
        Some(path) => Some(json_file_layer(open_log_file(path)?)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// 以追加方式打开日志文件，不存在时创建
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// 将事件格式化为 JSON 行写入文件的层
pub fn json_file_layer<S>(file: File) -> fmt::Layer<S, JsonFields, Format<Json>, Mutex<File>> {
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
}
