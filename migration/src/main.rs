// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 迁移工具入口
///
/// 对 match_queue / matches 表执行 up、down、status 等迁移命令
#[async_std::main]
async fn main() {
    cli::run_cli(migration::Migrator).await;
}
