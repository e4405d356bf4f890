// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;
#[derive(DeriveMigrationName)]
pub struct Migration;
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(MatchQueue::Table)
                    .add_column(
                        ColumnDef::new(MatchQueue::LeaseExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_match_queue_lease_expires_at")
                    .table(MatchQueue::Table)
                    .col(MatchQueue::LeaseExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_match_queue_lease_expires_at")
                    .table(MatchQueue::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(MatchQueue::Table)
                    .drop_column(MatchQueue::LeaseExpiresAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum MatchQueue {
    Table,
    LeaseExpiresAt,
}
