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
        // Create match_queue table
        manager
            .create_table(
                Table::create()
                    .table(MatchQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MatchQueue::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MatchQueue::MatchIdentifier).string().not_null())
                    .col(
                        ColumnDef::new(MatchQueue::IsAssigned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MatchQueue::Agent).string().null())
                    .col(
                        ColumnDef::new(MatchQueue::IsProcessed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MatchQueue::LeasedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(MatchQueue::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Duplicate identifiers are rejected at the table level as well
        manager
            .create_index(
                Index::create()
                    .name("idx_match_queue_match_identifier")
                    .table(MatchQueue::Table)
                    .col(MatchQueue::MatchIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Claim scans: unassigned, unprocessed, ordered by id
        manager
            .create_index(
                Index::create()
                    .name("idx_match_queue_claimable")
                    .table(MatchQueue::Table)
                    .col(MatchQueue::IsAssigned)
                    .col(MatchQueue::IsProcessed)
                    .col(MatchQueue::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_match_queue_agent")
                    .table(MatchQueue::Table)
                    .col(MatchQueue::Agent)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MatchQueue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MatchQueue {
    Table,
    Id,
    MatchIdentifier,
    IsAssigned,
    Agent,
    IsProcessed,
    LeasedAt,
    CreatedAt,
}
