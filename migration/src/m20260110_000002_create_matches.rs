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
        // Completed matches, keyed by the queue's match identifier
        manager
            .create_table(
                Table::create()
                    .table(Matches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Matches::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Matches::StartTime).big_integer().not_null())
                    .col(ColumnDef::new(Matches::RadiantWin).boolean().not_null())
                    .col(ColumnDef::new(Matches::Duration).integer().not_null())
                    .col(ColumnDef::new(Matches::RadiantScore).integer().not_null())
                    .col(ColumnDef::new(Matches::DireScore).integer().not_null())
                    .col(ColumnDef::new(Matches::AverageRankTier).integer())
                    .col(ColumnDef::new(Matches::Agent).string().not_null())
                    .col(
                        ColumnDef::new(Matches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MatchPlayers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MatchPlayers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MatchPlayers::MatchId).string().not_null())
                    .col(ColumnDef::new(MatchPlayers::PlayerSlot).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::AccountId).big_integer())
                    .col(ColumnDef::new(MatchPlayers::HeroId).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::IsRadiant).boolean().not_null())
                    .col(ColumnDef::new(MatchPlayers::Kills).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::Deaths).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::Assists).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::GoldPerMin).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::XpPerMin).integer().not_null())
                    .col(ColumnDef::new(MatchPlayers::RankTier).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_match_players_match_id")
                            .from(MatchPlayers::Table, MatchPlayers::MatchId)
                            .to(Matches::Table, Matches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_match_players_match_slot")
                    .table(MatchPlayers::Table)
                    .col(MatchPlayers::MatchId)
                    .col(MatchPlayers::PlayerSlot)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MatchPlayers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Matches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Matches {
    Table,
    Id,
    StartTime,
    RadiantWin,
    Duration,
    RadiantScore,
    DireScore,
    AverageRankTier,
    Agent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MatchPlayers {
    Table,
    Id,
    MatchId,
    PlayerSlot,
    AccountId,
    HeroId,
    IsRadiant,
    Kills,
    Deaths,
    Assists,
    GoldPerMin,
    XpPerMin,
    RankTier,
}
