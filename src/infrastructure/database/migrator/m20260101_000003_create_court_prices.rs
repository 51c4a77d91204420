//! Create court_prices table
//!
//! Half-hour price grid, 48 rows per weekday per court.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_courts::Courts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CourtPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CourtPrices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CourtPrices::CourtId).integer().not_null())
                    .col(ColumnDef::new(CourtPrices::DayOfWeek).integer())
                    .col(
                        ColumnDef::new(CourtPrices::StartMinute)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CourtPrices::EndMinute).integer().not_null())
                    .col(
                        ColumnDef::new(CourtPrices::PricePerHour)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_court_prices_court")
                            .from(CourtPrices::Table, CourtPrices::CourtId)
                            .to(Courts::Table, Courts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_court_prices_court_day")
                    .table(CourtPrices::Table)
                    .col(CourtPrices::CourtId)
                    .col(CourtPrices::DayOfWeek)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CourtPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CourtPrices {
    Table,
    Id,
    CourtId,
    DayOfWeek,
    StartMinute,
    EndMinute,
    PricePerHour,
}
