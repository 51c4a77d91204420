//! Create booking_items table

use sea_orm_migration::prelude::*;

use super::m20260101_000002_create_sub_courts::SubCourts;
use super::m20260101_000004_create_bookings::Bookings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BookingItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BookingItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BookingItems::BookingId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BookingItems::SubCourtId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BookingItems::Date).date().not_null())
                    .col(
                        ColumnDef::new(BookingItems::StartMinute)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BookingItems::EndMinute)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BookingItems::Price)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_items_booking")
                            .from(BookingItems::Table, BookingItems::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_items_sub_court")
                            .from(BookingItems::Table, BookingItems::SubCourtId)
                            .to(SubCourts::Table, SubCourts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Slot lookups filter by sub-court and date
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_items_sub_court_date")
                    .table(BookingItems::Table)
                    .col(BookingItems::SubCourtId)
                    .col(BookingItems::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_items_booking")
                    .table(BookingItems::Table)
                    .col(BookingItems::BookingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookingItems::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BookingItems {
    Table,
    Id,
    BookingId,
    SubCourtId,
    Date,
    StartMinute,
    EndMinute,
    Price,
}
