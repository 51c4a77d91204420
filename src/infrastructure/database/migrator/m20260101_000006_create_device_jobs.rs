//! Create device_jobs table
//!
//! Durable delayed-dispatch queue for court light events. Rows live until the
//! event is delivered; exhausted rows stay for operators.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeviceJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::ReservationId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::SubCourtId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::WindowStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceJobs::Kind).string().not_null())
                    .col(ColumnDef::new(DeviceJobs::CourtId).integer().not_null())
                    .col(ColumnDef::new(DeviceJobs::DeviceKey).string())
                    .col(
                        ColumnDef::new(DeviceJobs::RunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::State)
                            .string()
                            .not_null()
                            .default("Queued"),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DeviceJobs::LastError).text())
                    .col(
                        ColumnDef::new(DeviceJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_jobs_state_run_at")
                    .table(DeviceJobs::Table)
                    .col(DeviceJobs::State)
                    .col(DeviceJobs::RunAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_device_jobs_reservation_sub_court")
                    .table(DeviceJobs::Table)
                    .col(DeviceJobs::ReservationId)
                    .col(DeviceJobs::SubCourtId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum DeviceJobs {
    Table,
    Id,
    ReservationId,
    SubCourtId,
    WindowStart,
    Kind,
    CourtId,
    DeviceKey,
    RunAt,
    State,
    Attempts,
    LastError,
    CreatedAt,
    UpdatedAt,
}
