//! Create courts table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Courts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Courts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Courts::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Courts::Name).string().not_null())
                    .col(ColumnDef::new(Courts::DeviceKey).string())
                    .col(
                        ColumnDef::new(Courts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Courts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One court per owner
        manager
            .create_index(
                Index::create()
                    .name("idx_courts_owner")
                    .table(Courts::Table)
                    .col(Courts::OwnerId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Courts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Courts {
    Table,
    Id,
    OwnerId,
    Name,
    DeviceKey,
    IsActive,
    CreatedAt,
}
