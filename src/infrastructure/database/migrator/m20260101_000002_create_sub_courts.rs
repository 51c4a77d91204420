//! Create sub_courts table

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
                    .table(SubCourts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubCourts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SubCourts::CourtId).integer().not_null())
                    .col(ColumnDef::new(SubCourts::Name).string().not_null())
                    .col(
                        ColumnDef::new(SubCourts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sub_courts_court")
                            .from(SubCourts::Table, SubCourts::CourtId)
                            .to(Courts::Table, Courts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sub_courts_court")
                    .table(SubCourts::Table)
                    .col(SubCourts::CourtId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubCourts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SubCourts {
    Table,
    Id,
    CourtId,
    Name,
    IsActive,
}
