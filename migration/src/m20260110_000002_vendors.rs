use sea_orm_migration::prelude::*;

use crate::m20260110_000001_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vendors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vendors::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Vendors::UserId).uuid().unique_key())
                    .col(ColumnDef::new(Vendors::CompanyName).string().not_null())
                    .col(
                        ColumnDef::new(Vendors::Tier)
                            .string_len(16)
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(Vendors::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vendors_user")
                            .from(Vendors::Table, Vendors::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vendors_tier")
                    .table(Vendors::Table)
                    .col(Vendors::Tier)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vendors::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Vendors {
    Table,
    Id,
    UserId,
    CompanyName,
    Tier,
    CreatedAt,
}
