use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscountCodeUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscountCodeUsages::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodeUsages::DiscountCodeId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DiscountCodeUsages::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(DiscountCodeUsages::CustomerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodeUsages::CustomerPhone)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodeUsages::UsedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_discount_code_usages_code_id")
                            .from(
                                DiscountCodeUsages::Table,
                                DiscountCodeUsages::DiscountCodeId,
                            )
                            .to(
                                super::m20250301_000005_create_discount_codes_table::DiscountCodes::Table,
                                super::m20250301_000005_create_discount_codes_table::DiscountCodes::Id,
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One usage row per (code, order): concurrent applies race on this.
        manager
            .create_index(
                Index::create()
                    .name("idx_discount_code_usages_code_order")
                    .table(DiscountCodeUsages::Table)
                    .col(DiscountCodeUsages::DiscountCodeId)
                    .col(DiscountCodeUsages::OrderId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_discount_code_usages_code_order")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(DiscountCodeUsages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DiscountCodeUsages {
    Table,
    Id,
    DiscountCodeId,
    OrderId,
    CustomerId,
    CustomerPhone,
    UsedAt,
}
