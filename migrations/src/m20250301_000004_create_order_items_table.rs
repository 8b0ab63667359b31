use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductTitle).string().not_null())
                    .col(
                        ColumnDef::new(OrderItems::ProductDescription)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(OrderItems::ProductImageUrl).string().null())
                    .col(ColumnDef::new(OrderItems::CategoryName).string().null())
                    .col(ColumnDef::new(OrderItems::OriginalPrice).decimal().not_null())
                    .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                    .col(
                        ColumnDef::new(OrderItems::DiscountApplied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order_id")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(
                                super::m20250301_000003_create_orders_table::Orders::Table,
                                super::m20250301_000003_create_orders_table::Orders::Id,
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    ProductTitle,
    ProductDescription,
    ProductImageUrl,
    CategoryName,
    OriginalPrice,
    UnitPrice,
    DiscountApplied,
    Quantity,
    CreatedAt,
}
