use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Payments::Provider).string().not_null())
                    .col(
                        ColumnDef::new(Payments::InvoiceReference)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                    .col(
                        ColumnDef::new(Payments::Currency)
                            .string_len(3)
                            .not_null()
                            .default("KWD"),
                    )
                    .col(
                        ColumnDef::new(Payments::Status)
                            .string()
                            .not_null()
                            .default("initiated"),
                    )
                    .col(ColumnDef::new(Payments::RawResponse).text().null())
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Payments::UpdatedAt).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_order_id")
                            .from(Payments::Table, Payments::OrderId)
                            .to(
                                super::m20250301_000003_create_orders_table::Orders::Table,
                                super::m20250301_000003_create_orders_table::Orders::Id,
                            )
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Payments {
    Table,
    Id,
    OrderId,
    Provider,
    InvoiceReference,
    Amount,
    Currency,
    Status,
    RawResponse,
    CreatedAt,
    UpdatedAt,
}
