use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Orders::OrderNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Orders::SubtotalAmount).decimal().not_null())
                    .col(
                        ColumnDef::new(Orders::DiscountAmount)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::ShippingAmount)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::TotalAmount).decimal().not_null())
                    .col(
                        ColumnDef::new(Orders::Currency)
                            .string_len(3)
                            .not_null()
                            .default("KWD"),
                    )
                    .col(ColumnDef::new(Orders::DiscountCode).string().null())
                    .col(
                        ColumnDef::new(Orders::FreeShipping)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::TrackingNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::ShipStreet).string().not_null())
                    .col(ColumnDef::new(Orders::ShipCity).string().not_null())
                    .col(ColumnDef::new(Orders::ShipGovernorate).string().not_null())
                    .col(ColumnDef::new(Orders::ShipPostalCode).string().null())
                    .col(ColumnDef::new(Orders::ShipNotes).text().null())
                    .col(
                        ColumnDef::new(Orders::ShipCountry)
                            .string_len(2)
                            .not_null()
                            .default("KW"),
                    )
                    .col(ColumnDef::new(Orders::Notes).text().null())
                    .col(
                        ColumnDef::new(Orders::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_customer_id")
                            .from(Orders::Table, Orders::CustomerId)
                            .to(
                                super::m20250301_000001_create_customers_table::Customers::Table,
                                super::m20250301_000001_create_customers_table::Customers::Id,
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
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderNumber,
    CustomerId,
    Status,
    SubtotalAmount,
    DiscountAmount,
    ShippingAmount,
    TotalAmount,
    Currency,
    DiscountCode,
    FreeShipping,
    TrackingNumber,
    ShipStreet,
    ShipCity,
    ShipGovernorate,
    ShipPostalCode,
    ShipNotes,
    ShipCountry,
    Notes,
    Version,
    CreatedAt,
    UpdatedAt,
}
