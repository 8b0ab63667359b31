use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscountCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscountCodes::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodes::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(DiscountCodes::Description).text().null())
                    .col(ColumnDef::new(DiscountCodes::DiscountType).string().not_null())
                    .col(ColumnDef::new(DiscountCodes::Value).decimal().not_null())
                    .col(
                        ColumnDef::new(DiscountCodes::MinimumOrderAmount)
                            .decimal()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodes::MaximumDiscountAmount)
                            .decimal()
                            .null(),
                    )
                    .col(ColumnDef::new(DiscountCodes::UsageLimit).integer().null())
                    .col(
                        ColumnDef::new(DiscountCodes::UsageLimitPerCustomer)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiscountCodes::UsageCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DiscountCodes::ProductIds).text().null())
                    .col(ColumnDef::new(DiscountCodes::CategoryIds).text().null())
                    .col(ColumnDef::new(DiscountCodes::CustomerIds).text().null())
                    .col(
                        ColumnDef::new(DiscountCodes::FirstTimeCustomerOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DiscountCodes::NewCustomerOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DiscountCodes::StartsAt).timestamp().null())
                    .col(ColumnDef::new(DiscountCodes::ExpiresAt).timestamp().null())
                    .col(
                        ColumnDef::new(DiscountCodes::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DiscountCodes::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DiscountCodes::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiscountCodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DiscountCodes {
    Table,
    Id,
    Code,
    Description,
    DiscountType,
    Value,
    MinimumOrderAmount,
    MaximumDiscountAmount,
    UsageLimit,
    UsageLimitPerCustomer,
    UsageCount,
    ProductIds,
    CategoryIds,
    CustomerIds,
    FirstTimeCustomerOnly,
    NewCustomerOnly,
    StartsAt,
    ExpiresAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
