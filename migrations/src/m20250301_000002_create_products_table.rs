use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Products::Title).string().not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::ImageUrl).string().null())
                    .col(ColumnDef::new(Products::CategoryId).uuid().null())
                    .col(ColumnDef::new(Products::CategoryName).string().null())
                    .col(ColumnDef::new(Products::Price).decimal().not_null())
                    .col(ColumnDef::new(Products::DiscountPrice).decimal().null())
                    .col(
                        ColumnDef::new(Products::DiscountStartsAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Products::DiscountExpiresAt)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(Products::WeightGrams).integer().null())
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Products {
    Table,
    Id,
    Title,
    Description,
    ImageUrl,
    CategoryId,
    CategoryName,
    Price,
    DiscountPrice,
    DiscountStartsAt,
    DiscountExpiresAt,
    WeightGrams,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
