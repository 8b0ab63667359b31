use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CountryShippingRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CountryShippingRates::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CountryShippingRates::CountryCode)
                            .string_len(2)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CountryShippingRates::CountryName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CountryShippingRates::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CountryShippingRates::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CountryShippingRates::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShippingWeightTiers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShippingWeightTiers::Id)
                            .integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingWeightTiers::CountryRateId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingWeightTiers::MaxWeightKg)
                            .decimal()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingWeightTiers::BasePrice)
                            .decimal()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShippingWeightTiers::AdditionalPercentage)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ShippingWeightTiers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipping_weight_tiers_country_rate_id")
                            .from(
                                ShippingWeightTiers::Table,
                                ShippingWeightTiers::CountryRateId,
                            )
                            .to(
                                CountryShippingRates::Table,
                                CountryShippingRates::Id,
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
            .drop_table(Table::drop().table(ShippingWeightTiers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CountryShippingRates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CountryShippingRates {
    Table,
    Id,
    CountryCode,
    CountryName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ShippingWeightTiers {
    Table,
    Id,
    CountryRateId,
    MaxWeightKg,
    BasePrice,
    AdditionalPercentage,
    CreatedAt,
}
