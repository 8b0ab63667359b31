use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Customer order history filtered by status (first-order checks).
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_customer_status")
                    .table(Orders::Table)
                    .col(Orders::CustomerId)
                    .col(Orders::Status)
                    .to_owned(),
            )
            .await?;

        // Recent orders listing.
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_created_status")
                    .table(Orders::Table)
                    .col((Orders::CreatedAt, IndexOrder::Desc))
                    .col(Orders::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_items_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::OrderId)
                    .to_owned(),
            )
            .await?;

        // Per-customer usage limits count over these two.
        manager
            .create_index(
                Index::create()
                    .name("idx_discount_code_usages_code_customer")
                    .table(DiscountCodeUsages::Table)
                    .col(DiscountCodeUsages::DiscountCodeId)
                    .col(DiscountCodeUsages::CustomerId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_discount_code_usages_code_phone")
                    .table(DiscountCodeUsages::Table)
                    .col(DiscountCodeUsages::DiscountCodeId)
                    .col(DiscountCodeUsages::CustomerPhone)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_order_id")
                    .table(Payments::Table)
                    .col(Payments::OrderId)
                    .to_owned(),
            )
            .await?;

        // Reconciliation backlog scans.
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_logs_processed_received")
                    .table(WebhookLogs::Table)
                    .col(WebhookLogs::Processed)
                    .col((WebhookLogs::ReceivedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shipping_weight_tiers_country_rate")
                    .table(ShippingWeightTiers::Table)
                    .col(ShippingWeightTiers::CountryRateId)
                    .col(ShippingWeightTiers::MaxWeightKg)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_shipping_weight_tiers_country_rate")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_webhook_logs_processed_received")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_payments_order_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_discount_code_usages_code_phone")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_discount_code_usages_code_customer")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_order_items_order_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_orders_created_status").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_orders_customer_status").to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Orders {
    Table,
    CustomerId,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum OrderItems {
    Table,
    OrderId,
}

#[derive(Iden)]
enum DiscountCodeUsages {
    Table,
    DiscountCodeId,
    CustomerId,
    CustomerPhone,
}

#[derive(Iden)]
enum Payments {
    Table,
    OrderId,
}

#[derive(Iden)]
enum WebhookLogs {
    Table,
    Processed,
    ReceivedAt,
}

#[derive(Iden)]
enum ShippingWeightTiers {
    Table,
    CountryRateId,
    MaxWeightKg,
}
