pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_customers_table;
mod m20250301_000002_create_products_table;
mod m20250301_000003_create_orders_table;
mod m20250301_000004_create_order_items_table;
mod m20250301_000005_create_discount_codes_table;
mod m20250301_000006_create_discount_code_usages_table;
mod m20250301_000007_create_shipping_rates_tables;
mod m20250301_000008_create_payments_table;
mod m20250301_000009_create_webhook_logs_table;
mod m20250420_000010_add_lookup_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_customers_table::Migration),
            Box::new(m20250301_000002_create_products_table::Migration),
            Box::new(m20250301_000003_create_orders_table::Migration),
            Box::new(m20250301_000004_create_order_items_table::Migration),
            Box::new(m20250301_000005_create_discount_codes_table::Migration),
            Box::new(m20250301_000006_create_discount_code_usages_table::Migration),
            Box::new(m20250301_000007_create_shipping_rates_tables::Migration),
            Box::new(m20250301_000008_create_payments_table::Migration),
            Box::new(m20250301_000009_create_webhook_logs_table::Migration),
            Box::new(m20250420_000010_add_lookup_indexes::Migration),
        ]
    }
}
