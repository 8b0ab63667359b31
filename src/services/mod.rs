// Order flow
pub mod orders;
pub mod payments;
pub mod pricing;

// Catalog and customer lookups shared by the order flow
pub mod catalog;
pub mod customers;

// Discounts and shipping
pub mod discounts;
pub mod shipping;
