pub mod country_shipping_rate;
pub mod customer;
pub mod discount_code;
pub mod discount_code_usage;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod shipping_weight_tier;
pub mod webhook_log;

pub use discount_code::DiscountType;
pub use order::OrderStatus;
pub use payment::PaymentStatus;
