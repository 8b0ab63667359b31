use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::catalog;

/// Per-line quantity cap.
pub const MAX_QUANTITY_PER_LINE: i32 = 10;

/// Rounds a money amount to mils (KWD carries three decimal places).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10, message = "Quantity must be between 1 and 10"))]
    pub quantity: i32,
}

/// One priced order line carrying the catalog snapshot that will be
/// frozen onto the order item.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_title: String,
    pub product_description: Option<String>,
    pub product_image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    /// List price at pricing time.
    pub original_price: Decimal,
    /// Price charged per unit after any open promotional window.
    pub unit_price: Decimal,
    pub discount_applied: bool,
    pub quantity: i32,
    pub line_total: Decimal,
    pub weight_grams: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub total_weight_grams: i32,
}

/// Prices a set of items against the current catalog. Unknown and
/// inactive products both reject the whole cart; callers never get a
/// partially priced result.
pub async fn price_items<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItemInput],
) -> Result<PricedCart, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        item.validate()?;
    }

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = catalog::load_products(conn, &ids).await?;
    let now = Utc::now();

    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut total_weight_grams: i32 = 0;

    for item in items {
        let product = products
            .get(&item.product_id)
            .ok_or(ServiceError::ProductUnavailable(item.product_id))?;
        if !product.is_active {
            return Err(ServiceError::ProductUnavailable(product.id));
        }

        let (unit_price, discount_applied) = product.effective_unit_price(now);
        let quantity = Decimal::from(item.quantity);
        let line_total = round_money(unit_price * quantity);
        let weight_grams = product.unit_weight_grams() * item.quantity;

        subtotal += line_total;
        total_weight_grams += weight_grams;

        lines.push(PricedLine {
            product_id: product.id,
            product_title: product.title.clone(),
            product_description: product.description.clone(),
            product_image_url: product.image_url.clone(),
            category_id: product.category_id,
            category_name: product.category_name.clone(),
            original_price: product.price,
            unit_price,
            discount_applied,
            quantity: item.quantity,
            line_total,
            weight_grams,
        });
    }

    Ok(PricedCart {
        lines,
        subtotal: round_money(subtotal),
        total_weight_grams,
    })
}
