use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::entities::{country_shipping_rate, shipping_weight_tier};
use crate::errors::ServiceError;
use crate::services::pricing::round_money;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingQuote {
    pub amount: Decimal,
    pub country_code: String,
    /// Upper bound of the tier the shipment landed in.
    pub tier_max_weight_kg: Decimal,
}

/// Quotes shipping from the per-country weight-tier ladders.
#[derive(Clone)]
pub struct ShippingService {
    db_pool: Arc<DbPool>,
}

impl ShippingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Quotes a destination and weight. Unknown destinations are an
    /// error, never a silent default rate.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        country_code: &str,
        weight_grams: i32,
    ) -> Result<ShippingQuote, ServiceError> {
        if weight_grams < 0 {
            return Err(ServiceError::ValidationError(
                "Weight cannot be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let normalized = country_code.trim().to_uppercase();

        let rate = country_shipping_rate::Entity::find()
            .filter(country_shipping_rate::Column::CountryCode.eq(&normalized))
            .one(db)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| ServiceError::ShippingRateNotFound {
                country: normalized.clone(),
            })?;

        let tiers = shipping_weight_tier::Entity::find()
            .filter(shipping_weight_tier::Column::CountryRateId.eq(rate.id))
            .order_by_asc(shipping_weight_tier::Column::MaxWeightKg)
            .all(db)
            .await?;

        if tiers.is_empty() {
            return Err(ServiceError::ShippingRateNotFound {
                country: normalized,
            });
        }

        let weight_kg = Decimal::from(weight_grams) / Decimal::from(1000);
        let (amount, tier_max_weight_kg) = compute_cost(&tiers, weight_kg);

        Ok(ShippingQuote {
            amount,
            country_code: normalized,
            tier_max_weight_kg,
        })
    }
}

/// Walks the tier ladder (ascending bounds) and prices the shipment.
///
/// The matching tier is the first whose bound covers the weight; heavier
/// shipments fall into the last tier. The surcharge bills whole started
/// kilograms beyond the previous tier's bound:
/// `base + base * additional_percentage/100 * excess_kg`. The first tier
/// never carries a surcharge.
fn compute_cost(tiers: &[shipping_weight_tier::Model], weight_kg: Decimal) -> (Decimal, Decimal) {
    let index = tiers
        .iter()
        .position(|t| weight_kg <= t.max_weight_kg)
        .unwrap_or(tiers.len() - 1);
    let tier = &tiers[index];

    let excess_kg = if index == 0 {
        Decimal::ZERO
    } else {
        let previous_bound = tiers[index - 1].max_weight_kg;
        (weight_kg - previous_bound).max(Decimal::ZERO).ceil()
    };

    let surcharge = tier.base_price * tier.additional_percentage / Decimal::from(100) * excess_kg;
    (round_money(tier.base_price + surcharge), tier.max_weight_kg)
}
