use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weight assumed for products that never had one recorded.
pub const DEFAULT_ITEM_WEIGHT_GRAMS: i32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    /// List price
    pub price: Decimal,
    /// Promotional price, charged only while the window below is open
    pub discount_price: Option<Decimal>,
    pub discount_starts_at: Option<DateTime<Utc>>,
    pub discount_expires_at: Option<DateTime<Utc>>,
    pub weight_grams: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Price the customer pays right now, and whether the product-level
    /// discount was in effect. A discount price at or above the list price
    /// is ignored.
    pub fn effective_unit_price(&self, now: DateTime<Utc>) -> (Decimal, bool) {
        if let Some(discount_price) = self.discount_price {
            if discount_price < self.price && self.discount_window_contains(now) {
                return (discount_price, true);
            }
        }
        (self.price, false)
    }

    fn discount_window_contains(&self, now: DateTime<Utc>) -> bool {
        let started = self.discount_starts_at.map_or(true, |t| now >= t);
        let not_ended = self.discount_expires_at.map_or(true, |t| now <= t);
        started && not_ended
    }

    pub fn unit_weight_grams(&self) -> i32 {
        self.weight_grams.unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
