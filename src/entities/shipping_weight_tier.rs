use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of a country's weight ladder. Tiers are read in ascending
/// `max_weight_kg` order; the first bound at or above the shipment weight
/// wins, and weight past the final bound is surcharged per excess kilogram.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_weight_tiers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub country_rate_id: Uuid,
    pub max_weight_kg: Decimal,
    pub base_price: Decimal,
    /// Percentage of base price added per excess kilogram; zero keeps the
    /// tier flat
    pub additional_percentage: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::country_shipping_rate::Entity",
        from = "Column::CountryRateId",
        to = "super::country_shipping_rate::Column::Id"
    )]
    CountryRate,
}

impl Related<super::country_shipping_rate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CountryRate.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }

        Ok(active_model)
    }
}
