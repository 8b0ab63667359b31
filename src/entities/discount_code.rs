use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed_amount")]
    FixedAmount,
    #[sea_orm(string_value = "free_shipping")]
    FreeShipping,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::FixedAmount => write!(f, "fixed_amount"),
            DiscountType::FreeShipping => write!(f, "free_shipping"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Stored uppercase; lookups normalize before comparing
    #[sea_orm(unique)]
    pub code: String,

    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percentage points for percentage codes, an amount otherwise
    pub value: Decimal,

    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,

    pub usage_limit: Option<i32>,
    pub usage_limit_per_customer: Option<i32>,
    /// Monotonic counter, bumped only by the guarded increment
    pub usage_count: i32,

    /// JSON arrays of UUIDs; None means unrestricted
    pub product_ids: Option<String>,
    pub category_ids: Option<String>,
    pub customer_ids: Option<String>,

    pub first_time_customer_only: bool,
    pub new_customer_only: bool,

    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields the duplicate operation may change; everything left `None` is
/// copied from the source code unchanged.
#[derive(Debug, Default, Clone)]
pub struct DiscountOverrides {
    pub description: Option<String>,
    pub value: Option<Decimal>,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_customer: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl Model {
    fn parse_id_list(raw: &Option<String>) -> Vec<Uuid> {
        raw.as_deref()
            .and_then(|json| serde_json::from_str::<Vec<Uuid>>(json).ok())
            .unwrap_or_default()
    }

    pub fn product_id_list(&self) -> Vec<Uuid> {
        Self::parse_id_list(&self.product_ids)
    }

    pub fn category_id_list(&self) -> Vec<Uuid> {
        Self::parse_id_list(&self.category_ids)
    }

    pub fn customer_id_list(&self) -> Vec<Uuid> {
        Self::parse_id_list(&self.customer_ids)
    }

    /// Whether the code restricts which lines it applies to.
    pub fn is_item_restricted(&self) -> bool {
        !self.product_id_list().is_empty() || !self.category_id_list().is_empty()
    }

    /// Explicit copy constructor for the duplicate flow: a fresh,
    /// independent row sharing the rules of this one. The usage counter
    /// always restarts at zero.
    pub fn clone_with(&self, new_code: String, overrides: DiscountOverrides) -> ActiveModel {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(new_code.to_uppercase()),
            description: Set(overrides.description.or_else(|| self.description.clone())),
            discount_type: Set(self.discount_type),
            value: Set(overrides.value.unwrap_or(self.value)),
            minimum_order_amount: Set(overrides
                .minimum_order_amount
                .or(self.minimum_order_amount)),
            maximum_discount_amount: Set(overrides
                .maximum_discount_amount
                .or(self.maximum_discount_amount)),
            usage_limit: Set(overrides.usage_limit.or(self.usage_limit)),
            usage_limit_per_customer: Set(overrides
                .usage_limit_per_customer
                .or(self.usage_limit_per_customer)),
            usage_count: Set(0),
            product_ids: Set(self.product_ids.clone()),
            category_ids: Set(self.category_ids.clone()),
            customer_ids: Set(self.customer_ids.clone()),
            first_time_customer_only: Set(self.first_time_customer_only),
            new_customer_only: Set(self.new_customer_only),
            starts_at: Set(overrides.starts_at.or(self.starts_at)),
            expires_at: Set(overrides.expires_at.or(self.expires_at)),
            is_active: Set(overrides.is_active.unwrap_or(self.is_active)),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::discount_code_usage::Entity")]
    Usages,
}

impl Related<super::discount_code_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usages.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
