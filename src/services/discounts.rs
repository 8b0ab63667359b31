use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::DbPool;
use crate::entities::discount_code::{self, DiscountOverrides, DiscountType};
use crate::entities::{customer, discount_code_usage, order, OrderStatus};
use crate::errors::{DiscountRejection, ServiceError};
use crate::services::pricing::{round_money, PricedCart};

/// A customer created within this window still counts as new.
pub const NEW_CUSTOMER_WINDOW_DAYS: i64 = 30;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{2,31}$").unwrap());

fn validate_code_format(code: &str) -> Result<(), ValidationError> {
    if CODE_RE.is_match(&code.trim().to_uppercase()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("format");
        err.message =
            Some("Code must be 3-32 characters: letters, digits, '-' or '_'".into());
        Err(err)
    }
}

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Value must be greater than 0".into());
        Err(err)
    }
}

/// Everything `validate` needs to judge a code against one cart.
#[derive(Debug, Clone, Copy)]
pub struct DiscountContext<'a> {
    pub cart: &'a PricedCart,
    /// The resolved customer, when one exists for the phone.
    pub customer: Option<&'a customer::Model>,
    pub customer_phone: &'a str,
    pub now: DateTime<Utc>,
}

/// The outcome of a successful validation: what the code is worth
/// against this cart.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedDiscount {
    #[serde(skip)]
    pub code_id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub free_shipping: bool,
    /// Portion of the cart the code was judged against.
    pub eligible_subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountCodeRequest {
    #[validate(custom = "validate_code_format")]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom = "validate_positive_decimal")]
    pub value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_customer: Option<i32>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    pub customer_ids: Vec<Uuid>,
    #[serde(default)]
    pub first_time_customer_only: bool,
    #[serde(default)]
    pub new_customer_only: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DuplicateDiscountCodeRequest {
    #[validate(custom = "validate_code_format")]
    pub new_code: String,
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

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscountCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_customer: Option<i32>,
    pub usage_count: i32,
    pub product_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
    pub customer_ids: Vec<Uuid>,
    pub first_time_customer_only: bool,
    pub new_customer_only: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscountCodeListResponse {
    pub discount_codes: Vec<DiscountCodeResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Validates and applies discount codes, and keeps the usage ledger.
#[derive(Clone)]
pub struct DiscountService {
    db_pool: Arc<DbPool>,
}

impl DiscountService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Judges a code against a priced cart. Checks run in a fixed
    /// order and the first failure wins, so the caller always gets the
    /// most fundamental reason.
    #[instrument(skip(self, ctx), fields(code = %code))]
    pub async fn validate(
        &self,
        code: &str,
        ctx: &DiscountContext<'_>,
    ) -> Result<AppliedDiscount, ServiceError> {
        let db = &*self.db_pool;
        let normalized = code.trim().to_uppercase();

        let code_row = discount_code::Entity::find()
            .filter(discount_code::Column::Code.eq(&normalized))
            .one(db)
            .await?
            .ok_or(DiscountRejection::UnknownCode)?;

        if !code_row.is_active {
            return Err(DiscountRejection::Inactive.into());
        }

        if let Some(starts_at) = code_row.starts_at {
            if ctx.now < starts_at {
                return Err(DiscountRejection::NotStarted.into());
            }
        }
        if let Some(expires_at) = code_row.expires_at {
            if ctx.now > expires_at {
                return Err(DiscountRejection::Expired.into());
            }
        }

        if let Some(limit) = code_row.usage_limit {
            if code_row.usage_count >= limit {
                return Err(DiscountRejection::Exhausted.into());
            }
        }

        if let Some(per_customer) = code_row.usage_limit_per_customer {
            let used = self.count_customer_usages(code_row.id, ctx).await?;
            if used >= per_customer as u64 {
                return Err(DiscountRejection::CustomerLimitReached.into());
            }
        }

        if code_row.first_time_customer_only && self.has_prior_order(ctx).await? {
            return Err(DiscountRejection::FirstOrderOnly.into());
        }

        if code_row.new_customer_only {
            if let Some(c) = ctx.customer {
                if ctx.now - c.created_at > Duration::days(NEW_CUSTOMER_WINDOW_DAYS) {
                    return Err(DiscountRejection::NewCustomersOnly.into());
                }
            }
        }

        let allowed_customers = code_row.customer_id_list();
        if !allowed_customers.is_empty() {
            match ctx.customer {
                Some(c) if allowed_customers.contains(&c.id) => {}
                _ => return Err(DiscountRejection::NotEligible.into()),
            }
        }

        let eligible_subtotal = eligible_subtotal(&code_row, ctx.cart)?;

        if let Some(minimum) = code_row.minimum_order_amount {
            if eligible_subtotal < minimum {
                return Err(DiscountRejection::BelowMinimum { minimum }.into());
            }
        }

        let (amount, free_shipping) =
            compute_amount(&code_row, eligible_subtotal, ctx.cart.subtotal);

        Ok(AppliedDiscount {
            code_id: code_row.id,
            code: normalized,
            discount_type: code_row.discount_type,
            amount,
            free_shipping,
            eligible_subtotal,
        })
    }

    /// Consumes one use of the code for an order. Run inside the order
    /// transaction: the guarded increment re-checks the global limit at
    /// write time, so of N concurrent orders racing for the last use
    /// exactly one commits.
    pub async fn record_usage<C: ConnectionTrait>(
        &self,
        conn: &C,
        applied: &AppliedDiscount,
        order_id: Uuid,
        customer_id: Uuid,
        customer_phone: &str,
    ) -> Result<(), ServiceError> {
        let guarded = discount_code::Entity::update_many()
            .col_expr(
                discount_code::Column::UsageCount,
                Expr::col(discount_code::Column::UsageCount).add(1),
            )
            .col_expr(
                discount_code::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(discount_code::Column::Id.eq(applied.code_id))
            .filter(
                Condition::any()
                    .add(discount_code::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(discount_code::Column::UsageCount)
                            .lt(Expr::col(discount_code::Column::UsageLimit)),
                    ),
            )
            .exec(conn)
            .await?;

        if guarded.rows_affected == 0 {
            return Err(DiscountRejection::Exhausted.into());
        }

        let usage = discount_code_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            discount_code_id: Set(applied.code_id),
            order_id: Set(order_id),
            customer_id: Set(customer_id),
            customer_phone: Set(customer_phone.to_string()),
            ..Default::default()
        };

        match usage.insert(conn).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(DiscountRejection::AlreadyApplied.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a new code. The code string is stored uppercase.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreateDiscountCodeRequest,
    ) -> Result<DiscountCodeResponse, ServiceError> {
        request.validate()?;

        if request.discount_type == DiscountType::Percentage && request.value > Decimal::from(100)
        {
            return Err(ServiceError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }

        let model = discount_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code.trim().to_uppercase()),
            description: Set(request.description),
            discount_type: Set(request.discount_type),
            value: Set(request.value),
            minimum_order_amount: Set(request.minimum_order_amount),
            maximum_discount_amount: Set(request.maximum_discount_amount),
            usage_limit: Set(request.usage_limit),
            usage_limit_per_customer: Set(request.usage_limit_per_customer),
            usage_count: Set(0),
            product_ids: Set(encode_id_list(&request.product_ids)?),
            category_ids: Set(encode_id_list(&request.category_ids)?),
            customer_ids: Set(encode_id_list(&request.customer_ids)?),
            first_time_customer_only: Set(request.first_time_customer_only),
            new_customer_only: Set(request.new_customer_only),
            starts_at: Set(request.starts_at),
            expires_at: Set(request.expires_at),
            is_active: Set(true),
            ..Default::default()
        };

        match model.insert(&*self.db_pool).await {
            Ok(created) => {
                info!(code = %created.code, "Discount code created");
                Ok(model_to_response(created))
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                ServiceError::Conflict("A discount code with this code already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<DiscountCodeListResponse, ServiceError> {
        let paginator = discount_code::Entity::find()
            .order_by_desc(discount_code::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let codes = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(DiscountCodeListResponse {
            discount_codes: codes.into_iter().map(model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, code: &str) -> Result<DiscountCodeResponse, ServiceError> {
        let row = self.find_by_code(code).await?;
        Ok(model_to_response(row))
    }

    /// Turns a code off. Already-inactive codes deactivate again
    /// without complaint.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, code: &str) -> Result<DiscountCodeResponse, ServiceError> {
        let row = self.find_by_code(code).await?;
        if !row.is_active {
            return Ok(model_to_response(row));
        }

        let mut active: discount_code::ActiveModel = row.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;

        info!(code = %updated.code, "Discount code deactivated");
        Ok(model_to_response(updated))
    }

    /// Clones an existing code under a new name. Rules carry over,
    /// the usage counter restarts at zero, and individual fields may be
    /// overridden in the same call.
    #[instrument(skip(self, request), fields(new_code = %request.new_code))]
    pub async fn duplicate(
        &self,
        source_code: &str,
        request: DuplicateDiscountCodeRequest,
    ) -> Result<DiscountCodeResponse, ServiceError> {
        request.validate()?;

        let source = self.find_by_code(source_code).await?;
        let overrides = DiscountOverrides {
            description: request.description,
            value: request.value,
            minimum_order_amount: request.minimum_order_amount,
            maximum_discount_amount: request.maximum_discount_amount,
            usage_limit: request.usage_limit,
            usage_limit_per_customer: request.usage_limit_per_customer,
            starts_at: request.starts_at,
            expires_at: request.expires_at,
            is_active: request.is_active,
        };

        let clone = source.clone_with(request.new_code.trim().to_string(), overrides);
        match clone.insert(&*self.db_pool).await {
            Ok(created) => {
                info!(source = %source_code, code = %created.code, "Discount code duplicated");
                Ok(model_to_response(created))
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                ServiceError::Conflict("A discount code with this code already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<discount_code::Model, ServiceError> {
        discount_code::Entity::find()
            .filter(discount_code::Column::Code.eq(code.trim().to_uppercase()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount code {} not found", code)))
    }

    /// Uses by this customer, matched by id or phone so a guest order
    /// and a later account share one budget.
    async fn count_customer_usages(
        &self,
        code_id: Uuid,
        ctx: &DiscountContext<'_>,
    ) -> Result<u64, ServiceError> {
        let mut matcher = Condition::any()
            .add(discount_code_usage::Column::CustomerPhone.eq(ctx.customer_phone));
        if let Some(c) = ctx.customer {
            matcher = matcher.add(discount_code_usage::Column::CustomerId.eq(c.id));
        }

        let count = discount_code_usage::Entity::find()
            .filter(discount_code_usage::Column::DiscountCodeId.eq(code_id))
            .filter(matcher)
            .count(&*self.db_pool)
            .await?;
        Ok(count)
    }

    /// Whether the customer has any non-cancelled order already.
    async fn has_prior_order(&self, ctx: &DiscountContext<'_>) -> Result<bool, ServiceError> {
        let customer = match ctx.customer {
            Some(customer) => customer,
            None => return Ok(false),
        };

        let count = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer.id))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .count(&*self.db_pool)
            .await?;
        Ok(count > 0)
    }
}

/// The subtotal the code is judged against: the whole cart for
/// unrestricted codes, matching lines only otherwise.
fn eligible_subtotal(
    code: &discount_code::Model,
    cart: &PricedCart,
) -> Result<Decimal, DiscountRejection> {
    if !code.is_item_restricted() {
        return Ok(cart.subtotal);
    }

    let products = code.product_id_list();
    let categories = code.category_id_list();

    let eligible: Decimal = cart
        .lines
        .iter()
        .filter(|line| {
            products.contains(&line.product_id)
                || line
                    .category_id
                    .map_or(false, |category| categories.contains(&category))
        })
        .map(|line| line.line_total)
        .sum();

    if eligible <= Decimal::ZERO {
        Err(DiscountRejection::NotApplicable)
    } else {
        Ok(eligible)
    }
}

fn compute_amount(
    code: &discount_code::Model,
    eligible_subtotal: Decimal,
    cart_subtotal: Decimal,
) -> (Decimal, bool) {
    let raw = match code.discount_type {
        DiscountType::Percentage => {
            let mut amount = eligible_subtotal * code.value / Decimal::from(100);
            if let Some(cap) = code.maximum_discount_amount {
                amount = amount.min(cap);
            }
            amount
        }
        DiscountType::FixedAmount => code.value.min(eligible_subtotal),
        DiscountType::FreeShipping => return (Decimal::ZERO, true),
    };

    // Clamped so an order total can never go negative.
    let amount = round_money(raw.max(Decimal::ZERO).min(cart_subtotal));
    (amount, false)
}

fn encode_id_list(ids: &[Uuid]) -> Result<Option<String>, ServiceError> {
    if ids.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(ids)?))
    }
}

fn model_to_response(model: discount_code::Model) -> DiscountCodeResponse {
    DiscountCodeResponse {
        product_ids: model.product_id_list(),
        category_ids: model.category_id_list(),
        customer_ids: model.customer_id_list(),
        id: model.id,
        code: model.code,
        description: model.description,
        discount_type: model.discount_type,
        value: model.value,
        minimum_order_amount: model.minimum_order_amount,
        maximum_discount_amount: model.maximum_discount_amount,
        usage_limit: model.usage_limit,
        usage_limit_per_customer: model.usage_limit_per_customer,
        usage_count: model.usage_count,
        first_time_customer_only: model.first_time_customer_only,
        new_customer_only: model.new_customer_only,
        starts_at: model.starts_at,
        expires_at: model.expires_at,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}
