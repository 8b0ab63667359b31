use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::{RuntimeSettings, DEFAULT_CURRENCY};
use crate::db::DbPool;
use crate::entities::{customer, discount_code_usage, order, order_item, OrderStatus};
use crate::errors::{DiscountRejection, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::catalog;
use crate::services::customers;
use crate::services::discounts::{AppliedDiscount, DiscountContext, DiscountService};
use crate::services::pricing::{self, OrderItemInput, PricedCart, PricedLine};
use crate::services::shipping::ShippingService;

/// Destination assumed when the address does not name one.
pub const DEFAULT_SHIP_COUNTRY: &str = "KW";

fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount cannot be negative".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInput {
    #[validate(length(min = 8, max = 20, message = "Phone must be 8 to 20 characters"))]
    pub phone: String,
    #[validate(length(max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Address {
    #[validate(length(min = 1, max = 200, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 80, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 80, message = "Governorate is required"))]
    pub governorate: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    /// ISO 3166-1 alpha-2; defaults to KW.
    #[validate(length(equal = 2, message = "Country must be a 2-letter code"))]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerInput,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
    #[validate]
    pub shipping_address: Address,
    pub discount_code: Option<String>,
    /// Overrides the quoted shipping amount when supplied (admin flows).
    #[validate(custom = "validate_non_negative_decimal")]
    pub shipping_amount: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PreviewOrderRequest {
    #[validate(length(min = 1, message = "Preview requires at least one item"))]
    pub items: Vec<OrderItemInput>,
    pub discount_code: Option<String>,
    pub customer_phone: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AttachDiscountRequest {
    #[validate(length(min = 1, max = 64, message = "Code is required"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_amount: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub discount_code: Option<String>,
    pub free_shipping: bool,
    pub tracking_number: String,
    pub shipping_address: Address,
    pub notes: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub product_description: Option<String>,
    pub product_image_url: Option<String>,
    pub category_name: Option<String>,
    pub original_price: Decimal,
    pub unit_price: Decimal,
    pub discount_applied: bool,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderPreviewResponse {
    pub lines: Vec<PricedLine>,
    pub subtotal_amount: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub free_shipping: bool,
    pub total_weight_grams: i32,
    pub discount: Option<AppliedDiscount>,
}

/// Public tracking projection: no customer or address data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackOrderResponse {
    pub order_number: String,
    pub status: OrderStatus,
    pub tracking_number: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Owns the order lifecycle: creation, discount attachment, status
/// transitions and the read surface.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    discounts: Arc<DiscountService>,
    shipping: Arc<ShippingService>,
    settings: RuntimeSettings,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        discounts: Arc<DiscountService>,
        shipping: Arc<ShippingService>,
        settings: RuntimeSettings,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            discounts,
            shipping,
            settings,
            event_sender,
        }
    }

    /// Prices, discounts and persists a new order in one transaction.
    /// Any failure past validation rolls everything back: no partial
    /// order, no partial discount usage.
    #[instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        if !self.settings.orders_enabled() {
            return Err(ServiceError::InvalidOperation(
                "Ordering is temporarily disabled".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let CreateOrderRequest {
            customer: customer_input,
            items,
            shipping_address,
            discount_code,
            shipping_amount: shipping_override,
            notes,
        } = request;

        let customer = customers::find_or_create_by_phone(
            db,
            &customer_input.phone,
            customer_input.name.as_deref(),
            customer_input.email.as_deref(),
        )
        .await?;

        let cart = pricing::price_items(db, &items).await?;

        let applied = match &discount_code {
            Some(code) => {
                let ctx = DiscountContext {
                    cart: &cart,
                    customer: Some(&customer),
                    customer_phone: &customer.phone,
                    now,
                };
                Some(self.discounts.validate(code, &ctx).await?)
            }
            None => None,
        };

        let discount_amount = applied.as_ref().map(|a| a.amount).unwrap_or(Decimal::ZERO);
        let free_shipping = applied.as_ref().map(|a| a.free_shipping).unwrap_or(false);

        let ship_country = shipping_address
            .country
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_SHIP_COUNTRY.to_string());

        let shipping_amount = if free_shipping {
            Decimal::ZERO
        } else if let Some(override_amount) = shipping_override {
            pricing::round_money(override_amount)
        } else {
            self.shipping
                .quote(&ship_country, cart.total_weight_grams)
                .await?
                .amount
        };

        let total_amount = cart.subtotal - discount_amount + shipping_amount;

        let order_id = Uuid::new_v4();
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            customer_id: Set(customer.id),
            status: Set(OrderStatus::Pending),
            subtotal_amount: Set(cart.subtotal),
            discount_amount: Set(discount_amount),
            shipping_amount: Set(shipping_amount),
            total_amount: Set(total_amount),
            currency: Set(DEFAULT_CURRENCY.to_string()),
            discount_code: Set(applied.as_ref().map(|a| a.code.clone())),
            free_shipping: Set(free_shipping),
            tracking_number: Set(generate_tracking_number()),
            ship_street: Set(shipping_address.street),
            ship_city: Set(shipping_address.city),
            ship_governorate: Set(shipping_address.governorate),
            ship_postal_code: Set(shipping_address.postal_code),
            ship_notes: Set(shipping_address.notes),
            ship_country: Set(ship_country),
            notes: Set(notes),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !order_model.amounts_consistent() {
            return Err(ServiceError::InternalError(
                "Order amounts failed the consistency check".to_string(),
            ));
        }

        for line in &cart.lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_title: Set(line.product_title.clone()),
                product_description: Set(line.product_description.clone()),
                product_image_url: Set(line.product_image_url.clone()),
                category_name: Set(line.category_name.clone()),
                original_price: Set(line.original_price),
                unit_price: Set(line.unit_price),
                discount_applied: Set(line.discount_applied),
                quantity: Set(line.quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        if let Some(applied) = &applied {
            self.discounts
                .record_usage(&txn, applied, order_id, customer.id, &customer.phone)
                .await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            order_number = %order_model.order_number,
            total_amount = %order_model.total_amount,
            "Order created"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id,
                    order_number: order_model.order_number.clone(),
                    total_amount: order_model.total_amount,
                })
                .await;
            if let Some(applied) = &applied {
                sender
                    .send_or_log(Event::DiscountApplied {
                        order_id,
                        code: applied.code.clone(),
                        amount: applied.amount,
                    })
                    .await;
            }
        }

        Ok(order_to_response(order_model))
    }

    /// Prices a cart, optionally judging a discount code, without
    /// touching any state.
    #[instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn preview_order(
        &self,
        request: PreviewOrderRequest,
    ) -> Result<OrderPreviewResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let cart = pricing::price_items(db, &request.items).await?;

        let applied = match &request.discount_code {
            Some(code) => {
                let normalized_phone = request
                    .customer_phone
                    .as_deref()
                    .map(customers::normalize_phone)
                    .transpose()?;
                let existing_customer = match &normalized_phone {
                    Some(phone) => {
                        customer::Entity::find()
                            .filter(customer::Column::Phone.eq(phone))
                            .one(db)
                            .await?
                    }
                    None => None,
                };
                let ctx = DiscountContext {
                    cart: &cart,
                    customer: existing_customer.as_ref(),
                    customer_phone: normalized_phone.as_deref().unwrap_or(""),
                    now,
                };
                Some(self.discounts.validate(code, &ctx).await?)
            }
            None => None,
        };

        let discount_amount = applied.as_ref().map(|a| a.amount).unwrap_or(Decimal::ZERO);
        let free_shipping = applied.as_ref().map(|a| a.free_shipping).unwrap_or(false);

        let country = request
            .country
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_SHIP_COUNTRY.to_string());
        let shipping_amount = if free_shipping {
            Decimal::ZERO
        } else {
            self.shipping
                .quote(&country, cart.total_weight_grams)
                .await?
                .amount
        };

        Ok(OrderPreviewResponse {
            subtotal_amount: cart.subtotal,
            discount_amount,
            shipping_amount,
            total_amount: cart.subtotal - discount_amount + shipping_amount,
            free_shipping,
            total_weight_grams: cart.total_weight_grams,
            lines: cart.lines,
            discount: applied,
        })
    }

    /// Attaches a code to an existing order. Allowed only before
    /// payment and only once per order; the amounts are recomputed
    /// against the stored snapshot prices.
    #[instrument(skip(self, request), fields(order_id = %order_id, code = %request.code))]
    pub async fn attach_discount(
        &self,
        order_id: Uuid,
        request: AttachDiscountRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let order_model = self.load_order(order_id).await?;
        ensure_discount_attachable(&order_model)?;

        let usage_count = discount_code_usage::Entity::find()
            .filter(discount_code_usage::Column::OrderId.eq(order_id))
            .count(db)
            .await?;
        if usage_count > 0 {
            return Err(DiscountRejection::AlreadyApplied.into());
        }

        let customer = customer::Entity::find_by_id(order_model.customer_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Order {} references a missing customer",
                    order_id
                ))
            })?;

        let cart = rebuild_cart(db, &order_model).await?;
        let ctx = DiscountContext {
            cart: &cart,
            customer: Some(&customer),
            customer_phone: &customer.phone,
            now,
        };
        let applied = self.discounts.validate(&request.code, &ctx).await?;

        let txn = db.begin().await?;

        // Re-read inside the transaction: another request may have
        // attached a code since the checks above.
        let fresh = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_discount_attachable(&fresh)?;

        let shipping_amount = if applied.free_shipping {
            Decimal::ZERO
        } else {
            fresh.shipping_amount
        };
        let total_amount = fresh.subtotal_amount - applied.amount + shipping_amount;
        let version = fresh.version;

        let mut active: order::ActiveModel = fresh.into();
        active.discount_code = Set(Some(applied.code.clone()));
        active.discount_amount = Set(applied.amount);
        active.free_shipping = Set(applied.free_shipping);
        active.shipping_amount = Set(shipping_amount);
        active.total_amount = Set(total_amount);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        self.discounts
            .record_usage(&txn, &applied, order_id, customer.id, &customer.phone)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, code = %applied.code, amount = %applied.amount, "Discount attached to order");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::DiscountApplied {
                    order_id,
                    code: applied.code.clone(),
                    amount: applied.amount,
                })
                .await;
        }

        Ok(order_to_response(updated))
    }

    /// Moves an order along the lifecycle. Transitions outside the
    /// table are rejected, not coerced.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let new_status = request.status;

        let txn = db.begin().await?;

        let order_model = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order_model.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let version = order_model.version;
        let mut active: order::ActiveModel = order_model.into();
        active.status = Set(new_status);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(now));
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                })
                .await;
            match new_status {
                OrderStatus::Shipped => {
                    sender
                        .send_or_log(Event::OrderShipped {
                            order_id,
                            tracking_number: updated.tracking_number.clone(),
                        })
                        .await;
                }
                OrderStatus::Delivered => {
                    sender.send_or_log(Event::OrderDelivered(order_id)).await;
                }
                OrderStatus::Cancelled => {
                    sender.send_or_log(Event::OrderCancelled(order_id)).await;
                }
                _ => {}
            }
        }

        Ok(order_to_response(updated))
    }

    /// Customer-facing cancellation: allowed until payment completes,
    /// and cancelling an already-cancelled order succeeds quietly.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order_model = self.load_order(order_id).await?;

        if order_model.status == OrderStatus::Cancelled {
            info!(order_id = %order_id, "Order already cancelled");
            return Ok(order_to_response(order_model));
        }

        if !order_model.status.is_cancellable() {
            return Err(ServiceError::InvalidStatusTransition {
                from: order_model.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        self.update_status(
            order_id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Cancelled,
                notes: None,
            },
        )
        .await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order_model = self.load_order(order_id).await?;
        Ok(order_to_response(order_model))
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemResponse>, ServiceError> {
        // Ensures a 404 for unknown orders instead of an empty list.
        self.load_order(order_id).await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db_pool)
            .await?;

        Ok(items.into_iter().map(item_to_response).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(order_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Public tracking lookup by order number.
    #[instrument(skip(self))]
    pub async fn track(&self, order_number: &str) -> Result<TrackOrderResponse, ServiceError> {
        let order_model = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number.trim().to_uppercase()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", order_number))
            })?;

        Ok(TrackOrderResponse {
            order_number: order_model.order_number,
            status: order_model.status,
            tracking_number: order_model.tracking_number,
            total_amount: order_model.total_amount,
            currency: order_model.currency,
            created_at: order_model.created_at,
        })
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

fn ensure_discount_attachable(order_model: &order::Model) -> Result<(), ServiceError> {
    if !matches!(
        order_model.status,
        OrderStatus::Pending | OrderStatus::AwaitingPayment
    ) {
        return Err(ServiceError::InvalidOperation(format!(
            "A discount cannot be attached to an order in status {}",
            order_model.status
        )));
    }
    if order_model.discount_code.is_some() {
        return Err(DiscountRejection::AlreadyApplied.into());
    }
    Ok(())
}

/// Reconstructs a priced cart from the stored item snapshots, with
/// category ids refreshed from the catalog for eligibility checks.
async fn rebuild_cart<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order_model: &order::Model,
) -> Result<PricedCart, ServiceError> {
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_model.id))
        .all(conn)
        .await?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = catalog::load_products(conn, &ids).await?;

    let mut total_weight_grams = 0;
    let lines = items
        .into_iter()
        .map(|item| {
            let product = products.get(&item.product_id);
            let weight_grams = product
                .map(|p| p.unit_weight_grams() * item.quantity)
                .unwrap_or(0);
            total_weight_grams += weight_grams;
            PricedLine {
                line_total: item.line_total(),
                product_id: item.product_id,
                product_title: item.product_title,
                product_description: item.product_description,
                product_image_url: item.product_image_url,
                category_id: product.and_then(|p| p.category_id),
                category_name: item.category_name,
                original_price: item.original_price,
                unit_price: item.unit_price,
                discount_applied: item.discount_applied,
                quantity: item.quantity,
                weight_grams,
            }
        })
        .collect();

    Ok(PricedCart {
        lines,
        subtotal: order_model.subtotal_amount,
        total_weight_grams,
    })
}

fn generate_order_number() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

fn generate_tracking_number() -> String {
    format!("TRK-{:010}", thread_rng().gen_range(0u64..10_000_000_000))
}

fn order_to_response(model: order::Model) -> OrderResponse {
    OrderResponse {
        id: model.id,
        order_number: model.order_number,
        customer_id: model.customer_id,
        status: model.status,
        subtotal_amount: model.subtotal_amount,
        discount_amount: model.discount_amount,
        shipping_amount: model.shipping_amount,
        total_amount: model.total_amount,
        currency: model.currency,
        discount_code: model.discount_code,
        free_shipping: model.free_shipping,
        tracking_number: model.tracking_number,
        shipping_address: Address {
            street: model.ship_street,
            city: model.ship_city,
            governorate: model.ship_governorate,
            postal_code: model.ship_postal_code,
            notes: model.ship_notes,
            country: Some(model.ship_country),
        },
        notes: model.notes,
        version: model.version,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn item_to_response(model: order_item::Model) -> OrderItemResponse {
    OrderItemResponse {
        line_total: model.line_total(),
        id: model.id,
        product_id: model.product_id,
        product_title: model.product_title,
        product_description: model.product_description,
        product_image_url: model.product_image_url,
        category_name: model.category_name,
        original_price: model.original_price,
        unit_price: model.unit_price,
        discount_applied: model.discount_applied,
        quantity: model.quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_numbers_follow_the_dated_format() {
        let number = generate_order_number();
        let today = Utc::now().format("%Y%m%d").to_string();

        assert_eq!(number.len(), "ORD-20250601-A1B2C3".len());
        assert!(number.starts_with(&format!("ORD-{}-", today)));
        assert!(number
            .rsplit('-')
            .next()
            .unwrap()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn tracking_numbers_are_ten_digits() {
        let number = generate_tracking_number();
        assert!(number.starts_with("TRK-"));
        assert_eq!(number.len(), 14);
        assert!(number[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn create_request_rejects_bad_inputs() {
        let valid = CreateOrderRequest {
            customer: CustomerInput {
                phone: "+96550001234".into(),
                name: Some("Fatima Al-Sabah".into()),
                email: None,
            },
            items: vec![OrderItemInput {
                product_id: Uuid::new_v4(),
                quantity: 2,
            }],
            shipping_address: Address {
                street: "Block 4, Street 12, House 7".into(),
                city: "Salmiya".into(),
                governorate: "Hawalli".into(),
                postal_code: None,
                notes: None,
                country: Some("KW".into()),
            },
            discount_code: Some("SAVE10".into()),
            shipping_amount: None,
            notes: None,
        };
        assert!(valid.validate().is_ok());

        let mut empty_items = valid.clone();
        empty_items.items.clear();
        assert!(empty_items.validate().is_err());

        let mut bad_phone = valid.clone();
        bad_phone.customer.phone = "1234".into();
        assert!(bad_phone.validate().is_err());

        let mut bad_email = valid.clone();
        bad_email.customer.email = Some("not-an-email".into());
        assert!(bad_email.validate().is_err());

        let mut negative_shipping = valid.clone();
        negative_shipping.shipping_amount = Some(dec!(-1));
        assert!(negative_shipping.validate().is_err());

        let mut long_country = valid;
        long_country.shipping_address.country = Some("KWT".into());
        assert!(long_country.validate().is_err());
    }

    #[test]
    fn discount_attachable_only_before_payment() {
        let base = order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-20250601-A1B2C3".into(),
            customer_id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            subtotal_amount: dec!(25.000),
            discount_amount: dec!(0),
            shipping_amount: dec!(2.000),
            total_amount: dec!(27.000),
            currency: "KWD".into(),
            discount_code: None,
            free_shipping: false,
            tracking_number: "TRK-0000000001".into(),
            ship_street: "Block 4, Street 12".into(),
            ship_city: "Salmiya".into(),
            ship_governorate: "Hawalli".into(),
            ship_postal_code: None,
            ship_notes: None,
            ship_country: "KW".into(),
            notes: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert!(ensure_discount_attachable(&base).is_ok());

        let mut paid = base.clone();
        paid.status = OrderStatus::Paid;
        assert!(matches!(
            ensure_discount_attachable(&paid),
            Err(ServiceError::InvalidOperation(_))
        ));

        let mut already = base;
        already.discount_code = Some("SAVE10".into());
        assert!(matches!(
            ensure_discount_attachable(&already),
            Err(ServiceError::DiscountRejected(
                DiscountRejection::AlreadyApplied
            ))
        ));
    }
}
