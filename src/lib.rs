//! Dukkan API Library
//!
//! This crate provides the core functionality for the Dukkan commerce API:
//! order pricing, discount codes, weight-tiered shipping and payment
//! reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod notifications;
pub mod openapi;
pub mod request_id;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub settings: config::RuntimeSettings,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub(crate) fn default_page() -> u64 {
    1
}
pub(crate) fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


// API routes under /api/v1
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/preview", post(handlers::orders::preview_order))
        .route(
            "/orders/track/:order_number",
            get(handlers::orders::track_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/items", get(handlers::orders::get_order_items))
        .route(
            "/orders/:id/discount",
            post(handlers::orders::attach_discount),
        )
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order));

    let payments = Router::new()
        .route(
            "/payments/initiate",
            post(handlers::payments::initiate_payment),
        )
        .route(
            "/payments/execute",
            post(handlers::payments::execute_payment),
        )
        .route(
            "/payments/order/:order_id",
            get(handlers::payments::get_order_payments),
        )
        .route("/payments/:id", get(handlers::payments::get_payment));

    // Signature-verified, so no auth in front of it
    let payment_webhook = Router::new().route(
        "/webhooks/payment-provider",
        post(handlers::payment_webhooks::payment_webhook),
    );

    let discounts = Router::new()
        .route(
            "/discount-codes",
            post(handlers::discounts::create_discount_code)
                .get(handlers::discounts::list_discount_codes),
        )
        .route(
            "/discount-codes/:code",
            get(handlers::discounts::get_discount_code),
        )
        .route(
            "/discount-codes/:code/duplicate",
            post(handlers::discounts::duplicate_discount_code),
        )
        .route(
            "/discount-codes/:code/deactivate",
            post(handlers::discounts::deactivate_discount_code),
        );

    let shipping = Router::new().route("/shipping/quote", get(handlers::shipping::shipping_quote));

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Orders API
        .merge(orders)
        // Payments API
        .merge(payments)
        .merge(payment_webhook)
        // Discounts API
        .merge(discounts)
        // Shipping API
        .merge(shipping)
        // Admin
        .nest("/admin", handlers::admin::router())
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "dukkan-api",
        "environment": state.config.environment,
        "orders_enabled": state.settings.orders_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    // Check database connectivity
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::gateway::*;
    pub use crate::openapi::*;
    pub use crate::request_id::*;
}
