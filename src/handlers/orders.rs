use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::OrderStatus;
use crate::services::orders::{
    AttachDiscountRequest, CreateOrderRequest, OrderItemResponse, OrderPreviewResponse,
    OrderResponse, PreviewOrderRequest, TrackOrderResponse, UpdateOrderStatusRequest,
};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

/// Query parameters for the order list endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
}

/// Formats validator output the way clients expect it: one
/// "field: message" line per failure.
pub(crate) fn collect_field_errors(validation_errors: validator::ValidationErrors) -> Vec<String> {
    validation_errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            let field = field.to_string();
            errors.iter().map(move |error| {
                format!(
                    "{}: {}",
                    field,
                    error.message.as_ref().unwrap_or(&"Invalid value".into())
                )
            })
        })
        .collect()
}

/// Create a new order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Price the items, apply an optional discount code, quote shipping and persist the order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Ordering disabled or invalid request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation or discount rejection", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    if let Err(validation_errors) = request.validate() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::validation_errors(collect_field_errors(
                validation_errors,
            ))),
        ));
    }

    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Preview an order without persisting anything
#[utoipa::path(
    post,
    path = "/api/v1/orders/preview",
    summary = "Preview order totals",
    description = "Price the items and judge an optional discount code without touching any state",
    request_body = PreviewOrderRequest,
    responses(
        (status = 200, description = "Preview computed", body = ApiResponse<OrderPreviewResponse>),
        (status = 422, description = "Validation or discount rejection", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn preview_order(
    State(state): State<AppState>,
    Json(request): Json<PreviewOrderRequest>,
) -> Result<Json<ApiResponse<OrderPreviewResponse>>, ServiceError> {
    if let Err(validation_errors) = request.validate() {
        return Err(ServiceError::ValidationError(
            collect_field_errors(validation_errors).join("; "),
        ));
    }

    let preview = state.services.orders.preview_order(request).await?;
    Ok(Json(ApiResponse::success(preview)))
}

/// List orders with pagination and optional status filtering
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let limit = query
        .limit
        .clamp(1, state.config.api_max_page_size as u64);
    let page = query.page.max(1);

    let result = state
        .services
        .orders
        .list_orders(page, limit, query.status)
        .await?;
    let total_pages = result.total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: result.orders,
        total: result.total,
        page,
        limit,
        total_pages,
    })))
}

/// Get a single order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Get the line items of an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    summary = "Get order items",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Items retrieved", body = ApiResponse<Vec<OrderItemResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ServiceError> {
    let items = state.services.orders.get_order_items(id).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Attach a discount code to an existing order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/discount",
    summary = "Attach discount code",
    description = "Apply a code to an order that has not been paid yet; the totals are recomputed",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AttachDiscountRequest,
    responses(
        (status = 200, description = "Discount attached", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order is past the point of discounting", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Discount rejected", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn attach_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachDiscountRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.attach_discount(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update the status of an order
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Move an order along its lifecycle; transitions outside the allowed table are rejected",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.update_status(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Customer-facing cancellation; cancelling an already-cancelled order succeeds",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order can no longer be cancelled", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.cancel(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Track an order by its public order number
#[utoipa::path(
    get,
    path = "/api/v1/orders/track/{order_number}",
    summary = "Track order",
    description = "Public tracking projection; exposes no customer or address data",
    params(("order_number" = String, Path, description = "Order number, e.g. ORD-20250601-A1B2C3")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<TrackOrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<TrackOrderResponse>>, ServiceError> {
    let tracked = state.services.orders.track(&order_number).await?;
    Ok(Json(ApiResponse::success(tracked)))
}
