use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::services::payments::{
    ExecutePaymentRequest, ExecutePaymentResponse, InitiatePaymentRequest,
    InitiatePaymentResponse, PaymentResponse,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Initiate a payment for an order
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate",
    summary = "Initiate payment",
    description = "Register an invoice with the payment provider for the order's total and return the hosted payment page URL",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Payment initiated", body = ApiResponse<InitiatePaymentResponse>),
        (status = 400, description = "Order is not payable in its current status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InitiatePaymentResponse>>), ServiceError> {
    let initiated = state.services.payments.initiate(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(initiated))))
}

/// Confirm a payment after the customer returns from the provider
#[utoipa::path(
    post,
    path = "/api/v1/payments/execute",
    summary = "Execute payment",
    description = "Poll the provider for the payment's invoice status and reconcile the result",
    request_body = ExecutePaymentRequest,
    responses(
        (status = 200, description = "Payment reconciled", body = ApiResponse<ExecutePaymentResponse>),
        (status = 404, description = "Payment not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn execute_payment(
    State(state): State<AppState>,
    Json(request): Json<ExecutePaymentRequest>,
) -> Result<Json<ApiResponse<ExecutePaymentResponse>>, ServiceError> {
    let executed = state.services.payments.execute(request).await?;
    Ok(Json(ApiResponse::success(executed)))
}

/// Get a payment by id
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    summary = "Get payment",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment found", body = ApiResponse<PaymentResponse>),
        (status = 404, description = "Payment not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let payment = state.services.payments.get_payment(id).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// List all payment attempts for an order
#[utoipa::path(
    get,
    path = "/api/v1/payments/order/{order_id}",
    summary = "List order payments",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payments retrieved", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn get_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, ServiceError> {
    let payments = state.services.payments.list_for_order(order_id).await?;
    Ok(Json(ApiResponse::success(payments)))
}
