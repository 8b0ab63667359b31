use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::handlers::orders::collect_field_errors;
use crate::services::discounts::{
    CreateDiscountCodeRequest, DiscountCodeListResponse, DiscountCodeResponse,
    DuplicateDiscountCodeRequest,
};
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery};

/// Create a discount code
#[utoipa::path(
    post,
    path = "/api/v1/discount-codes",
    summary = "Create discount code",
    request_body = CreateDiscountCodeRequest,
    responses(
        (status = 201, description = "Code created", body = ApiResponse<DiscountCodeResponse>),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse),
    ),
    tag = "Discounts"
)]
pub async fn create_discount_code(
    State(state): State<AppState>,
    Json(request): Json<CreateDiscountCodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DiscountCodeResponse>>), ServiceError> {
    if let Err(validation_errors) = request.validate() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::validation_errors(collect_field_errors(
                validation_errors,
            ))),
        ));
    }

    let created = state.services.discounts.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// List discount codes
#[utoipa::path(
    get,
    path = "/api/v1/discount-codes",
    summary = "List discount codes",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Codes retrieved", body = ApiResponse<DiscountCodeListResponse>),
    ),
    tag = "Discounts"
)]
pub async fn list_discount_codes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<DiscountCodeListResponse>>, ServiceError> {
    let limit = query
        .limit
        .clamp(1, state.config.api_max_page_size as u64);
    let list = state
        .services
        .discounts
        .list(query.page.max(1), limit)
        .await?;
    Ok(Json(ApiResponse::success(list)))
}

/// Get a discount code by its code string
#[utoipa::path(
    get,
    path = "/api/v1/discount-codes/{code}",
    summary = "Get discount code",
    params(("code" = String, Path, description = "Code string, case-insensitive")),
    responses(
        (status = 200, description = "Code found", body = ApiResponse<DiscountCodeResponse>),
        (status = 404, description = "Code not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Discounts"
)]
pub async fn get_discount_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<DiscountCodeResponse>>, ServiceError> {
    let found = state.services.discounts.get(&code).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// Duplicate a discount code under a new code string
#[utoipa::path(
    post,
    path = "/api/v1/discount-codes/{code}/duplicate",
    summary = "Duplicate discount code",
    description = "Clone the rules of an existing code under a new name with a fresh usage counter",
    params(("code" = String, Path, description = "Source code string")),
    request_body = DuplicateDiscountCodeRequest,
    responses(
        (status = 201, description = "Code duplicated", body = ApiResponse<DiscountCodeResponse>),
        (status = 404, description = "Source code not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "New code already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Discounts"
)]
pub async fn duplicate_discount_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<DuplicateDiscountCodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DiscountCodeResponse>>), ServiceError> {
    let created = state.services.discounts.duplicate(&code, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Deactivate a discount code
#[utoipa::path(
    post,
    path = "/api/v1/discount-codes/{code}/deactivate",
    summary = "Deactivate discount code",
    description = "Turn a code off; deactivating an already-inactive code succeeds",
    params(("code" = String, Path, description = "Code string")),
    responses(
        (status = 200, description = "Code deactivated", body = ApiResponse<DiscountCodeResponse>),
        (status = 404, description = "Code not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Discounts"
)]
pub async fn deactivate_discount_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<DiscountCodeResponse>>, ServiceError> {
    let updated = state.services.discounts.deactivate(&code).await?;
    Ok(Json(ApiResponse::success(updated)))
}
