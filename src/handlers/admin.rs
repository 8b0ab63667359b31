use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::services::payments::{WebhookLogListResponse, WebhookLogResponse, WebhookRetryResponse};
use crate::{errors::ServiceError, ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", get(list_webhook_logs))
        .route("/webhooks/:id", get(get_webhook_log))
        .route("/webhooks/:id/retry", post(retry_webhook_log))
        .route("/settings", put(update_settings))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct WebhookLogQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    /// Filter by processed flag; omit for all rows
    pub processed: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub orders_enabled: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub orders_enabled: bool,
}

/// List received webhook payloads, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/webhooks",
    summary = "List webhook logs",
    params(WebhookLogQuery),
    responses(
        (status = 200, description = "Logs retrieved", body = ApiResponse<WebhookLogListResponse>)
    ),
    tag = "Admin"
)]
pub async fn list_webhook_logs(
    State(state): State<AppState>,
    Query(query): Query<WebhookLogQuery>,
) -> Result<Json<ApiResponse<WebhookLogListResponse>>, ServiceError> {
    let limit = query
        .limit
        .clamp(1, state.config.api_max_page_size as u64);
    let logs = state
        .services
        .payments
        .list_webhook_logs(query.page.max(1), limit, query.processed)
        .await?;
    Ok(Json(ApiResponse::success(logs)))
}

/// Get one webhook log with its full stored payload
#[utoipa::path(
    get,
    path = "/api/v1/admin/webhooks/{id}",
    summary = "Get webhook log",
    params(("id" = Uuid, Path, description = "Webhook log ID")),
    responses(
        (status = 200, description = "Log found", body = ApiResponse<WebhookLogResponse>),
        (status = 404, description = "Log not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn get_webhook_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WebhookLogResponse>>, ServiceError> {
    let log = state.services.payments.get_webhook_log(id).await?;
    Ok(Json(ApiResponse::success(log)))
}

/// Re-run reconciliation from a stored payload
#[utoipa::path(
    post,
    path = "/api/v1/admin/webhooks/{id}/retry",
    summary = "Retry webhook log",
    description = "Parses the stored payload again and feeds it through reconciliation. \
                   Safe to call on already-applied logs; the status ladder makes replays no-ops.",
    params(("id" = Uuid, Path, description = "Webhook log ID")),
    responses(
        (status = 200, description = "Reconciliation re-run", body = ApiResponse<WebhookRetryResponse>),
        (status = 400, description = "Stored payload is malformed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Log not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn retry_webhook_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WebhookRetryResponse>>, ServiceError> {
    let outcome = state.services.payments.retry_webhook(id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Flip runtime switches without a restart
#[utoipa::path(
    put,
    path = "/api/v1/admin/settings",
    summary = "Update runtime settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = ApiResponse<SettingsResponse>)
    ),
    tag = "Admin"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<SettingsResponse>>, ServiceError> {
    if let Some(enabled) = request.orders_enabled {
        state.settings.set_orders_enabled(enabled);
        tracing::info!(orders_enabled = enabled, "Runtime settings updated");
    }

    Ok(Json(ApiResponse::success(SettingsResponse {
        orders_enabled: state.settings.orders_enabled(),
    })))
}
