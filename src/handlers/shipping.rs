use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::services::shipping::ShippingQuote;
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ShippingQuoteQuery {
    /// ISO 3166-1 alpha-2 destination, case-insensitive
    pub country: String,
    /// Total shipment weight in grams
    pub weight_grams: i32,
}

/// Quote shipping for a destination and weight
#[utoipa::path(
    get,
    path = "/api/v1/shipping/quote",
    summary = "Quote shipping",
    description = "Look up the weight-tiered rate for a destination without creating an order",
    params(ShippingQuoteQuery),
    responses(
        (status = 200, description = "Quote computed", body = ApiResponse<ShippingQuote>),
        (status = 422, description = "No rate for the destination, or negative weight", body = crate::errors::ErrorResponse),
    ),
    tag = "Shipping"
)]
pub async fn shipping_quote(
    State(state): State<AppState>,
    Query(query): Query<ShippingQuoteQuery>,
) -> Result<Json<ApiResponse<ShippingQuote>>, ServiceError> {
    let quote = state
        .services
        .shipping
        .quote(&query.country, query.weight_grams)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}
