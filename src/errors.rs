use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::request_id::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error payload returned by every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Order with ID 550e8400-e29b-41d4-a716-446655440000 not found",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2025-06-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict", "Unprocessable Entity")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Order with ID 550e8400-e29b-41d4-a716-446655440000 not found")]
    pub message: String,
    /// Additional detail (per-field validation messages, rejection reasons)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "items[0].quantity: must be between 1 and 10")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2025-06-09T10:30:00.000Z")]
    pub timestamp: String,
}

/// The specific reason a discount code was refused. Every reason is shown to
/// the customer verbatim, so messages stay free of internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DiscountRejection {
    #[error("discount code not found")]
    UnknownCode,

    #[error("discount code is not active")]
    Inactive,

    #[error("discount code is not valid yet")]
    NotStarted,

    #[error("discount code has expired")]
    Expired,

    #[error("discount code usage limit has been reached")]
    Exhausted,

    #[error("discount code has already been used the maximum number of times by this customer")]
    CustomerLimitReached,

    #[error("discount code is only valid on a first order")]
    FirstOrderOnly,

    #[error("discount code is only valid for new customers")]
    NewCustomersOnly,

    #[error("discount code is not available for this customer")]
    NotEligible,

    #[error("discount code does not apply to any item in this order")]
    NotApplicable,

    #[error("order subtotal is below the {minimum} minimum required by this discount code")]
    BelowMinimum { minimum: Decimal },

    #[error("order already has a discount code applied")]
    AlreadyApplied,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Product {0} is unavailable")]
    ProductUnavailable(Uuid),

    #[error("Discount rejected: {0}")]
    DiscountRejected(#[from] DiscountRejection),

    #[error("No shipping rate configured for destination {country}")]
    ShippingRateNotFound { country: String },

    #[error("Order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Webhook signature invalid")]
    WebhookSignatureInvalid,

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) | Self::PaymentNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::ProductUnavailable(_)
            | Self::DiscountRejected(_)
            | Self::ShippingRateNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidStatusTransition { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidOperation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::WebhookSignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::GatewayError(_) => {
                "Payment gateway is unavailable, please retry shortly".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Machine-readable detail attached to the response, when one exists.
    fn response_details(&self) -> Option<String> {
        match self {
            Self::DiscountRejected(rejection) => serde_json::to_string(rejection).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.response_details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response = crate::request_id::scope_request_id(
            crate::request_id::RequestId::new("req-123"),
            async { ServiceError::NotFound("missing".into()).into_response() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::PaymentNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::ProductUnavailable(Uuid::nil()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DiscountRejected(DiscountRejection::Expired).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::ShippingRateNotFound {
                country: "XX".into()
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InvalidStatusTransition {
                from: "delivered".into(),
                to: "pending".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::WebhookSignatureInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::GatewayError("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("stack trace".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::db_error("constraint violated").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::GatewayError("connect to 10.0.0.3 refused".into()).response_message(),
            "Payment gateway is unavailable, please retry shortly"
        );

        // User-facing errors keep the actual message
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
        assert_eq!(
            ServiceError::DiscountRejected(DiscountRejection::Expired).response_message(),
            "Discount rejected: discount code has expired"
        );
    }

    #[test]
    fn discount_rejection_messages_are_distinct() {
        let rejections = [
            DiscountRejection::UnknownCode,
            DiscountRejection::Inactive,
            DiscountRejection::NotStarted,
            DiscountRejection::Expired,
            DiscountRejection::Exhausted,
            DiscountRejection::CustomerLimitReached,
            DiscountRejection::FirstOrderOnly,
            DiscountRejection::NewCustomersOnly,
            DiscountRejection::NotEligible,
            DiscountRejection::NotApplicable,
            DiscountRejection::BelowMinimum {
                minimum: dec!(20.000),
            },
            DiscountRejection::AlreadyApplied,
        ];
        let mut messages: Vec<String> = rejections.iter().map(|r| r.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), rejections.len());
    }

    #[test]
    fn below_minimum_message_includes_threshold() {
        let rejection = DiscountRejection::BelowMinimum {
            minimum: dec!(20.000),
        };
        assert!(rejection.to_string().contains("20.000"));
    }

    #[tokio::test]
    async fn discount_rejection_response_carries_reason_detail() {
        let response =
            ServiceError::DiscountRejected(DiscountRejection::Exhausted).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(payload.details.unwrap().contains("exhausted"));
    }
}
