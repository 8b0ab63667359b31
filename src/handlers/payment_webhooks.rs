use axum::{extract::State, http::HeaderMap, response::Json};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::warn;

use crate::services::payments::ProviderEvent;
use crate::{errors::ServiceError, ApiResponse, AppState};

type HmacSha256 = Hmac<Sha256>;

/// Receive a payment provider webhook
///
/// Every delivery is recorded before anything happens to it, so redelivery
/// and crash recovery always have the original payload to work from. The
/// handler does no outbound calls; it must answer inside the provider's
/// delivery timeout.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment-provider",
    summary = "Payment provider webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook applied", body = ApiResponse<Value>),
        (status = 400, description = "Malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Processing failed; provider should redeliver", body = crate::errors::ErrorResponse),
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let payload = String::from_utf8_lossy(&body).to_string();
    let payments = state.services.payments.clone();

    // Log first: the row must exist even if everything below fails.
    let log = payments
        .log_webhook(&state.config.gateway.provider, &payload)
        .await?;

    if let Some(secret) = state
        .config
        .payment_webhook_secret
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !verify_signature(
            &headers,
            &body,
            secret,
            state.config.payment_webhook_tolerance_secs,
        ) {
            warn!(log_id = %log.id, "Payment webhook signature verification failed");
            payments
                .mark_webhook_processed(log.id, "signature rejected")
                .await?;
            return Err(ServiceError::WebhookSignatureInvalid);
        }
    }

    let event = match ProviderEvent::from_payload(&payload) {
        Ok(event) => event,
        Err(e) => {
            payments
                .mark_webhook_processed(log.id, &format!("malformed payload: {}", e))
                .await?;
            return Err(e);
        }
    };

    match payments.reconcile(event).await {
        Ok(outcome) => {
            let note = outcome.note();
            payments.mark_webhook_processed(log.id, &note).await?;
            Ok(Json(ApiResponse::success(json!({ "outcome": note }))))
        }
        Err(e) => {
            // Non-2xx makes the provider redeliver; the retry arrives as a
            // fresh log row.
            payments
                .mark_webhook_processed(log.id, &format!("failed: {}", e))
                .await?;
            Err(e)
        }
    }
}

/// Generic HMAC scheme: `x-signature` is the hex HMAC-SHA256 of
/// `"{x-timestamp}.{body}"`, and the timestamp must be within tolerance.
fn verify_signature(
    headers: &HeaderMap,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) else {
        return false;
    };
    let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) else {
        return false;
    };

    let Ok(ts_i) = ts.parse::<i64>() else {
        return false;
    };
    let now = chrono::Utc::now().timestamp();
    if (now - ts_i).unsigned_abs() > tolerance_secs {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
