/*!
 * # Payment Gateway Adapter
 *
 * Boundary between the order/payment flow and the hosted payment page
 * provider. The trait carries no reconciliation logic; callers decide
 * what a `paid` or `failed` report means for order state.
 */

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub mod rest;

pub use rest::RestPaymentGateway;

/// Invoice creation request sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub order_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
}

/// Hosted payment session returned by the provider. The
/// `invoice_reference` is the provider's identifier; webhooks and status
/// polls resolve payments through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSession {
    pub invoice_reference: String,
    pub payment_url: String,
}

/// Outcome of an invoice as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPaymentState {
    Paid,
    Failed,
    Pending,
}

impl GatewayPaymentState {
    /// Maps a provider status label onto the three states the
    /// reconciler understands. Unknown labels read as still pending.
    pub fn from_provider_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "paid" | "captured" | "settled" => GatewayPaymentState::Paid,
            "failed" | "declined" | "expired" | "cancelled" => GatewayPaymentState::Failed,
            _ => GatewayPaymentState::Pending,
        }
    }
}

/// Invoice status as fetched from the provider, with the untouched
/// provider payload kept for the audit trail.
#[derive(Debug, Clone)]
pub struct GatewayInvoiceStatus {
    pub state: GatewayPaymentState,
    pub raw: serde_json::Value,
}

/// Provider adapter. Implementations translate between our invoice
/// model and one provider's HTTP API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers an invoice with the provider and returns the hosted
    /// payment session for the customer.
    async fn create_invoice(&self, request: InvoiceRequest)
        -> Result<InvoiceSession, ServiceError>;

    /// Fetches the provider's current view of an invoice.
    async fn fetch_status(&self, invoice_reference: &str)
        -> Result<GatewayInvoiceStatus, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_labels_collapse_onto_three_states() {
        assert_eq!(
            GatewayPaymentState::from_provider_label("PAID"),
            GatewayPaymentState::Paid
        );
        assert_eq!(
            GatewayPaymentState::from_provider_label("captured"),
            GatewayPaymentState::Paid
        );
        assert_eq!(
            GatewayPaymentState::from_provider_label("declined"),
            GatewayPaymentState::Failed
        );
        assert_eq!(
            GatewayPaymentState::from_provider_label("expired"),
            GatewayPaymentState::Failed
        );
        assert_eq!(
            GatewayPaymentState::from_provider_label("awaiting_authorization"),
            GatewayPaymentState::Pending
        );
    }
}
