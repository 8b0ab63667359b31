use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::{GatewayInvoiceStatus, GatewayPaymentState, InvoiceRequest, InvoiceSession, PaymentGateway};
use crate::config::GatewayConfig;
use crate::errors::ServiceError;

/// Invoice record as the provider returns it.
#[derive(Debug, Deserialize)]
struct ProviderInvoice {
    invoice_reference: String,
    payment_url: String,
}

/// HTTP adapter for hosted-payment providers exposing an
/// `/invoices` resource. Auth is a bearer key; requests run under the
/// configured timeout so a stalled provider cannot stall checkout.
#[derive(Debug, Clone)]
pub struct RestPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestPaymentGateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build gateway HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn map_send_error(e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::GatewayError("Gateway request timed out".to_string())
        } else {
            ServiceError::GatewayError(format!("Gateway request failed: {}", e))
        }
    }

    fn check_status(status: StatusCode) -> Result<(), ServiceError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::GatewayError(format!(
                "Gateway responded with status {}",
                status
            )))
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RestPaymentGateway {
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    async fn create_invoice(
        &self,
        request: InvoiceRequest,
    ) -> Result<InvoiceSession, ServiceError> {
        let url = format!("{}/invoices", self.base_url);

        let response = self
            .authorize(self.client.post(&url).json(&request))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_status(response.status())?;

        let invoice: ProviderInvoice = response.json().await.map_err(|e| {
            ServiceError::GatewayError(format!("Gateway returned malformed invoice: {}", e))
        })?;

        info!(
            invoice_reference = %invoice.invoice_reference,
            "Gateway invoice created"
        );

        Ok(InvoiceSession {
            invoice_reference: invoice.invoice_reference,
            payment_url: invoice.payment_url,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_status(
        &self,
        invoice_reference: &str,
    ) -> Result<GatewayInvoiceStatus, ServiceError> {
        let url = format!("{}/invoices/{}", self.base_url, invoice_reference);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_status(response.status())?;

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            ServiceError::GatewayError(format!("Gateway returned malformed status: {}", e))
        })?;

        let label = raw
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or_default();
        let state = GatewayPaymentState::from_provider_label(label);

        if label.is_empty() {
            warn!(invoice_reference, "Gateway status payload missing status field");
        }

        Ok(GatewayInvoiceStatus { state, raw })
    }
}
