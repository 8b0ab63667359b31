use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{customer, order, payment, webhook_log, OrderStatus, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{GatewayPaymentState, InvoiceRequest, PaymentGateway};

/// What a reconciliation attempt did. Every variant is a success from the
/// caller's point of view; only transport and database failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The payment (and possibly its order) moved to the incoming status.
    Applied {
        payment_id: Uuid,
        order_id: Uuid,
        status: PaymentStatus,
    },
    /// Replay of a status the payment already holds.
    AlreadyCurrent {
        payment_id: Uuid,
        status: PaymentStatus,
    },
    /// The incoming status is outranked by the stored one. A paid payment
    /// is never downgraded by a late `failed` delivery.
    Stale {
        payment_id: Uuid,
        current: PaymentStatus,
        incoming: PaymentStatus,
    },
    /// No payment carries this invoice reference. Webhooks never create
    /// payment rows.
    PaymentNotFound { invoice_reference: String },
}

impl ReconcileOutcome {
    /// Short note recorded on the webhook log row.
    pub fn note(&self) -> String {
        match self {
            ReconcileOutcome::Applied { status, .. } => format!("applied {}", status),
            ReconcileOutcome::AlreadyCurrent { status, .. } => {
                format!("already {}, replay ignored", status)
            }
            ReconcileOutcome::Stale {
                current, incoming, ..
            } => format!("stale {} ignored, payment already {}", incoming, current),
            ReconcileOutcome::PaymentNotFound { invoice_reference } => {
                format!("payment not found for invoice {}", invoice_reference)
            }
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.note())
    }
}

/// A provider report about one invoice, normalized from either a webhook
/// body or a status poll. `raw` keeps the provider payload verbatim for
/// the payment's audit column.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub invoice_reference: String,
    pub state: GatewayPaymentState,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProviderWebhookPayload {
    invoice_reference: String,
    status: String,
}

impl ProviderEvent {
    /// Parses a webhook (or stored log) body. The body must be JSON with
    /// `invoice_reference` and `status`; unknown status labels read as
    /// still pending rather than failing the delivery.
    pub fn from_payload(payload: &str) -> Result<Self, ServiceError> {
        let raw: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
            ServiceError::InvalidInput(format!("Webhook payload is not valid JSON: {}", e))
        })?;
        let fields: ProviderWebhookPayload = serde_json::from_value(raw.clone()).map_err(|e| {
            ServiceError::InvalidInput(format!(
                "Webhook payload is missing required fields: {}",
                e
            ))
        })?;

        Ok(ProviderEvent {
            invoice_reference: fields.invoice_reference,
            state: GatewayPaymentState::from_provider_label(&fields.status),
            raw,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutePaymentRequest {
    pub payment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub invoice_reference: String,
    /// Hosted payment page the customer is redirected to.
    pub payment_url: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub invoice_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutePaymentResponse {
    pub payment: PaymentResponse,
    /// Human-readable reconciliation outcome, e.g. "applied paid".
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookLogResponse {
    pub id: Uuid,
    pub provider: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processing_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookLogListResponse {
    pub logs: Vec<WebhookLogResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookRetryResponse {
    pub id: Uuid,
    pub outcome: String,
}

/// Owns payment attempts and their reconciliation with the provider.
/// Gateway reports reach order state only through [`PaymentService::reconcile`],
/// which makes redelivered and out-of-order webhooks harmless.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    provider: String,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        provider: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            provider,
            event_sender,
        }
    }

    /// Registers an invoice for the order's total and records the attempt.
    /// If the gateway call fails nothing is persisted; the customer can
    /// simply try again.
    #[instrument(skip(self), fields(order_id = %request.order_id))]
    pub async fn initiate(
        &self,
        request: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, ServiceError> {
        let db = &*self.db_pool;
        let order_id = request.order_id;

        let order_model = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !matches!(
            order_model.status,
            OrderStatus::Pending | OrderStatus::AwaitingPayment
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment cannot be initiated for an order in status {}",
                order_model.status
            )));
        }

        let customer_model = customer::Entity::find_by_id(order_model.customer_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Order {} references a missing customer",
                    order_id
                ))
            })?;

        // Gateway first: a declined invoice leaves no trace locally.
        let session = self
            .gateway
            .create_invoice(InvoiceRequest {
                order_number: order_model.order_number.clone(),
                amount: order_model.total_amount,
                currency: order_model.currency.clone(),
                customer_phone: customer_model.phone.clone(),
                customer_name: Some(customer_model.name.clone()),
            })
            .await?;

        let payment_id = Uuid::new_v4();
        let now = Utc::now();
        let txn = db.begin().await?;

        let payment_model = payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order_id),
            provider: Set(self.provider.clone()),
            invoice_reference: Set(session.invoice_reference.clone()),
            amount: Set(order_model.total_amount),
            currency: Set(order_model.currency.clone()),
            status: Set(PaymentStatus::Initiated),
            raw_response: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if order_model.status == OrderStatus::Pending {
            let version = order_model.version;
            let mut active: order::ActiveModel = order_model.into();
            active.status = Set(OrderStatus::AwaitingPayment);
            active.version = Set(version + 1);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
        }

        txn.commit().await?;

        info!(
            payment_id = %payment_id,
            order_id = %order_id,
            invoice_reference = %payment_model.invoice_reference,
            amount = %payment_model.amount,
            "Payment initiated"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PaymentInitiated {
                    order_id,
                    payment_id,
                })
                .await;
        }

        Ok(InitiatePaymentResponse {
            payment_id,
            order_id,
            invoice_reference: payment_model.invoice_reference,
            payment_url: session.payment_url,
            amount: payment_model.amount,
            currency: payment_model.currency,
            status: payment_model.status,
        })
    }

    /// Applies one provider report to the matching payment. Replays are
    /// no-ops, out-of-order deliveries never downgrade, and a report for
    /// an unknown invoice touches nothing.
    #[instrument(skip(self, event), fields(invoice_reference = %event.invoice_reference))]
    pub async fn reconcile(&self, event: ProviderEvent) -> Result<ReconcileOutcome, ServiceError> {
        let db = &*self.db_pool;
        let incoming = incoming_status(event.state);
        let now = Utc::now();

        let txn = db.begin().await?;

        let Some(payment_model) = payment::Entity::find()
            .filter(payment::Column::InvoiceReference.eq(event.invoice_reference.as_str()))
            .one(&txn)
            .await?
        else {
            warn!(invoice_reference = %event.invoice_reference, "Provider report for unknown invoice");
            return Ok(ReconcileOutcome::PaymentNotFound {
                invoice_reference: event.invoice_reference,
            });
        };

        let current = payment_model.status;
        if incoming.rank() == current.rank() {
            return Ok(ReconcileOutcome::AlreadyCurrent {
                payment_id: payment_model.id,
                status: current,
            });
        }
        if incoming.rank() < current.rank() {
            warn!(
                payment_id = %payment_model.id,
                current = %current,
                incoming = %incoming,
                "Stale provider report ignored"
            );
            return Ok(ReconcileOutcome::Stale {
                payment_id: payment_model.id,
                current,
                incoming,
            });
        }

        let payment_id = payment_model.id;
        let order_id = payment_model.order_id;
        let amount = payment_model.amount;

        // Guarded update: the status filter loses against a concurrent
        // delivery that already advanced this payment, so only one of two
        // racing `paid` webhooks reaches the order and the events.
        let updated = payment::Entity::update_many()
            .col_expr(payment::Column::Status, Expr::value(incoming))
            .col_expr(
                payment::Column::RawResponse,
                Expr::value(Some(event.raw.to_string())),
            )
            .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(payment::Column::Id.eq(payment_id))
            .filter(payment::Column::Status.eq(current))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Ok(ReconcileOutcome::AlreadyCurrent {
                payment_id,
                status: incoming,
            });
        }

        let target = match incoming {
            PaymentStatus::Paid => Some(OrderStatus::Paid),
            // A failed attempt hands the order back for a retry.
            PaymentStatus::Failed => Some(OrderStatus::Pending),
            PaymentStatus::Initiated => None,
        };

        if let Some(target) = target {
            let order_model = order::Entity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Payment {} references a missing order",
                        payment_id
                    ))
                })?;

            if order_model.status.can_transition_to(target) {
                let version = order_model.version;
                let mut active: order::ActiveModel = order_model.into();
                active.status = Set(target);
                active.version = Set(version + 1);
                active.updated_at = Set(Some(now));
                active.update(&txn).await?;
            } else if order_model.status != target {
                // e.g. paid report for a cancelled order. The payment row
                // records the money; the order needs an operator.
                warn!(
                    payment_id = %payment_id,
                    order_id = %order_id,
                    order_status = %order_model.status,
                    payment_status = %incoming,
                    "Order status left untouched by reconciliation"
                );
            }
        }

        txn.commit().await?;

        info!(
            payment_id = %payment_id,
            order_id = %order_id,
            status = %incoming,
            "Payment reconciled"
        );

        if let Some(sender) = &self.event_sender {
            match incoming {
                PaymentStatus::Paid => {
                    sender
                        .send_or_log(Event::PaymentReceived {
                            order_id,
                            payment_id,
                            amount,
                        })
                        .await;
                }
                PaymentStatus::Failed => {
                    sender
                        .send_or_log(Event::PaymentFailed {
                            order_id,
                            payment_id,
                            status: incoming,
                        })
                        .await;
                }
                PaymentStatus::Initiated => {}
            }
        }

        Ok(ReconcileOutcome::Applied {
            payment_id,
            order_id,
            status: incoming,
        })
    }

    /// Post-redirect confirmation: polls the gateway for the payment's
    /// invoice and reconciles the answer. The poll is recorded through the
    /// same log as webhook deliveries.
    #[instrument(skip(self), fields(payment_id = %request.payment_id))]
    pub async fn execute(
        &self,
        request: ExecutePaymentRequest,
    ) -> Result<ExecutePaymentResponse, ServiceError> {
        let db = &*self.db_pool;

        let payment_model = payment::Entity::find_by_id(request.payment_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::PaymentNotFound(format!("Payment {} not found", request.payment_id))
            })?;

        let status = self
            .gateway
            .fetch_status(&payment_model.invoice_reference)
            .await?;

        // Same shape ProviderEvent::from_payload reads, so admin retry
        // works on poll records too.
        let payload = json!({
            "invoice_reference": payment_model.invoice_reference,
            "status": status.state,
            "raw": status.raw,
        })
        .to_string();
        let log = self
            .log_webhook(&format!("{}:execute", self.provider), &payload)
            .await?;

        let outcome = self
            .reconcile(ProviderEvent {
                invoice_reference: payment_model.invoice_reference.clone(),
                state: status.state,
                raw: status.raw,
            })
            .await;

        match &outcome {
            Ok(outcome) => self.mark_webhook_processed(log.id, &outcome.note()).await?,
            Err(e) => {
                self.mark_webhook_processed(log.id, &format!("failed: {}", e))
                    .await?
            }
        }
        let outcome = outcome?;

        let refreshed = payment::Entity::find_by_id(request.payment_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::PaymentNotFound(format!("Payment {} not found", request.payment_id))
            })?;

        Ok(ExecutePaymentResponse {
            payment: payment_to_response(refreshed),
            outcome: outcome.note(),
        })
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<PaymentResponse, ServiceError> {
        let payment_model = payment::Entity::find_by_id(payment_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::PaymentNotFound(format!("Payment {} not found", payment_id))
            })?;

        Ok(payment_to_response(payment_model))
    }

    /// All payment attempts for one order, newest first.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentResponse>, ServiceError> {
        let db = &*self.db_pool;

        order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let payments = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(payments.into_iter().map(payment_to_response).collect())
    }

    /// Durably records a delivery before anything is done with it.
    pub async fn log_webhook(
        &self,
        provider: &str,
        payload: &str,
    ) -> Result<webhook_log::Model, ServiceError> {
        let log = webhook_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider: Set(provider.to_string()),
            payload: Set(payload.to_string()),
            processed: Set(false),
            processing_notes: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        Ok(log)
    }

    /// Flips `processed` and records what became of the delivery.
    pub async fn mark_webhook_processed(
        &self,
        log_id: Uuid,
        note: &str,
    ) -> Result<(), ServiceError> {
        let log = webhook_log::Entity::find_by_id(log_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Webhook log {} not found", log_id))
            })?;

        let mut active: webhook_log::ActiveModel = log.into();
        active.processed = Set(true);
        active.processing_notes = Set(Some(note.to_string()));
        active.update(&*self.db_pool).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_webhook_logs(
        &self,
        page: u64,
        per_page: u64,
        processed: Option<bool>,
    ) -> Result<WebhookLogListResponse, ServiceError> {
        let mut query =
            webhook_log::Entity::find().order_by_desc(webhook_log::Column::ReceivedAt);
        if let Some(processed) = processed {
            query = query.filter(webhook_log::Column::Processed.eq(processed));
        }

        let paginator = query.paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let logs = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(WebhookLogListResponse {
            logs: logs.into_iter().map(webhook_log_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self), fields(log_id = %log_id))]
    pub async fn get_webhook_log(&self, log_id: Uuid) -> Result<WebhookLogResponse, ServiceError> {
        let log = webhook_log::Entity::find_by_id(log_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Webhook log {} not found", log_id))
            })?;

        Ok(webhook_log_to_response(log))
    }

    /// Re-runs reconciliation from the stored payload. Safe at any time:
    /// if the delivery was already applied the retry lands as a replay.
    #[instrument(skip(self), fields(log_id = %log_id))]
    pub async fn retry_webhook(&self, log_id: Uuid) -> Result<WebhookRetryResponse, ServiceError> {
        let log = webhook_log::Entity::find_by_id(log_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Webhook log {} not found", log_id))
            })?;

        let event = ProviderEvent::from_payload(&log.payload)?;
        let outcome = self.reconcile(event).await?;

        let note = match &log.processing_notes {
            Some(previous) => format!("{}; retry: {}", previous, outcome.note()),
            None => format!("retry: {}", outcome.note()),
        };
        self.mark_webhook_processed(log_id, &note).await?;

        info!(log_id = %log_id, outcome = %outcome, "Webhook log retried");

        Ok(WebhookRetryResponse {
            id: log_id,
            outcome: outcome.note(),
        })
    }
}

/// Provider states land on the payment ladder: a pending report carries
/// rank 0 and therefore never advances anything.
fn incoming_status(state: GatewayPaymentState) -> PaymentStatus {
    match state {
        GatewayPaymentState::Paid => PaymentStatus::Paid,
        GatewayPaymentState::Failed => PaymentStatus::Failed,
        GatewayPaymentState::Pending => PaymentStatus::Initiated,
    }
}

fn payment_to_response(model: payment::Model) -> PaymentResponse {
    PaymentResponse {
        id: model.id,
        order_id: model.order_id,
        provider: model.provider,
        invoice_reference: model.invoice_reference,
        amount: model.amount,
        currency: model.currency,
        status: model.status,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn webhook_log_to_response(model: webhook_log::Model) -> WebhookLogResponse {
    WebhookLogResponse {
        id: model.id,
        provider: model.provider,
        payload: model.payload,
        received_at: model.received_at,
        processed: model.processed,
        processing_notes: model.processing_notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parses_into_a_provider_event() {
        let event = ProviderEvent::from_payload(
            r#"{"invoice_reference":"INV-1001","status":"paid","amount":"24.500"}"#,
        )
        .unwrap();
        assert_eq!(event.invoice_reference, "INV-1001");
        assert_eq!(event.state, GatewayPaymentState::Paid);
        assert_eq!(event.raw["amount"], "24.500");
    }

    #[test]
    fn unknown_status_labels_read_as_pending() {
        let event = ProviderEvent::from_payload(
            r#"{"invoice_reference":"INV-1001","status":"authorization_hold"}"#,
        )
        .unwrap();
        assert_eq!(event.state, GatewayPaymentState::Pending);
    }

    #[test]
    fn malformed_payloads_are_invalid_input() {
        assert!(matches!(
            ProviderEvent::from_payload("not json"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            ProviderEvent::from_payload(r#"{"status":"paid"}"#),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn provider_states_map_onto_the_status_ladder() {
        assert_eq!(
            incoming_status(GatewayPaymentState::Paid),
            PaymentStatus::Paid
        );
        assert_eq!(
            incoming_status(GatewayPaymentState::Failed),
            PaymentStatus::Failed
        );
        assert_eq!(
            incoming_status(GatewayPaymentState::Pending),
            PaymentStatus::Initiated
        );
    }

    #[test]
    fn outcome_notes_name_what_happened() {
        let applied = ReconcileOutcome::Applied {
            payment_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            status: PaymentStatus::Paid,
        };
        assert_eq!(applied.note(), "applied paid");

        let replay = ReconcileOutcome::AlreadyCurrent {
            payment_id: Uuid::new_v4(),
            status: PaymentStatus::Paid,
        };
        assert!(replay.note().contains("replay ignored"));

        let stale = ReconcileOutcome::Stale {
            payment_id: Uuid::new_v4(),
            current: PaymentStatus::Paid,
            incoming: PaymentStatus::Failed,
        };
        assert_eq!(stale.note(), "stale failed ignored, payment already paid");

        let missing = ReconcileOutcome::PaymentNotFound {
            invoice_reference: "INV-404".into(),
        };
        assert!(missing.note().contains("payment not found"));
    }

    #[test]
    fn execute_poll_records_parse_back_into_events() {
        // The synthesized poll payload must round-trip through the same
        // parser the admin retry endpoint uses.
        let payload = json!({
            "invoice_reference": "INV-1001",
            "status": GatewayPaymentState::Failed,
            "raw": {"provider_code": "E42"},
        })
        .to_string();

        let event = ProviderEvent::from_payload(&payload).unwrap();
        assert_eq!(event.invoice_reference, "INV-1001");
        assert_eq!(event.state, GatewayPaymentState::Failed);
    }
}
