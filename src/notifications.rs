/*!
 * # Notifications
 *
 * Sink for committed domain events. The default implementation writes
 * structured log lines; SMS/WhatsApp delivery plugs in behind the same
 * trait without touching the order or payment flow.
 */

use async_trait::async_trait;
use tracing::info;

use crate::errors::ServiceError;
use crate::events::Event;

/// Delivery seam for domain events drained by the event loop.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), ServiceError>;
}

/// Notifier that emits one structured log line per event.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &Event) -> Result<(), ServiceError> {
        match event {
            Event::OrderCreated {
                order_id,
                order_number,
                total_amount,
            } => {
                info!(%order_id, %order_number, %total_amount, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            Event::OrderCancelled(order_id) => {
                info!(%order_id, "Order cancelled");
            }
            Event::OrderShipped {
                order_id,
                tracking_number,
            } => {
                info!(%order_id, %tracking_number, "Order shipped");
            }
            Event::OrderDelivered(order_id) => {
                info!(%order_id, "Order delivered");
            }
            Event::DiscountApplied {
                order_id,
                code,
                amount,
            } => {
                info!(%order_id, %code, %amount, "Discount applied");
            }
            Event::PaymentInitiated {
                order_id,
                payment_id,
            } => {
                info!(%order_id, %payment_id, "Payment initiated");
            }
            Event::PaymentReceived {
                order_id,
                payment_id,
                amount,
            } => {
                info!(%order_id, %payment_id, %amount, "Payment received");
            }
            Event::PaymentFailed {
                order_id,
                payment_id,
                status,
            } => {
                info!(%order_id, %payment_id, %status, "Payment failed");
            }
        }
        Ok(())
    }
}
