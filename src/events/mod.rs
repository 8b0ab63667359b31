use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::{OrderStatus, PaymentStatus};
use crate::notifications::Notifier;

/// Events emitted after state changes commit. Consumers are notification
/// sinks only; nothing in the order or payment flow depends on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled(Uuid),
    OrderShipped {
        order_id: Uuid,
        tracking_number: String,
    },
    OrderDelivered(Uuid),
    DiscountApplied {
        order_id: Uuid,
        code: String,
        amount: Decimal,
    },
    PaymentInitiated {
        order_id: Uuid,
        payment_id: Uuid,
    },
    PaymentReceived {
        order_id: Uuid,
        payment_id: Uuid,
        amount: Decimal,
    },
    PaymentFailed {
        order_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, downgrading failure to a warning. Notification
    /// delivery never blocks or fails a committed mutation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel, forwarding each event to the notifier.
/// Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            error!("Failed to deliver notification for {:?}: {}", event, e);
        }
    }

    info!("Event processing loop stopped");
}
