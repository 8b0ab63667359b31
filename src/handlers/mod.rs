pub mod admin;
pub mod discounts;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod shipping;

use std::sync::Arc;

use crate::config::RuntimeSettings;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::services::discounts::DiscountService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::services::shipping::ShippingService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub discounts: Arc<DiscountService>,
    pub shipping: Arc<ShippingService>,
}

impl AppServices {
    /// Wires every service against one pool, one gateway and one event
    /// channel.
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        provider: String,
        settings: RuntimeSettings,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let discounts = Arc::new(DiscountService::new(db_pool.clone()));
        let shipping = Arc::new(ShippingService::new(db_pool.clone()));
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            discounts.clone(),
            shipping.clone(),
            settings,
            event_sender.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            db_pool,
            gateway,
            provider,
            event_sender,
        ));

        Self {
            orders,
            payments,
            discounts,
            shipping,
        }
    }
}
