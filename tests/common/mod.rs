#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use sha2::Sha256;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use dukkan_api::{
    config::{AppConfig, RuntimeSettings},
    db,
    entities::{
        country_shipping_rate, customer, product, shipping_weight_tier, DiscountType,
    },
    errors::ServiceError,
    events::{self, Event, EventSender},
    gateway::{
        GatewayInvoiceStatus, GatewayPaymentState, InvoiceRequest, InvoiceSession, PaymentGateway,
    },
    handlers::AppServices,
    notifications::Notifier,
    request_id,
    services::discounts::CreateDiscountCodeRequest,
    AppState,
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Gateway double. Invoice references are handed out sequentially and
/// each invoice's reported status can be scripted per test.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    pub fail_create: AtomicBool,
    pub invoices: Mutex<Vec<InvoiceRequest>>,
    statuses: Mutex<HashMap<String, GatewayPaymentState>>,
}

impl FakeGateway {
    pub fn set_status(&self, invoice_reference: &str, state: GatewayPaymentState) {
        self.statuses
            .lock()
            .unwrap()
            .insert(invoice_reference.to_string(), state);
    }

    pub fn created_invoices(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(
        &self,
        request: InvoiceRequest,
    ) -> Result<InvoiceSession, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "invoice creation declined".to_string(),
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.invoices.lock().unwrap().push(request);
        Ok(InvoiceSession {
            invoice_reference: format!("inv_test_{:04}", n),
            payment_url: format!("https://pay.test/inv_test_{:04}", n),
        })
    }

    async fn fetch_status(
        &self,
        invoice_reference: &str,
    ) -> Result<GatewayInvoiceStatus, ServiceError> {
        let state = self
            .statuses
            .lock()
            .unwrap()
            .get(invoice_reference)
            .copied()
            .unwrap_or(GatewayPaymentState::Pending);
        let label = match state {
            GatewayPaymentState::Paid => "paid",
            GatewayPaymentState::Failed => "failed",
            GatewayPaymentState::Pending => "pending",
        };
        Ok(GatewayInvoiceStatus {
            state,
            raw: json!({ "status": label, "reference": invoice_reference }),
        })
    }
}

/// Notifier that captures every delivered event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count_payment_received(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::PaymentReceived { .. }))
            .count()
    }

    pub fn count_payment_failed(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::PaymentFailed { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &Event) -> Result<(), ServiceError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Helper harness for spinning up an application state backed by a
/// per-test SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir for test database");
        let db_path = db_dir.path().join("dukkan_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        // SQLite allows a single writer. One pooled connection makes
        // concurrent requests queue on acquire instead of hitting busy
        // errors, while the guarded updates still decide who wins.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let notifier = Arc::new(RecordingNotifier::default());
        let event_task = tokio::spawn(events::process_events(event_rx, notifier.clone()));

        let gateway = Arc::new(FakeGateway::default());
        let settings = RuntimeSettings::from_config(&cfg);
        let services = AppServices::new(
            db_arc.clone(),
            gateway.clone(),
            cfg.gateway.provider.clone(),
            settings.clone(),
            Some(Arc::new(event_sender.clone())),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            settings,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", dukkan_api::api_v1_routes())
            .layer(axum::middleware::from_fn(request_id::request_id_middleware))
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            notifier,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a raw body with extra headers, as webhook deliveries do.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: String,
        headers: &[(&str, String)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let request = builder
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Deliver a provider webhook signed with the test secret.
    pub async fn deliver_webhook(&self, payload: &str) -> axum::response::Response {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_webhook(WEBHOOK_SECRET, &timestamp, payload);
        self.request_raw(
            Method::POST,
            "/api/v1/webhooks/payment-provider",
            payload.to_string(),
            &[
                ("x-timestamp", timestamp),
                ("x-signature", signature),
                ("content-type", "application/json".to_string()),
            ],
        )
        .await
    }

    pub async fn seed_product(
        &self,
        title: &str,
        price: Decimal,
        weight_grams: i32,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(None),
            image_url: Set(None),
            category_id: Set(None),
            category_name: Set(None),
            price: Set(price),
            discount_price: Set(None),
            discount_starts_at: Set(None),
            discount_expires_at: Set(None),
            weight_grams: Set(Some(weight_grams)),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    pub async fn seed_customer(&self, phone: &str, name: &str) -> customer::Model {
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone: Set(phone.to_string()),
            name: Set(name.to_string()),
            email: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer for tests")
    }

    /// Seed one destination with its weight ladder. Tiers are
    /// `(max_weight_kg, base_price, additional_percentage)`.
    pub async fn seed_country_rates(
        &self,
        country_code: &str,
        country_name: &str,
        tiers: &[(Decimal, Decimal, Decimal)],
    ) -> country_shipping_rate::Model {
        let rate = country_shipping_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            country_code: Set(country_code.to_string()),
            country_name: Set(country_name.to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed country rate for tests");

        for (max_weight_kg, base_price, additional_percentage) in tiers {
            shipping_weight_tier::ActiveModel {
                country_rate_id: Set(rate.id),
                max_weight_kg: Set(*max_weight_kg),
                base_price: Set(*base_price),
                additional_percentage: Set(*additional_percentage),
                ..Default::default()
            }
            .insert(&*self.state.db)
            .await
            .expect("seed weight tier for tests");
        }

        rate
    }

    pub async fn seed_discount_code(
        &self,
        request: CreateDiscountCodeRequest,
    ) -> dukkan_api::services::discounts::DiscountCodeResponse {
        self.state
            .services
            .discounts
            .create(request)
            .await
            .expect("seed discount code for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// A percentage code with every optional rule left off.
pub fn base_discount_request(
    code: &str,
    discount_type: DiscountType,
    value: Decimal,
) -> CreateDiscountCodeRequest {
    CreateDiscountCodeRequest {
        code: code.to_string(),
        description: None,
        discount_type,
        value,
        minimum_order_amount: None,
        maximum_discount_amount: None,
        usage_limit: None,
        usage_limit_per_customer: None,
        product_ids: vec![],
        category_ids: vec![],
        customer_ids: vec![],
        first_time_customer_only: false,
        new_customer_only: false,
        starts_at: None,
        expires_at: None,
    }
}

pub fn webhook_payload(invoice_reference: &str, status: &str) -> String {
    json!({
        "invoice_reference": invoice_reference,
        "status": status,
        "id": format!("evt_{}", Uuid::new_v4().simple()),
    })
    .to_string()
}

pub fn sign_webhook(secret: &str, timestamp: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not json")
}

/// Reads a money field regardless of whether it was serialized as a
/// string or a bare number. Comparison is numeric, so scale differences
/// like `2.5` vs `2.500` do not matter.
pub fn dec_field(value: &Value) -> Decimal {
    use std::str::FromStr;
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string field"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number field"),
        other => panic!("expected a decimal field, got {other:?}"),
    }
}

/// Standard order body used by the flow tests: the quantities land on a
/// 25.000 KWD subtotal and 500 grams.
pub fn order_body(product_a: Uuid, product_b: Uuid, discount_code: Option<&str>) -> Value {
    json!({
        "customer": {
            "phone": "+96550001234",
            "name": "Fatima Al-Sabah",
            "email": "fatima@example.com",
        },
        "items": [
            { "product_id": product_a, "quantity": 2 },
            { "product_id": product_b, "quantity": 1 },
        ],
        "shipping_address": {
            "street": "Block 4, Street 12, House 7",
            "city": "Salmiya",
            "governorate": "Hawalli",
            "country": "KW",
        },
        "discount_code": discount_code,
    })
}
