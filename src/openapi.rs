use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dukkan API",
        version = "1.0.0",
        description = r#"
# Dukkan Commerce API

Order pricing, discount codes, weight-tiered shipping and payment
reconciliation for a small storefront.

## Money

All amounts are decimal strings in the shop currency (KWD, 3 decimal
places). Per-line totals are rounded half-up before summing.

## Order lifecycle

`pending -> awaiting_payment -> paid -> shipped -> delivered`, with
`cancelled` and `refunded` reachable where the transition table allows.
A failed payment returns the order to `pending`.

## Webhooks

`POST /api/v1/webhooks/payment-provider` accepts provider callbacks.
Requests are HMAC-signed (`x-timestamp` / `x-signature` headers); every
delivery is stored before processing and replays are idempotent.

## Pagination

List endpoints take `page` (default 1) and `limit` (default 20, capped
by server config).
        "#,
        contact(
            name = "Dukkan Support",
            email = "support@dukkan.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order creation, pricing preview and lifecycle"),
        (name = "Payments", description = "Payment initiation and gateway polling"),
        (name = "Webhooks", description = "Provider callback intake"),
        (name = "Discounts", description = "Discount code administration"),
        (name = "Shipping", description = "Shipping quotes"),
        (name = "Admin", description = "Webhook log inspection and runtime settings"),
        (name = "Health", description = "Service status")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::preview_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::attach_discount,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::track_order,

        // Payments
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::execute_payment,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::get_order_payments,

        // Webhooks
        crate::handlers::payment_webhooks::payment_webhook,

        // Discounts
        crate::handlers::discounts::create_discount_code,
        crate::handlers::discounts::list_discount_codes,
        crate::handlers::discounts::get_discount_code,
        crate::handlers::discounts::duplicate_discount_code,
        crate::handlers::discounts::deactivate_discount_code,

        // Shipping
        crate::handlers::shipping::shipping_quote,

        // Admin
        crate::handlers::admin::list_webhook_logs,
        crate::handlers::admin::get_webhook_log,
        crate::handlers::admin::retry_webhook_log,
        crate::handlers::admin::update_settings,
    ),
    components(
        schemas(
            // Envelope
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Orders
            crate::services::orders::CustomerInput,
            crate::services::orders::Address,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::PreviewOrderRequest,
            crate::services::orders::AttachDiscountRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderPreviewResponse,
            crate::services::orders::TrackOrderResponse,
            crate::entities::order::OrderStatus,

            // Pricing
            crate::services::pricing::OrderItemInput,
            crate::services::pricing::PricedLine,

            // Payments
            crate::services::payments::InitiatePaymentRequest,
            crate::services::payments::ExecutePaymentRequest,
            crate::services::payments::InitiatePaymentResponse,
            crate::services::payments::PaymentResponse,
            crate::services::payments::ExecutePaymentResponse,
            crate::services::payments::WebhookLogResponse,
            crate::services::payments::WebhookLogListResponse,
            crate::services::payments::WebhookRetryResponse,
            crate::entities::payment::PaymentStatus,

            // Discounts
            crate::services::discounts::CreateDiscountCodeRequest,
            crate::services::discounts::DuplicateDiscountCodeRequest,
            crate::services::discounts::DiscountCodeResponse,
            crate::services::discounts::DiscountCodeListResponse,
            crate::services::discounts::AppliedDiscount,
            crate::entities::discount_code::DiscountType,

            // Shipping
            crate::services::shipping::ShippingQuote,

            // Admin
            crate::handlers::admin::UpdateSettingsRequest,
            crate::handlers::admin::SettingsResponse,

            // Errors
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
