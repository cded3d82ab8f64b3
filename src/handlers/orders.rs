use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::orders::{CreateOrderInput, UpdateOrderStatusInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for order and payment endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_all_orders))
        .route("/my-orders", get(my_orders))
        .route("/payment/create-razorpay-order", post(create_razorpay_order))
        .route("/payment/verify-razorpay", post(verify_razorpay))
        .route("/:id", get(get_order))
        .route("/:id/cancel", put(cancel_order))
        .route("/:id/status", put(update_status))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRazorpayOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRazorpayRequest {
    pub order_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Place an order from an explicit item list
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order placed; stock decremented and cart cleared"),
        (status = 400, description = "Insufficient stock or invalid items"),
        (status = 404, description = "A product in the list does not exist")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .create_order(user.user_id, payload)
        .await?;
    Ok(created_response(order))
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/my-orders",
    responses((status = 200, description = "The caller's orders")),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let orders = state.services.orders.my_orders(user.user_id).await?;
    Ok(success_response(orders))
}

/// Admin: every order, newest first
async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let orders = state.services.orders.list_all_orders().await?;
    Ok(success_response(orders))
}

/// Order detail; owner or admin only
async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(id, &user).await?;
    Ok(success_response(order))
}

/// Owner cancellation; restores stock
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled, stock restored"),
        (status = 400, description = "Order is already shipped, delivered or cancelled"),
        (status = 403, description = "Not the order's owner")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.cancel_order(id, user.user_id).await?;
    Ok(success_response(order))
}

/// Admin: guarded status update
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Illegal status transition"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let order = state.services.orders.update_status(id, payload).await?;
    Ok(success_response(order))
}

/// Create a gateway order for an existing order's final amount
#[utoipa::path(
    post,
    path = "/api/v1/orders/payment/create-razorpay-order",
    request_body = CreateRazorpayOrderRequest,
    responses(
        (status = 200, description = "Gateway order created"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Gateway unavailable or unconfigured")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn create_razorpay_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRazorpayOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    // Ownership check doubles as the amount lookup
    let order = state
        .services
        .orders
        .get_order(payload.order_id, &user)
        .await?;

    let gateway_order = state
        .services
        .payments
        .create_gateway_order(order.order.final_amount, order.order.id, user.user_id)
        .await?;
    Ok(success_response(gateway_order))
}

/// Verify a checkout signature and record the payment
#[utoipa::path(
    post,
    path = "/api/v1/orders/payment/verify-razorpay",
    request_body = VerifyRazorpayRequest,
    responses(
        (status = 200, description = "Payment recorded, order confirmed"),
        (status = 400, description = "Signature mismatch; nothing changed"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn verify_razorpay(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyRazorpayRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    // Ensure the order exists and belongs to the caller before any check
    state
        .services
        .orders
        .get_order(payload.order_id, &user)
        .await?;

    state.services.payments.verify_signature(
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
    )?;

    let order = state
        .services
        .orders
        .confirm_payment(
            payload.order_id,
            payload.razorpay_order_id,
            payload.razorpay_payment_id,
        )
        .await?;
    Ok(success_response(order))
}
