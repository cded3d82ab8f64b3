use crate::handlers::common::{success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::carts::{AddToCartInput, RemoveCartItemInput, UpdateCartItemInput},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::{delete, get, post, put},
    Router,
};

/// Creates the router for cart endpoints. Every route acts on the
/// authenticated user's own cart.
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items", put(update_item))
        .route("/items", delete(remove_item))
        .route("/clear", post(clear_cart))
}

/// Get the cart, creating an empty one on first access
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "The user's cart with items")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(user.user_id).await?;
    Ok(success_response(cart))
}

/// Add an item, merging on (product, size)
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Product not found or inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let cart = state.services.carts.add_item(user.user_id, payload).await?;
    Ok(success_response(cart))
}

/// Update a line's quantity; zero or less removes it
async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .update_item_quantity(user.user_id, payload)
        .await?;
    Ok(success_response(cart))
}

/// Remove the line matching (product, size)
async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RemoveCartItemInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .remove_item(user.user_id, payload)
        .await?;
    Ok(success_response(cart))
}

/// Empty the cart
async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state.services.carts.clear_cart(user.user_id).await?;
    Ok(success_response(cart))
}
