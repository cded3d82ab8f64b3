use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::catalog::{
        AddReviewInput, CreateProductInput, ProductListQuery, UpdateProductInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/admin", get(admin_list_products))
        .route("/:id", get(get_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/reviews", post(add_review))
}

/// List active products with filters and sorting
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Active products matching the filters")
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let products = state.services.catalog.list_products(query).await?;
    Ok(success_response(products))
}

/// Get one product with its reviews
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail with reviews"),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let detail = state.services.catalog.get_product(id).await?;
    Ok(success_response(detail))
}

/// Admin: list active products, newest first
async fn admin_list_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let products = state.services.catalog.admin_list_products().await?;
    Ok(success_response(products))
}

/// Admin: create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid pricing or fields"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(user.user_id, payload)
        .await?;
    Ok(created_response(product))
}

/// Admin: partial product update
async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

/// Admin: soft-delete a product
async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.ensure_admin()?;
    let deleted_id = state.services.catalog.delete_product(id).await?;
    Ok(success_response(json!({ "id": deleted_id })))
}

/// Add a review to a product
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = AddReviewInput,
    responses(
        (status = 201, description = "Review added"),
        (status = 400, description = "Rating outside 1..=5"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddReviewInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let review = state
        .services
        .catalog
        .add_review(id, user.user_id, user.name.clone(), payload)
        .await?;
    Ok(created_response(review))
}
