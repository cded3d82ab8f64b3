use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the `bearer_auth` scheme referenced by the annotated handlers.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StepOut API",
        description = "Footwear storefront: catalog, cart, checkout, orders and payments",
        version = "1.0.0"
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::verify_otp,
        crate::handlers::auth::login,
        crate::handlers::auth::delete_address,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::add_review,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::orders::create_order,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_status,
        crate::handlers::orders::create_razorpay_order,
        crate::handlers::orders::verify_razorpay,
    ),
    components(schemas(
        crate::ApiResponse<serde_json::Value>,
        crate::errors::ErrorResponse,
        crate::entities::product::Model,
        crate::entities::product::Category,
        crate::entities::product::SizeStock,
        crate::entities::product_review::Model,
        crate::entities::cart::Model,
        crate::entities::cart_item::Model,
        crate::entities::order::Model,
        crate::entities::order::OrderStatus,
        crate::entities::order::PaymentStatus,
        crate::entities::order::PaymentMethod,
        crate::entities::order_item::Model,
        crate::entities::address::Model,
        crate::services::users::RegisterInput,
        crate::services::users::VerifyOtpInput,
        crate::services::users::ResendOtpInput,
        crate::services::users::LoginInput,
        crate::services::users::UpdateProfileInput,
        crate::services::users::AddressInput,
        crate::services::users::UserProfile,
        crate::services::users::AuthResponse,
        crate::services::catalog::CreateProductInput,
        crate::services::catalog::UpdateProductInput,
        crate::services::catalog::AddReviewInput,
        crate::services::catalog::ProductDetail,
        crate::services::carts::AddToCartInput,
        crate::services::carts::UpdateCartItemInput,
        crate::services::carts::RemoveCartItemInput,
        crate::services::carts::CartWithItems,
        crate::services::orders::OrderItemInput,
        crate::services::orders::ShippingAddressInput,
        crate::services::orders::CreateOrderInput,
        crate::services::orders::UpdateOrderStatusInput,
        crate::services::orders::OrderWithItems,
        crate::services::payments::GatewayOrder,
        crate::handlers::orders::CreateRazorpayOrderRequest,
        crate::handlers::orders::VerifyRazorpayRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, OTP verification, login, profile and addresses"),
        (name = "products", description = "Catalog browsing and back-office product management"),
        (name = "cart", description = "The authenticated user's shopping cart"),
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "payments", description = "Razorpay order creation and signature verification"),
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_annotated_path() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/products",
            "/api/v1/products/{id}",
            "/api/v1/cart",
            "/api/v1/orders",
            "/api/v1/orders/{id}/status",
            "/api/v1/orders/payment/verify-razorpay",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
