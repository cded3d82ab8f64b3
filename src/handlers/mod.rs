pub mod auth;
pub mod carts;
pub mod common;
pub mod orders;
pub mod products;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        notifications::EmailSender, CartService, OrderService, ProductCatalogService,
        RazorpayService, UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub users: Arc<UserService>,
    pub catalog: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<RazorpayService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let auth = AuthService::new(config.jwt_secret.clone(), config.jwt_expiration);

        let users = Arc::new(UserService::new(
            db_pool.clone(),
            event_sender.clone(),
            auth.clone(),
            mailer,
            config.otp_expiry_minutes,
        ));
        let catalog = Arc::new(ProductCatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let carts = Arc::new(CartService::new(db_pool.clone()));
        let orders = Arc::new(OrderService::new(db_pool, event_sender));
        let payments = Arc::new(RazorpayService::new(config));

        Self {
            auth,
            users,
            catalog,
            carts,
            orders,
            payments,
        }
    }
}
