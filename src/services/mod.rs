pub mod carts;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod users;

pub use carts::CartService;
pub use catalog::ProductCatalogService;
pub use orders::OrderService;
pub use payments::RazorpayService;
pub use users::UserService;
