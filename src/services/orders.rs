use crate::{
    auth::AuthUser,
    entities::{
        cart, cart_item,
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order workflow service: transactional checkout, owner queries,
/// admin status management and owner cancellation.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ShippingAddressInput {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Pincode is required"))]
    pub pincode: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
    #[validate]
    pub shipping_address: ShippingAddressInput,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusInput {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Order plus its line snapshots, the shape every order endpoint returns
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// `ORD-{unix millis}-{4 random digits}`
fn generate_order_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}-{:04}", Utc::now().timestamp_millis(), suffix)
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Places an order. Stock validation, stock decrement, order insertion
    /// and cart clearing all happen in one transaction; any failure leaves
    /// every product and the cart untouched.
    ///
    /// Orders start Confirmed with payment Pending regardless of method;
    /// gateway verification later flips the payment status.
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        input.validate()?;
        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Item quantity must be at least 1".to_string(),
                ));
            }
        }

        let txn = self.db.begin().await?;

        let mut total_amount = Decimal::ZERO;
        let mut discount = Decimal::ZERO;
        let mut snapshots = Vec::with_capacity(input.items.len());

        for item in &input.items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(product.name));
            }

            let quantity = Decimal::from(item.quantity);
            total_amount += product.discounted_price * quantity;
            discount += (product.price - product.discounted_price) * quantity;

            let first_image = product
                .images
                .as_array()
                .and_then(|urls| urls.first())
                .and_then(|url| url.as_str())
                .map(str::to_owned);

            snapshots.push((product.clone(), first_image, item));

            let new_stock = product.stock - item.quantity;
            let mut product: product::ActiveModel = product.into();
            product.stock = Set(new_stock);
            product.updated_at = Set(Utc::now());
            product.update(&txn).await?;
        }

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(user_id),
            total_amount: Set(total_amount),
            discount: Set(discount),
            final_amount: Set(total_amount),
            full_name: Set(input.shipping_address.full_name),
            phone: Set(input.shipping_address.phone),
            address_line_1: Set(input.shipping_address.address_line_1),
            address_line_2: Set(input.shipping_address.address_line_2),
            city: Set(input.shipping_address.city),
            state: Set(input.shipping_address.state),
            pincode: Set(input.shipping_address.pincode),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Confirmed),
            razorpay_order_id: Set(None),
            razorpay_payment_id: Set(None),
            notes: Set(input.notes),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for (product, image, item) in snapshots {
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                unit_price: Set(product.discounted_price),
                quantity: Set(item.quantity),
                size: Set(item.size.clone()),
                image: Set(image),
            };
            items.push(line.insert(&txn).await?);
        }

        self.clear_cart(&txn, user_id).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        info!(
            "Created order {} for user {}: {} line(s), total {}",
            order.order_number,
            user_id,
            items.len(),
            order.total_amount
        );
        Ok(OrderWithItems { order, items })
    }

    /// The owner's orders, newest first.
    #[instrument(skip(self))]
    pub async fn my_orders(&self, user_id: Uuid) -> Result<Vec<OrderWithItems>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.attach_items(orders).await
    }

    /// Every order, newest first. Admin only; the handler enforces the role.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderWithItems>, ServiceError> {
        let orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.attach_items(orders).await
    }

    /// Loads one order; only the owner or an admin may see it.
    #[instrument(skip(self, user))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        user: &AuthUser,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user.user_id && !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        let items = self.load_items(&*self.db, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Admin status update, guarded by the fulfilment and payment state
    /// machines. Same-state updates are no-ops; anything else illegal
    /// fails with `InvalidTransition`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.order_status;
        let mut changed = false;
        let mut active: order::ActiveModel = order.clone().into();

        if let Some(next) = input.order_status {
            if next != order.order_status {
                if !order.order_status.can_transition_to(next) {
                    return Err(ServiceError::InvalidTransition(format!(
                        "Cannot move order from {} to {}",
                        order.order_status, next
                    )));
                }
                active.order_status = Set(next);
                changed = true;
            }
        }

        if let Some(next) = input.payment_status {
            if next != order.payment_status {
                if !order.payment_status.can_transition_to(next) {
                    return Err(ServiceError::InvalidTransition(format!(
                        "Cannot move payment from {} to {}",
                        order.payment_status, next
                    )));
                }
                active.payment_status = Set(next);
                changed = true;
            }
        }

        let order = if changed {
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?
        } else {
            order
        };

        if changed {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: order.order_status.to_string(),
                })
                .await;
        }

        let items = self.load_items(&*self.db, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Owner cancellation. Shipped, delivered and already-cancelled orders
    /// cannot be cancelled; otherwise every line's stock is restored and
    /// the order flips to Cancelled in one transaction.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You can only cancel your own orders".to_string(),
            ));
        }

        if !order.order_status.is_cancellable() {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot cancel an order that is {}",
                order.order_status
            )));
        }

        let items = self.load_items(&txn, order_id).await?;
        for item in &items {
            if let Some(product) = product::Entity::find_by_id(item.product_id).one(&txn).await? {
                let new_stock = product.stock + item.quantity;
                let mut product: product::ActiveModel = product.into();
                product.stock = Set(new_stock);
                product.updated_at = Set(Utc::now());
                product.update(&txn).await?;
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.order_status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        info!("Cancelled order {} for user {}", order_id, user_id);
        Ok(OrderWithItems { order, items })
    }

    /// Records a verified gateway payment: payment Completed, order
    /// Confirmed, both gateway ids stored. Re-applying the same terminal
    /// state is harmless, which makes verification replays idempotent.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        gateway_order_id: String,
        payment_id: String,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Completed);
        active.order_status = Set(OrderStatus::Confirmed);
        active.razorpay_order_id = Set(Some(gateway_order_id));
        active.razorpay_payment_id = Set(Some(payment_id.clone()));
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentCompleted {
                order_id,
                payment_id,
            })
            .await;

        let items = self.load_items(&*self.db, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    async fn attach_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.load_items(&*self.db, order.id).await?;
            result.push(OrderWithItems { order, items });
        }
        Ok(result)
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(conn)
            .await?)
    }

    /// Empties the user's cart after checkout. A user without a cart is
    /// fine; checkout may be called with an explicit item list.
    async fn clear_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        else {
            return Ok(());
        };

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(conn)
            .await?;

        let mut cart: cart::ActiveModel = cart.into();
        cart.total_items = Set(0);
        cart.total_price = Set(Decimal::ZERO);
        cart.updated_at = Set(Utc::now());
        cart.update(conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }
}
