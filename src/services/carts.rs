use crate::{
    entities::{cart, cart_item, product},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Shopping cart service. Every user owns at most one cart, created lazily
/// on first access. All mutations recompute the denormalised totals inside
/// the same transaction, so `total_items`/`total_price` always equal the
/// fold over the items.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCartItemInput {
    pub product_id: Uuid,
    pub size: String,
    /// Zero or negative removes the line
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RemoveCartItemInput {
    pub product_id: Uuid,
    pub size: String,
}

/// Cart plus its lines, the shape every cart endpoint returns
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_cart(&*self.db, user_id).await?;
        let items = self.load_items(&*self.db, cart.id).await?;
        Ok(CartWithItems { cart, items })
    }

    /// Adds a product line to the cart, merging on (product_id, size).
    /// The unit price and image are snapshots of the product's discounted
    /// price and first image at add time.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        let existing_item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Size.eq(input.size.clone()))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let current_quantity = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current_quantity + input.quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let first_image = product
                .images
                .as_array()
                .and_then(|urls| urls.first())
                .and_then(|url| url.as_str())
                .map(str::to_owned);

            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                size: Set(input.size.clone()),
                quantity: Set(input.quantity),
                unit_price: Set(product.discounted_price),
                image: Set(first_image),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let cart = self.recalculate_totals(&txn, cart.id).await?;
        let items = self.load_items(&txn, cart.id).await?;
        txn.commit().await?;

        info!(
            "Added item to cart for user {}: product {} ({}) x{}",
            user_id, input.product_id, input.size, input.quantity
        );
        Ok(CartWithItems { cart, items })
    }

    /// Updates a line's quantity; zero or negative removes it.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        input: UpdateCartItemInput,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        let item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Size.eq(input.size.clone()))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        if input.quantity <= 0 {
            item.delete(&txn).await?;
        } else {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(input.quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        }

        let cart = self.recalculate_totals(&txn, cart.id).await?;
        let items = self.load_items(&txn, cart.id).await?;
        txn.commit().await?;

        Ok(CartWithItems { cart, items })
    }

    /// Removes the line matching (product_id, size).
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        input: RemoveCartItemInput,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        let item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Size.eq(input.size.clone()))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        item.delete(&txn).await?;

        let cart = self.recalculate_totals(&txn, cart.id).await?;
        let items = self.load_items(&txn, cart.id).await?;
        txn.commit().await?;

        Ok(CartWithItems { cart, items })
    }

    /// Removes every line from the user's cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart = self.recalculate_totals(&txn, cart.id).await?;
        txn.commit().await?;

        info!("Cleared cart for user {}", user_id);
        Ok(CartWithItems {
            cart,
            items: Vec::new(),
        })
    }

    /// Fetches the user's cart or inserts an empty one.
    pub(crate) async fn get_or_create_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_items: Set(0),
            total_price: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        Ok(cart.insert(conn).await?)
    }

    /// Recomputes the denormalised totals from the lines.
    pub(crate) async fn recalculate_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total_items: i32 = items.iter().map(|i| i.quantity).sum();
        let total_price: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let cart = cart::Entity::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let mut cart: cart::ActiveModel = cart.into();
        cart.total_items = Set(total_items);
        cart.total_price = Set(total_price);
        cart.updated_at = Set(Utc::now());
        Ok(cart.update(conn).await?)
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(conn)
            .await?)
    }
}
