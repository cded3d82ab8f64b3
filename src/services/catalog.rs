use crate::{
    entities::product::{self, Category, SizeStock},
    entities::product_review,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Product catalog service: storefront listing and search, admin CRUD with
/// soft deletion, and append-only reviews with a denormalised mean rating.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductListQuery {
    /// Exact category match
    pub category: Option<Category>,
    /// Case-insensitive brand substring
    pub brand: Option<String>,
    /// Case-insensitive search over name, description and brand
    pub search: Option<String>,
    /// Lower bound on discounted price
    pub min_price: Option<Decimal>,
    /// Upper bound on discounted price
    pub max_price: Option<Decimal>,
    /// One of: price-low, price-high, newest, rating
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub category: Category,
    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<SizeStock>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub sizes: Option<Vec<SizeStock>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddReviewInput {
    pub rating: i16,
    pub comment: Option<String>,
}

/// Product plus its reviews, the shape of the detail endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub reviews: Vec<product_review::Model>,
}

/// discounted = price - price * discount / 100
fn discounted_price(price: Decimal, discount: Decimal) -> Decimal {
    price - price * discount / Decimal::from(100)
}

fn validate_pricing(price: Decimal, discount: Decimal) -> Result<(), ServiceError> {
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    if discount < Decimal::ZERO || discount > Decimal::from(100) {
        return Err(ServiceError::ValidationError(
            "Discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists active products with optional filters and sorting.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut select = product::Entity::find().filter(product::Column::IsActive.eq(true));

        if let Some(category) = query.category {
            select = select.filter(product::Column::Category.eq(category));
        }

        if let Some(brand) = query.brand.as_deref().filter(|b| !b.trim().is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Brand)))
                    .like(format!("%{}%", brand.trim().to_lowercase())),
            );
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim().to_lowercase());
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Description)))
                            .like(pattern.clone()),
                    )
                    .add(Expr::expr(Func::lower(Expr::col(product::Column::Brand))).like(pattern)),
            );
        }

        if let Some(min) = query.min_price {
            select = select.filter(product::Column::DiscountedPrice.gte(min));
        }
        if let Some(max) = query.max_price {
            select = select.filter(product::Column::DiscountedPrice.lte(max));
        }

        select = match query.sort.as_deref() {
            Some("price-low") => select.order_by_asc(product::Column::DiscountedPrice),
            Some("price-high") => select.order_by_desc(product::Column::DiscountedPrice),
            Some("rating") => select.order_by_desc(product::Column::Rating),
            _ => select.order_by_desc(product::Column::CreatedAt),
        };

        Ok(select.all(&*self.db).await?)
    }

    /// Loads one active product with its reviews.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let reviews = product_review::Entity::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .order_by_desc(product_review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(ProductDetail { product, reviews })
    }

    /// Admin listing: active products, newest first.
    #[instrument(skip(self))]
    pub async fn admin_list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Creates a product, deriving the discounted price.
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        created_by: Uuid,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        validate_pricing(input.price, input.discount)?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            category: Set(input.category),
            brand: Set(input.brand),
            price: Set(input.price),
            discount: Set(input.discount),
            discounted_price: Set(discounted_price(input.price, input.discount)),
            stock: Set(input.stock),
            images: Set(serde_json::json!(input.images)),
            sizes: Set(serde_json::to_value(&input.sizes)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            rating: Set(Decimal::ZERO),
            is_active: Set(true),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product: {}", product.id);
        Ok(product)
    }

    /// Applies a partial update, re-deriving the discounted price whenever
    /// price or discount change.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let price = input.price.unwrap_or(existing.price);
        let discount = input.discount.unwrap_or(existing.discount);
        validate_pricing(price, discount)?;

        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock cannot be negative".to_string(),
                ));
            }
        }

        let mut product: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            product.name = Set(name);
        }
        if let Some(description) = input.description {
            product.description = Set(description);
        }
        if let Some(category) = input.category {
            product.category = Set(category);
        }
        if let Some(brand) = input.brand {
            product.brand = Set(brand);
        }
        if let Some(stock) = input.stock {
            product.stock = Set(stock);
        }
        if let Some(images) = input.images {
            product.images = Set(serde_json::json!(images));
        }
        if let Some(sizes) = input.sizes {
            product.sizes = Set(serde_json::to_value(&sizes)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?);
        }
        product.price = Set(price);
        product.discount = Set(discount);
        product.discounted_price = Set(discounted_price(price, discount));
        product.updated_at = Set(Utc::now());

        let product = product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product.id))
            .await;

        Ok(product)
    }

    /// Soft-deletes a product so existing order and cart snapshots stay
    /// resolvable. Returns the id for the response body.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<Uuid, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut product: product::ActiveModel = product.into();
        product.is_active = Set(false);
        product.updated_at = Set(Utc::now());
        product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Soft-deleted product: {}", product_id);
        Ok(product_id)
    }

    /// Appends a review and recomputes the product's mean rating (rounded
    /// to one decimal place) in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn add_review(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        user_name: String,
        input: AddReviewInput,
    ) -> Result<product_review::Model, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let review = product_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            user_name: Set(user_name),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(Utc::now()),
        };
        let review = review.insert(&txn).await?;

        let ratings: Vec<i16> = product_review::Entity::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.rating)
            .collect();

        let mean = if ratings.is_empty() {
            Decimal::ZERO
        } else {
            let sum: Decimal = ratings.iter().map(|&r| Decimal::from(r)).sum();
            (sum / Decimal::from(ratings.len() as i64)).round_dp(1)
        };

        let mut product: product::ActiveModel = product.into();
        product.rating = Set(mean);
        product.updated_at = Set(Utc::now());
        product.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewAdded {
                product_id,
                rating: review.rating,
            })
            .await;

        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discounted_price_is_percentage_off() {
        assert_eq!(discounted_price(dec!(1000), dec!(20)), dec!(800));
        assert_eq!(discounted_price(dec!(999), dec!(0)), dec!(999));
        assert_eq!(discounted_price(dec!(500), dec!(100)), dec!(0));
    }

    #[test]
    fn pricing_bounds_are_enforced() {
        assert!(validate_pricing(dec!(100), dec!(0)).is_ok());
        assert!(validate_pricing(dec!(100), dec!(100)).is_ok());
        assert!(validate_pricing(dec!(-1), dec!(0)).is_err());
        assert!(validate_pricing(dec!(100), dec!(101)).is_err());
        assert!(validate_pricing(dec!(100), dec!(-5)).is_err());
    }
}
