use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Product entity for the storefront catalog
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: Category,
    pub brand: String,
    pub price: Decimal,
    /// Discount percent, 0..=100
    pub discount: Decimal,
    /// Derived: price - price * discount / 100, recomputed on every write
    pub discounted_price: Decimal,
    pub stock: i32,
    /// List of image URLs
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<String>)]
    pub images: Json,
    /// Advisory per-size stock breakdown: [{"size": "...", "stock": n}]
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Object)]
    pub sizes: Json,
    /// Mean review rating rounded to 1 decimal place, 0 when unreviewed
    pub rating: Decimal,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_review::Entity")]
    Reviews,
}

impl Related<super::product_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Product category enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum Category {
    #[sea_orm(string_value = "Men")]
    Men,
    #[sea_orm(string_value = "Women")]
    Women,
    #[sea_orm(string_value = "Sports")]
    Sports,
    #[sea_orm(string_value = "Casual")]
    Casual,
    #[sea_orm(string_value = "Formal")]
    Formal,
}

/// Advisory per-size stock entry stored in the `sizes` json column
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SizeStock {
    pub size: String,
    pub stock: i32,
}
