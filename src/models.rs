use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub password: String,
    pub gender: String,
    pub about: String,
    pub image_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub about: String,
    pub image_name: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateUserEntity {
    pub name: String,
    pub password: String,
    pub gender: String,
    pub about: String,
    pub image_name: Option<String>,
}

// Categories

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_image: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_image: String,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct UpdateCategoryEntity {
    pub title: String,
    pub description: String,
    pub cover_image: String,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Minor currency units.
    pub price: i32,
    /// Price actually charged per unit, in minor currency units.
    pub discounted_price: i32,
    pub quantity: i32,
    pub added_date: DateTime<Utc>,
    pub live: bool,
    pub stock: bool,
    pub image_name: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i32,
    pub discounted_price: i32,
    pub quantity: i32,
    pub added_date: DateTime<Utc>,
    pub live: bool,
    pub stock: bool,
    pub image_name: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateProductEntity {
    pub title: String,
    pub description: String,
    pub price: i32,
    pub discounted_price: i32,
    pub quantity: i32,
    pub live: bool,
    pub stock: bool,
    pub image_name: Option<String>,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub id: i32,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: i32,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: i32,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_status: String,
    pub payment_status: String,
    pub order_amount: i32,
    pub billing_name: String,
    pub billing_address: String,
    pub billing_phone: String,
    pub order_date: DateTime<Utc>,
    pub delivered_date: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_status: String,
    pub payment_status: String,
    pub order_amount: i32,
    pub billing_name: String,
    pub billing_address: String,
    pub billing_phone: String,
    pub order_date: DateTime<Utc>,
    pub delivered_date: Option<DateTime<Utc>>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::orders)]
pub struct UpdateOrderStatusEntity {
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub delivered_date: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: i32,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: i32,
}
