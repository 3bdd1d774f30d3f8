use std::collections::HashMap;

use chrono::Utc;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, TextExpressionMethods,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{app_error::AppError, extract::not_blank},
    models::{CategoryEntity, CreateProductEntity, ProductEntity, UpdateProductEntity},
    pagination::{PageRequest, PageableResponse, sort_boxed},
    schema::{categories, products},
    services::{categories::find_category, users::escape_like},
};

#[derive(Deserialize, Debug, Clone, ToSchema, Validate)]
#[validate(schema(function = "discount_within_price"))]
pub struct ProductReq {
    #[validate(length(min = 3, max = 255, message = "Title must be between 3 and 255 characters"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price: i32,
    #[validate(range(min = 0, message = "Discounted price must not be negative"))]
    pub discounted_price: i32,
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i32,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub stock: bool,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub image_name: Option<String>,
}

fn discount_within_price(request: &ProductReq) -> Result<(), ValidationError> {
    if request.discounted_price > request.price {
        let mut err = ValidationError::new("discount_above_price");
        err.message = Some("Discounted price must not exceed price".into());
        return Err(err);
    }
    Ok(())
}

/// A product together with the category it is filed under.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: ProductEntity,
    pub category: Option<CategoryEntity>,
}

/// Which products a listing covers.
#[derive(Debug, Clone)]
pub enum ProductFilter {
    All,
    Live,
    TitleContains(String),
    InCategory(Uuid),
}

pub async fn find_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
) -> Result<ProductEntity, AppError> {
    products::table
        .find(product_id)
        .select(ProductEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Product not found with given id"))
}

async fn with_categories(
    conn: &mut AsyncPgConnection,
    rows: Vec<ProductEntity>,
) -> Result<Vec<ProductDetails>, AppError> {
    let category_ids: Vec<Uuid> = rows.iter().filter_map(|p| p.category_id).collect();

    let mut by_id: HashMap<Uuid, CategoryEntity> = HashMap::new();
    if !category_ids.is_empty() {
        let found: Vec<CategoryEntity> = categories::table
            .filter(categories::id.eq_any(&category_ids))
            .select(CategoryEntity::as_select())
            .get_results(conn)
            .await?;
        by_id.extend(found.into_iter().map(|c| (c.id, c)));
    }

    Ok(rows
        .into_iter()
        .map(|product| ProductDetails {
            category: product.category_id.and_then(|id| by_id.get(&id).cloned()),
            product,
        })
        .collect())
}

pub async fn get_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
) -> Result<ProductDetails, AppError> {
    let product = find_product(conn, product_id).await?;
    let mut details = with_categories(conn, vec![product]).await?;
    details
        .pop()
        .ok_or_else(|| AppError::not_found("Product not found with given id"))
}

/// Create a product, optionally filed under `category_id` (which must exist).
pub async fn create_product(
    conn: &mut AsyncPgConnection,
    request: ProductReq,
    category_id: Option<Uuid>,
) -> Result<ProductDetails, AppError> {
    info!("Creating product: {}", request.title);

    if let Some(category_id) = category_id {
        find_category(conn, category_id).await?;
    }

    let product = diesel::insert_into(products::table)
        .values(CreateProductEntity {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            price: request.price,
            discounted_price: request.discounted_price,
            quantity: request.quantity,
            added_date: Utc::now(),
            live: request.live,
            stock: request.stock,
            image_name: request.image_name,
            category_id,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Product created: {}", product.id);
    let mut details = with_categories(conn, vec![product]).await?;
    details
        .pop()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("Created product vanished")))
}

pub async fn update_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    request: ProductReq,
) -> Result<ProductDetails, AppError> {
    info!("Updating product: {}", product_id);

    let product = diesel::update(products::table.find(product_id))
        .set(UpdateProductEntity {
            title: request.title,
            description: request.description,
            price: request.price,
            discounted_price: request.discounted_price,
            quantity: request.quantity,
            live: request.live,
            stock: request.stock,
            image_name: request.image_name,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Product not found with given id"))?;

    let mut details = with_categories(conn, vec![product]).await?;
    details
        .pop()
        .ok_or_else(|| AppError::not_found("Product not found with given id"))
}

/// Delete a product. Cart lines holding it go with it; products already ordered cannot be deleted.
pub async fn delete_product(conn: &mut AsyncPgConnection, product_id: Uuid) -> Result<(), AppError> {
    info!("Deleting product: {}", product_id);

    let deleted = diesel::delete(products::table.find(product_id))
        .execute(conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found("Product not found with given id"));
    }
    Ok(())
}

pub async fn list_products(
    conn: &mut AsyncPgConnection,
    filter: ProductFilter,
    page: &PageRequest,
) -> Result<PageableResponse<ProductDetails>, AppError> {
    let mut query = products::table
        .select(ProductEntity::as_select())
        .into_boxed();
    let mut count = products::table.count().into_boxed();

    match &filter {
        ProductFilter::All => {}
        ProductFilter::Live => {
            query = query.filter(products::live.eq(true));
            count = count.filter(products::live.eq(true));
        }
        ProductFilter::TitleContains(keyword) => {
            let pattern = format!("%{}%", escape_like(keyword));
            query = query.filter(products::title.like(pattern.clone()));
            count = count.filter(products::title.like(pattern));
        }
        ProductFilter::InCategory(category_id) => {
            find_category(conn, *category_id).await?;
            query = query.filter(products::category_id.eq(*category_id));
            count = count.filter(products::category_id.eq(*category_id));
        }
    }

    let query = sort_boxed!(query, page, {
        "title" => products::title,
        "price" => products::price,
        "discounted_price" => products::discounted_price,
        "quantity" => products::quantity,
        "added_date" => products::added_date,
    })?;

    let rows: Vec<ProductEntity> = query
        .then_order_by(products::id.asc())
        .limit(page.page_size)
        .offset(page.offset())
        .get_results(conn)
        .await?;
    let total: i64 = count.get_result(conn).await?;

    let details = with_categories(conn, rows).await?;
    Ok(PageableResponse::from_rows(details, total, page, |product| product))
}

/// File an existing product under an existing category.
pub async fn assign_category(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    category_id: Uuid,
) -> Result<ProductDetails, AppError> {
    let category = find_category(conn, category_id).await?;
    let product = find_product(conn, product_id).await?;

    let product = diesel::update(products::table.find(product.id))
        .set(products::category_id.eq(Some(category.id)))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Product {} assigned to category {}", product.id, category.id);
    Ok(ProductDetails {
        product,
        category: Some(category),
    })
}

pub async fn set_image(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    image_name: &str,
) -> Result<ProductEntity, AppError> {
    let product = diesel::update(products::table.find(product_id))
        .set(products::image_name.eq(image_name))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ProductReq {
        ProductReq {
            title: "Mechanical keyboard".into(),
            description: "Tactile switches".into(),
            price: 12_000,
            discounted_price: 9_900,
            quantity: 15,
            live: true,
            stock: true,
            image_name: None,
        }
    }

    #[test]
    fn valid_product_passes_validation() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn discount_may_equal_but_not_exceed_price() {
        let equal = ProductReq {
            discounted_price: 12_000,
            ..valid_request()
        };
        assert!(equal.validate().is_ok());

        let above = ProductReq {
            discounted_price: 12_001,
            ..valid_request()
        };
        assert!(above.validate().is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let request = ProductReq {
            price: -1,
            quantity: -5,
            discounted_price: -1,
            ..valid_request()
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("discounted_price"));
    }

    #[test]
    fn long_title_and_image_name_are_rejected() {
        let request = ProductReq {
            title: "K".repeat(256),
            image_name: Some("i".repeat(256)),
            ..valid_request()
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("image_name"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn details_serialize_flat_with_category() -> testresult::TestResult {
        let category_id = Uuid::new_v4();
        let details = ProductDetails {
            product: ProductEntity {
                id: Uuid::new_v4(),
                title: "Lamp".into(),
                description: "Desk lamp".into(),
                price: 2_000,
                discounted_price: 1_500,
                quantity: 3,
                added_date: Utc::now(),
                live: true,
                stock: true,
                image_name: None,
                category_id: Some(category_id),
            },
            category: Some(CategoryEntity {
                id: category_id,
                title: "Lighting".into(),
                description: "Lamps and bulbs".into(),
                cover_image: "lighting.png".into(),
            }),
        };

        let json = serde_json::to_value(&details)?;
        assert_eq!(json["title"], "Lamp");
        assert_eq!(json["discounted_price"], 1_500);
        assert_eq!(json["category"]["title"], "Lighting");
        Ok(())
    }
}
