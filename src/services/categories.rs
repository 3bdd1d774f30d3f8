use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{app_error::AppError, extract::not_blank},
    models::{CategoryEntity, CreateCategoryEntity, UpdateCategoryEntity},
    pagination::{PageRequest, PageableResponse, sort_boxed},
    schema::{categories, products},
};

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct CategoryReq {
    #[validate(
        custom(function = "not_blank"),
        length(min = 4, max = 255, message = "Title must be between 4 and 255 characters")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub cover_image: String,
}

pub async fn find_category(
    conn: &mut AsyncPgConnection,
    category_id: Uuid,
) -> Result<CategoryEntity, AppError> {
    categories::table
        .find(category_id)
        .select(CategoryEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Category not found with given id"))
}

pub async fn create_category(
    conn: &mut AsyncPgConnection,
    request: CategoryReq,
) -> Result<CategoryEntity, AppError> {
    info!("Creating category: {}", request.title);

    let category = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            cover_image: request.cover_image,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;
    Ok(category)
}

pub async fn update_category(
    conn: &mut AsyncPgConnection,
    category_id: Uuid,
    request: CategoryReq,
) -> Result<CategoryEntity, AppError> {
    info!("Updating category: {}", category_id);

    diesel::update(categories::table.find(category_id))
        .set(UpdateCategoryEntity {
            title: request.title,
            description: request.description,
            cover_image: request.cover_image,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Category not found with given id"))
}

/// Delete a category. Refused while live products still belong to it; other products become uncategorized.
pub async fn delete_category(conn: &mut AsyncPgConnection, category_id: Uuid) -> Result<(), AppError> {
    info!("Deleting category: {}", category_id);

    conn.transaction(move |conn| {
        Box::pin(async move {
            let category = find_category(conn, category_id).await?;

            let live_products: i64 = products::table
                .filter(products::category_id.eq(category.id))
                .filter(products::live.eq(true))
                .count()
                .get_result(conn)
                .await?;
            if live_products > 0 {
                warn!(
                    "Refusing to delete category {} with {} live products",
                    category.id, live_products
                );
                return Err(AppError::bad_request(format!(
                    "Category still has {} live products",
                    live_products
                )));
            }

            diesel::delete(categories::table.find(category.id))
                .execute(conn)
                .await?;
            Ok::<(), AppError>(())
        })
    })
    .await
}

pub async fn get_all_categories(
    conn: &mut AsyncPgConnection,
    page: &PageRequest,
) -> Result<PageableResponse<CategoryEntity>, AppError> {
    let query = categories::table
        .select(CategoryEntity::as_select())
        .into_boxed();
    let query = sort_boxed!(query, page, {
        "title" => categories::title,
        "description" => categories::description,
    })?;

    let rows: Vec<CategoryEntity> = query
        .then_order_by(categories::id.asc())
        .limit(page.page_size)
        .offset(page.offset())
        .get_results(conn)
        .await?;
    let total: i64 = categories::table.count().get_result(conn).await?;

    Ok(PageableResponse::from_rows(rows, total, page, |category| category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_are_rejected() {
        let request = CategoryReq {
            title: "TV".into(),
            description: "Televisions".into(),
            cover_image: "tv.png".into(),
        };

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn blank_cover_image_is_rejected() {
        let request = CategoryReq {
            title: "Laptops".into(),
            description: "Portable computers".into(),
            cover_image: "   ".into(),
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 1);
        assert!(errors.field_errors().contains_key("cover_image"));
    }

    #[test]
    fn titles_longer_than_the_column_are_rejected() {
        let request = CategoryReq {
            title: "T".repeat(256),
            description: "Too wordy".into(),
            cover_image: format!("{}.png", "c".repeat(252)),
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("cover_image"));

        let fits = CategoryReq {
            title: "T".repeat(255),
            description: "Just right".into(),
            cover_image: "c.png".into(),
        };
        assert!(fits.validate().is_ok());
    }
}
