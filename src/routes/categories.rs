use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        extract::ValidatedJson,
    },
    models::CategoryEntity,
    pagination::{PageQuery, PageableResponse, SortDirection},
    services::{
        categories::{self, CategoryReq},
        products::{self, ProductDetails, ProductFilter, ProductReq},
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/categories",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_category, get_categories))
            .routes(utoipa_axum::routes!(get_category, update_category, delete_category))
            .routes(utoipa_axum::routes!(create_product_in_category, get_products_of_category))
            .routes(utoipa_axum::routes!(assign_category)),
    )
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    request_body = CategoryReq,
    responses(
        (status = 201, description = "Category created", body = StdResponse<CategoryEntity, String>),
        (status = 422, description = "Invalid category fields")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::create_category(conn, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(category),
            message: Some("Category created successfully"),
        },
    ))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Categories"],
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Category updated", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn update_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::update_category(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Category updated successfully"),
    })
}

/// Delete a category. Refused while it still holds live products.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Categories"],
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 400, description = "Category still holds live products"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    categories::delete_category(conn, id).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Category is deleted successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Categories"],
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category found", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::find_category(conn, id).await?;

    Ok(StdResponse {
        data: Some(category),
        message: None::<String>,
    })
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    params(PageQuery),
    responses(
        (status = 200, description = "One page of categories", body = StdResponse<PageableResponse<CategoryEntity>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn get_categories(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = page.resolve("title", SortDirection::Asc)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories = categories::get_all_categories(conn, &page).await?;

    Ok(StdResponse {
        data: Some(categories),
        message: None::<String>,
    })
}

/// Create a product filed directly under this category.
#[utoipa::path(
    post,
    path = "/{id}/products",
    tags = ["Categories"],
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = ProductReq,
    responses(
        (status = 201, description = "Product created", body = StdResponse<ProductDetails, String>),
        (status = 404, description = "Category not found"),
        (status = 422, description = "Invalid product fields")
    )
)]
pub async fn create_product_in_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::create_product(conn, body, Some(id)).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(product),
            message: Some("Product created successfully"),
        },
    ))
}

#[utoipa::path(
    put,
    path = "/{id}/products/{product_id}",
    tags = ["Categories"],
    params(
        ("id" = Uuid, Path, description = "Category ID"),
        ("product_id" = Uuid, Path, description = "Product to file under the category")
    ),
    responses(
        (status = 200, description = "Product assigned", body = StdResponse<ProductDetails, String>),
        (status = 404, description = "Category or product not found")
    )
)]
pub async fn assign_category(
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::assign_category(conn, product_id, id).await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Category assigned successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}/products",
    tags = ["Categories"],
    params(("id" = Uuid, Path, description = "Category ID"), PageQuery),
    responses(
        (status = 200, description = "One page of the category's products", body = StdResponse<PageableResponse<ProductDetails>, String>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_products_of_category(
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = page.resolve("title", SortDirection::Asc)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products = products::list_products(conn, ProductFilter::InCategory(id), &page).await?;

    Ok(StdResponse {
        data: Some(products),
        message: None::<String>,
    })
}
