use anyhow::Context;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        extract::ValidatedJson,
    },
    models::ProductEntity,
    pagination::{PageQuery, PageableResponse, SortDirection},
    routes::{image_response, read_upload},
    services::{
        files,
        products::{self, ProductDetails, ProductFilter, ProductReq},
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/products",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_product, get_products))
            .routes(utoipa_axum::routes!(get_product, update_product, delete_product))
            .routes(utoipa_axum::routes!(get_live_products))
            .routes(utoipa_axum::routes!(search_products))
            .routes(utoipa_axum::routes!(upload_product_image, serve_product_image)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct ProductImageForm {
    #[schema(value_type = String, format = Binary)]
    product_image: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Products"],
    request_body = ProductReq,
    responses(
        (status = 201, description = "Product created", body = StdResponse<ProductDetails, String>),
        (status = 422, description = "Invalid product fields")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::create_product(conn, body, None).await?;

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
    path = "/{id}",
    tags = ["Products"],
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductReq,
    responses(
        (status = 200, description = "Product updated", body = StdResponse<ProductDetails, String>),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::update_product(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Product updated successfully"),
    })
}

/// Delete a product. Products referenced by an order cannot be deleted.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Products"],
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 400, description = "Product is referenced by an order"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    products::delete_product(conn, id).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Product is deleted successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Products"],
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = StdResponse<ProductDetails, String>),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::get_product(conn, id).await?;

    Ok(StdResponse {
        data: Some(product),
        message: None::<String>,
    })
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Products"],
    params(PageQuery),
    responses(
        (status = 200, description = "One page of products", body = StdResponse<PageableResponse<ProductDetails>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn get_products(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    list(state, ProductFilter::All, page).await
}

/// Products currently offered for sale.
#[utoipa::path(
    get,
    path = "/live",
    tags = ["Products"],
    params(PageQuery),
    responses(
        (status = 200, description = "One page of live products", body = StdResponse<PageableResponse<ProductDetails>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn get_live_products(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    list(state, ProductFilter::Live, page).await
}

#[utoipa::path(
    get,
    path = "/search/{query}",
    tags = ["Products"],
    params(("query" = String, Path, description = "Substring of the product title"), PageQuery),
    responses(
        (status = 200, description = "One page of matching products", body = StdResponse<PageableResponse<ProductDetails>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn search_products(
    Path(query): Path<String>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    list(state, ProductFilter::TitleContains(query), page).await
}

async fn list(
    state: AppState,
    filter: ProductFilter,
    page: PageQuery,
) -> Result<StdResponse<PageableResponse<ProductDetails>, String>, AppError> {
    let page = page.resolve("title", SortDirection::Asc)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products = products::list_products(conn, filter, &page).await?;

    Ok(StdResponse {
        data: Some(products),
        message: None,
    })
}

/// Upload a product image under the `productImage` multipart field.
#[utoipa::path(
    post,
    path = "/image/{id}",
    tags = ["Products"],
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body(content = ProductImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Unsupported file type"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn upload_product_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (file_name, bytes) = read_upload(multipart, "productImage").await?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::find_product(conn, id).await?;
    let dir = &state.config.images.product_dir;
    let stored = files::upload_image(dir, &file_name, &bytes).await?;
    let updated = products::set_image(conn, product.id, &stored).await?;

    if let Some(previous) = product.image_name.filter(|previous| *previous != stored) {
        files::delete_image(dir, &previous).await?;
    }
    info!("Product {} image set to {}", updated.id, stored);

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(updated),
            message: Some("Image uploaded successfully"),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/image/{id}",
    tags = ["Products"],
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Image bytes", body = Vec<u8>, content_type = "image/*"),
        (status = 404, description = "Product or image not found")
    )
)]
pub async fn serve_product_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = products::find_product(conn, id).await?;
    let name = product
        .image_name
        .ok_or_else(|| AppError::not_found("Product has no image"))?;
    let bytes = files::read_image(&state.config.images.product_dir, &name).await?;

    Ok(image_response(&name, bytes))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use testresult::TestResult;
    use tower::ServiceExt;

    use crate::routes::{products::routes_with_openapi, test_support::offline_app};

    #[tokio::test]
    async fn discount_above_price_is_unprocessable() -> TestResult {
        let app = offline_app(routes_with_openapi())?;
        let body = serde_json::json!({
            "title": "Desk lamp",
            "description": "Adjustable arm",
            "price": 1000,
            "discounted_price": 1200,
            "quantity": 4,
        });

        let response = app
            .oneshot(
                Request::post("/products")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }

    #[tokio::test]
    async fn negative_page_is_a_bad_request() -> TestResult {
        let app = offline_app(routes_with_openapi())?;

        let response = app
            .oneshot(Request::get("/products/live?page_number=-1").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
