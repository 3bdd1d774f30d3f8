use anyhow::Context;
use axum::{
    extract::{Path, State},
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
    services::carts::{self, AddItemToCartReq, CartSnapshot},
};

/// Cart routes, keyed by the owning user.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(add_item, clear_cart, get_cart))
            .routes(utoipa_axum::routes!(remove_item)),
    )
}

/// Add a product to the user's cart, creating the cart on first use.
#[utoipa::path(
    post,
    path = "/{user_id}",
    tags = ["Carts"],
    params(("user_id" = Uuid, Path, description = "Owner of the cart")),
    request_body = AddItemToCartReq,
    responses(
        (status = 200, description = "Updated cart", body = StdResponse<CartSnapshot, String>),
        (status = 400, description = "Quantity is not positive"),
        (status = 404, description = "User or product not found")
    )
)]
pub async fn add_item(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<AddItemToCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = carts::add_item(conn, user_id, body, state.config.cart.quantity_merge).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Item added to the cart"),
    })
}

/// Remove one line from the user's cart.
#[utoipa::path(
    delete,
    path = "/{user_id}/items/{item_id}",
    tags = ["Carts"],
    params(
        ("user_id" = Uuid, Path, description = "Owner of the cart"),
        ("item_id" = i32, Path, description = "Cart line to remove")
    ),
    responses(
        (status = 200, description = "Line removed"),
        (status = 404, description = "User or cart line not found")
    )
)]
pub async fn remove_item(
    Path((user_id, item_id)): Path<(Uuid, i32)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    carts::remove_item(conn, user_id, item_id).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Item is removed from the cart."),
    })
}

/// Empty the user's cart. The cart itself is kept.
#[utoipa::path(
    delete,
    path = "/{user_id}",
    tags = ["Carts"],
    params(("user_id" = Uuid, Path, description = "Owner of the cart")),
    responses(
        (status = 200, description = "Cart emptied"),
        (status = 404, description = "User or cart not found")
    )
)]
pub async fn clear_cart(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    carts::clear_cart(conn, user_id).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Cart is cleared."),
    })
}

#[utoipa::path(
    get,
    path = "/{user_id}",
    tags = ["Carts"],
    params(("user_id" = Uuid, Path, description = "Owner of the cart")),
    responses(
        (status = 200, description = "Current cart", body = StdResponse<CartSnapshot, String>),
        (status = 404, description = "User or cart not found")
    )
)]
pub async fn get_cart(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = carts::get_cart(conn, user_id).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: None::<String>,
    })
}
