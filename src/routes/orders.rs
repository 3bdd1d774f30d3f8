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
    pagination::{PageQuery, PageableResponse, SortDirection},
    services::orders::{self, CreateOrderReq, OrderSnapshot, UpdateOrderStatusReq},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_order, get_orders))
            .routes(utoipa_axum::routes!(get_order, remove_order, update_order_status))
            .routes(utoipa_axum::routes!(get_orders_of_user)),
    )
}

/// Check out a cart into a new order. The cart is emptied in the same transaction.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order created", body = StdResponse<OrderSnapshot, String>),
        (status = 400, description = "Cart is empty"),
        (status = 404, description = "User or cart not found"),
        (status = 422, description = "Billing details missing")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::create_order(conn, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(order),
            message: Some("Order created successfully"),
        },
    ))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order removed"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn remove_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    orders::remove_order(conn, id).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Order is removed."),
    })
}

/// Fetch a specific order with its lines.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = StdResponse<OrderSnapshot, String>),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::get_order(conn, id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: None::<String>,
    })
}

/// Change order or payment status. Moving to `DELIVERED` stamps the delivery date.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Orders"],
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order updated", body = StdResponse<OrderSnapshot, String>),
        (status = 400, description = "Nothing to change"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::update_order_status(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Order updated successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tags = ["Orders"],
    params(("user_id" = Uuid, Path, description = "User whose orders are listed")),
    responses(
        (status = 200, description = "Orders of the user", body = StdResponse<Vec<OrderSnapshot>, String>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_orders_of_user(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders = orders::get_orders_of_user(conn, user_id).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: None::<String>,
    })
}

/// Page through every order, newest first unless asked otherwise.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    params(PageQuery),
    responses(
        (status = 200, description = "One page of orders", body = StdResponse<PageableResponse<OrderSnapshot>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn get_orders(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = page.resolve("order_date", SortDirection::Desc)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders = orders::get_orders(conn, &page).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: None::<String>,
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use testresult::TestResult;
    use tower::ServiceExt;

    use crate::routes::{orders::routes_with_openapi, test_support::offline_app};

    #[tokio::test]
    async fn blank_billing_details_are_unprocessable() -> TestResult {
        let app = offline_app(routes_with_openapi())?;
        let body = serde_json::json!({
            "cart_id": uuid::Uuid::new_v4(),
            "user_id": uuid::Uuid::new_v4(),
            "billing_name": " ",
            "billing_address": "",
            "billing_phone": "555-0100",
        });

        let response = app
            .oneshot(
                Request::post("/orders")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;
        let message = json["message"].as_str().unwrap_or_default();
        assert!(message.contains("billing_name"));
        assert!(message.contains("billing_address"));
        assert!(json["data"].is_null());
        Ok(())
    }

    #[tokio::test]
    async fn empty_page_size_is_a_bad_request() -> TestResult {
        let app = offline_app(routes_with_openapi())?;

        let response = app
            .oneshot(Request::get("/orders?page_size=0").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
