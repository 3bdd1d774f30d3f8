//! Order engine: converts a cart into an immutable order with snapshotted totals.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{app_error::AppError, extract::not_blank},
    models::{
        CartEntity, CartItemEntity, CreateOrderEntity, CreateOrderItemEntity, OrderEntity,
        OrderItemEntity, ProductEntity, UpdateOrderStatusEntity,
    },
    pagination::{PageRequest, PageableResponse, sort_boxed},
    schema::{cart_items, carts, order_items, orders, products, users},
    services::carts::{load_cart_items, lock_user},
};

pub const DEFAULT_ORDER_STATUS: &str = "PENDING";
pub const DEFAULT_PAYMENT_STATUS: &str = "NOT_PAID";
pub const DELIVERED_STATUS: &str = "DELIVERED";

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct CreateOrderReq {
    pub cart_id: Uuid,
    pub user_id: Uuid,
    #[validate(custom(function = "not_blank"), length(max = 32))]
    pub order_status: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 32))]
    pub payment_status: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub billing_name: String,
    #[validate(custom(function = "not_blank"), length(max = 1000))]
    pub billing_address: String,
    #[validate(custom(function = "not_blank"), length(max = 32))]
    pub billing_phone: String,
}

#[derive(Deserialize, Debug, Default, ToSchema, Validate)]
pub struct UpdateOrderStatusReq {
    #[validate(custom(function = "not_blank"), length(max = 32))]
    pub order_status: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 32))]
    pub payment_status: Option<String>,
    pub delivered_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct OrderItemDetails {
    pub id: i32,
    pub quantity: i32,
    pub total_price: i32,
    pub product: ProductEntity,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct OrderSnapshot {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemDetails>,
}

/// Freeze cart lines into order lines, returning them with the order amount.
///
/// Line totals are copied as stored on the cart, not recomputed from current prices.
pub fn snapshot_items(
    cart_items: &[CartItemEntity],
    order_id: Uuid,
) -> Result<(Vec<CreateOrderItemEntity>, i32), AppError> {
    if cart_items.is_empty() {
        return Err(AppError::bad_request("Cart is empty, cannot create an order"));
    }

    let mut order_amount: i32 = 0;
    let mut items = Vec::with_capacity(cart_items.len());
    for item in cart_items {
        order_amount = order_amount
            .checked_add(item.total_price)
            .ok_or_else(|| AppError::bad_request("Order amount is too large"))?;
        items.push(CreateOrderItemEntity {
            order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            total_price: item.total_price,
        });
    }

    Ok((items, order_amount))
}

/// Status changes for an order. Marking it delivered stamps `delivered_date` unless one is given.
pub fn status_changeset(request: UpdateOrderStatusReq, now: DateTime<Utc>) -> UpdateOrderStatusEntity {
    let delivered = request
        .order_status
        .as_deref()
        .is_some_and(|status| status.eq_ignore_ascii_case(DELIVERED_STATUS));

    UpdateOrderStatusEntity {
        delivered_date: request
            .delivered_date
            .or_else(|| delivered.then_some(now)),
        order_status: request.order_status,
        payment_status: request.payment_status,
    }
}

async fn attach_items(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
) -> Result<Vec<OrderSnapshot>, AppError> {
    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();

    let rows: Vec<(OrderItemEntity, ProductEntity)> = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq_any(&order_ids))
        .order(order_items::id.asc())
        .select((OrderItemEntity::as_select(), ProductEntity::as_select()))
        .get_results(conn)
        .await?;

    let mut group: HashMap<Uuid, Vec<OrderItemDetails>> = HashMap::new();
    for (item, product) in rows {
        group.entry(item.order_id).or_default().push(OrderItemDetails {
            id: item.id,
            quantity: item.quantity,
            total_price: item.total_price,
            product,
        });
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderSnapshot {
            order_items: group.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

async fn find_order(conn: &mut AsyncPgConnection, order_id: Uuid) -> Result<OrderEntity, AppError> {
    orders::table
        .find(order_id)
        .select(OrderEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Given order id not found"))
}

/// Check out a cart: persist an order built from its lines and empty the cart, atomically.
pub async fn create_order(
    conn: &mut AsyncPgConnection,
    request: CreateOrderReq,
) -> Result<OrderSnapshot, AppError> {
    info!(
        "Creating order for user {} from cart {}",
        request.user_id, request.cart_id
    );

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let user = lock_user(conn, request.user_id).await?;

                let cart: CartEntity = carts::table
                    .find(request.cart_id)
                    .filter(carts::user_id.eq(user.id))
                    .select(CartEntity::as_select())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Cart not found with given id"))?;

                let cart_lines = load_cart_items(conn, cart.id).await?;
                let order_id = Uuid::new_v4();
                let (new_items, order_amount) = snapshot_items(&cart_lines, order_id)?;

                diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart.id)))
                    .execute(conn)
                    .await?;

                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        id: order_id,
                        user_id: user.id,
                        order_status: request
                            .order_status
                            .unwrap_or_else(|| DEFAULT_ORDER_STATUS.into()),
                        payment_status: request
                            .payment_status
                            .unwrap_or_else(|| DEFAULT_PAYMENT_STATUS.into()),
                        order_amount,
                        billing_name: request.billing_name,
                        billing_address: request.billing_address,
                        billing_phone: request.billing_phone,
                        order_date: Utc::now(),
                        delivered_date: None,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                diesel::insert_into(order_items::table)
                    .values(&new_items)
                    .execute(conn)
                    .await?;

                debug!(
                    "Order {} holds {} items totalling {}",
                    order.id,
                    new_items.len(),
                    order.order_amount
                );
                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    let mut snapshots = attach_items(conn, vec![order]).await?;
    snapshots
        .pop()
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("Created order vanished")))
}

/// Delete an order together with its lines.
pub async fn remove_order(conn: &mut AsyncPgConnection, order_id: Uuid) -> Result<(), AppError> {
    info!("Removing order: {}", order_id);

    conn.transaction(move |conn| {
        Box::pin(async move {
            let order = find_order(conn, order_id).await?;

            diesel::delete(order_items::table.filter(order_items::order_id.eq(order.id)))
                .execute(conn)
                .await?;
            diesel::delete(orders::table.find(order.id))
                .execute(conn)
                .await?;

            Ok::<(), AppError>(())
        })
    })
    .await
}

pub async fn get_order(
    conn: &mut AsyncPgConnection,
    order_id: Uuid,
) -> Result<OrderSnapshot, AppError> {
    let order = find_order(conn, order_id).await?;
    let mut snapshots = attach_items(conn, vec![order]).await?;
    snapshots
        .pop()
        .ok_or_else(|| AppError::not_found("Given order id not found"))
}

pub async fn get_orders_of_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<Vec<OrderSnapshot>, AppError> {
    info!("Fetching orders of user: {}", user_id);

    let exists: i64 = users::table
        .find(user_id)
        .count()
        .get_result(conn)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("User not found with given id"));
    }

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::user_id.eq(user_id))
        .select(OrderEntity::as_select())
        .get_results(conn)
        .await?;

    attach_items(conn, orders).await
}

pub async fn get_orders(
    conn: &mut AsyncPgConnection,
    page: &PageRequest,
) -> Result<PageableResponse<OrderSnapshot>, AppError> {
    let query = orders::table
        .select(OrderEntity::as_select())
        .into_boxed();
    let query = sort_boxed!(query, page, {
        "order_date" => orders::order_date,
        "order_amount" => orders::order_amount,
        "order_status" => orders::order_status,
        "payment_status" => orders::payment_status,
        "billing_name" => orders::billing_name,
        "delivered_date" => orders::delivered_date,
    })?;

    let rows: Vec<OrderEntity> = query
        .then_order_by(orders::id.asc())
        .limit(page.page_size)
        .offset(page.offset())
        .get_results(conn)
        .await?;
    let total: i64 = orders::table.count().get_result(conn).await?;

    let snapshots = attach_items(conn, rows).await?;
    Ok(PageableResponse::from_rows(snapshots, total, page, |snapshot| snapshot))
}

/// Update status fields of an existing order.
pub async fn update_order_status(
    conn: &mut AsyncPgConnection,
    order_id: Uuid,
    request: UpdateOrderStatusReq,
) -> Result<OrderSnapshot, AppError> {
    info!("Updating status of order: {}", order_id);

    let changes = status_changeset(request, Utc::now());
    if changes.order_status.is_none()
        && changes.payment_status.is_none()
        && changes.delivered_date.is_none()
    {
        return Err(AppError::bad_request("No status change requested"));
    }

    let order: OrderEntity = diesel::update(orders::table.find(order_id))
        .set(&changes)
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Given order id not found"))?;

    let mut snapshots = attach_items(conn, vec![order]).await?;
    snapshots
        .pop()
        .ok_or_else(|| AppError::not_found("Given order id not found"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use testresult::TestResult;

    use super::*;

    fn cart_item(id: i32, quantity: i32, unit_price: i32) -> CartItemEntity {
        CartItemEntity {
            id,
            cart_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            quantity,
            total_price: quantity * unit_price,
        }
    }

    #[test]
    fn order_amount_is_sum_of_line_totals() -> TestResult {
        let order_id = Uuid::new_v4();
        let lines = vec![cart_item(1, 2, 10), cart_item(2, 1, 5)];

        let (items, amount) = snapshot_items(&lines, order_id)?;

        assert_eq!(amount, 25);
        assert_eq!(
            items.iter().map(|item| item.total_price).collect::<Vec<_>>(),
            vec![20, 5]
        );
        assert!(items.iter().all(|item| item.order_id == order_id));
        Ok(())
    }

    #[test]
    fn line_totals_are_copied_not_recomputed() -> TestResult {
        let mut line = cart_item(1, 3, 10);
        line.total_price = 27;

        let (items, amount) = snapshot_items(&[line.clone()], Uuid::new_v4())?;

        assert_eq!(items[0].total_price, 27);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].product_id, line.product_id);
        assert_eq!(amount, 27);
        Ok(())
    }

    #[test]
    fn empty_cart_cannot_be_ordered() {
        let result = snapshot_items(&[], Uuid::new_v4());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        let lines = vec![cart_item(1, 1, i32::MAX), cart_item(2, 1, 1)];
        assert!(matches!(
            snapshot_items(&lines, Uuid::new_v4()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn delivered_status_stamps_delivery_date() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let changes = status_changeset(
            UpdateOrderStatusReq {
                order_status: Some("DELIVERED".into()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(changes.delivered_date, Some(now));
        assert_eq!(changes.order_status.as_deref(), Some("DELIVERED"));
        assert_eq!(changes.payment_status, None);
    }

    #[test]
    fn explicit_delivery_date_wins() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let changes = status_changeset(
            UpdateOrderStatusReq {
                order_status: Some("DELIVERED".into()),
                delivered_date: Some(earlier),
                ..Default::default()
            },
            now,
        );

        assert_eq!(changes.delivered_date, Some(earlier));
    }

    #[test]
    fn other_statuses_leave_delivery_date_alone() {
        let changes = status_changeset(
            UpdateOrderStatusReq {
                order_status: Some("DISPATCHED".into()),
                payment_status: Some("PAID".into()),
                delivered_date: None,
            },
            Utc::now(),
        );

        assert_eq!(changes.delivered_date, None);
        assert_eq!(changes.payment_status.as_deref(), Some("PAID"));
    }

    #[test]
    fn blank_billing_fields_fail_validation() {
        let request = CreateOrderReq {
            cart_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_status: None,
            payment_status: None,
            billing_name: "  ".into(),
            billing_address: "221B Baker Street".into(),
            billing_phone: "".into(),
        };

        let errors = request.validate().err().map(|e| e.field_errors().len());
        assert_eq!(errors, Some(2));
    }

    #[test]
    fn create_fields_are_bounded_by_their_columns() {
        let request = CreateOrderReq {
            cart_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_status: Some(" ".into()),
            payment_status: Some("P".repeat(33)),
            billing_name: "n".repeat(256),
            billing_address: "221B Baker Street".into(),
            billing_phone: "9".repeat(33),
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("order_status"));
        assert!(fields.contains_key("payment_status"));
        assert!(fields.contains_key("billing_name"));
        assert!(fields.contains_key("billing_phone"));
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn create_fields_at_column_width_pass() {
        let request = CreateOrderReq {
            cart_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_status: Some("S".repeat(32)),
            payment_status: None,
            billing_name: "n".repeat(255),
            billing_address: "221B Baker Street".into(),
            billing_phone: "9".repeat(32),
        };

        assert!(request.validate().is_ok());
    }
}
