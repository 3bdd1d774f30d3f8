//! Cart engine: per-user cart aggregate with one line per product.
//!
//! Every mutation runs in a single transaction that first locks the owning user
//! row, so concurrent mutations (and checkout) for the same user are serialized.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::app_error::AppError,
    models::{
        CartEntity, CartItemEntity, CreateCartEntity, CreateCartItemEntity, ProductEntity,
        UserEntity,
    },
    schema::{cart_items, carts, products, users},
};

/// How a repeated add of the same product combines with the existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityMerge {
    /// The requested quantity overwrites the line's quantity.
    #[default]
    Replace,
    /// The requested quantity is added to the line's quantity.
    Accumulate,
}

impl FromStr for QuantityMerge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(QuantityMerge::Replace),
            "accumulate" => Ok(QuantityMerge::Accumulate),
            other => Err(format!(
                "unknown quantity merge policy '{}', expected 'replace' or 'accumulate'",
                other
            )),
        }
    }
}

/// `quantity` carries no field rule: a non-positive quantity is a 400 raised by [`add_item`], not a 422.
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct AddItemToCartReq {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CartItemDetails {
    pub id: i32,
    pub quantity: i32,
    pub total_price: i32,
    pub product: ProductEntity,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CartSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user: UserEntity,
    pub items: Vec<CartItemDetails>,
}

/// Store write needed to fold one add-item request into a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartLine {
    Update {
        item_id: i32,
        quantity: i32,
        total_price: i32,
    },
    Insert(CreateCartItemEntity),
}

pub fn check_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Requested quantity is not valid"));
    }
    Ok(())
}

/// `quantity × unit_price`, rejecting totals that do not fit the price column.
pub fn line_total(quantity: i32, unit_price: i32) -> Result<i32, AppError> {
    quantity
        .checked_mul(unit_price)
        .ok_or_else(|| AppError::bad_request("Cart line total is too large"))
}

/// Decide how `quantity` units of `product` land in a cart currently holding `items`.
pub fn reconcile_line(
    items: &[CartItemEntity],
    cart_id: Uuid,
    product: &ProductEntity,
    quantity: i32,
    merge: QuantityMerge,
) -> Result<CartLine, AppError> {
    check_quantity(quantity)?;

    match items.iter().find(|item| item.product_id == product.id) {
        Some(existing) => {
            let quantity = match merge {
                QuantityMerge::Replace => quantity,
                QuantityMerge::Accumulate => existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| AppError::bad_request("Requested quantity is not valid"))?,
            };
            Ok(CartLine::Update {
                item_id: existing.id,
                quantity,
                total_price: line_total(quantity, product.discounted_price)?,
            })
        }
        None => Ok(CartLine::Insert(CreateCartItemEntity {
            cart_id,
            product_id: product.id,
            quantity,
            total_price: line_total(quantity, product.discounted_price)?,
        })),
    }
}

/// Resolve a user and hold a row lock on it until the surrounding transaction ends.
pub(crate) async fn lock_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<UserEntity, AppError> {
    users::table
        .find(user_id)
        .select(UserEntity::as_select())
        .for_update()
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("User not found with given id"))
}

async fn find_user(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<UserEntity, AppError> {
    users::table
        .find(user_id)
        .select(UserEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("User not found with given id"))
}

async fn find_cart_of_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<CartEntity, AppError> {
    carts::table
        .filter(carts::user_id.eq(user_id))
        .select(CartEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("Cart of given user not found"))
}

/// Fetch the user's cart, creating it when absent. Relies on the unique `user_id` constraint.
async fn get_or_create_cart(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<CartEntity, AppError> {
    let created = diesel::insert_into(carts::table)
        .values(CreateCartEntity {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        })
        .on_conflict(carts::user_id)
        .do_nothing()
        .execute(conn)
        .await?;

    if created > 0 {
        info!("Created cart for user: {}", user_id);
    }

    find_cart_of_user(conn, user_id).await
}

pub(crate) async fn load_cart_items(
    conn: &mut AsyncPgConnection,
    cart_id: Uuid,
) -> Result<Vec<CartItemEntity>, AppError> {
    let items = cart_items::table
        .filter(cart_items::cart_id.eq(cart_id))
        .order(cart_items::id.asc())
        .select(CartItemEntity::as_select())
        .get_results(conn)
        .await?;
    Ok(items)
}

async fn load_snapshot(
    conn: &mut AsyncPgConnection,
    cart: CartEntity,
    user: UserEntity,
) -> Result<CartSnapshot, AppError> {
    let rows: Vec<(CartItemEntity, ProductEntity)> = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::cart_id.eq(cart.id))
        .order(cart_items::id.asc())
        .select((CartItemEntity::as_select(), ProductEntity::as_select()))
        .get_results(conn)
        .await?;

    let items = rows
        .into_iter()
        .map(|(item, product)| CartItemDetails {
            id: item.id,
            quantity: item.quantity,
            total_price: item.total_price,
            product,
        })
        .collect();

    Ok(CartSnapshot {
        id: cart.id,
        created_at: cart.created_at,
        user,
        items,
    })
}

/// Add `request.quantity` units of a product to the user's cart, creating the cart if needed.
pub async fn add_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    request: AddItemToCartReq,
    merge: QuantityMerge,
) -> Result<CartSnapshot, AppError> {
    info!("Adding item to cart for user: {}", user_id);
    // Rejected before the transaction opens, so nothing is read or written.
    check_quantity(request.quantity)?;

    conn.transaction(move |conn| {
        Box::pin(async move {
            let product: ProductEntity = products::table
                .find(request.product_id)
                .select(ProductEntity::as_select())
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::not_found("Product not found with given id"))?;

            let user = lock_user(conn, user_id).await?;
            let cart = get_or_create_cart(conn, user.id).await?;
            let items = load_cart_items(conn, cart.id).await?;

            match reconcile_line(&items, cart.id, &product, request.quantity, merge)? {
                CartLine::Update {
                    item_id,
                    quantity,
                    total_price,
                } => {
                    diesel::update(cart_items::table.find(item_id))
                        .set((
                            cart_items::quantity.eq(quantity),
                            cart_items::total_price.eq(total_price),
                        ))
                        .execute(conn)
                        .await?;
                }
                CartLine::Insert(item) => {
                    diesel::insert_into(cart_items::table)
                        .values(&item)
                        .execute(conn)
                        .await?;
                }
            }

            let snapshot = load_snapshot(conn, cart, user).await?;
            debug!("Updated cart items: {:?}", snapshot.items);
            Ok::<CartSnapshot, AppError>(snapshot)
        })
    })
    .await
}

/// Delete one line from the user's cart. Lines of other users' carts are reported as missing.
pub async fn remove_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    cart_item_id: i32,
) -> Result<(), AppError> {
    info!("Removing item {} from cart for user: {}", cart_item_id, user_id);

    conn.transaction(move |conn| {
        Box::pin(async move {
            lock_user(conn, user_id).await?;

            let (item, cart): (CartItemEntity, CartEntity) = cart_items::table
                .inner_join(carts::table)
                .filter(cart_items::id.eq(cart_item_id))
                .select((CartItemEntity::as_select(), CartEntity::as_select()))
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::not_found("Cart Item not found"))?;

            if cart.user_id != user_id {
                warn!(
                    "User {} attempted to remove cart item {} owned by another user",
                    user_id, item.id
                );
                return Err(AppError::not_found("Cart Item not found"));
            }

            diesel::delete(cart_items::table.find(item.id))
                .execute(conn)
                .await?;

            Ok::<(), AppError>(())
        })
    })
    .await
}

/// Remove every line from the user's cart. Clearing an empty cart is a no-op.
pub async fn clear_cart(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<(), AppError> {
    info!("Clearing cart for user: {}", user_id);

    conn.transaction(move |conn| {
        Box::pin(async move {
            lock_user(conn, user_id).await?;
            let cart = find_cart_of_user(conn, user_id).await?;

            let removed = diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart.id)))
                .execute(conn)
                .await?;
            debug!("Removed {} items from cart {}", removed, cart.id);

            Ok::<(), AppError>(())
        })
    })
    .await
}

pub async fn get_cart(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<CartSnapshot, AppError> {
    info!("Fetching cart for user: {}", user_id);

    let user = find_user(conn, user_id).await?;
    let cart = find_cart_of_user(conn, user_id).await?;
    load_snapshot(conn, cart, user).await
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn product(discounted_price: i32) -> ProductEntity {
        ProductEntity {
            id: Uuid::new_v4(),
            title: "Headphones".into(),
            description: "Over-ear".into(),
            price: discounted_price + 100,
            discounted_price,
            quantity: 10,
            added_date: Utc::now(),
            live: true,
            stock: true,
            image_name: None,
            category_id: None,
        }
    }

    fn item(id: i32, cart_id: Uuid, product: &ProductEntity, quantity: i32) -> CartItemEntity {
        CartItemEntity {
            id,
            cart_id,
            product_id: product.id,
            quantity,
            total_price: quantity * product.discounted_price,
        }
    }

    #[test]
    fn first_add_inserts_a_line() -> TestResult {
        let cart_id = Uuid::new_v4();
        let product = product(250);

        let line = reconcile_line(&[], cart_id, &product, 3, QuantityMerge::Replace)?;

        assert_eq!(
            line,
            CartLine::Insert(CreateCartItemEntity {
                cart_id,
                product_id: product.id,
                quantity: 3,
                total_price: 750,
            })
        );
        Ok(())
    }

    #[test]
    fn repeated_add_replaces_quantity() -> TestResult {
        let cart_id = Uuid::new_v4();
        let product = product(10);
        let items = vec![item(7, cart_id, &product, 2)];

        let line = reconcile_line(&items, cart_id, &product, 5, QuantityMerge::Replace)?;

        assert_eq!(
            line,
            CartLine::Update {
                item_id: 7,
                quantity: 5,
                total_price: 50,
            }
        );
        Ok(())
    }

    #[test]
    fn repeated_add_accumulates_when_configured() -> TestResult {
        let cart_id = Uuid::new_v4();
        let product = product(10);
        let items = vec![item(7, cart_id, &product, 2)];

        let line = reconcile_line(&items, cart_id, &product, 5, QuantityMerge::Accumulate)?;

        assert_eq!(
            line,
            CartLine::Update {
                item_id: 7,
                quantity: 7,
                total_price: 70,
            }
        );
        Ok(())
    }

    #[test]
    fn total_uses_current_discounted_price() -> TestResult {
        let cart_id = Uuid::new_v4();
        let mut product = product(10);
        let items = vec![item(1, cart_id, &product, 2)];
        product.discounted_price = 8;

        let line = reconcile_line(&items, cart_id, &product, 2, QuantityMerge::Replace)?;

        assert_eq!(
            line,
            CartLine::Update {
                item_id: 1,
                quantity: 2,
                total_price: 16,
            }
        );
        Ok(())
    }

    #[test]
    fn other_products_do_not_match() -> TestResult {
        let cart_id = Uuid::new_v4();
        let existing = product(10);
        let added = product(20);
        let items = vec![item(1, cart_id, &existing, 1)];

        let line = reconcile_line(&items, cart_id, &added, 1, QuantityMerge::Replace)?;

        assert!(matches!(line, CartLine::Insert(ref new) if new.product_id == added.id));
        Ok(())
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let product = product(10);
        for quantity in [0, -1, i32::MIN] {
            let result = reconcile_line(&[], Uuid::new_v4(), &product, quantity, QuantityMerge::Replace);
            assert!(matches!(result, Err(AppError::BadRequest(_))), "quantity {quantity}");
        }
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let product = product(i32::MAX / 2);
        let result = reconcile_line(&[], Uuid::new_v4(), &product, 3, QuantityMerge::Replace);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn merge_policy_parses_case_insensitively() {
        assert_eq!("Replace".parse::<QuantityMerge>(), Ok(QuantityMerge::Replace));
        assert_eq!("ACCUMULATE".parse::<QuantityMerge>(), Ok(QuantityMerge::Accumulate));
        assert!("increment".parse::<QuantityMerge>().is_err());
    }
}
