use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};

use crate::{
    catalog::{PRODUCT_COLUMNS, product_from_row},
    error::{BankError, Result},
    models::{Cart, CartItem, Contributor},
};

/// Largest quantity a single cart item can hold.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

pub fn create_cart(conn: &Connection, name: &str) -> Result<Cart> {
    conn.execute("INSERT INTO carts (name) VALUES (?1)", [name])?;

    Ok(Cart {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub fn add_member(conn: &Connection, cart_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cart_users (cart_id, user_id) VALUES (?1, ?2)",
        params![cart_id, user_id],
    )?;

    Ok(())
}

pub fn members(conn: &Connection, cart_id: i64) -> Result<Vec<Contributor>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username FROM cart_users cu JOIN users u ON u.id = cu.user_id
         WHERE cu.cart_id = ?1 ORDER BY u.id",
    )?;
    let members = stmt
        .query_map([cart_id], |row| {
            Ok(Contributor {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(members)
}

/// The lowest-id cart the user belongs to.
pub fn cart_for_user(conn: &Connection, user_id: i64) -> Result<Option<Cart>> {
    Ok(conn
        .query_row(
            "SELECT c.id, c.name FROM carts c JOIN cart_users cu ON cu.cart_id = c.id
             WHERE cu.user_id = ?1 ORDER BY c.id LIMIT 1",
            [user_id],
            cart_from_row,
        )
        .optional()?)
}

/// The user's cart. Users without one join the cart named `default_name`,
/// which is created on first use.
pub fn shared_cart_for(conn: &mut Connection, user_id: i64, default_name: &str) -> Result<Cart> {
    if let Some(cart) = cart_for_user(conn, user_id)? {
        return Ok(cart);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = tx
        .query_row(
            "SELECT id, name FROM carts WHERE name = ?1",
            [default_name],
            cart_from_row,
        )
        .optional()?;

    let cart = match existing {
        Some(cart) => cart,
        None => {
            info!("Creating shared cart {default_name:?}");
            create_cart(&tx, default_name)?
        }
    };
    add_member(&tx, cart.id, user_id)?;
    tx.commit()?;

    debug!("User {user_id} joined cart {}", cart.id);

    Ok(cart)
}

/// Adds `quantity` of a product. Rows are merged per (cart, product, added_by).
pub fn add_item(
    conn: &mut Connection,
    cart_id: i64,
    product_id: i64,
    added_by: Option<i64>,
    quantity: u32,
) -> Result<CartItem> {
    if quantity == 0 {
        return Err(BankError::InvalidQuantity { min: 1 });
    }
    if quantity > MAX_QUANTITY {
        return Err(BankError::QuantityTooLarge { max: MAX_QUANTITY });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<(i64, u32)> = tx
        .query_row(
            "SELECT id, quantity FROM cart_items
             WHERE cart_id = ?1 AND product_id = ?2 AND added_by IS ?3
             ORDER BY id LIMIT 1",
            params![cart_id, product_id, added_by],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let item_id = match existing {
        Some((item_id, current)) => {
            let merged = current
                .checked_add(quantity)
                .filter(|merged| *merged <= MAX_QUANTITY)
                .ok_or(BankError::QuantityTooLarge { max: MAX_QUANTITY })?;

            tx.execute(
                "UPDATE cart_items SET quantity = ?2 WHERE id = ?1",
                params![item_id, merged],
            )?;
            item_id
        }
        None => {
            tx.execute(
                "INSERT INTO cart_items (cart_id, product_id, quantity, added_by)
                 VALUES (?1, ?2, ?3, ?4)",
                params![cart_id, product_id, quantity, added_by],
            )?;
            tx.last_insert_rowid()
        }
    };
    tx.commit()?;

    get_item(conn, item_id)
}

pub fn get_item(conn: &Connection, item_id: i64) -> Result<CartItem> {
    conn.query_row(
        &format!("{} WHERE ci.id = ?1", item_select()),
        [item_id],
        item_from_row,
    )
    .optional()?
    .ok_or(BankError::NotFound("Cart item"))
}

/// Sets the quantity of an item in `cart_id`. Zero deletes the row and
/// returns `None`.
pub fn update_quantity(
    conn: &Connection,
    cart_id: i64,
    item_id: i64,
    quantity: u32,
) -> Result<Option<CartItem>> {
    ensure_in_cart(conn, cart_id, item_id)?;

    if quantity > MAX_QUANTITY {
        return Err(BankError::QuantityTooLarge { max: MAX_QUANTITY });
    }
    if quantity == 0 {
        conn.execute("DELETE FROM cart_items WHERE id = ?1", [item_id])?;
        return Ok(None);
    }

    conn.execute(
        "UPDATE cart_items SET quantity = ?2 WHERE id = ?1",
        params![item_id, quantity],
    )?;

    get_item(conn, item_id).map(Some)
}

pub fn remove_item(conn: &Connection, cart_id: i64, item_id: i64) -> Result<CartItem> {
    let item = ensure_in_cart(conn, cart_id, item_id)?;
    conn.execute("DELETE FROM cart_items WHERE id = ?1", [item_id])?;

    Ok(item)
}

pub fn items(conn: &Connection, cart_id: i64) -> Result<Vec<CartItem>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE ci.cart_id = ?1 ORDER BY ci.id",
        item_select()
    ))?;
    let items = stmt
        .query_map([cart_id], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(items)
}

pub fn clear_items(conn: &Connection, cart_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM cart_items WHERE cart_id = ?1", [cart_id])?)
}

fn ensure_in_cart(conn: &Connection, cart_id: i64, item_id: i64) -> Result<CartItem> {
    let item = get_item(conn, item_id)?;

    if item.cart_id != cart_id {
        return Err(BankError::NotPermitted);
    }

    Ok(item)
}

fn item_select() -> String {
    format!(
        "SELECT ci.id, ci.cart_id, ci.quantity, ci.added_by, u.username, {PRODUCT_COLUMNS}
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         LEFT JOIN users u ON u.id = ci.added_by"
    )
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CartItem> {
    let added_by: Option<i64> = row.get(3)?;
    let username: Option<String> = row.get(4)?;

    Ok(CartItem {
        id: row.get(0)?,
        cart_id: row.get(1)?,
        quantity: row.get(2)?,
        added_by: added_by.map(|id| Contributor {
            id,
            username: username.unwrap_or_default(),
        }),
        product: product_from_row(row, 5)?,
    })
}

fn cart_from_row(row: &Row<'_>) -> rusqlite::Result<Cart> {
    Ok(Cart {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{create_product, create_supermarket, tests::product},
        models::Product,
        open_in_memory,
        users::{NewUser, create_user},
    };

    struct Fixture {
        conn: Connection,
        user: i64,
        milk: Product,
        bread: Product,
    }

    fn fixture() -> Fixture {
        let mut conn = open_in_memory().unwrap();
        let user = create_user(
            &mut conn,
            &NewUser {
                username: "testuser",
                email: "test@example.com",
                password: "testpass",
                address: "Test University",
            },
        )
        .unwrap()
        .id;
        let market = create_supermarket(&conn, "Test Supermarket", "Test Location").unwrap();
        let milk = create_product(&conn, &product(market.id, "Test Product", "10.99")).unwrap();
        let bread = create_product(&conn, &product(market.id, "Second Test Product", "5.50"))
            .unwrap();

        Fixture {
            conn,
            user,
            milk,
            bread,
        }
    }

    fn other_user(conn: &mut Connection) -> i64 {
        create_user(
            conn,
            &NewUser {
                username: "otheruser",
                email: "other@example.com",
                password: "otherpass",
                address: "Other University",
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_shared_cart_is_created_once() {
        let mut f = fixture();
        let first = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();
        assert_eq!(first.name, "Shared Cart");

        let other = other_user(&mut f.conn);
        let second = shared_cart_for(&mut f.conn, other, "Shared Cart").unwrap();
        assert_eq!(first, second);

        let usernames: Vec<_> = members(&f.conn, first.id)
            .unwrap()
            .into_iter()
            .map(|m| m.username)
            .collect();
        assert_eq!(usernames, ["testuser", "otheruser"]);
    }

    #[test]
    fn test_existing_membership_wins() {
        let mut f = fixture();
        let cart = create_cart(&f.conn, "Update Cart").unwrap();
        add_member(&f.conn, cart.id, f.user).unwrap();
        add_member(&f.conn, cart.id, f.user).unwrap();

        assert_eq!(shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap(), cart);
        assert_eq!(members(&f.conn, cart.id).unwrap().len(), 1);
    }

    #[test]
    fn test_add_item_merges_same_product_and_user() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();

        let first = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 2).unwrap();
        let merged = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();
        assert_eq!(first.id, merged.id);
        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.to_string(), "3 x Test Product");

        let other = other_user(&mut f.conn);
        let separate = add_item(&mut f.conn, cart.id, f.milk.id, Some(other), 1).unwrap();
        assert_ne!(separate.id, first.id);
        assert_eq!(separate.added_by.unwrap().username, "otheruser");

        let anonymous = add_item(&mut f.conn, cart.id, f.milk.id, None, 1).unwrap();
        let again = add_item(&mut f.conn, cart.id, f.milk.id, None, 1).unwrap();
        assert_eq!(anonymous.id, again.id);
        assert!(again.added_by.is_none());

        assert_eq!(items(&f.conn, cart.id).unwrap().len(), 3);
    }

    #[test]
    fn test_add_item_rejects_zero() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();

        assert!(matches!(
            add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 0),
            Err(BankError::InvalidQuantity { min: 1 })
        ));
    }

    #[test]
    fn test_add_item_refuses_to_grow_past_max() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();

        assert!(matches!(
            add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), MAX_QUANTITY + 1),
            Err(BankError::QuantityTooLarge { max: MAX_QUANTITY })
        ));

        let item = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), MAX_QUANTITY - 1)
            .unwrap();
        let full = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();
        assert_eq!(full.quantity, MAX_QUANTITY);

        assert!(matches!(
            add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1),
            Err(BankError::QuantityTooLarge { .. })
        ));
        assert!(matches!(
            add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), u32::MAX / 2 + 1),
            Err(BankError::QuantityTooLarge { .. })
        ));

        assert_eq!(get_item(&f.conn, item.id).unwrap().quantity, MAX_QUANTITY);
        let rows = items(&f.conn, cart.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, MAX_QUANTITY);
    }

    #[test]
    fn test_max_quantity_is_enforced_by_schema() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();
        let item = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();

        assert!(
            f.conn
                .execute(
                    "UPDATE cart_items SET quantity = ?2 WHERE id = ?1",
                    params![item.id, i64::from(MAX_QUANTITY) + 1],
                )
                .is_err()
        );
        assert_eq!(get_item(&f.conn, item.id).unwrap().quantity, 1);
    }

    #[test]
    fn test_total_price() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();

        let milk = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 2).unwrap();
        let bread = add_item(&mut f.conn, cart.id, f.bread.id, Some(f.user), 3).unwrap();
        assert_eq!(milk.total_price().to_string(), "21.98");
        assert_eq!(bread.total_price().to_string(), "16.50");
    }

    #[test]
    fn test_update_quantity() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();
        let item = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();

        let updated = update_quantity(&f.conn, cart.id, item.id, 4).unwrap().unwrap();
        assert_eq!(updated.quantity, 4);

        assert!(matches!(
            update_quantity(&f.conn, cart.id, item.id, MAX_QUANTITY + 1),
            Err(BankError::QuantityTooLarge { .. })
        ));
        assert_eq!(get_item(&f.conn, item.id).unwrap().quantity, 4);

        assert!(update_quantity(&f.conn, cart.id, item.id, 0).unwrap().is_none());
        assert!(matches!(
            get_item(&f.conn, item.id),
            Err(BankError::NotFound(_))
        ));
    }

    #[test]
    fn test_other_carts_are_off_limits() {
        let mut f = fixture();
        let mine = create_cart(&f.conn, "Update Cart").unwrap();
        add_member(&f.conn, mine.id, f.user).unwrap();

        let other = other_user(&mut f.conn);
        let theirs = create_cart(&f.conn, "Other Cart").unwrap();
        add_member(&f.conn, theirs.id, other).unwrap();
        let item = add_item(&mut f.conn, theirs.id, f.milk.id, Some(other), 2).unwrap();

        assert!(matches!(
            update_quantity(&f.conn, mine.id, item.id, 5),
            Err(BankError::NotPermitted)
        ));
        assert!(matches!(
            remove_item(&f.conn, mine.id, item.id),
            Err(BankError::NotPermitted)
        ));
        assert_eq!(get_item(&f.conn, item.id).unwrap().quantity, 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();
        let milk = add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();
        add_item(&mut f.conn, cart.id, f.bread.id, Some(f.user), 1).unwrap();

        let removed = remove_item(&f.conn, cart.id, milk.id).unwrap();
        assert_eq!(removed.product.name, "Test Product");
        assert_eq!(items(&f.conn, cart.id).unwrap().len(), 1);

        assert_eq!(clear_items(&f.conn, cart.id).unwrap(), 1);
        assert!(items(&f.conn, cart.id).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_user_cascades_to_items() {
        let mut f = fixture();
        let cart = shared_cart_for(&mut f.conn, f.user, "Shared Cart").unwrap();
        add_item(&mut f.conn, cart.id, f.milk.id, Some(f.user), 1).unwrap();

        f.conn
            .execute("DELETE FROM users WHERE id = ?1", [f.user])
            .unwrap();
        assert!(items(&f.conn, cart.id).unwrap().is_empty());
        assert!(members(&f.conn, cart.id).unwrap().is_empty());
    }
}
