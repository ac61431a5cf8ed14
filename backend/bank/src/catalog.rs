use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::{
    error::{BankError, Result},
    like_pattern,
    models::{Money, NewProduct, Product, Supermarket},
};

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.price_cents, p.category, p.calories, \
     p.protein, p.carbohydrates, p.fat, p.is_healthy, p.health_score, p.image, p.supermarket_id";

/// A supermarket with the products shown under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub supermarket: Supermarket,
    pub products: Vec<Product>,
}

pub fn create_supermarket(conn: &Connection, name: &str, location: &str) -> Result<Supermarket> {
    conn.execute(
        "INSERT INTO supermarkets (name, location) VALUES (?1, ?2)",
        params![name, location],
    )?;

    Ok(Supermarket {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        location: location.to_string(),
    })
}

pub fn find_supermarket(conn: &Connection, name: &str, location: &str) -> Result<Option<Supermarket>> {
    Ok(conn
        .query_row(
            "SELECT id, name, location FROM supermarkets WHERE name = ?1 AND location = ?2
             ORDER BY id LIMIT 1",
            params![name, location],
            supermarket_from_row,
        )
        .optional()?)
}

pub fn list_supermarkets(conn: &Connection) -> Result<Vec<Supermarket>> {
    let mut stmt = conn.prepare("SELECT id, name, location FROM supermarkets ORDER BY id")?;
    let supermarkets = stmt
        .query_map([], supermarket_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(supermarkets)
}

/// Saves a product. An empty image falls back to one derived from the name.
pub fn create_product(conn: &Connection, product: &NewProduct) -> Result<Product> {
    let image = if product.image.trim().is_empty() {
        Product::image_for(&product.name)
    } else {
        product.image.clone()
    };

    conn.execute(
        "INSERT INTO products (name, price_cents, category, calories, protein, carbohydrates,
             fat, is_healthy, health_score, image, supermarket_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            product.name,
            product.price.cents(),
            product.category,
            product.calories,
            product.protein,
            product.carbohydrates,
            product.fat,
            product.is_healthy,
            product.health_score,
            image,
            product.supermarket_id,
        ],
    )?;

    get_product(conn, conn.last_insert_rowid())
}

pub fn get_product(conn: &Connection, product_id: i64) -> Result<Product> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1"),
        [product_id],
        |row| product_from_row(row, 0),
    )
    .optional()?
    .ok_or(BankError::NotFound("Product"))
}

pub fn product_exists(conn: &Connection, supermarket_id: i64, name: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM products WHERE supermarket_id = ?1 AND name = ?2)",
        params![supermarket_id, name],
        |row| row.get(0),
    )?)
}

/// Every supermarket with its products, optionally narrowed to products whose
/// name contains `search` (case-insensitive).
pub fn list_supermarkets_with_products(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<Listing>> {
    let mut listings: Vec<Listing> = list_supermarkets(conn)?
        .into_iter()
        .map(|supermarket| Listing {
            supermarket,
            products: Vec::new(),
        })
        .collect();

    let index: HashMap<i64, usize> = listings
        .iter()
        .enumerate()
        .map(|(i, listing)| (listing.supermarket.id, i))
        .collect();

    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let products = match search {
        Some(needle) => {
            debug!("Filtering products by {needle:?}");
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p
                 WHERE p.name LIKE ?1 ESCAPE '\\' ORDER BY p.id"
            ))?;
            let rows = stmt
                .query_map([like_pattern(needle)], |row| product_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY p.id"
            ))?;
            let rows = stmt
                .query_map([], |row| product_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };

    for product in products {
        if let Some(&i) = index.get(&product.supermarket_id) {
            listings[i].products.push(product);
        }
    }

    Ok(listings)
}

fn supermarket_from_row(row: &Row<'_>) -> rusqlite::Result<Supermarket> {
    Ok(Supermarket {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
    })
}

/// Reads [`PRODUCT_COLUMNS`] starting at column `offset`.
pub(crate) fn product_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        price: Money::from_cents(row.get(offset + 2)?),
        category: row.get(offset + 3)?,
        calories: row.get(offset + 4)?,
        protein: row.get(offset + 5)?,
        carbohydrates: row.get(offset + 6)?,
        fat: row.get(offset + 7)?,
        is_healthy: row.get(offset + 8)?,
        health_score: row.get(offset + 9)?,
        image: row.get(offset + 10)?,
        supermarket_id: row.get(offset + 11)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::open_in_memory;

    pub(crate) fn product(supermarket_id: i64, name: &str, price: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price: price.parse().unwrap(),
            category: "Test Category".to_string(),
            calories: 100,
            protein: 10.5,
            carbohydrates: 20.5,
            fat: 5.5,
            is_healthy: true,
            health_score: 80,
            image: format!("images/products/{}.jpeg", name.replace(' ', "")),
            supermarket_id,
        }
    }

    #[test]
    fn test_create_product_round_trips_fields() {
        let conn = open_in_memory().unwrap();
        let market = create_supermarket(&conn, "Test Supermarket", "Test Location").unwrap();

        let saved = create_product(&conn, &product(market.id, "Test Product", "10.99")).unwrap();
        assert_eq!(saved.name, "Test Product");
        assert_eq!(saved.price.to_string(), "10.99");
        assert_eq!(saved.health_score, 80);
        assert!(saved.is_healthy);
        assert_eq!(saved.image, "images/products/TestProduct.jpeg");
        assert_eq!(saved.to_string(), "Test Product");
    }

    #[test]
    fn test_image_defaults() {
        let conn = open_in_memory().unwrap();
        let market = create_supermarket(&conn, "Market", "Somewhere").unwrap();

        let defaulted = create_product(
            &conn,
            &NewProduct {
                name: "Oat Milk".to_string(),
                supermarket_id: market.id,
                ..NewProduct::default()
            },
        )
        .unwrap();
        assert_eq!(defaulted.image, "images/products/AlmondMilk.jpeg");

        let derived = create_product(
            &conn,
            &NewProduct {
                name: "Whole Wheat Bread".to_string(),
                image: String::new(),
                supermarket_id: market.id,
                ..NewProduct::default()
            },
        )
        .unwrap();
        assert_eq!(derived.image, "images/products/WholeWheatBread.jpeg");
    }

    #[test]
    fn test_get_missing_product() {
        let conn = open_in_memory().unwrap();
        assert!(matches!(
            get_product(&conn, 42),
            Err(BankError::NotFound("Product"))
        ));
    }

    #[test]
    fn test_listing_groups_by_supermarket() {
        let conn = open_in_memory().unwrap();
        let first = create_supermarket(&conn, "Supermarket 1", "Location 1").unwrap();
        let second = create_supermarket(&conn, "Supermarket 2", "Location 2").unwrap();
        create_product(&conn, &product(first.id, "Product 1", "12.99")).unwrap();
        create_product(&conn, &product(second.id, "Product 2", "8.50")).unwrap();
        create_product(&conn, &product(first.id, "Product 3", "1.00")).unwrap();

        let listings = list_supermarkets_with_products(&conn, None).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].supermarket, first);

        let names: Vec<_> = listings[0].products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Product 1", "Product 3"]);
        assert_eq!(listings[1].products.len(), 1);
    }

    #[test]
    fn test_listing_search_is_case_insensitive() {
        let conn = open_in_memory().unwrap();
        let first = create_supermarket(&conn, "Supermarket 1", "Location 1").unwrap();
        let second = create_supermarket(&conn, "Supermarket 2", "Location 2").unwrap();
        create_product(&conn, &product(first.id, "Product 1", "12.99")).unwrap();
        create_product(&conn, &product(second.id, "Product 2", "8.50")).unwrap();

        let listings = list_supermarkets_with_products(&conn, Some("product 1")).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].products.len(), 1);
        assert!(listings[1].products.is_empty());

        let blank = list_supermarkets_with_products(&conn, Some("   ")).unwrap();
        assert_eq!(blank.iter().map(|l| l.products.len()).sum::<usize>(), 2);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let conn = open_in_memory().unwrap();
        let market = create_supermarket(&conn, "Market", "Somewhere").unwrap();
        create_product(&conn, &product(market.id, "Milk", "1.00")).unwrap();

        let listings = list_supermarkets_with_products(&conn, Some("%")).unwrap();
        assert!(listings[0].products.is_empty());
    }

    #[test]
    fn test_find_supermarket_and_product_exists() {
        let conn = open_in_memory().unwrap();
        let market = create_supermarket(&conn, "Market", "Somewhere").unwrap();
        create_product(&conn, &product(market.id, "Milk", "1.00")).unwrap();

        assert_eq!(
            find_supermarket(&conn, "Market", "Somewhere").unwrap(),
            Some(market.clone())
        );
        assert!(find_supermarket(&conn, "Market", "Elsewhere").unwrap().is_none());
        assert!(product_exists(&conn, market.id, "Milk").unwrap());
        assert!(!product_exists(&conn, market.id, "Eggs").unwrap());
    }

    #[test]
    fn test_deleting_supermarket_cascades() {
        let conn = open_in_memory().unwrap();
        let market = create_supermarket(&conn, "Market", "Somewhere").unwrap();
        let milk = create_product(&conn, &product(market.id, "Milk", "1.00")).unwrap();

        conn.execute("DELETE FROM supermarkets WHERE id = ?1", [market.id])
            .unwrap();
        assert!(get_product(&conn, milk.id).is_err());
    }
}
