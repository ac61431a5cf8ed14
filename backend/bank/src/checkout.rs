//! # Checkout
//!
//! Aggregates the rows of a shared cart three ways:
//! - lines: each item with its total price
//! - by user: what each contributor put in, in order of first contribution
//! - by product: summed quantity and price per product, in order of first appearance
use std::collections::{HashMap, hash_map::Entry};

use crate::models::{CartItem, Money};

pub const UNKNOWN_CONTRIBUTOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLine {
    pub item: CartItem,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserTotal {
    pub user_id: Option<i64>,
    pub username: String,
    pub lines: Vec<CheckoutLine>,
    pub quantity: u64,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotal {
    pub product_id: i64,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u64,
    pub total_price: Money,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutSummary {
    pub lines: Vec<CheckoutLine>,
    pub by_user: Vec<UserTotal>,
    pub by_product: Vec<ProductTotal>,
    pub total_quantity: u64,
    pub total_price: Money,
}

impl CheckoutSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn summarize(items: Vec<CartItem>) -> CheckoutSummary {
    let mut summary = CheckoutSummary::default();
    let mut user_index: HashMap<Option<i64>, usize> = HashMap::new();
    let mut product_index: HashMap<i64, usize> = HashMap::new();

    for item in items {
        let total_price = item.total_price();
        let quantity = u64::from(item.quantity);
        let line = CheckoutLine { item, total_price };

        summary.total_quantity += quantity;
        summary.total_price += total_price;

        let product = &line.item.product;
        match product_index.entry(product.id) {
            Entry::Vacant(entry) => {
                entry.insert(summary.by_product.len());
                summary.by_product.push(ProductTotal {
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity,
                    total_price,
                });
            }
            Entry::Occupied(entry) => {
                let row = &mut summary.by_product[*entry.get()];
                row.quantity += quantity;
                row.total_price += total_price;
            }
        }

        let contributor = line.item.added_by.as_ref();
        let user_key = contributor.map(|c| c.id);
        let group = match user_index.entry(user_key) {
            Entry::Vacant(entry) => {
                entry.insert(summary.by_user.len());
                summary.by_user.push(UserTotal {
                    user_id: user_key,
                    username: contributor
                        .map(|c| c.username.clone())
                        .unwrap_or_else(|| UNKNOWN_CONTRIBUTOR.to_string()),
                    lines: Vec::new(),
                    quantity: 0,
                    total_price: Money::ZERO,
                });
                summary.by_user.last_mut()
            }
            Entry::Occupied(entry) => summary.by_user.get_mut(*entry.get()),
        };

        if let Some(group) = group {
            group.quantity += quantity;
            group.total_price += total_price;
            group.lines.push(line.clone());
        }

        summary.lines.push(line);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contributor, Product};

    fn product(id: i64, name: &str, cents: i64) -> Product {
        Product {
            id,
            name: name.to_string(),
            price: Money::from_cents(cents),
            category: "Test Category".to_string(),
            calories: 0,
            protein: 0.0,
            carbohydrates: 0.0,
            fat: 0.0,
            is_healthy: false,
            health_score: 50,
            image: String::new(),
            supermarket_id: 1,
        }
    }

    fn item(id: i64, product: &Product, quantity: u32, user: Option<(i64, &str)>) -> CartItem {
        CartItem {
            id,
            cart_id: 1,
            product: product.clone(),
            quantity,
            added_by: user.map(|(id, username)| Contributor {
                id,
                username: username.to_string(),
            }),
        }
    }

    #[test]
    fn test_empty_cart() {
        let summary = summarize(Vec::new());
        assert!(summary.is_empty());
        assert_eq!(summary.total_price, Money::ZERO);
        assert_eq!(summary.total_price.to_string(), "0.00");
    }

    #[test]
    fn test_totals_for_multiple_items() {
        let milk = product(1, "Test Product", 1099);
        let bread = product(2, "Second Test Product", 550);
        let summary = summarize(vec![
            item(1, &milk, 2, Some((1, "testuser"))),
            item(2, &bread, 3, Some((1, "testuser"))),
        ]);

        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].total_price.to_string(), "21.98");
        assert_eq!(summary.lines[1].total_price.to_string(), "16.50");
        assert_eq!(summary.total_price.to_string(), "38.48");
        assert_eq!(summary.total_quantity, 5);
    }

    #[test]
    fn test_groups_by_user_in_first_seen_order() {
        let milk = product(1, "Milk", 100);
        let eggs = product(2, "Eggs", 250);
        let summary = summarize(vec![
            item(1, &milk, 1, Some((2, "bob"))),
            item(2, &eggs, 2, Some((1, "alice"))),
            item(3, &eggs, 1, Some((2, "bob"))),
            item(4, &milk, 4, None),
        ]);

        let users: Vec<_> = summary
            .by_user
            .iter()
            .map(|g| (g.username.as_str(), g.quantity, g.total_price.cents()))
            .collect();
        assert_eq!(
            users,
            [("bob", 2, 350), ("alice", 2, 500), ("Unknown", 4, 400)]
        );
        assert_eq!(summary.by_user[0].lines.len(), 2);
        assert_eq!(summary.by_user[2].user_id, None);
    }

    #[test]
    fn test_groups_by_product() {
        let milk = product(1, "Milk", 100);
        let eggs = product(2, "Eggs", 250);
        let summary = summarize(vec![
            item(1, &eggs, 2, Some((1, "alice"))),
            item(2, &milk, 1, Some((2, "bob"))),
            item(3, &eggs, 1, Some((2, "bob"))),
        ]);

        let products: Vec<_> = summary
            .by_product
            .iter()
            .map(|p| (p.name.as_str(), p.quantity, p.total_price.cents()))
            .collect();
        assert_eq!(products, [("Eggs", 3, 750), ("Milk", 1, 100)]);
        assert_eq!(summary.by_product[0].unit_price, Money::from_cents(250));
        assert_eq!(summary.total_price, Money::from_cents(850));
    }

    #[test]
    fn test_grand_total_matches_breakdowns() {
        let milk = product(1, "Milk", 199);
        let eggs = product(2, "Eggs", 349);
        let summary = summarize(vec![
            item(1, &milk, 3, Some((1, "alice"))),
            item(2, &eggs, 2, Some((2, "bob"))),
            item(3, &milk, 1, None),
        ]);

        let by_user: Money = summary.by_user.iter().map(|g| g.total_price).sum();
        let by_product: Money = summary.by_product.iter().map(|p| p.total_price).sum();
        assert_eq!(by_user, summary.total_price);
        assert_eq!(by_product, summary.total_price);
    }
}
