//! # Catalog Loading
//!
//! Reads a JSON catalog and writes it into the store.
//!
//! ```json
//! { "supermarkets": [
//!     { "name": "Walmart", "location": "West Lafayette",
//!       "products": [ { "name": "Almond Milk", "price": "3.49", "calories": 30 } ] } ] }
//! ```
//!
//! ## Rules
//! - Names are sanitized (trimmed, whitespace collapsed) before anything else.
//! - Entries whose name is empty after sanitizing are skipped.
//! - A supermarket with the same name and location is reused, not duplicated.
//! - A product whose name already exists in that supermarket is skipped.
//! - The whole catalog goes in one transaction. A bad price aborts the load.
use std::{fs, path::Path};

use anyhow::Context;
use bank::{
    catalog,
    models::{DEFAULT_HEALTH_SCORE, NewProduct},
    rusqlite::Connection,
};
use indicatif::{ProgressBar, ProgressStyle};

pub mod models;
pub mod utils;

use models::Catalog;
use utils::sanitize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub supermarkets_added: usize,
    pub supermarkets_reused: usize,
    pub products_added: usize,
    pub products_skipped: usize,
}

pub fn read_catalog(path: &Path) -> anyhow::Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("parsing catalog {}", path.display()))
}

pub fn load_catalog(conn: &mut Connection, source: &Catalog) -> anyhow::Result<LoadReport> {
    let total: usize = source.supermarkets.iter().map(|s| s.products.len()).sum();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let tx = conn.transaction()?;
    let mut report = LoadReport::default();

    for entry in &source.supermarkets {
        let name = sanitize(&entry.name);
        if name.is_empty() {
            pb.inc(entry.products.len() as u64);
            continue;
        }
        let location = sanitize(&entry.location);

        let supermarket = match catalog::find_supermarket(&tx, &name, &location)? {
            Some(existing) => {
                report.supermarkets_reused += 1;
                existing
            }
            None => {
                report.supermarkets_added += 1;
                catalog::create_supermarket(&tx, &name, &location)?
            }
        };
        pb.set_message(supermarket.name.clone());

        for product in &entry.products {
            pb.inc(1);

            let product_name = sanitize(&product.name);
            if product_name.is_empty()
                || catalog::product_exists(&tx, supermarket.id, &product_name)?
            {
                report.products_skipped += 1;
                continue;
            }

            let price = product
                .price
                .to_money()
                .with_context(|| format!("price of {product_name} at {}", supermarket.name))?;

            catalog::create_product(
                &tx,
                &NewProduct {
                    name: product_name,
                    price,
                    category: sanitize(&product.category),
                    calories: product.calories,
                    protein: product.protein,
                    carbohydrates: product.carbohydrates,
                    fat: product.fat,
                    is_healthy: product.is_healthy,
                    health_score: product.health_score.unwrap_or(DEFAULT_HEALTH_SCORE),
                    image: product.image.clone().unwrap_or_default(),
                    supermarket_id: supermarket.id,
                },
            )?;
            report.products_added += 1;
        }
    }

    tx.commit()?;
    pb.finish_with_message("Done");

    Ok(report)
}
