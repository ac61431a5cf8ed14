use std::path::PathBuf;

use clap::Parser;

/// Loads a JSON product catalog into the shared cart database.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Catalog file
    catalog: PathBuf,

    /// SQLite database to write into
    #[arg(long, default_value = "sharedcart.db")]
    database: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let catalog = process::read_catalog(&args.catalog)?;
    let mut conn = bank::open(&args.database)?;

    println!("Loaded Supermarkets: {}", catalog.supermarkets.len());
    let report = process::load_catalog(&mut conn, &catalog)?;

    println!("\nNew Supermarkets: {}", report.supermarkets_added);
    println!("Existing Supermarkets: {}", report.supermarkets_reused);
    println!("New Products: {}", report.products_added);
    println!("Skipped Products: {}", report.products_skipped);

    Ok(())
}
