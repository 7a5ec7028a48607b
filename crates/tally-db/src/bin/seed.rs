//! # Seed Data Generator
//!
//! Populates a development database with a lot-tracked catalog, a loyalty
//! customer, a promo code and an open shift, so the sale engine can be
//! exercised end to end.
//!
//! ## Usage
//! ```bash
//! # 200 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom amount, path and cashier
//! cargo run -p tally-db --bin seed -- --count 1000 --db ./data/tally.db --cashier till-2
//!
//! # More detail
//! RUST_LOG=tally_db=debug cargo run -p tally-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Products: SKU `{CATEGORY}-{NAME}-{NNN}`, price 1.99 - 9.99 plus a
//!   size addon, tax 0% / 5% / 8.25% / 10%
//! - 1 to 3 batches per product, oldest first; perishable categories get
//!   expiry dates, some of them already past
//! - `stock_quantity` equals the sum of the batches
//! - Customer `cust-demo` with 500 points, promo `WELCOME10` (10% off
//!   orders of 20.00 or more), one open shift for the cashier

use chrono::{Duration, Utc};
use std::env;
use tally_core::{Customer, Product, ProductBatch, Promotion, PromotionKind, ShiftSession, ShiftStatus};
use tally_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Product categories; the flag marks perishables that get expiry dates
const CATEGORIES: &[(&str, bool, &[&str])] = &[
    (
        "BEV",
        false,
        &["Cola", "Lemonade", "Iced Tea", "Orange Juice", "Sparkling Water", "Cold Brew"],
    ),
    (
        "SNK",
        false,
        &["Salted Crisps", "Pretzels", "Trail Mix", "Oat Cookies", "Dark Chocolate"],
    ),
    (
        "DRY",
        true,
        &["Whole Milk", "Greek Yogurt", "Cheddar", "Butter", "Eggs Dozen", "Cream Cheese"],
    ),
    (
        "BAK",
        true,
        &["Sourdough", "Baguette", "Croissant", "Rye Loaf", "Bagels"],
    ),
    (
        "GRO",
        false,
        &["Spaghetti", "White Rice", "Canned Beans", "Peanut Butter", "Honey", "Flour"],
    ),
];

/// Size variants for products
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("Family", 350),
];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tally_dev.db");
    let mut cashier = String::from("cashier-1");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--cashier" => {
                if i + 1 < args.len() {
                    cashier = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>      Database file path (default: ./tally_dev.db)");
                println!("      --cashier <ID>   User to open a shift for (default: cashier-1)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, products = count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut batches = 0;

    'outer: for (category_idx, (category_code, perishable, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size_name, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let lots = generate_batches(seed, *perishable);
                let product = generate_product(category_code, name, size_name, *price_addon, seed, &lots);

                if let Err(e) = db.products().insert(&product).await {
                    warn!(sku = %product.sku, error = %e, "Failed to insert product");
                    continue;
                }
                for mut lot in lots {
                    lot.product_id = product.id.clone();
                    db.products().insert_batch(&lot).await?;
                    batches += 1;
                }

                generated += 1;
                if generated % 50 == 0 {
                    info!(generated, "Products generated");
                }
            }
        }
    }

    let now = Utc::now();
    db.customers()
        .insert(&Customer {
            id: "cust-demo".to_string(),
            name: "Demo Customer".to_string(),
            loyalty_points: 500,
            created_at: now,
        })
        .await?;

    db.promotions()
        .insert(&Promotion {
            code: "WELCOME10".to_string(),
            kind: PromotionKind::Percentage,
            value: 1000,
            min_order_value_cents: 2000,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(90),
            is_active: true,
        })
        .await?;

    db.shifts()
        .insert(&ShiftSession {
            id: Uuid::new_v4().to_string(),
            user_id: cashier.clone(),
            start_time: now,
            end_time: None,
            status: ShiftStatus::Open,
            starting_cash_cents: 20_000,
            ending_cash_cents: None,
            cash_sales_cents: 0,
            expected_cash_cents: 0,
            difference_cents: None,
        })
        .await?;

    info!(
        products = generated,
        batches,
        cashier = %cashier,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Generates one to three lots, oldest first. Perishable lots get expiry
/// dates; every seventh perishable product carries an already-expired
/// oldest lot so the expiry guard can be seen rejecting it.
fn generate_batches(seed: usize, perishable: bool) -> Vec<ProductBatch> {
    let now = Utc::now();
    let today = now.date_naive();
    let lot_count = 1 + seed % 3;

    (0..lot_count)
        .map(|lot| {
            let age_days = ((lot_count - lot) * 7) as i64;
            let quantity = 5 + ((seed + lot * 13) % 40) as i64;
            let expiry_date = if perishable {
                let expired = lot == 0 && seed % 7 == 0;
                Some(if expired {
                    today - Duration::days(1)
                } else {
                    today + Duration::days(14 + (lot * 7) as i64)
                })
            } else {
                None
            };

            ProductBatch {
                id: Uuid::new_v4().to_string(),
                product_id: String::new(),
                batch_number: format!("LOT-{:05}-{}", seed, lot + 1),
                quantity_initial: quantity,
                quantity_remaining: quantity,
                expiry_date,
                created_at: now - Duration::days(age_days),
            }
        })
        .collect()
}

/// Generates a single product whose stock matches its lots.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
    lots: &[ProductBatch],
) -> Product {
    let now = Utc::now();

    let code: String = name.replace(' ', "").chars().take(3).collect::<String>().to_uppercase();
    let sku = format!("{}-{}-{:03}", category, code, seed);

    // base 1.99 - 9.99 + size addon
    let base_price = 199 + ((seed * 17) % 800) as i64;
    let price_cents = base_price + price_addon;

    // cost is 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", name, size),
        price_cents,
        cost_price_cents: price_cents * cost_pct / 100,
        tax_rate_bps: TAX_RATES[seed % TAX_RATES.len()],
        stock_quantity: lots.iter().map(|b| b.quantity_remaining).sum(),
        reorder_level: 5,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
