//! # Seed Data Generator
//!
//! Populates the database with test products, sales and debts for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default) for user "dev"
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-db --bin seed -- --count 1000
//!
//! # Specify database path and user
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --user shop-1
//! ```
//!
//! ## Generated Data
//! - Products across a few hardware-store categories, each with a cost,
//!   a margin of 10% to 60% and a stock of 0 to 100
//! - One cash sale per in-stock product in the first ten
//! - Two debts, one of them partially paid
//!
//! Without `--db` the path comes from `tally.toml` / `TALLY_DB_PATH`.

use std::env;
use std::path::PathBuf;
use tally_core::{Cart, DebtTerms, Money, NewDebt, NewProduct, Product, Rate};
use tally_db::{Database, DbConfig, TallyConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Tools",
        &[
            "Hammer",
            "Screwdriver Set",
            "Pliers",
            "Tape Measure",
            "Utility Knife",
            "Hand Saw",
            "Level",
            "Wrench",
        ],
    ),
    (
        "Paint",
        &[
            "White Latex",
            "Primer",
            "Roller Kit",
            "Brush 2in",
            "Masking Tape",
            "Drop Cloth",
        ],
    ),
    (
        "Plumbing",
        &[
            "PVC Pipe",
            "Elbow Joint",
            "Teflon Tape",
            "Faucet",
            "Drain Cleaner",
            "Hose Clamp",
        ],
    ),
    (
        "Electrical",
        &[
            "LED Bulb",
            "Extension Cord",
            "Wall Switch",
            "Outlet",
            "Wire Nuts",
            "Breaker",
        ],
    ),
];

/// Size variants with a cost addon in cents
const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 150), ("L", 400), ("XL", 900)];

/// Margins in basis points
const MARGINS: &[u32] = &[1_000, 2_000, 2_500, 4_000, 6_000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path: Option<PathBuf> = None;
    let mut user_id = String::from("dev");

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
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: from tally.toml)");
                println!("  -u, --user <UID>   Owner of the generated data (default: dev)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let settings = TallyConfig::load_or_default(None);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)),
        )
        .init();

    let mut config = DbConfig::from_settings(&settings);
    if let Some(path) = db_path {
        config.database_path = path;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database_path.display());
    println!("User:     {}", user_id);
    println!("Products: {}", count);
    println!();

    let db = Database::new(config).await?;
    let user = db.user(&user_id)?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = user.products().count().await?;
    if existing > 0 {
        println!("⚠ User already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut created: Vec<Product> = Vec::with_capacity(count);

    'outer: for (category, names) in CATEGORIES {
        for name in names.iter() {
            for (size, addon) in SIZES {
                if created.len() >= count {
                    break 'outer;
                }

                let seed = created.len();
                let new = NewProduct {
                    name: format!("{} {} ({})", name, size, category),
                    cost: Money::from_cents(150 + ((seed * 37) % 2_000) as i64 + addon),
                    margin: Rate::from_bps(MARGINS[seed % MARGINS.len()]),
                    stock: (seed % 101) as i64,
                };

                match user.products().insert(new).await {
                    Ok(product) => created.push(product),
                    Err(e) => warn!(error = %e, "Failed to insert product"),
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", created.len(), elapsed);

    println!();
    println!("Recording sales...");

    let mut sales = 0;
    for product in created.iter().take(10).filter(|p| p.in_stock()) {
        let cart = Cart::new().add(&product.id, 1, product.sale_price());
        match user.sales().record_sale(&cart).await {
            Ok(_) => sales += 1,
            Err(e) => warn!(error = %e, "Seed sale rejected"),
        }
    }
    println!("✓ Recorded {} sales", sales);

    let stocked: Vec<&Product> = created.iter().filter(|p| p.stock >= 2).take(2).collect();
    if let [first, second] = stocked.as_slice() {
        let on_account = NewDebt::new(
            "Walk-in Customer",
            Cart::new().add(&first.id, 1, first.sale_price()),
            DebtTerms::cash_on_account(),
        );
        user.debts().create(&on_account).await?;

        let financed = NewDebt::new(
            "Contractor Co",
            Cart::new().add(&second.id, 2, second.sale_price()),
            DebtTerms::new(Rate::from_bps(1_000), 3),
        );
        let debt = user.debts().create(&financed).await?;
        user.debts()
            .apply_payment(&debt.id, debt.installment_amount)
            .await?;

        println!("✓ Created 2 debts");
    }

    let outstanding = user.debts().outstanding_total().await?;
    info!(%outstanding, "Seed complete");

    println!();
    println!("✓ Seed complete! Outstanding debt: {}", outstanding);

    db.close().await;
    Ok(())
}
