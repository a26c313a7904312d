//! # Seed Data Generator
//!
//! Populates the database with a small catalog and a handful of promo rules
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./promo_dev.db
//! cargo run -p promo-db --bin seed
//!
//! # Specify database path
//! cargo run -p promo-db --bin seed -- --db ./data/promo.db
//! ```
//!
//! ## Generated Data
//! - Products `1001..` across a few furniture and stationery lines
//! - Quantity tiers on every stationery product (2+ → 5%, 5+ → 10%, 10+ → 15%)
//! - Two bundles: a desk set anchored on the desk, and an all-in-combo
//!   lamp pair where either lamp anchors the bundle

use std::env;

use promo_core::{ApplyScope, BundleRateTier, DiscountRate, GroupSpec, Money, ProductId, TierRule};
use promo_db::{Database, DbConfig};

/// (id, title, price in minor units)
const FURNITURE: &[(ProductId, &str, i64)] = &[
    (1001, "Oak Desk", 24_900),
    (1002, "Office Chair", 12_900),
    (1003, "Desk Mat", 1_900),
    (1004, "Monitor Arm", 7_900),
    (1005, "Floor Lamp", 5_900),
    (1006, "Desk Lamp", 3_400),
];

const STATIONERY: &[(ProductId, &str, i64)] = &[
    (2001, "Ballpoint Pen", 150),
    (2002, "Gel Pen", 220),
    (2003, "A5 Notebook", 640),
    (2004, "Sticky Notes", 310),
    (2005, "Highlighter", 180),
];

/// Quantity tiers in basis points.
const STATIONERY_TIERS: &[(u32, u32)] = &[(2, 500), (5, 1_000), (10, 1_500)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./promo_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Promo Engine Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./promo_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Promo Engine Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let catalog = db.catalog();
    for (id, title, price) in FURNITURE.iter().chain(STATIONERY) {
        catalog.upsert(*id, title, Money::from_minor(*price)).await?;
    }
    println!("✓ Inserted {} products", FURNITURE.len() + STATIONERY.len());

    let tiers: Vec<TierRule> = STATIONERY_TIERS
        .iter()
        .map(|(min_qty, bps)| TierRule {
            min_qty: *min_qty,
            rate: DiscountRate::from_bps(*bps),
        })
        .collect();
    for (id, _, _) in STATIONERY {
        db.rules()
            .upsert_tier_config(*id, true, tiers.clone(), &catalog)
            .await?;
    }
    println!("✓ Quantity tiers on {} products", STATIONERY.len());

    let desk_set = GroupSpec {
        name: "Desk set".to_string(),
        enabled: true,
        priority: 10,
        apply_scope: ApplyScope::MainOnly,
        main_ids: vec![1001],
        product_ids: vec![1001, 1002, 1003, 1004],
        rate_tiers: vec![
            BundleRateTier { min_items: 2, rate: DiscountRate::from_bps(500) },
            BundleRateTier { min_items: 4, rate: DiscountRate::from_bps(1_200) },
        ],
    };
    let group = db.rules().upsert_group(1001, desk_set, &catalog).await?;
    println!("✓ Bundle '{}' -> {}", group.name, group.group_key);

    let lamp_pair = GroupSpec {
        name: "Lamp pair".to_string(),
        enabled: true,
        priority: 0,
        apply_scope: ApplyScope::AllInCombo,
        main_ids: vec![1005],
        product_ids: vec![1005, 1006],
        rate_tiers: vec![BundleRateTier { min_items: 2, rate: DiscountRate::from_bps(1_000) }],
    };
    let group = db.rules().upsert_group(1005, lamp_pair, &catalog).await?;
    println!("✓ Bundle '{}' -> {} targets", group.name, group.targets.len());

    let summary = db.rules().summary().await?;
    println!();
    println!(
        "Rules: {} scanned, {} enabled, {} quantity, {} bundle",
        summary.scanned, summary.enabled, summary.quantity, summary.bundle
    );
    println!("✓ Seed complete!");

    Ok(())
}
