//! # Seed Data Generator
//!
//! Populates an empty database with a small demo depot.
//!
//! ## Usage
//! ```bash
//! cargo run -p depot-db --bin seed
//! cargo run -p depot-db --bin seed -- --db ./data/depot.db --stores 5
//! ```
//!
//! ## Generated Data
//! - The local supplier plus two regular suppliers
//! - One product per entry of `PRODUCTS`, with cost and supply prices
//! - `--stores` stores with rotating credit limits
//! - One approved purchase invoice per supplier, so products have stock
//! - An `admin` user (password `admin`, stored plaintext; change it)

use std::collections::BTreeSet;
use std::env;

use chrono::{Duration, Utc};
use depot_core::{
    ApprovalStatus, Invoice, InvoiceItem, InvoiceStatus, Money, Product, Store, StoreConfig,
    Supplier, User, ADMIN_ROLE,
};
use depot_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (name, purchase cost, supply price) in cents.
const PRODUCTS: &[(&str, i64, i64)] = &[
    ("Rice 1kg", 120, 160),
    ("Black Beans 1kg", 180, 240),
    ("Sugar 1kg", 95, 130),
    ("Vegetable Oil 1L", 310, 395),
    ("Pasta 500g", 70, 99),
    ("Coffee 250g", 420, 560),
    ("Powdered Milk 400g", 510, 650),
    ("Tomato Sauce", 60, 85),
    ("Laundry Soap", 140, 190),
    ("Toilet Paper 4u", 230, 300),
];

const STORES: &[&str] = &[
    "Corner Market",
    "La Esquina",
    "Mini Super Norte",
    "Abarrotes Sur",
    "Tienda Central",
    "Bodega Azul",
];

/// Credit limits in cents; `None` falls back to the default limit.
const LIMITS: &[Option<i64>] = &[None, Some(500_000), Some(1_500_000)];

const COLORS: &[&str] = &["#3366ff", "#ff8800", "#22aa55", "#aa3377"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,depot_db=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut store_count: usize = 3;
    let mut db_path = String::from("./depot_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stores" | "-s" => {
                if i + 1 < args.len() {
                    store_count = args[i + 1].parse().unwrap_or(3).min(STORES.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stores <N>   Number of stores to create (default: 3, max: 6)");
                println!("  -d, --db <PATH>    Database file path (default: ./depot_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Depot Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Stores:   {}", store_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Suppliers
    let suppliers = vec![
        Supplier::local(),
        supplier("Distribuidora Norte"),
        supplier("Abastos del Valle"),
    ];
    for s in &suppliers {
        db.suppliers().put(s).await?;
    }
    println!("✓ {} suppliers", suppliers.len());

    // Products, split between the two regular suppliers
    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (idx, (name, cost, supply)) in PRODUCTS.iter().enumerate() {
        let supplier_id = suppliers[1 + idx % 2].id.clone();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            purchase_cost: Money::from_cents(*cost),
            purchase_tax: Money::zero(),
            purchase_freight: Money::from_cents(cost / 20),
            supply_price: Money::from_cents(*supply),
            retail_price: Money::from_cents(supply + supply / 4),
            stock: 0,
            min_stock: 10,
            max_stock: 200,
            supplier_id: Some(supplier_id),
        };
        db.products().add(&product).await?;
        products.push(product);
    }
    println!("✓ {} products", products.len());

    // One opening invoice per regular supplier
    for (n, s) in suppliers.iter().skip(1).enumerate() {
        let items: Vec<InvoiceItem> = products
            .iter()
            .filter(|p| p.supplier_id.as_deref() == Some(s.id.as_str()))
            .map(|p| {
                InvoiceItem::new(&p.id, 100, p.purchase_cost, p.purchase_tax, p.purchase_freight)
            })
            .collect();
        let total_amount = items.iter().map(InvoiceItem::line_cost).sum();
        let date = Utc::now();

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            supplier_id: s.id.clone(),
            invoice_number: format!("OPEN-{:04}", n + 1),
            date,
            due_date: Some(date + Duration::days(30)),
            items,
            total_amount,
            amount_paid: Money::zero(),
            status: InvoiceStatus::Pending,
            approval_status: ApprovalStatus::Approved,
            notes: Some("Opening stock".to_string()),
            authorized_by: None,
            authorized_at: None,
            rejection_reason: None,
            adjustment_id: None,
        };
        println!("  Invoice {} = {}", invoice.invoice_number, invoice.total_amount);
        db.invoices().add(&invoice).await?;
    }
    println!("✓ {} invoices", suppliers.len() - 1);

    // Stores
    for (idx, name) in STORES.iter().take(store_count).enumerate() {
        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color: Some(COLORS[idx % COLORS.len()].to_string()),
            config: StoreConfig {
                allows_credit: true,
                max_debt_limit: LIMITS[idx % LIMITS.len()].map(Money::from_cents),
                payment_term_days: 15,
            },
            total_debt: Money::zero(),
            active: true,
        };
        db.stores().add(&store).await?;
    }
    println!("✓ {} stores", store_count);

    // Admin
    if db.users().filter(|u| u.username == "admin").await?.is_empty() {
        let admin = User {
            id: Uuid::new_v4().to_string(),
            username: "admin".to_string(),
            name: "Administrator".to_string(),
            roles: BTreeSet::from([ADMIN_ROLE.to_string()]),
            password: Some("admin".to_string()),
        };
        db.users().add(&admin).await?;
        println!("✓ admin user (password: admin)");
    }

    let ledger = db.load_ledger().await?;
    let projections = ledger.project();

    println!();
    println!("✓ Seeded in {:?}", start.elapsed());
    println!();
    println!("Stock on hand:");
    for p in &ledger.products {
        println!("  {:<22} {:>5}", p.name, projections.stock_of(&p.id));
    }

    db.close().await;

    println!();
    println!("🎉 Seed complete!");
    Ok(())
}

fn supplier(name: &str) -> Supplier {
    Supplier {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        tax_id: None,
        total_volume: Money::zero(),
        debt: Money::zero(),
    }
}
