//! # Demo Data Seeder
//!
//! Creates a ready-to-sell demo site: catalog, registers and an active
//! SUNAT configuration in certification mode.
//!
//! ## Usage
//! ```bash
//! # Seed ./caja_dev.db
//! cargo run -p caja-db --bin seed
//!
//! # Specify database path
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db
//! ```

use std::env;

use caja_core::catalog::{NewProduct, NewRegister, NewSite};
use caja_core::invoice::TaxConfigInput;
use caja_core::{Money, ProductType, SunatEnvironment};
use caja_db::{Database, DbConfig};

/// (name, type, stock, price in céntimos)
const PRODUCTS: &[(&str, ProductType, i64, i64)] = &[
    ("Arroz Costeño 1kg", ProductType::Abarrote, 120, 450),
    ("Azúcar rubia 1kg", ProductType::Abarrote, 80, 380),
    ("Aceite Primor 1L", ProductType::Abarrote, 60, 1_090),
    ("Leche Gloria 400g", ProductType::Abarrote, 200, 420),
    ("Fideos Don Vittorio 500g", ProductType::Abarrote, 90, 350),
    ("Atún Florida 170g", ProductType::Abarrote, 75, 690),
    ("Inca Kola 500ml", ProductType::Abarrote, 150, 250),
    ("Coca-Cola 500ml", ProductType::Abarrote, 150, 250),
    ("Agua San Luis 625ml", ProductType::Abarrote, 180, 150),
    ("Pan francés", ProductType::Insumo, 300, 20),
    ("Huevos (unidad)", ProductType::Insumo, 240, 60),
    ("Papa amarilla 1kg", ProductType::Insumo, 50, 420),
    ("Cebolla roja 1kg", ProductType::Insumo, 40, 300),
    ("Pollo entero 1kg", ProductType::Insumo, 30, 1_150),
];

const REGISTERS: usize = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./caja_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Caja POS Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./caja_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Caja POS Demo Seeder");
    println!("=======================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.sites().list().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} site(s)", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let site = db
        .sites()
        .create(&NewSite {
            name: "Sede Central".to_string(),
            address: Some("Jr. de la Unión 500, Cercado de Lima".to_string()),
            phone: Some("01 426 0000".to_string()),
            ruc: Some("20100066603".to_string()),
        })
        .await?;
    println!("✓ Site: {} ({})", site.name, site.id);

    let mut inventory_value = Money::zero();
    for (name, product_type, stock, price_cents) in PRODUCTS {
        let product = db
            .products()
            .create(&NewProduct {
                site_id: site.id.clone(),
                name: name.to_string(),
                product_type: Some(*product_type),
                stock: *stock,
                price_cents: *price_cents,
            })
            .await?;
        inventory_value += product.price().multiply_quantity(product.stock);
    }
    println!("✓ {} products, stock valued at {}", PRODUCTS.len(), inventory_value);

    for n in 1..=REGISTERS {
        let register = db
            .registers()
            .create(&NewRegister {
                site_id: site.id.clone(),
                assigned_user_id: None,
            })
            .await?;
        println!("✓ Register {}: {}", n, register.id);
    }

    let config = db
        .tax_configs()
        .upsert(&TaxConfigInput {
            site_id: site.id.clone(),
            boleta_series: "B001".to_string(),
            factura_series: "F001".to_string(),
            environment: SunatEnvironment::Certification,
            issuer_ruc: Some("20100066603".to_string()),
            issuer_legal_name: Some("Bodega Central S.A.C.".to_string()),
            issuer_address: Some("Jr. de la Unión 500, Cercado de Lima".to_string()),
            issuer_ubigeo: Some("150101".to_string()),
            certificate_ref: None,
            sunat_endpoint: None,
            sunat_user: None,
            active: true,
        })
        .await?;
    println!(
        "✓ SUNAT config: {} / {} ({})",
        config.boleta_series, config.factura_series, config.environment
    );

    println!();
    println!("✓ Seed complete! Open a register with abrirCaja to start selling.");

    db.close().await;
    Ok(())
}
