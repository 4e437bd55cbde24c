//! # pos-service: HTTP Service for Caja POS
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          pos-service                                    │
//! │                                                                         │
//! │  Web client ──► axum Router ──► handlers ──► caja-db ──► SQLite        │
//! │                     │                                                   │
//! │                     ├── POST /mutations      (abrirCaja, cerrarCaja,   │
//! │                     │                         crearPOSVentaConDetalles,│
//! │                     │                         anularPOSVenta,          │
//! │                     │                         emitirComprobante)       │
//! │                     ├── GET  /health                                   │
//! │                     └── REST reads + admin                             │
//! │                                                                         │
//! │  queue::run ── every poll_interval ──► SunatGateway (when wired in)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML + environment configuration
//! - [`error`] - `ApiError` and HTTP status mapping
//! - [`handlers`] - mutation dispatch and REST handlers
//! - [`queue`] - SUNAT submission queue processor

pub mod config;
pub mod error;
pub mod handlers;
pub mod queue;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;
use crate::queue::SunatGateway;
use caja_db::{Database, DbConfig};

pub use error::{ApiError, ApiResult, ErrorCode};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServiceConfig>,
}

/// Initializes tracing/logging.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caja=debug,pos_service=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Builds the HTTP router.
pub fn router(state: AppState) -> Router {
    use handlers::{catalog, invoice, register, sale};

    Router::new()
        .route("/health", get(handlers::health))
        .route("/mutations", post(handlers::mutate))
        // Catalog
        .route("/sites", get(catalog::list_sites).post(catalog::create_site))
        .route("/sites/{id}", get(catalog::get_site))
        .route("/sites/{id}/tax-config", get(invoice::get_tax_config))
        .route("/products", get(catalog::list_products).post(catalog::create_product))
        .route("/products/{id}", get(catalog::get_product))
        .route("/products/{id}/stock", post(catalog::adjust_stock))
        // Registers
        .route("/registers", get(register::list_registers).post(register::create_register))
        .route("/registers/{id}", get(register::get_register))
        .route("/registers/{id}/logs", get(register::register_logs))
        .route("/registers/{id}/expenses", post(register::record_expense))
        // Sales
        .route("/sales", get(sale::list_sales))
        .route("/sales/{id}", get(sale::get_sale))
        .route("/sales/{id}/invoices", get(invoice::invoices_for_sale))
        // Invoices and SUNAT
        .route("/invoices", get(invoice::list_invoices))
        .route("/invoices/{id}", get(invoice::get_invoice))
        .route("/invoices/{id}/submissions", post(invoice::enqueue_submission))
        .route("/tax-configs", put(invoice::upsert_tax_config))
        .route("/submissions", get(invoice::list_submissions))
        .route("/submissions/{id}", get(invoice::get_submission))
        .with_state(state)
}

/// Runs the service until Ctrl+C / SIGTERM.
///
/// The submission queue processor starts only when `queue.enabled` is set
/// and a gateway is given.
pub async fn serve(
    config: ServiceConfig,
    gateway: Option<Arc<dyn SunatGateway>>,
) -> anyhow::Result<()> {
    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;
    info!(path = ?config.database.path, "Database ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = match (config.queue.enabled, gateway) {
        (true, Some(gateway)) => Some(tokio::spawn(queue::run(
            db.clone(),
            gateway,
            config.queue.clone(),
            shutdown_rx,
        ))),
        (true, None) => {
            warn!("Submission queue enabled but no SUNAT gateway is configured");
            None
        }
        (false, _) => None,
    };

    let bind_addr = config.server.bind_address();
    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "POS service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_tx.send(true).ok();
        })
        .await?;

    if let Some(handle) = processor {
        if let Err(e) = handle.await {
            error!(error = %e, "Submission queue processor panicked");
        }
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

/// Fixtures shared by the handler and queue tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::config::ServiceConfig;
    use crate::error::ApiResult;
    use crate::handlers::{dispatch, MutationRequest};
    use crate::AppState;
    use caja_core::catalog::{NewProduct, NewRegister, NewSite};
    use caja_core::invoice::{EmitInvoice, TaxConfigInput};
    use caja_core::register::OpenRegister;
    use caja_core::sale::{NewSale, SaleItemInput};
    use caja_core::{Invoice, ItemType, PaymentMethod, Product, Register, Site, SunatEnvironment};
    use caja_db::{Database, DbConfig};

    /// Fresh in-memory state with one site.
    pub async fn setup() -> (AppState, Site) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let site = db
            .sites()
            .create(&NewSite {
                name: "Sede Miraflores".to_string(),
                address: Some("Av. Larco 345, Miraflores".to_string()),
                phone: None,
                ruc: Some("20100066603".to_string()),
            })
            .await
            .unwrap();
        let state = AppState {
            db,
            config: Arc::new(ServiceConfig::default()),
        };
        (state, site)
    }

    /// Runs a mutation the way `POST /mutations` does.
    pub async fn mutate(state: &AppState, field_name: &str, arguments: Value) -> ApiResult<Value> {
        dispatch(
            &state.db,
            MutationRequest {
                field_name: field_name.to_string(),
                arguments,
            },
        )
        .await
    }

    pub async fn new_register(state: &AppState, site_id: &str) -> Register {
        state
            .db
            .registers()
            .create(&NewRegister {
                site_id: site_id.to_string(),
                assigned_user_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn open_register(state: &AppState, site_id: &str) -> Register {
        let reg = new_register(state, site_id).await;
        state
            .db
            .open_register(&OpenRegister {
                register_id: reg.id,
                user_id: None,
                opening_amount_cents: 0,
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn new_product(state: &AppState, site_id: &str, name: &str, stock: i64, price_cents: i64) -> Product {
        state
            .db
            .products()
            .create(&NewProduct {
                site_id: site_id.to_string(),
                name: name.to_string(),
                product_type: None,
                stock,
                price_cents,
            })
            .await
            .unwrap()
    }

    /// Active SUNAT configuration with complete issuer data.
    pub async fn configure_sunat(state: &AppState, site_id: &str) {
        configure(&state.db, site_id).await;
    }

    async fn configure(db: &Database, site_id: &str) {
        db.tax_configs()
            .upsert(&TaxConfigInput {
                site_id: site_id.to_string(),
                boleta_series: "B001".to_string(),
                factura_series: "F001".to_string(),
                environment: SunatEnvironment::Certification,
                issuer_ruc: Some("20100066603".to_string()),
                issuer_legal_name: Some("Bodega Central S.A.C.".to_string()),
                issuer_address: Some("Jr. de la Unión 500, Lima".to_string()),
                issuer_ubigeo: Some("150101".to_string()),
                certificate_ref: None,
                sunat_endpoint: None,
                sunat_user: None,
                active: true,
            })
            .await
            .unwrap();
    }

    /// An anonymous boleta for a fresh one-line sale.
    pub async fn emitted_boleta(db: &Database, site_id: &str) -> Invoice {
        if db.tax_configs().get(site_id).await.unwrap().is_none() {
            configure(db, site_id).await;
        }
        let reg = db
            .registers()
            .create(&NewRegister {
                site_id: site_id.to_string(),
                assigned_user_id: None,
            })
            .await
            .unwrap();
        db.open_register(&OpenRegister {
            register_id: reg.id.clone(),
            user_id: None,
            opening_amount_cents: 0,
            notes: None,
        })
        .await
        .unwrap();

        let sale = db
            .create_sale(&NewSale {
                register_id: reg.id,
                seller_user_id: "vendedor-1".to_string(),
                payment_method: PaymentMethod::Cash,
                discount_cents: 0,
                notes: None,
                customer_name: None,
                customer_dni: None,
                items: vec![SaleItemInput {
                    item_type: ItemType::Service,
                    product_id: None,
                    description: "Menú ejecutivo".to_string(),
                    quantity: 1,
                    unit_price_cents: 1_500,
                }],
            })
            .await
            .unwrap();

        db.emit_invoice(&EmitInvoice {
            sale_id: sale.sale.id,
            invoice_type: "03".to_string(),
            receiver_document_type: "0".to_string(),
            receiver_document_number: String::new(),
            receiver_name: "Cliente varios".to_string(),
            receiver_address: None,
        })
        .await
        .unwrap()
        .invoice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;

    #[tokio::test]
    async fn test_router_builds() {
        let (state, _site) = setup().await;
        let _app = router(state);
    }
}
