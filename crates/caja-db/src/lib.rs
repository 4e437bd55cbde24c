//! # caja-db: Database Layer for Caja POS
//!
//! SQLite persistence for the POS: connection pool, embedded migrations,
//! repositories, and the transactional register/sale/invoice operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  POST /mutations {"fieldName": "crearPOSVentaConDetalles", ...}        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Operations   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ open/close    │    │  (embedded)  │  │   │
//! │  │   │               │    │ sale / void   │    │              │  │   │
//! │  │   │ SqlitePool    │    │ emit invoice  │    │ 0001_initial │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │                    │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌─────────────────────────────────────────┐                 │   │
//! │  │   │  Repositories (site, product, register, │                 │   │
//! │  │   │  sale, tax_config, invoice, submission) │                 │   │
//! │  │   └─────────────────────────────────────────┘                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite database (WAL)                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`operations`] - The five POS mutations as `Database` methods
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("caja.db")).await?;
//!
//! let register = db.open_register(&open_args).await?;
//! let sale = db.create_sale(&new_sale).await?;
//! let invoice = db.emit_invoice(&emit_args).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod operations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::invoice::{InvoiceFilter, InvoiceRepository};
pub use repository::product::ProductRepository;
pub use repository::register::RegisterRepository;
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::site::SiteRepository;
pub use repository::submission::{
    SubmissionFault, SubmissionPayload, SubmissionRepository,
};
pub use repository::tax_config::TaxConfigRepository;
