//! # POS Operations
//!
//! The five mutations of the POS, each a single SQLite transaction.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.create_sale(&input)                                                │
//! │       │                                                                 │
//! │       ├── input.validate(), input.totals()      (caja-core, no I/O)    │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                     (db.begin_write(): write lock)     │
//! │       ├── read register / products / tickets    (&mut *tx)             │
//! │       ├── business checks                       (caja-core)            │
//! │       ├── INSERT sale, lines; guarded stock UPDATEs                    │
//! │       ▼                                                                 │
//! │  COMMIT ──► Ok(SaleDetail)                                             │
//! │                                                                         │
//! │  Any `?` before COMMIT drops the transaction: SQLite rolls back and    │
//! │  nothing of the sale is left behind.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Taking the write lock at `BEGIN` serializes the mutations: two sales
//! never read the same ticket counter or stock and then race to write.
//! Version-guarded UPDATEs still return `Conflict` if a row changed under
//! a caller that read it outside the transaction.
//!
//! Inside a transaction only the transaction is used. The in-memory test
//! pool has a single connection, so touching the pool there would wait
//! forever.
//!
//! | Mutation                   | Method                           |
//! |----------------------------|----------------------------------|
//! | `abrirCaja`                | [`Database::open_register`]      |
//! | `cerrarCaja`               | [`Database::close_register`]     |
//! | `crearPOSVentaConDetalles` | [`Database::create_sale`]        |
//! | `anularPOSVenta`           | [`Database::void_sale`]          |
//! | `emitirComprobante`        | [`Database::emit_invoice`]       |
//!
//! [`Database::open_register`]: crate::Database::open_register
//! [`Database::close_register`]: crate::Database::close_register
//! [`Database::create_sale`]: crate::Database::create_sale
//! [`Database::void_sale`]: crate::Database::void_sale
//! [`Database::emit_invoice`]: crate::Database::emit_invoice

mod invoice;
mod register;
mod sale;
