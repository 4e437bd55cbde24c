//! # Repository Module
//!
//! Database repository implementations for Caja POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.products().search(&site_id, "arroz", 20)                   │
//! │       ▼                                                                 │
//! │  ProductRepository  (owns a pool clone, reads/writes one table)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  module-level helpers: fetch(exec, id), take_stock(exec, ..)           │
//! │       ▲                                                                 │
//! │       │  same helpers, called with `&mut *tx`                          │
//! │  operations::* (open/close register, sale, void, invoice)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module exposes its SQL twice: as methods on the repository (plain
//! reads and admin writes on the pool) and as `pub(crate)` functions
//! generic over [`sqlx::SqliteExecutor`] so the operations in
//! [`crate::operations`] can run them inside a single transaction.
//!
//! ## Available Repositories
//!
//! - [`site::SiteRepository`] - Sites (sedes)
//! - [`product::ProductRepository`] - Product catalog, search and stock
//! - [`register::RegisterRepository`] - Registers and their log
//! - [`sale::SaleRepository`] - Sale history and detail
//! - [`tax_config::TaxConfigRepository`] - SUNAT configuration per site
//! - [`invoice::InvoiceRepository`] - Electronic invoices
//! - [`submission::SubmissionRepository`] - Outbound SUNAT queue

pub mod invoice;
pub mod product;
pub mod register;
pub mod sale;
pub mod site;
pub mod submission;
pub mod tax_config;

/// Builds a `LIKE` pattern matching `query` anywhere, with `%`, `_` and
/// `\` escaped. Use together with `ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}


#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("arroz"), "%arroz%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern(""), "%%");
    }
}
