//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Stock is only ever moved by DELTA, never overwritten:             │
//! │                                                                     │
//! │    UPDATE products SET stock = stock - 3                           │
//! │    WHERE id = ? AND stock >= 3        ← guard, checked atomically  │
//! │                                                                     │
//! │  Two registers selling the last unit at once: one UPDATE matches,  │
//! │  the other affects 0 rows and its sale is rolled back.             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::like_pattern;
use crate::error::{DbError, DbResult};
use caja_core::catalog::{NewProduct, StockAdjustment};
use caja_core::validation::validate_search_query;
use caja_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, site_id, name, product_type, stock, price_cents, version, created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product for an existing site.
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate()?;

        if super::site::fetch(&self.pool, &input.site_id).await?.is_none() {
            return Err(DbError::not_found("Site", &input.site_id));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            site_id: input.site_id.clone(),
            name: input.name.trim().to_string(),
            product_type: input.product_type,
            stock: input.stock,
            price_cents: input.price_cents,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, site_id, name, product_type, stock, price_cents,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.site_id)
        .bind(&product.name)
        .bind(product.product_type)
        .bind(product.stock)
        .bind(product.price_cents)
        .bind(product.version)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(product_id = %product.id, name = %product.name, stock = product.stock, "Product created");
        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch(&self.pool, id).await
    }

    /// Lists a site's products by name.
    pub async fn list_by_site(&self, site_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE site_id = ?1 ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Case-insensitive substring search on the product name.
    ///
    /// An empty query lists the site's products.
    pub async fn search(&self, site_id: &str, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        debug!(site_id = %site_id, query = %query, limit, "Searching products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE site_id = ?1
              AND name LIKE ?2 ESCAPE '\'
            ORDER BY name
            LIMIT ?3
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(site_id)
            .bind(like_pattern(&query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Moves stock by `delta` (negative removes). Stock never goes below zero.
    pub async fn adjust_stock(&self, adjustment: &StockAdjustment) -> DbResult<Product> {
        adjustment.validate()?;
        let id = adjustment.product_id.as_str();
        debug!(id = %id, delta = adjustment.delta, "Adjusting stock");

        let now = Utc::now();
        let mut conn = self.pool.acquire().await?;
        if adjustment.delta >= 0 {
            if !restore_stock(&mut *conn, id, adjustment.delta, now).await? {
                return Err(DbError::not_found("Product", id));
            }
        } else {
            take_stock_or_fail(&mut conn, id, adjustment.removed(), now).await?;
        }

        let product = fetch(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        info!(product_id = %id, delta = adjustment.delta, stock = product.stock, "Stock adjusted");
        Ok(product)
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(product)
}

/// Removes `quantity` units if available. Returns `false` when the guard
/// did not match (product missing or not enough stock).
pub(crate) async fn take_stock<'e, E>(
    exec: E,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?2,
            version = version + 1,
            updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// [`take_stock`] that turns a guard miss into `InsufficientStock` (or
/// `NotFound`), reading the stock that is actually left.
pub(crate) async fn take_stock_or_fail(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    if take_stock(&mut *conn, id, quantity, now).await? {
        return Ok(());
    }

    let product = fetch(&mut *conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;
    warn!(product_id = %id, requested = quantity, available = product.stock, "Stock guard refused update");
    Err(CoreError::InsufficientStock {
        product: product.name,
        available: product.stock,
        requested: quantity,
    }
    .into())
}

/// Puts `quantity` units back. Returns `false` if the product is gone.
pub(crate) async fn restore_stock<'e, E>(
    exec: E,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2,
            version = version + 1,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::take_stock_or_fail;
    use crate::repository::test_support::{product, setup};
    use crate::DbError;
    use caja_core::catalog::{NewProduct, StockAdjustment};
    use caja_core::{CoreError, ProductType, ValidationError};
    use chrono::Utc;

    #[tokio::test]
    async fn test_create_requires_site() {
        let (db, _site) = setup().await;

        let err = db
            .products()
            .create(&NewProduct {
                site_id: "nope".to_string(),
                name: "Arroz".to_string(),
                product_type: None,
                stock: 1,
                price_cents: 100,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Site"));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let (db, site) = setup().await;
        product(&db, &site.id, "Arroz Costeño 1kg", 10, 450).await;
        product(&db, &site.id, "Azúcar rubia", 10, 380).await;
        product(&db, &site.id, "Inca Kola 500ml", 10, 250).await;

        let found = db.products().search(&site.id, "ARROZ", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Arroz Costeño 1kg");

        let found = db.products().search(&site.id, "kola", 20).await.unwrap();
        assert_eq!(found.len(), 1);

        let all = db.products().search(&site.id, "", 20).await.unwrap();
        assert_eq!(all.len(), 3);

        // Wildcards in the query are literal
        assert!(db.products().search(&site.id, "%", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_stock_never_negative() {
        let (db, site) = setup().await;
        let p = product(&db, &site.id, "Gaseosa", 5, 250).await;

        let updated = db
            .products()
            .adjust_stock(&StockAdjustment { product_id: p.id.clone(), delta: 7 })
            .await
            .unwrap();
        assert_eq!(updated.stock, 12);
        assert_eq!(updated.version, p.version + 1);

        let err = db
            .products()
            .adjust_stock(&StockAdjustment { product_id: p.id.clone(), delta: -13 })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 12, requested: 13, .. })
        ));

        let err = db
            .products()
            .adjust_stock(&StockAdjustment { product_id: "missing".to_string(), delta: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_out_of_range_delta() {
        let (db, site) = setup().await;
        let p = product(&db, &site.id, "Gaseosa", 5, 250).await;

        for delta in [i64::MIN, i64::MAX] {
            let err = db
                .products()
                .adjust_stock(&StockAdjustment { product_id: p.id.clone(), delta })
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
            ));
        }
        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_stock_guard_reports_what_is_left() {
        let (db, site) = setup().await;
        let p = product(&db, &site.id, "Pan francés", 10, 30).await;

        // Stock checked at 10, then another register takes 8 before the update
        sqlx::query("UPDATE products SET stock = 2 WHERE id = ?1")
            .bind(&p.id)
            .execute(db.pool())
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = take_stock_or_fail(&mut conn, &p.id, 5, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 2, requested: 5, ref product }) if product == "Pan francés"
        ));

        let err = take_stock_or_fail(&mut conn, "ghost", 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        take_stock_or_fail(&mut conn, &p.id, 2, Utc::now()).await.unwrap();
        drop(conn);
        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_list_by_site() {
        let (db, site) = setup().await;
        let created = db
            .products()
            .create(&NewProduct {
                site_id: site.id.clone(),
                name: "Harina".to_string(),
                product_type: Some(ProductType::Insumo),
                stock: 0,
                price_cents: 0,
            })
            .await
            .unwrap();

        let listed = db.products().list_by_site(&site.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].product_type, Some(ProductType::Insumo));
    }
}
