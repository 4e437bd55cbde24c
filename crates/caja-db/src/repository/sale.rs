//! # Sale Repository
//!
//! Read side of sales plus the row-level helpers the sale operations use.
//!
//! ## Sale Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales                          sale_lines                              │
//! │  ┌────────────────────────┐     ┌──────────────────────────────────┐   │
//! │  │ id                     │◄────│ sale_id        (ON DELETE CASCADE)│   │
//! │  │ ticket_number 00000042 │     │ position       (input order)     │   │
//! │  │ register_id            │     │ item_type      PRODUCTO/SERVICIO │   │
//! │  │ status     COMPLETADA  │     │ product_id     (NULL = service)  │   │
//! │  │ total_cents            │     │ quantity × unit_price = subtotal │   │
//! │  │ version                │     └──────────────────────────────────┘   │
//! │  └────────────────────────┘                                             │
//! │  UNIQUE (register_id, ticket_number)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use caja_core::{Sale, SaleDetail, SaleLine, SaleStatus};

const SALE_COLUMNS: &str = r#"
    id, ticket_number, register_id, seller_user_id, customer_name, customer_dni,
    subtotal_cents, discount_cents, igv_cents, total_cents, payment_method,
    status, notes, sold_at, modified_at, version
"#;

/// Default page size for [`SaleRepository::list`].
pub const DEFAULT_SALE_LIMIT: u32 = 100;

/// Filters for listing sales. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub register_id: Option<String>,
    /// Sold at or after.
    pub from: Option<DateTime<Utc>>,
    /// Sold strictly before.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        fetch(&self.pool, id).await
    }

    /// Gets a sale with its lines in input order.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = fetch(&self.pool, id).await? else {
            return Ok(None);
        };
        let lines = lines(&self.pool, id).await?;
        Ok(Some(SaleDetail { sale, lines }))
    }

    /// Lists sales newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        debug!(?filter, "Listing sales");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SALE_COLUMNS} FROM sales WHERE 1 = 1"));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(register_id) = filter.register_id.as_deref() {
            qb.push(" AND register_id = ").push_bind(register_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND sold_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND sold_at < ").push_bind(to);
        }
        qb.push(" ORDER BY sold_at DESC, ticket_number DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(DEFAULT_SALE_LIMIT));

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        debug!(count = sales.len(), "Sales listed");
        Ok(sales)
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<Sale>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(sale)
}

pub(crate) async fn lines<'e, E>(exec: E, sale_id: &str) -> DbResult<Vec<SaleLine>>
where
    E: SqliteExecutor<'e>,
{
    let lines = sqlx::query_as::<_, SaleLine>(
        r#"
        SELECT id, sale_id, item_type, product_id, description, quantity,
               unit_price_cents, subtotal_cents
        FROM sale_lines
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(exec)
    .await?;
    Ok(lines)
}

/// Every ticket number issued on a register, numeric or not.
pub(crate) async fn ticket_numbers<'e, E>(exec: E, register_id: &str) -> DbResult<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    let tickets = sqlx::query_scalar::<_, String>(
        "SELECT ticket_number FROM sales WHERE register_id = ?1",
    )
    .bind(register_id)
    .fetch_all(exec)
    .await?;
    Ok(tickets)
}

pub(crate) async fn insert<'e, E>(exec: E, sale: &Sale) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, ticket_number, register_id, seller_user_id, customer_name, customer_dni,
            subtotal_cents, discount_cents, igv_cents, total_cents, payment_method,
            status, notes, sold_at, modified_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.ticket_number)
    .bind(&sale.register_id)
    .bind(&sale.seller_user_id)
    .bind(&sale.customer_name)
    .bind(&sale.customer_dni)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.igv_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.status)
    .bind(&sale.notes)
    .bind(sale.sold_at)
    .bind(sale.modified_at)
    .bind(sale.version)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn insert_line<'e, E>(exec: E, line: &SaleLine, position: i64) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO sale_lines (
            id, sale_id, position, item_type, product_id, description,
            quantity, unit_price_cents, subtotal_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&line.id)
    .bind(&line.sale_id)
    .bind(position)
    .bind(line.item_type)
    .bind(&line.product_id)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.subtotal_cents)
    .execute(exec)
    .await?;
    Ok(())
}

/// Sets a sale to `CANCELADA` if it still has the version that was read,
/// otherwise fails with `Conflict`.
pub(crate) async fn mark_cancelled<'e, E>(
    exec: E,
    sale: &Sale,
    notes: &str,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE sales
        SET status = ?3,
            notes = ?4,
            modified_at = ?5,
            version = version + 1
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&sale.id)
    .bind(sale.version)
    .bind(SaleStatus::Cancelled)
    .bind(notes)
    .bind(now)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Sale", &sale.id));
    }
    Ok(())
}
