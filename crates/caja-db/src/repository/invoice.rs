//! # Invoice Repository
//!
//! Electronic invoices (comprobantes) and their lines.
//!
//! Invoices are inserted by [`crate::operations`] together with the
//! correlative bump. Afterwards only the SUNAT response fields change.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use super::like_pattern;
use crate::error::{DbError, DbResult};
use caja_core::{Invoice, InvoiceDetail, InvoiceLine, InvoiceType, SunatStatus};

const INVOICE_COLUMNS: &str = r#"
    id, invoice_type, series, number, issued_at, due_date,
    issuer_ruc, issuer_legal_name, issuer_address, issuer_ubigeo,
    receiver_doc_type, receiver_doc_number, receiver_name, receiver_address,
    subtotal_cents, igv_cents, total_cents,
    sunat_status, sunat_response, sunat_response_code, sunat_responded_at,
    xml_generated, xml_signed, cdr, sale_id, currency, exchange_rate, notes
"#;

/// Default page size for [`InvoiceRepository::list`].
pub const DEFAULT_INVOICE_LIMIT: u32 = 100;

/// Filters for listing invoices. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    pub invoice_type: Option<InvoiceType>,
    pub sunat_status: Option<SunatStatus>,
    pub series: Option<String>,
    pub number: Option<i64>,
    /// Issued at or after.
    pub from: Option<DateTime<Utc>>,
    /// Issued strictly before.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the receiver name.
    pub receiver_name: Option<String>,
    pub limit: Option<u32>,
}

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        fetch(&self.pool, id).await
    }

    /// Gets an invoice with its lines.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<InvoiceDetail>> {
        let Some(invoice) = fetch(&self.pool, id).await? else {
            return Ok(None);
        };
        let lines = lines(&self.pool, id).await?;
        Ok(Some(InvoiceDetail { invoice, lines }))
    }

    /// Invoices issued for a sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE sale_id = ?1 ORDER BY issued_at");
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Lists invoices newest first.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        debug!(?filter, "Listing invoices");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE 1 = 1"));
        if let Some(invoice_type) = filter.invoice_type {
            qb.push(" AND invoice_type = ").push_bind(invoice_type);
        }
        if let Some(status) = filter.sunat_status {
            qb.push(" AND sunat_status = ").push_bind(status);
        }
        if let Some(series) = filter.series.as_deref() {
            qb.push(" AND series = ").push_bind(series);
        }
        if let Some(number) = filter.number {
            qb.push(" AND number = ").push_bind(number);
        }
        if let Some(from) = filter.from {
            qb.push(" AND issued_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND issued_at < ").push_bind(to);
        }
        if let Some(name) = filter.receiver_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            qb.push(" AND receiver_name LIKE ")
                .push_bind(like_pattern(name))
                .push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY issued_at DESC, number DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(DEFAULT_INVOICE_LIMIT));

        let invoices = qb.build_query_as::<Invoice>().fetch_all(&self.pool).await?;
        debug!(count = invoices.len(), "Invoices listed");
        Ok(invoices)
    }

    /// Records the SUNAT verdict for an invoice.
    pub async fn update_sunat_status(
        &self,
        id: &str,
        status: SunatStatus,
        response_code: Option<&str>,
        response: Option<&str>,
    ) -> DbResult<Invoice> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET sunat_status = ?2,
                sunat_response_code = ?3,
                sunat_response = ?4,
                sunat_responded_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(response_code)
        .bind(response)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(invoice_id = %id, status = %status, code = ?response_code, "SUNAT status updated");
        fetch(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<Invoice>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
    let invoice = sqlx::query_as::<_, Invoice>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(invoice)
}

pub(crate) async fn lines<'e, E>(exec: E, invoice_id: &str) -> DbResult<Vec<InvoiceLine>>
where
    E: SqliteExecutor<'e>,
{
    let lines = sqlx::query_as::<_, InvoiceLine>(
        r#"
        SELECT id, invoice_id, description, quantity, unit_code, unit_price_cents,
               subtotal_cents, igv_cents, igv_type, sale_line_id
        FROM invoice_lines
        WHERE invoice_id = ?1
        ORDER BY position
        "#,
    )
    .bind(invoice_id)
    .fetch_all(exec)
    .await?;
    Ok(lines)
}

pub(crate) async fn insert<'e, E>(exec: E, invoice: &Invoice) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_type, series, number, issued_at, due_date,
            issuer_ruc, issuer_legal_name, issuer_address, issuer_ubigeo,
            receiver_doc_type, receiver_doc_number, receiver_name, receiver_address,
            subtotal_cents, igv_cents, total_cents,
            sunat_status, sunat_response, sunat_response_code, sunat_responded_at,
            xml_generated, xml_signed, cdr, sale_id, currency, exchange_rate, notes
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
        )
        "#,
    )
    .bind(&invoice.id)
    .bind(invoice.invoice_type)
    .bind(&invoice.series)
    .bind(invoice.number)
    .bind(invoice.issued_at)
    .bind(invoice.due_date)
    .bind(&invoice.issuer_ruc)
    .bind(&invoice.issuer_legal_name)
    .bind(&invoice.issuer_address)
    .bind(&invoice.issuer_ubigeo)
    .bind(invoice.receiver_doc_type)
    .bind(&invoice.receiver_doc_number)
    .bind(&invoice.receiver_name)
    .bind(&invoice.receiver_address)
    .bind(invoice.subtotal_cents)
    .bind(invoice.igv_cents)
    .bind(invoice.total_cents)
    .bind(invoice.sunat_status)
    .bind(&invoice.sunat_response)
    .bind(&invoice.sunat_response_code)
    .bind(invoice.sunat_responded_at)
    .bind(&invoice.xml_generated)
    .bind(&invoice.xml_signed)
    .bind(&invoice.cdr)
    .bind(&invoice.sale_id)
    .bind(&invoice.currency)
    .bind(invoice.exchange_rate)
    .bind(&invoice.notes)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn insert_line<'e, E>(exec: E, line: &InvoiceLine, position: i64) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO invoice_lines (
            id, invoice_id, position, description, quantity, unit_code,
            unit_price_cents, subtotal_cents, igv_cents, igv_type, sale_line_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&line.id)
    .bind(&line.invoice_id)
    .bind(position)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(&line.unit_code)
    .bind(line.unit_price_cents)
    .bind(line.subtotal_cents)
    .bind(line.igv_cents)
    .bind(&line.igv_type)
    .bind(&line.sale_line_id)
    .execute(exec)
    .await?;
    Ok(())
}
