//! # Submission Queue Repository
//!
//! Outbound queue of signed documents waiting to be sent to SUNAT.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   enqueue ──► PENDIENTE ──── send ok ────► ENVIADO                     │
//! │                  │  ▲                                                   │
//! │       send fails │  │ next_retry_at = now + 30s, 60s, 120s … ≤ 1h      │
//! │                  ▼  │                                                   │
//! │              attempts += 1                                              │
//! │                  │                                                      │
//! │                  └── attempts ≥ max_attempts ──► FALLIDO               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue stores whatever the signing pipeline produced (zip name,
//! base64 payload, XML digest). Producing those is out of this crate's
//! hands.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caja_core::retry::{FailureOutcome, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use caja_core::{Invoice, SubmissionEntry, SubmissionStatus};

const SUBMISSION_COLUMNS: &str = r#"
    id, invoice_id, cbc_id, issuer_ruc, invoice_type, series, number,
    zip_name, zip_base64, xml_sha1, status, attempts, max_attempts,
    next_retry_at, fault_code, fault_string, last_response_snippet,
    created_at, updated_at
"#;

/// Longest response excerpt kept on an entry, in characters.
pub const MAX_SNIPPET_CHARS: usize = 1_000;

/// Signed payload to queue for an invoice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub zip_name: String,
    pub zip_base64: String,
    pub xml_sha1: String,
}

/// What went wrong on a failed send.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFault {
    pub fault_code: Option<String>,
    pub fault_string: Option<String>,
    pub response_snippet: Option<String>,
}

/// Repository for the SUNAT submission queue.
#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pool: SqlitePool,
}

impl SubmissionRepository {
    /// Creates a new SubmissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SubmissionRepository { pool }
    }

    /// Queues an invoice for sending. The entry is due immediately.
    pub async fn enqueue(&self, invoice: &Invoice, payload: SubmissionPayload) -> DbResult<SubmissionEntry> {
        let now = Utc::now();
        let entry = SubmissionEntry {
            id: Uuid::new_v4().to_string(),
            invoice_id: Some(invoice.id.clone()),
            cbc_id: invoice.cbc_id(),
            issuer_ruc: invoice.issuer_ruc.clone(),
            invoice_type: invoice.invoice_type,
            series: invoice.series.clone(),
            number: invoice.number,
            zip_name: payload.zip_name,
            zip_base64: payload.zip_base64,
            xml_sha1: payload.xml_sha1,
            status: SubmissionStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            next_retry_at: None,
            fault_code: None,
            fault_string: None,
            last_response_snippet: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO submission_queue (
                id, invoice_id, cbc_id, issuer_ruc, invoice_type, series, number,
                zip_name, zip_base64, xml_sha1, status, attempts, max_attempts,
                next_retry_at, fault_code, fault_string, last_response_snippet,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.invoice_id)
        .bind(&entry.cbc_id)
        .bind(&entry.issuer_ruc)
        .bind(entry.invoice_type)
        .bind(&entry.series)
        .bind(entry.number)
        .bind(&entry.zip_name)
        .bind(&entry.zip_base64)
        .bind(&entry.xml_sha1)
        .bind(entry.status)
        .bind(entry.attempts)
        .bind(entry.max_attempts)
        .bind(entry.next_retry_at)
        .bind(&entry.fault_code)
        .bind(&entry.fault_string)
        .bind(&entry.last_response_snippet)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        info!(entry_id = %entry.id, cbc_id = %entry.cbc_id, "Submission queued");
        Ok(entry)
    }

    /// Gets a queue entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SubmissionEntry>> {
        fetch(&self.pool, id).await
    }

    /// Lists entries, newest first, optionally by status.
    pub async fn list(&self, status: Option<SubmissionStatus>, limit: u32) -> DbResult<Vec<SubmissionEntry>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SUBMISSION_COLUMNS} FROM submission_queue WHERE 1 = 1"));
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let entries = qb.build_query_as::<SubmissionEntry>().fetch_all(&self.pool).await?;
        Ok(entries)
    }

    /// Pending entries whose retry time has come, oldest first.
    pub async fn due(&self, now: DateTime<Utc>, limit: u32) -> DbResult<Vec<SubmissionEntry>> {
        let sql = format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM submission_queue
            WHERE status = ?1
              AND (next_retry_at IS NULL OR next_retry_at <= ?2)
            ORDER BY created_at
            LIMIT ?3
            "#
        );
        let entries = sqlx::query_as::<_, SubmissionEntry>(&sql)
            .bind(SubmissionStatus::Pending)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = entries.len(), "Due submissions fetched");
        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<SubmissionEntry> {
        let result = sqlx::query(
            r#"
            UPDATE submission_queue
            SET status = ?2,
                attempts = attempts + 1,
                next_retry_at = NULL,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SubmissionStatus::Sent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SubmissionEntry", id));
        }

        info!(entry_id = %id, "Submission sent");
        self.require(id).await
    }

    /// Records a failed send and either schedules the next try or gives up.
    pub async fn mark_failed(
        &self,
        id: &str,
        fault: &SubmissionFault,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> DbResult<SubmissionEntry> {
        let entry = self.require(id).await?;
        let attempts = entry.attempts + 1;

        let (status, next_retry_at) = match policy.after_failure(attempts, entry.max_attempts, now) {
            FailureOutcome::RetryAt(at) => (SubmissionStatus::Pending, Some(at)),
            FailureOutcome::GiveUp => (SubmissionStatus::Failed, None),
        };

        let snippet = fault
            .response_snippet
            .as_deref()
            .map(|s| s.chars().take(MAX_SNIPPET_CHARS).collect::<String>());

        let result = sqlx::query(
            r#"
            UPDATE submission_queue
            SET status = ?3,
                attempts = ?4,
                next_retry_at = ?5,
                fault_code = ?6,
                fault_string = ?7,
                last_response_snippet = ?8,
                updated_at = ?9
            WHERE id = ?1 AND attempts = ?2
            "#,
        )
        .bind(id)
        .bind(entry.attempts)
        .bind(status)
        .bind(attempts)
        .bind(next_retry_at)
        .bind(&fault.fault_code)
        .bind(&fault.fault_string)
        .bind(snippet)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("SubmissionEntry", id));
        }

        match status {
            SubmissionStatus::Failed => warn!(
                entry_id = %id,
                attempts,
                fault_code = ?fault.fault_code,
                "Submission gave up"
            ),
            _ => info!(
                entry_id = %id,
                attempts,
                next_retry_at = ?next_retry_at,
                "Submission failed, retry scheduled"
            ),
        }

        self.require(id).await
    }

    async fn require(&self, id: &str) -> DbResult<SubmissionEntry> {
        fetch(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("SubmissionEntry", id))
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<SubmissionEntry>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submission_queue WHERE id = ?1");
    let entry = sqlx::query_as::<_, SubmissionEntry>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(entry)
}
