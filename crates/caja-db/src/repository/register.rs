//! # Register Repository
//!
//! Registers (cajas), their audit log and cash expenses.
//!
//! Status changes go through [`crate::operations`] so that every
//! `APERTURA`/`CIERRE` is logged in the same transaction that flips the
//! status. This repository only creates, reads and records expenses.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caja_core::catalog::{NewRegister, RegisterExpense};
use caja_core::{Register, RegisterLog, RegisterStatus, SaleStatus};

const REGISTER_COLUMNS: &str = r#"
    id, site_id, status, opened_at, closed_at, opening_amount_cents,
    expenses_cents, assigned_user_id, version, created_at, updated_at
"#;

/// Repository for register database operations.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    /// Creates a new RegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Creates a closed register for a site.
    pub async fn create(&self, input: &NewRegister) -> DbResult<Register> {
        input.validate()?;

        if super::site::fetch(&self.pool, &input.site_id).await?.is_none() {
            return Err(DbError::not_found("Site", &input.site_id));
        }

        let now = Utc::now();
        let register = Register {
            id: Uuid::new_v4().to_string(),
            site_id: input.site_id.clone(),
            status: RegisterStatus::Closed,
            opened_at: None,
            closed_at: None,
            opening_amount_cents: 0,
            expenses_cents: 0,
            assigned_user_id: input.assigned_user_id.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO registers (
                id, site_id, status, opened_at, closed_at, opening_amount_cents,
                expenses_cents, assigned_user_id, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&register.id)
        .bind(&register.site_id)
        .bind(register.status)
        .bind(register.opened_at)
        .bind(register.closed_at)
        .bind(register.opening_amount_cents)
        .bind(register.expenses_cents)
        .bind(&register.assigned_user_id)
        .bind(register.version)
        .bind(register.created_at)
        .bind(register.updated_at)
        .execute(&self.pool)
        .await?;

        info!(register_id = %register.id, site_id = %register.site_id, "Register created");
        Ok(register)
    }

    /// Gets a register by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Register>> {
        fetch(&self.pool, id).await
    }

    /// Lists registers, optionally narrowed to a site and/or a status.
    pub async fn list(
        &self,
        site_id: Option<&str>,
        status: Option<RegisterStatus>,
    ) -> DbResult<Vec<Register>> {
        debug!(site_id = ?site_id, status = ?status, "Listing registers");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {REGISTER_COLUMNS} FROM registers WHERE 1 = 1"));
        if let Some(site_id) = site_id {
            qb.push(" AND site_id = ").push_bind(site_id);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY created_at");

        let registers = qb.build_query_as::<Register>().fetch_all(&self.pool).await?;
        Ok(registers)
    }

    /// Returns a register's log, oldest first.
    pub async fn logs(&self, register_id: &str) -> DbResult<Vec<RegisterLog>> {
        let logs = sqlx::query_as::<_, RegisterLog>(
            r#"
            SELECT id, register_id, user_id, operation, initial_amount_cents,
                   final_amount_cents, notes, recorded_at
            FROM register_logs
            WHERE register_id = ?1
            ORDER BY recorded_at, rowid
            "#,
        )
        .bind(register_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    /// Adds a cash expense to an open register.
    pub async fn record_expense(&self, input: &RegisterExpense) -> DbResult<Register> {
        input.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE registers
            SET expenses_cents = expenses_cents + ?2,
                version = version + 1,
                updated_at = ?3
            WHERE id = ?1 AND status = ?4
            "#,
        )
        .bind(&input.register_id)
        .bind(input.amount_cents)
        .bind(Utc::now())
        .bind(RegisterStatus::Open)
        .execute(&self.pool)
        .await?;

        let register = fetch(&self.pool, &input.register_id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &input.register_id))?;

        if result.rows_affected() == 0 {
            register.ensure_open()?;
        }

        info!(
            register_id = %register.id,
            amount_cents = input.amount_cents,
            expenses_cents = register.expenses_cents,
            "Register expense recorded"
        );
        Ok(register)
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<Register>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {REGISTER_COLUMNS} FROM registers WHERE id = ?1");
    let register = sqlx::query_as::<_, Register>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(register)
}

pub(crate) async fn insert_log<'e, E>(exec: E, log: &RegisterLog) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO register_logs (
            id, register_id, user_id, operation, initial_amount_cents,
            final_amount_cents, notes, recorded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&log.id)
    .bind(&log.register_id)
    .bind(&log.user_id)
    .bind(log.operation)
    .bind(log.initial_amount_cents)
    .bind(log.final_amount_cents)
    .bind(&log.notes)
    .bind(log.recorded_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Flips a register to `APERTURA` for a new session. Conditional on the
/// version that was read; `Conflict` if someone else got there first.
pub(crate) async fn mark_open<'e, E>(
    exec: E,
    register: &Register,
    opening_amount_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE registers
        SET status = ?3,
            opened_at = ?4,
            closed_at = NULL,
            opening_amount_cents = ?5,
            expenses_cents = 0,
            version = version + 1,
            updated_at = ?4
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&register.id)
    .bind(register.version)
    .bind(RegisterStatus::Open)
    .bind(now)
    .bind(opening_amount_cents)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Register", &register.id));
    }
    Ok(())
}

/// Flips a register to `CIERRE`. Same version guard as [`mark_open`].
pub(crate) async fn mark_closed<'e, E>(exec: E, register: &Register, now: DateTime<Utc>) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE registers
        SET status = ?3,
            closed_at = ?4,
            version = version + 1,
            updated_at = ?4
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&register.id)
    .bind(register.version)
    .bind(RegisterStatus::Closed)
    .bind(now)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Register", &register.id));
    }
    Ok(())
}

/// Sum of `total_cents` of the register's completed sales, optionally only
/// those sold at or after `since`.
pub(crate) async fn completed_sales_total<'e, E>(
    exec: E,
    register_id: &str,
    since: Option<DateTime<Utc>>,
) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(total_cents), 0)
        FROM sales
        WHERE register_id = ?1
          AND status = ?2
          AND (?3 IS NULL OR sold_at >= ?3)
        "#,
    )
    .bind(register_id)
    .bind(SaleStatus::Completed)
    .bind(since)
    .fetch_one(exec)
    .await?;
    Ok(total)
}
