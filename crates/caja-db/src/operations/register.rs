//! `abrirCaja` and `cerrarCaja`.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::register as registers;
use caja_core::register::{CloseRegister, OpenPlan, OpenRegister};
use caja_core::{Money, Register, RegisterLog, RegisterOperation};

impl Database {
    /// Opens a register for a new session.
    ///
    /// Opening an already open register returns it unchanged and logs
    /// nothing, so a retried request is harmless.
    pub async fn open_register(&self, input: &OpenRegister) -> DbResult<Register> {
        input.validate()?;

        let mut tx = self.begin_write().await?;

        let register = registers::fetch(&mut *tx, &input.register_id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &input.register_id))?;

        if register.open_plan() == OpenPlan::AlreadyOpen {
            debug!(register_id = %register.id, "Register already open");
            return Ok(register);
        }

        let now = Utc::now();
        registers::mark_open(&mut *tx, &register, input.opening_amount_cents, now).await?;

        registers::insert_log(
            &mut *tx,
            &RegisterLog {
                id: Uuid::new_v4().to_string(),
                register_id: register.id.clone(),
                user_id: input.user_id.clone(),
                operation: RegisterOperation::Open,
                initial_amount_cents: input.opening_amount_cents,
                final_amount_cents: 0,
                notes: input.notes.clone(),
                recorded_at: now,
            },
        )
        .await?;

        let opened = registers::fetch(&mut *tx, &register.id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &register.id))?;

        tx.commit().await?;

        info!(
            register_id = %opened.id,
            user_id = ?input.user_id,
            opening_amount = %opened.opening_amount(),
            "Register opened"
        );
        Ok(opened)
    }

    /// Closes an open register and logs the expected cash in the drawer.
    pub async fn close_register(&self, input: &CloseRegister) -> DbResult<Register> {
        input.validate()?;

        let mut tx = self.begin_write().await?;

        let register = registers::fetch(&mut *tx, &input.register_id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &input.register_id))?;
        register.ensure_open()?;

        let sales = registers::completed_sales_total(&mut *tx, &register.id, register.opened_at).await?;
        let balance = register.closing_balance(Money::from_cents(sales));

        let now = Utc::now();
        registers::mark_closed(&mut *tx, &register, now).await?;

        registers::insert_log(
            &mut *tx,
            &RegisterLog {
                id: Uuid::new_v4().to_string(),
                register_id: register.id.clone(),
                user_id: input.user_id.clone(),
                operation: RegisterOperation::Close,
                initial_amount_cents: register.opening_amount_cents,
                final_amount_cents: balance.cents(),
                notes: input.notes.clone(),
                recorded_at: now,
            },
        )
        .await?;

        let closed = registers::fetch(&mut *tx, &register.id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &register.id))?;

        tx.commit().await?;

        info!(
            register_id = %closed.id,
            user_id = ?input.user_id,
            sales = %Money::from_cents(sales),
            expenses = %register.expenses(),
            balance = %balance,
            "Register closed"
        );
        Ok(closed)
    }
}
