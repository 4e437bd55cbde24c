//! Register handlers: `abrirCaja`, `cerrarCaja` and the register REST routes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use caja_core::catalog::{NewRegister, RegisterExpense};
use caja_core::register::{CloseRegister, OpenRegister};
use caja_core::{Register, RegisterLog, RegisterStatus};
use caja_db::Database;

// =============================================================================
// Mutations
// =============================================================================

/// `abrirCaja`
pub async fn abrir_caja(db: &Database, input: OpenRegister) -> ApiResult<Register> {
    Ok(db.open_register(&input).await?)
}

/// `cerrarCaja`
pub async fn cerrar_caja(db: &Database, input: CloseRegister) -> ApiResult<Register> {
    Ok(db.close_register(&input).await?)
}

// =============================================================================
// REST
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterQuery {
    pub site_id: Option<String>,
    pub status: Option<RegisterStatus>,
}

/// `GET /registers?siteId=&status=`
pub async fn list_registers(
    State(state): State<AppState>,
    query: Result<Query<RegisterQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Register>>> {
    let Query(query) = query?;
    let registers = state
        .db
        .registers()
        .list(query.site_id.as_deref(), query.status)
        .await?;
    Ok(Json(registers))
}

/// `POST /registers`
pub async fn create_register(
    State(state): State<AppState>,
    body: Result<Json<NewRegister>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Register>)> {
    let Json(input) = body?;
    let register = state.db.registers().create(&input).await?;
    Ok((StatusCode::CREATED, Json(register)))
}

/// `GET /registers/{id}`
pub async fn get_register(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Register>> {
    state
        .db
        .registers()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Register", &id))
}

/// `GET /registers/{id}/logs`
pub async fn register_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RegisterLog>>> {
    if state.db.registers().get_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found("Register", &id));
    }
    Ok(Json(state.db.registers().logs(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBody {
    pub amount_cents: i64,
}

/// `POST /registers/{id}/expenses`
pub async fn record_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ExpenseBody>, JsonRejection>,
) -> ApiResult<Json<Register>> {
    let Json(body) = body?;
    let register = state
        .db
        .registers()
        .record_expense(&RegisterExpense {
            register_id: id,
            amount_cents: body.amount_cents,
        })
        .await?;
    info!(register_id = %register.id, amount_cents = body.amount_cents, "Expense recorded");
    Ok(Json(register))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{mutate, new_register, setup};
    use caja_core::RegisterOperation;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_and_close_over_the_wire() {
        let (state, site) = setup().await;
        let reg = new_register(&state, &site.id).await;

        let opened = mutate(
            &state,
            "abrirCaja",
            json!({ "registerId": reg.id, "userId": "cajero-1", "openingAmountCents": 20000 }),
        )
        .await
        .unwrap();
        assert_eq!(opened["status"], "APERTURA");
        assert_eq!(opened["opening_amount_cents"], 20000);

        // Second open is a no-op.
        let again = mutate(&state, "abrirCaja", json!({ "registerId": reg.id }))
            .await
            .unwrap();
        assert_eq!(again["version"], opened["version"]);

        let closed = mutate(&state, "cerrarCaja", json!({ "registerId": reg.id, "notes": "Fin de turno" }))
            .await
            .unwrap();
        assert_eq!(closed["status"], "CIERRE");

        let Json(logs) = register_logs(State(state.clone()), Path(reg.id.clone())).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].operation, RegisterOperation::Open);
        assert_eq!(logs[1].operation, RegisterOperation::Close);
        assert_eq!(logs[1].final_amount_cents, 20_000);
    }

    #[tokio::test]
    async fn test_close_unopened_is_business_error() {
        let (state, site) = setup().await;
        let reg = new_register(&state, &site.id).await;

        let err = mutate(&state, "cerrarCaja", json!({ "registerId": reg.id }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_open_unknown_register() {
        let (state, _site) = setup().await;
        let err = mutate(&state, "abrirCaja", json!({ "registerId": "caja-x" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Register not found: caja-x");
    }

    #[tokio::test]
    async fn test_rest_routes() {
        let (state, site) = setup().await;

        let (status, Json(reg)) = create_register(
            State(state.clone()),
            Ok(Json(NewRegister { site_id: site.id.clone(), assigned_user_id: None })),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reg.status, RegisterStatus::Closed);

        // Expenses need an open register.
        let err = record_expense(
            State(state.clone()),
            Path(reg.id.clone()),
            Ok(Json(ExpenseBody { amount_cents: 300 })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        mutate(&state, "abrirCaja", json!({ "registerId": reg.id })).await.unwrap();
        let Json(updated) = record_expense(
            State(state.clone()),
            Path(reg.id.clone()),
            Ok(Json(ExpenseBody { amount_cents: 300 })),
        )
        .await
        .unwrap();
        assert_eq!(updated.expenses_cents, 300);

        let Json(open) = list_registers(
            State(state.clone()),
            Ok(Query(RegisterQuery { site_id: Some(site.id.clone()), status: Some(RegisterStatus::Open) })),
        )
        .await
        .unwrap();
        assert_eq!(open.len(), 1);

        let err = get_register(State(state.clone()), Path("nope".to_string())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = register_logs(State(state), Path("nope".to_string())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
