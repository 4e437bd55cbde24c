//! # HTTP Handlers
//!
//! ## Mutation Endpoint
//! ```text
//! POST /mutations
//! {
//!   "fieldName": "crearPOSVentaConDetalles",
//!   "arguments": { "registerId": "...", "items": [ ... ] }
//! }
//!      │
//!      ▼
//! dispatch(fieldName) ──► handler(arguments) ──► caja-db operation
//!      │                                              │
//!      │ unknown name                                 ▼
//!      ▼                                       200 + result JSON
//! 400 {"code": "UNKNOWN_FIELD", "message": "Unknown field <name>"}
//! ```
//!
//! Everything else is plain REST over the repositories:
//! - [`catalog`] - sites and products
//! - [`register`] - registers, logs, expenses
//! - [`sale`] - sales
//! - [`invoice`] - invoices, tax configuration, submission queue

pub mod catalog;
pub mod invoice;
pub mod register;
pub mod sale;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::State;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use caja_db::Database;

// =============================================================================
// Mutation Dispatch
// =============================================================================

/// Body of `POST /mutations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    pub field_name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `POST /mutations`
pub async fn mutate(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let request: MutationRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid mutation request: {}", e)))?;
    dispatch(&state.db, request).await.map(Json)
}

/// Routes a mutation by its field name.
pub async fn dispatch(db: &Database, request: MutationRequest) -> ApiResult<Value> {
    debug!(field = %request.field_name, "Dispatching mutation");

    match request.field_name.as_str() {
        "abrirCaja" => to_json(register::abrir_caja(db, arguments(request.arguments)?).await?),
        "cerrarCaja" => to_json(register::cerrar_caja(db, arguments(request.arguments)?).await?),
        "crearPOSVentaConDetalles" => {
            to_json(sale::crear_venta(db, arguments(request.arguments)?).await?)
        }
        "anularPOSVenta" => to_json(sale::anular_venta(db, arguments(request.arguments)?).await?),
        "emitirComprobante" => {
            to_json(invoice::emitir_comprobante(db, arguments(request.arguments)?).await?)
        }
        other => {
            warn!(field = %other, "Unknown mutation");
            Err(ApiError::unknown_field(other))
        }
    }
}

/// Decimal-soles amounts sent by the web client, with the céntimos field
/// that replaces each. Sent unconverted they would be ignored or misread.
const SOLES_AMOUNTS: &[(&str, &str)] = &[
    ("monto_inicial", "openingAmountCents"),
    ("descuento", "discountCents"),
    ("precio_unitario", "unitPriceCents"),
];

/// Deserializes mutation arguments; `null` counts as `{}`.
fn arguments<T: DeserializeOwned>(arguments: Value) -> ApiResult<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    reject_soles_amounts(&arguments)?;
    serde_json::from_value(arguments)
        .map_err(|e| ApiError::validation(format!("Invalid arguments: {}", e)))
}

fn reject_soles_amounts(arguments: &Value) -> ApiResult<()> {
    let items = arguments.get("items").and_then(Value::as_array).into_iter().flatten();

    for object in std::iter::once(arguments).chain(items) {
        for (soles, cents) in SOLES_AMOUNTS {
            if object.get(soles).is_some() {
                return Err(ApiError::validation(format!(
                    "{soles} is not accepted, send {cents} in céntimos"
                )));
            }
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(format!("Serialization failed: {}", e)))
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.db.health_check().await;
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}

// =============================================================================
// Extractor rejections
// =============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
