//! Invoice handlers: `emitirComprobante`, invoice reads, tax configuration
//! and the submission queue.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use caja_core::invoice::{EmitInvoice, TaxConfigInput};
use caja_core::{Invoice, InvoiceDetail, SubmissionEntry, SubmissionStatus, TaxConfig};
use caja_db::{Database, InvoiceFilter, SubmissionPayload};

/// Page size for `GET /submissions` when none is given.
const DEFAULT_SUBMISSION_LIMIT: u32 = 100;

// =============================================================================
// Mutation
// =============================================================================

/// `emitirComprobante`
pub async fn emitir_comprobante(db: &Database, input: EmitInvoice) -> ApiResult<InvoiceDetail> {
    Ok(db.emit_invoice(&input).await?)
}

// =============================================================================
// Invoices
// =============================================================================

/// `GET /invoices?invoiceType=&sunatStatus=&series=&number=&from=&to=&receiverName=&limit=`
pub async fn list_invoices(
    State(state): State<AppState>,
    filter: Result<Query<InvoiceFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let Query(filter) = filter?;
    Ok(Json(state.db.invoices().list(&filter).await?))
}

/// `GET /invoices/{id}`
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    state
        .db
        .invoices()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Invoice", &id))
}

/// `GET /sales/{id}/invoices`
pub async fn invoices_for_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Vec<Invoice>>> {
    Ok(Json(state.db.invoices().list_for_sale(&sale_id).await?))
}

// =============================================================================
// Tax Configuration
// =============================================================================

/// `PUT /tax-configs`
pub async fn upsert_tax_config(
    State(state): State<AppState>,
    body: Result<Json<TaxConfigInput>, JsonRejection>,
) -> ApiResult<Json<TaxConfig>> {
    let Json(input) = body?;
    Ok(Json(state.db.tax_configs().upsert(&input).await?))
}

/// `GET /sites/{id}/tax-config`
pub async fn get_tax_config(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> ApiResult<Json<TaxConfig>> {
    state
        .db
        .tax_configs()
        .get(&site_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TaxConfig", &site_id))
}

// =============================================================================
// Submission Queue
// =============================================================================

/// `POST /invoices/{id}/submissions`
///
/// The payload is the already signed and zipped document.
pub async fn enqueue_submission(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    body: Result<Json<SubmissionPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmissionEntry>)> {
    let Json(payload) = body?;
    let invoice = state
        .db
        .invoices()
        .get_by_id(&invoice_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice", &invoice_id))?;
    let entry = state.db.submissions().enqueue(&invoice, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    pub status: Option<SubmissionStatus>,
    pub limit: Option<u32>,
}

/// `GET /submissions?status=&limit=`
pub async fn list_submissions(
    State(state): State<AppState>,
    query: Result<Query<SubmissionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SubmissionEntry>>> {
    let Query(query) = query?;
    let entries = state
        .db
        .submissions()
        .list(query.status, query.limit.unwrap_or(DEFAULT_SUBMISSION_LIMIT))
        .await?;
    Ok(Json(entries))
}

/// `GET /submissions/{id}`
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmissionEntry>> {
    state
        .db
        .submissions()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("SubmissionEntry", &id))
}
