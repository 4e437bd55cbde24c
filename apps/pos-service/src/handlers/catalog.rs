//! Site and product routes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use caja_core::catalog::{NewProduct, NewSite, StockAdjustment};
use caja_core::{Product, Site};

/// Search results when no `limit` is given.
const DEFAULT_SEARCH_LIMIT: u32 = 50;

// =============================================================================
// Sites
// =============================================================================

/// `GET /sites`
pub async fn list_sites(State(state): State<AppState>) -> ApiResult<Json<Vec<Site>>> {
    Ok(Json(state.db.sites().list().await?))
}

/// `POST /sites`
pub async fn create_site(
    State(state): State<AppState>,
    body: Result<Json<NewSite>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Site>)> {
    let Json(input) = body?;
    let site = state.db.sites().create(&input).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

/// `GET /sites/{id}`
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Site>> {
    state
        .db
        .sites()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Site", &id))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub site_id: String,
    /// Name substring; omitted lists the whole site.
    pub q: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /products?siteId=&q=&limit=`
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Product>>> {
    let Query(query) = query?;
    let products = match query.q.as_deref() {
        Some(q) => {
            state
                .db
                .products()
                .search(&query.site_id, q, query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                .await?
        }
        None => state.db.products().list_by_site(&query.site_id).await?,
    };
    Ok(Json(products))
}

/// `POST /products`
pub async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let Json(input) = body?;
    let product = state.db.products().create(&input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

#[derive(Debug, Deserialize)]
pub struct StockBody {
    pub delta: i64,
}

/// `POST /products/{id}/stock`
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StockBody>, JsonRejection>,
) -> ApiResult<Json<Product>> {
    let Json(body) = body?;
    let product = state
        .db
        .products()
        .adjust_stock(&StockAdjustment {
            product_id: id,
            delta: body.delta,
        })
        .await?;
    Ok(Json(product))
}
