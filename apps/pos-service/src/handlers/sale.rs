//! Sale handlers: `crearPOSVentaConDetalles`, `anularPOSVenta`, and reads.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use caja_core::sale::{NewSale, VoidSale};
use caja_core::{Sale, SaleDetail};
use caja_db::{Database, SaleFilter};

/// `crearPOSVentaConDetalles`
pub async fn crear_venta(db: &Database, input: NewSale) -> ApiResult<SaleDetail> {
    Ok(db.create_sale(&input).await?)
}

/// `anularPOSVenta`
pub async fn anular_venta(db: &Database, input: VoidSale) -> ApiResult<Sale> {
    Ok(db.void_sale(&input).await?)
}

/// `GET /sales?status=&registerId=&from=&to=&limit=`
pub async fn list_sales(
    State(state): State<AppState>,
    filter: Result<Query<SaleFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Sale>>> {
    let Query(filter) = filter?;
    Ok(Json(state.db.sales().list(&filter).await?))
}

/// `GET /sales/{id}`
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    state
        .db
        .sales()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{mutate, new_product, open_register, setup};
    use caja_core::SaleStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_sale_and_void_over_the_wire() {
        let (state, site) = setup().await;
        let reg = open_register(&state, &site.id).await;
        let gaseosa = new_product(&state, &site.id, "Inca Kola 500ml", 24, 350).await;

        let detail = mutate(
            &state,
            "crearPOSVentaConDetalles",
            json!({
                "registerId": reg.id,
                "sellerUserId": "vendedor-1",
                "paymentMethod": "YAPE",
                "discountCents": 50,
                "customerName": "  ",
                "items": [
                    { "itemType": "PRODUCTO", "productId": gaseosa.id, "description": "Inca Kola 500ml",
                      "quantity": 2, "unitPriceCents": 350 },
                    { "itemType": "SERVICIO", "description": "Delivery", "quantity": 1, "unitPriceCents": 500 }
                ]
            }),
        )
        .await
        .unwrap();

        assert_eq!(detail["sale"]["ticket_number"], "00000001");
        assert_eq!(detail["sale"]["payment_method"], "YAPE");
        assert_eq!(detail["sale"]["subtotal_cents"], 1200);
        assert_eq!(detail["sale"]["total_cents"], 1150);
        assert_eq!(detail["sale"]["customer_name"], serde_json::Value::Null);
        assert_eq!(detail["lines"].as_array().unwrap().len(), 2);
        assert_eq!(detail["lines"][1]["product_id"], serde_json::Value::Null);

        let stock = state.db.products().get_by_id(&gaseosa.id).await.unwrap().unwrap().stock;
        assert_eq!(stock, 22);

        let sale_id = detail["sale"]["id"].as_str().unwrap().to_string();
        let voided = mutate(&state, "anularPOSVenta", json!({ "saleId": sale_id, "reason": "Cliente desistió" }))
            .await
            .unwrap();
        assert_eq!(voided["status"], "CANCELADA");
        assert_eq!(voided["notes"], "Cliente desistió");

        let stock = state.db.products().get_by_id(&gaseosa.id).await.unwrap().unwrap().stock;
        assert_eq!(stock, 24);

        let err = mutate(&state, "anularPOSVenta", json!({ "saleId": sale_id })).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_insufficient_stock_code() {
        let (state, site) = setup().await;
        let reg = open_register(&state, &site.id).await;
        let arroz = new_product(&state, &site.id, "Arroz 1kg", 3, 420).await;

        let err = mutate(
            &state,
            "crearPOSVentaConDetalles",
            json!({
                "registerId": reg.id,
                "sellerUserId": "vendedor-1",
                "paymentMethod": "EFECTIVO",
                "items": [
                    { "itemType": "PRODUCTO", "productId": arroz.id, "description": "Arroz 1kg",
                      "quantity": 5, "unitPriceCents": 420 }
                ]
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("Arroz 1kg"));
    }

    #[tokio::test]
    async fn test_unknown_payment_method_is_rejected() {
        let (state, site) = setup().await;
        let reg = open_register(&state, &site.id).await;

        let err = mutate(
            &state,
            "crearPOSVentaConDetalles",
            json!({
                "registerId": reg.id,
                "sellerUserId": "vendedor-1",
                "paymentMethod": "BITCOIN",
                "items": [{ "itemType": "SERVICIO", "description": "Propina", "quantity": 1, "unitPriceCents": 100 }]
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_reads() {
        let (state, site) = setup().await;
        let reg = open_register(&state, &site.id).await;

        let sale = mutate(
            &state,
            "crearPOSVentaConDetalles",
            json!({
                "registerId": reg.id,
                "sellerUserId": "vendedor-1",
                "paymentMethod": "TARJETA",
                "items": [{ "itemType": "SERVICIO", "description": "Corte de cabello", "quantity": 1, "unitPriceCents": 2500 }]
            }),
        )
        .await
        .unwrap();
        let id = sale["sale"]["id"].as_str().unwrap().to_string();

        let Json(detail) = get_sale(State(state.clone()), Path(id.clone())).await.unwrap();
        assert_eq!(detail.lines.len(), 1);

        let Json(completed) = list_sales(
            State(state.clone()),
            Ok(Query(SaleFilter { status: Some(SaleStatus::Completed), ..Default::default() })),
        )
        .await
        .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, id);

        let err = get_sale(State(state), Path("ghost".to_string())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
