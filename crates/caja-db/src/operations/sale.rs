//! `crearPOSVentaConDetalles` and `anularPOSVenta`.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{product as products, register as registers, sale as sales};
use caja_core::sale::{check_stock, NewSale, VoidSale};
use caja_core::ticket::next_ticket_number;
use caja_core::{Sale, SaleDetail, SaleLine, SaleStatus};

/// Trims optional free text; blank becomes `None`.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Database {
    /// Rings up a sale on an open register and takes its products out of
    /// stock.
    pub async fn create_sale(&self, input: &NewSale) -> DbResult<SaleDetail> {
        input.validate()?;
        let totals = input.totals()?;
        let demand = input.stock_demand();

        let mut tx = self.begin_write().await?;

        let register = registers::fetch(&mut *tx, &input.register_id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &input.register_id))?;
        register.ensure_open()?;

        for (product_id, requested) in &demand {
            let product = products::fetch(&mut *tx, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;
            check_stock(&product, *requested)?;
        }

        let tickets = sales::ticket_numbers(&mut *tx, &register.id).await?;
        let ticket_number = next_ticket_number(&tickets);

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            ticket_number,
            register_id: register.id.clone(),
            seller_user_id: input.seller_user_id.trim().to_string(),
            customer_name: non_blank(input.customer_name.as_deref()),
            customer_dni: non_blank(input.customer_dni.as_deref()),
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            igv_cents: totals.igv.cents(),
            total_cents: totals.total.cents(),
            payment_method: input.payment_method,
            status: SaleStatus::Completed,
            notes: non_blank(input.notes.as_deref()),
            sold_at: now,
            modified_at: None,
            version: 1,
        };
        sales::insert(&mut *tx, &sale).await?;

        let mut lines = Vec::with_capacity(input.items.len());
        for (position, item) in (0_i64..).zip(&input.items) {
            let line = SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                item_type: item.item_type,
                product_id: item.stocked_product().map(str::to_string),
                description: item.description.trim().to_string(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal()?.cents(),
            };
            sales::insert_line(&mut *tx, &line, position).await?;
            lines.push(line);
        }

        for (product_id, requested) in &demand {
            // Re-checked by the UPDATE guard; a miss rolls the sale back.
            products::take_stock_or_fail(&mut *tx, product_id, *requested, now).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            register_id = %sale.register_id,
            ticket = %sale.ticket_number,
            lines = lines.len(),
            total = %sale.total(),
            payment_method = %sale.payment_method,
            "Sale completed"
        );
        Ok(SaleDetail { sale, lines })
    }

    /// Voids a completed sale and puts its products back in stock.
    pub async fn void_sale(&self, input: &VoidSale) -> DbResult<Sale> {
        input.validate()?;
        let reason = input.reason();

        let mut tx = self.begin_write().await?;

        let sale = sales::fetch(&mut *tx, &input.sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &input.sale_id))?;
        sale.ensure_voidable()?;

        let now = Utc::now();
        sales::mark_cancelled(&mut *tx, &sale, &reason, now).await?;

        let lines = sales::lines(&mut *tx, &sale.id).await?;
        let mut restocked = 0;
        for line in &lines {
            let Some(product_id) = line.stocked_product() else {
                continue;
            };
            if products::restore_stock(&mut *tx, product_id, line.quantity, now).await? {
                restocked += 1;
            } else {
                debug!(product_id = %product_id, "Product gone, nothing to restock");
            }
        }

        let voided = sales::fetch(&mut *tx, &sale.id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &sale.id))?;

        tx.commit().await?;

        info!(
            sale_id = %voided.id,
            ticket = %voided.ticket_number,
            restocked_lines = restocked,
            reason = %reason,
            "Sale voided"
        );
        Ok(voided)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{
        open_register, product, product_sale, register, remove_database, setup, setup_file,
    };
    use crate::DbError;
    use caja_core::sale::{NewSale, SaleItemInput, VoidSale};
    use caja_core::{CoreError, ItemType, PaymentMethod, SaleStatus, DEFAULT_VOID_REASON};

    fn service(description: &str, price: i64) -> SaleItemInput {
        SaleItemInput {
            item_type: ItemType::Service,
            product_id: None,
            description: description.to_string(),
            quantity: 1,
            unit_price_cents: price,
        }
    }

    #[tokio::test]
    async fn test_create_sale_persists_and_takes_stock() {
        let (db, site) = setup().await;
        let reg = open_register(&db, &site.id, 0).await;
        let rice = product(&db, &site.id, "Arroz 1kg", 10, 450).await;

        let mut input = product_sale(&reg.id, &rice, 3);
        input.items.push(service("Delivery", 500));
        input.discount_cents = 150;
        input.payment_method = PaymentMethod::Yape;
        input.customer_name = Some("  ".to_string());

        let detail = db.create_sale(&input).await.unwrap();
        let sale = &detail.sale;
        assert_eq!(sale.ticket_number, "00000001");
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.subtotal_cents, 1_850);
        assert_eq!(sale.discount_cents, 150);
        assert_eq!(sale.igv_cents, 0);
        assert_eq!(sale.total_cents, 1_700);
        assert_eq!(sale.payment_method, PaymentMethod::Yape);
        assert!(sale.customer_name.is_none());

        assert_eq!(detail.lines.len(), 2);
        assert_eq!(detail.lines[0].subtotal_cents, 1_350);
        assert_eq!(detail.lines[1].item_type, ItemType::Service);
        assert!(detail.lines[1].product_id.is_none());

        let stored = db.sales().get_detail(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 2);
        assert_eq!(stored.lines[0].product_id.as_deref(), Some(rice.id.as_str()));

        let rice_after = db.products().get_by_id(&rice.id).await.unwrap().unwrap();
        assert_eq!(rice_after.stock, 7);
        assert_eq!(rice_after.version, rice.version + 1);
    }

    #[tokio::test]
    async fn test_ticket_numbers_increase_per_register() {
        let (db, site) = setup().await;
        let a = open_register(&db, &site.id, 0).await;
        let b = open_register(&db, &site.id, 0).await;
        let item = product(&db, &site.id, "Galleta", 100, 100).await;

        let t1 = db.create_sale(&product_sale(&a.id, &item, 1)).await.unwrap();
        let t2 = db.create_sale(&product_sale(&a.id, &item, 1)).await.unwrap();
        let other = db.create_sale(&product_sale(&b.id, &item, 1)).await.unwrap();

        assert_eq!(t1.sale.ticket_number, "00000001");
        assert_eq!(t2.sale.ticket_number, "00000002");
        assert_eq!(other.sale.ticket_number, "00000001");

        // Voided tickets still count
        db.void_sale(&VoidSale { sale_id: t2.sale.id, reason: None }).await.unwrap();
        let t3 = db.create_sale(&product_sale(&a.id, &item, 1)).await.unwrap();
        assert_eq!(t3.sale.ticket_number, "00000003");
    }

    #[tokio::test]
    async fn test_insufficient_stock_aggregates_lines() {
        let (db, site) = setup().await;
        let reg = open_register(&db, &site.id, 0).await;
        let soda = product(&db, &site.id, "Inca Kola 500ml", 5, 250).await;

        // 3 + 3 > 5 even though each line fits
        let mut input = product_sale(&reg.id, &soda, 3);
        input.items.push(input.items[0].clone());

        let err = db.create_sale(&input).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock { product, available, requested }) => {
                assert_eq!(product, "Inca Kola 500ml");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing was written
        let after = db.products().get_by_id(&soda.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 5);
        assert!(db.sales().list(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_requires_open_register() {
        let (db, site) = setup().await;
        let reg = register(&db, &site.id).await;
        let item = product(&db, &site.id, "Agua", 10, 150).await;

        let err = db.create_sale(&product_sale(&reg.id, &item, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::RegisterNotOpen { .. })));

        let err = db.create_sale(&product_sale("ghost", &item, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Register"));
    }

    #[tokio::test]
    async fn test_sale_rejects_bad_input() {
        let (db, site) = setup().await;
        let reg = open_register(&db, &site.id, 0).await;
        let item = product(&db, &site.id, "Agua", 10, 150).await;

        let empty = NewSale { items: vec![], ..product_sale(&reg.id, &item, 1) };
        assert!(matches!(
            db.create_sale(&empty).await.unwrap_err(),
            DbError::Domain(CoreError::EmptySale)
        ));

        let mut over_discount = product_sale(&reg.id, &item, 1);
        over_discount.discount_cents = 151;
        assert!(matches!(
            db.create_sale(&over_discount).await.unwrap_err(),
            DbError::Domain(CoreError::DiscountExceedsSubtotal { .. })
        ));

        let mut ghost = product_sale(&reg.id, &item, 1);
        ghost.items[0].product_id = Some("ghost".to_string());
        assert!(matches!(
            db.create_sale(&ghost).await.unwrap_err(),
            DbError::NotFound { ref entity, .. } if entity == "Product"
        ));
    }

    #[tokio::test]
    async fn test_void_restocks_once() {
        let (db, site) = setup().await;
        let reg = open_register(&db, &site.id, 0).await;
        let item = product(&db, &site.id, "Leche", 10, 400).await;

        let sale = db.create_sale(&product_sale(&reg.id, &item, 4)).await.unwrap().sale;
        let voided = db
            .void_sale(&VoidSale { sale_id: sale.id.clone(), reason: Some(" Cliente desistió ".to_string()) })
            .await
            .unwrap();

        assert_eq!(voided.status, SaleStatus::Cancelled);
        assert_eq!(voided.notes.as_deref(), Some("Cliente desistió"));
        assert!(voided.modified_at.is_some());
        assert_eq!(voided.version, sale.version + 1);
        assert_eq!(db.products().get_by_id(&item.id).await.unwrap().unwrap().stock, 10);

        let err = db
            .void_sale(&VoidSale { sale_id: sale.id.clone(), reason: None })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidSaleStatus { .. })));
        assert_eq!(db.products().get_by_id(&item.id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_void_default_reason_and_services() {
        let (db, site) = setup().await;
        let reg = open_register(&db, &site.id, 0).await;
        let item = product(&db, &site.id, "Leche", 10, 400).await;

        let mut input = product_sale(&reg.id, &item, 1);
        input.items = vec![service("Recarga", 1_000)];
        let sale = db.create_sale(&input).await.unwrap().sale;

        let voided = db.void_sale(&VoidSale { sale_id: sale.id, reason: None }).await.unwrap();
        assert_eq!(voided.notes.as_deref(), Some(DEFAULT_VOID_REASON));

        let err = db
            .void_sale(&VoidSale { sale_id: "ghost".to_string(), reason: None })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_across_registers() {
        let (db, site, path) = setup_file(8).await;
        let water = product(&db, &site.id, "Agua San Luis 625ml", 1_000, 150).await;

        let mut registers = Vec::new();
        for _ in 0..8 {
            registers.push(open_register(&db, &site.id, 0).await);
        }

        let mut handles = Vec::new();
        for reg in &registers {
            for _ in 0..10 {
                let db = db.clone();
                let input = product_sale(&reg.id, &water, 1);
                handles.push(tokio::spawn(async move { db.create_sale(&input).await }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.products().get_by_id(&water.id).await.unwrap().unwrap().stock, 920);
        for reg in &registers {
            let mut tickets: Vec<String> = db
                .sales()
                .list(&crate::SaleFilter { register_id: Some(reg.id.clone()), ..Default::default() })
                .await
                .unwrap()
                .into_iter()
                .map(|sale| sale.ticket_number)
                .collect();
            tickets.sort();
            let expected: Vec<String> = (1..=10).map(|n| format!("{n:08}")).collect();
            assert_eq!(tickets, expected);
        }

        remove_database(db, &path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_for_last_units() {
        let (db, site, path) = setup_file(6).await;
        let cake = product(&db, &site.id, "Torta de chocolate", 5, 3_500).await;
        let reg = open_register(&db, &site.id, 0).await;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let db = db.clone();
                let input = product_sale(&reg.id, &cake, 1);
                tokio::spawn(async move { db.create_sale(&input).await })
            })
            .collect();

        let (mut sold, mut refused) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sold += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!((sold, refused), (5, 15));
        assert_eq!(db.products().get_by_id(&cake.id).await.unwrap().unwrap().stock, 0);

        // Racing voids of one sale: one wins, the rest see it already voided
        let sale_id = db.sales().list(&Default::default()).await.unwrap()[0].id.clone();
        let voids: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                let input = VoidSale { sale_id: sale_id.clone(), reason: None };
                tokio::spawn(async move { db.void_sale(&input).await })
            })
            .collect();
        let mut voided = 0;
        for handle in voids {
            match handle.await.unwrap() {
                Ok(_) => voided += 1,
                Err(DbError::Domain(CoreError::InvalidSaleStatus { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(voided, 1);
        assert_eq!(db.products().get_by_id(&cake.id).await.unwrap().unwrap().stock, 1);

        remove_database(db, &path).await;
    }
}
