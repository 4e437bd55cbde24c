//! `emitirComprobante`.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{
    invoice as invoices, register as registers, sale as sales, tax_config as tax_configs,
};
use caja_core::invoice::EmitInvoice;
use caja_core::{Invoice, InvoiceDetail, InvoiceLine, SunatStatus, CURRENCY_PEN};

impl Database {
    /// Issues an electronic invoice for a completed sale, drawing the next
    /// correlative of the site's series.
    ///
    /// The XML, signature and CDR fields are left empty: signing and
    /// sending happen elsewhere.
    pub async fn emit_invoice(&self, input: &EmitInvoice) -> DbResult<InvoiceDetail> {
        let emit = input.validate()?;

        let mut tx = self.begin_write().await?;

        let sale = sales::fetch(&mut *tx, &emit.sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &emit.sale_id))?;
        sale.ensure_invoiceable()?;

        let register = registers::fetch(&mut *tx, &sale.register_id)
            .await?
            .ok_or_else(|| DbError::not_found("Register", &sale.register_id))?;

        let config = tax_configs::fetch(&mut *tx, &register.site_id)
            .await?
            .ok_or_else(|| DbError::not_found("TaxConfig", &register.site_id))?;
        config.ensure_active()?;
        let issuer = config.issuer()?;

        let counter = emit.invoice_type.counter();
        let series = config.series_for(counter);
        let number = tax_configs::bump_counter(&mut *tx, &config.site_id, counter).await?;

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_type: emit.invoice_type,
            series,
            number,
            issued_at: Utc::now(),
            due_date: None,
            issuer_ruc: issuer.ruc,
            issuer_legal_name: issuer.legal_name,
            issuer_address: issuer.address,
            issuer_ubigeo: issuer.ubigeo,
            receiver_doc_type: emit.receiver_doc_type,
            receiver_doc_number: emit.receiver_doc_number,
            receiver_name: emit.receiver_name,
            receiver_address: emit.receiver_address,
            subtotal_cents: sale.subtotal_cents,
            igv_cents: sale.igv_cents,
            total_cents: sale.total_cents,
            sunat_status: SunatStatus::Pending,
            sunat_response: None,
            sunat_response_code: None,
            sunat_responded_at: None,
            xml_generated: None,
            xml_signed: None,
            cdr: None,
            sale_id: Some(sale.id.clone()),
            currency: CURRENCY_PEN.to_string(),
            exchange_rate: 1.0,
            notes: None,
        };
        invoices::insert(&mut *tx, &invoice).await?;

        let sale_lines = sales::lines(&mut *tx, &sale.id).await?;
        let mut lines = Vec::with_capacity(sale_lines.len());
        for (position, sale_line) in (0_i64..).zip(&sale_lines) {
            let line = InvoiceLine::from_sale_line(Uuid::new_v4().to_string(), &invoice.id, sale_line);
            invoices::insert_line(&mut *tx, &line, position).await?;
            lines.push(line);
        }

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            cbc_id = %invoice.cbc_id(),
            invoice_type = %invoice.invoice_type,
            sale_id = %sale.id,
            total = %sale.total(),
            "Invoice issued"
        );
        Ok(InvoiceDetail { invoice, lines })
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::invoice::InvoiceFilter;
    use crate::repository::test_support::{open_register, product, product_sale, setup, tax_input};
    use crate::{Database, DbError};
    use caja_core::invoice::EmitInvoice;
    use caja_core::sale::VoidSale;
    use caja_core::{
        CoreError, InvoiceType, ReceiverDocType, Site, SunatStatus, ValidationError,
    };

    /// Site configured for invoicing plus one completed sale of 3 × 4.50.
    async fn sold(db: &Database, site: &Site) -> String {
        db.tax_configs().upsert(&tax_input(&site.id)).await.unwrap();
        let reg = open_register(db, &site.id, 0).await;
        let rice = product(db, &site.id, "Arroz 1kg", 20, 450).await;
        db.create_sale(&product_sale(&reg.id, &rice, 3)).await.unwrap().sale.id
    }

    fn emit(sale_id: &str, invoice_type: &str, doc_type: &str, doc_number: &str) -> EmitInvoice {
        EmitInvoice {
            sale_id: sale_id.to_string(),
            invoice_type: invoice_type.to_string(),
            receiver_document_type: doc_type.to_string(),
            receiver_document_number: doc_number.to_string(),
            receiver_name: "Comercial Andina S.A.C.".to_string(),
            receiver_address: Some("Av. Arequipa 1200".to_string()),
        }
    }

    #[tokio::test]
    async fn test_emit_boleta() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;

        let detail = db.emit_invoice(&emit(&sale_id, "03", "1", "45678912")).await.unwrap();
        let invoice = &detail.invoice;

        assert_eq!(invoice.invoice_type, InvoiceType::Boleta);
        assert_eq!(invoice.cbc_id(), "B001-1");
        assert_eq!(invoice.receiver_doc_type, ReceiverDocType::Dni);
        assert_eq!(invoice.sunat_status, SunatStatus::Pending);
        assert_eq!(invoice.total_cents, 1_350);
        assert_eq!(invoice.issuer_ruc, "20100066603");
        assert_eq!(invoice.currency, "PEN");
        assert!(invoice.xml_signed.is_none());

        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].unit_code, "NIU");
        assert_eq!(detail.lines[0].subtotal_cents, 1_350);

        let stored = db.invoices().get_detail(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 1);
        assert_eq!(db.invoices().list_for_sale(&sale_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counters_per_type() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;

        let b1 = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap();
        let f1 = db.emit_invoice(&emit(&sale_id, "01", "6", "20512345678")).await.unwrap();
        let nc = db.emit_invoice(&emit(&sale_id, "07", "1", "45678912")).await.unwrap();
        let f2 = db.emit_invoice(&emit(&sale_id, "01", "6", "20512345678")).await.unwrap();
        let nd = db.emit_invoice(&emit(&sale_id, "08", "0", "")).await.unwrap();

        assert_eq!(b1.invoice.cbc_id(), "B001-1");
        assert_eq!(f1.invoice.cbc_id(), "F001-1");
        assert_eq!(nc.invoice.cbc_id(), "B001-2");
        assert_eq!(f2.invoice.cbc_id(), "F001-2");
        assert_eq!(nd.invoice.cbc_id(), "B001-3");

        let config = db.tax_configs().get(&site.id).await.unwrap().unwrap();
        assert_eq!(config.last_boleta_number, 3);
        assert_eq!(config.last_factura_number, 2);
    }

    #[tokio::test]
    async fn test_blank_series_falls_back() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;
        sqlx::query("UPDATE tax_configs SET factura_series = '' WHERE site_id = ?1")
            .bind(&site.id)
            .execute(db.pool())
            .await
            .unwrap();

        let f = db.emit_invoice(&emit(&sale_id, "01", "6", "20512345678")).await.unwrap();
        assert_eq!(f.invoice.series, "F001");
    }

    #[tokio::test]
    async fn test_factura_requires_ruc() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;

        let err = db.emit_invoice(&emit(&sale_id, "01", "1", "45678912")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(ValidationError::NotAllowed { .. }))));

        let err = db.emit_invoice(&emit(&sale_id, "03", "1", "123")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = db.emit_invoice(&emit(&sale_id, "02", "0", "")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // Failed attempts consume no correlative
        let config = db.tax_configs().get(&site.id).await.unwrap().unwrap();
        assert_eq!(config.last_factura_number, 0);
        assert_eq!(config.last_boleta_number, 0);
    }

    #[tokio::test]
    async fn test_inactive_or_missing_config() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;

        let mut input = tax_input(&site.id);
        input.active = false;
        db.tax_configs().upsert(&input).await.unwrap();
        let err = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TaxConfigInactive { .. })));

        let mut input = tax_input(&site.id);
        input.issuer_legal_name = None;
        db.tax_configs().upsert(&input).await.unwrap();
        let err = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::MissingIssuerData { ref field, .. }) if field == "issuer_legal_name"
        ));

        sqlx::query("DELETE FROM tax_configs").execute(db.pool()).await.unwrap();
        let err = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "TaxConfig"));
    }

    #[tokio::test]
    async fn test_cancelled_sale_cannot_be_invoiced() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;
        db.void_sale(&VoidSale { sale_id: sale_id.clone(), reason: None }).await.unwrap();

        let err = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidSaleStatus { .. })));

        let err = db.emit_invoice(&emit("ghost", "03", "0", "")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Sale"));
    }

    #[tokio::test]
    async fn test_list_and_status_update() {
        let (db, site) = setup().await;
        let sale_id = sold(&db, &site).await;

        let boleta = db.emit_invoice(&emit(&sale_id, "03", "0", "")).await.unwrap().invoice;
        let mut factura_args = emit(&sale_id, "01", "6", "20512345678");
        factura_args.receiver_name = "Distribuidora Norte E.I.R.L.".to_string();
        let factura = db.emit_invoice(&factura_args).await.unwrap().invoice;

        let repo = db.invoices();
        let all = repo.list(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, factura.id);

        let facturas = repo
            .list(&InvoiceFilter { invoice_type: Some(InvoiceType::Factura), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(facturas.len(), 1);

        let by_name = repo
            .list(&InvoiceFilter { receiver_name: Some("norte".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, factura.id);

        let by_number = repo
            .list(&InvoiceFilter {
                series: Some("B001".to_string()),
                number: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].id, boleta.id);

        let accepted = repo
            .update_sunat_status(&boleta.id, SunatStatus::Accepted, Some("0"), Some("La Boleta ha sido aceptada"))
            .await
            .unwrap();
        assert_eq!(accepted.sunat_status, SunatStatus::Accepted);
        assert!(accepted.sunat_responded_at.is_some());

        let pending = repo
            .list(&InvoiceFilter { sunat_status: Some(SunatStatus::Pending), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, factura.id);

        assert!(matches!(
            repo.update_sunat_status("ghost", SunatStatus::Rejected, None, None).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }
}
