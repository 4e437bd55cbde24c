//! # Electronic Invoice Rules
//!
//! Series/correlative selection and receiver checks for SUNAT documents.
//!
//! ## Correlatives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  invoice type      series used          counter bumped                  │
//! │  ─────────────     ──────────────────   ───────────────────────         │
//! │  01 factura        factura_series F001  last_factura_number             │
//! │  03 boleta         boleta_series  B001  last_boleta_number              │
//! │  07 credit note    boleta_series  B001  last_boleta_number              │
//! │  08 debit note     boleta_series  B001  last_boleta_number              │
//! │                                                                         │
//! │  number = counter + 1, written back in the same transaction            │
//! │  (series, number) is therefore never issued twice for one RUC          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{
    InvoiceLine, InvoiceType, ReceiverDocType, SaleLine, SunatEnvironment, TaxConfig,
};
use crate::validation::{
    validate_dni, validate_id, validate_ruc, validate_series, validate_text,
};
use crate::{DEFAULT_BOLETA_SERIES, DEFAULT_FACTURA_SERIES};

/// UN/ECE rec 20 code for "unit".
pub const UNIT_CODE_UNITS: &str = "NIU";

/// Catálogo 07: taxed, onerous operation.
pub const IGV_TYPE_TAXED: &str = "10";

// =============================================================================
// Series & Counters
// =============================================================================

/// Which correlative counter of a [`TaxConfig`] an invoice draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Boleta,
    Factura,
}

impl Counter {
    /// Column holding the last issued number.
    pub const fn column(&self) -> &'static str {
        match self {
            Counter::Boleta => "last_boleta_number",
            Counter::Factura => "last_factura_number",
        }
    }
}

impl InvoiceType {
    /// Facturas have their own counter; everything else shares the boleta one.
    pub const fn counter(&self) -> Counter {
        match self {
            InvoiceType::Factura => Counter::Factura,
            InvoiceType::Boleta | InvoiceType::CreditNote | InvoiceType::DebitNote => {
                Counter::Boleta
            }
        }
    }
}

/// Issuer data copied onto every invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub ruc: String,
    pub legal_name: String,
    pub address: String,
    pub ubigeo: Option<String>,
}

impl TaxConfig {
    /// Series for `counter`, falling back to `F001`/`B001` when blank.
    pub fn series_for(&self, counter: Counter) -> String {
        let (configured, fallback) = match counter {
            Counter::Boleta => (&self.boleta_series, DEFAULT_BOLETA_SERIES),
            Counter::Factura => (&self.factura_series, DEFAULT_FACTURA_SERIES),
        };
        let trimmed = configured.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn ensure_active(&self) -> CoreResult<()> {
        if !self.active {
            return Err(CoreError::TaxConfigInactive {
                site_id: self.site_id.clone(),
            });
        }
        Ok(())
    }

    /// Issuer snapshot; ruc, legal name and address are mandatory.
    pub fn issuer(&self) -> CoreResult<Issuer> {
        let required = |value: &Option<String>, field: &str| -> CoreResult<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(CoreError::MissingIssuerData {
                    site_id: self.site_id.clone(),
                    field: field.to_string(),
                }),
            }
        };

        Ok(Issuer {
            ruc: required(&self.issuer_ruc, "issuer_ruc")?,
            legal_name: required(&self.issuer_legal_name, "issuer_legal_name")?,
            address: required(&self.issuer_address, "issuer_address")?,
            ubigeo: self.issuer_ubigeo.clone(),
        })
    }
}

/// SUNAT document id: `SERIES-NUMBER`.
///
/// ```rust
/// assert_eq!(caja_core::invoice::cbc_id("B001", 42), "B001-42");
/// ```
pub fn cbc_id(series: &str, number: i64) -> String {
    format!("{series}-{number}")
}

// =============================================================================
// Emit Input
// =============================================================================

/// Arguments of `emitirComprobante`.
///
/// Codes arrive as strings and are parsed in [`EmitInvoice::validate`] so
/// that an unknown code reports the allowed set.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmitInvoice {
    #[serde(alias = "ventaId")]
    pub sale_id: String,
    #[serde(alias = "tipo_comprobante")]
    pub invoice_type: String,
    #[serde(alias = "receptor_tipo_documento")]
    pub receiver_document_type: String,
    #[serde(default, alias = "receptor_numero_documento")]
    pub receiver_document_number: String,
    #[serde(alias = "receptor_razon_social")]
    pub receiver_name: String,
    #[serde(default, alias = "receptor_direccion")]
    pub receiver_address: Option<String>,
}

/// [`EmitInvoice`] after parsing and validation.
#[derive(Debug, Clone)]
pub struct ValidEmit {
    pub sale_id: String,
    pub invoice_type: InvoiceType,
    pub receiver_doc_type: ReceiverDocType,
    pub receiver_doc_number: String,
    pub receiver_name: String,
    pub receiver_address: Option<String>,
}

impl EmitInvoice {
    pub fn validate(&self) -> CoreResult<ValidEmit> {
        validate_id("saleId", &self.sale_id)?;
        let invoice_type: InvoiceType = self.invoice_type.trim().parse()?;
        let receiver_doc_type: ReceiverDocType = self.receiver_document_type.trim().parse()?;
        let receiver_name = validate_text("receiverName", &self.receiver_name, 250)?;
        let receiver_doc_number = self.receiver_document_number.trim().to_string();

        validate_receiver(invoice_type, receiver_doc_type, &receiver_doc_number)?;

        Ok(ValidEmit {
            sale_id: self.sale_id.clone(),
            invoice_type,
            receiver_doc_type,
            receiver_doc_number,
            receiver_name,
            receiver_address: self
                .receiver_address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        })
    }
}

/// Receiver document rules.
///
/// - DNI is 8 digits, RUC is 11 digits
/// - a factura is only issued to a RUC
pub fn validate_receiver(
    invoice_type: InvoiceType,
    doc_type: ReceiverDocType,
    doc_number: &str,
) -> CoreResult<()> {
    if invoice_type == InvoiceType::Factura && doc_type != ReceiverDocType::Ruc {
        return Err(ValidationError::not_allowed("receiverDocumentType", &["6"]).into());
    }

    match doc_type {
        ReceiverDocType::Dni => validate_dni("receiverDocumentNumber", doc_number)?,
        ReceiverDocType::Ruc => validate_ruc(doc_number).map_err(|_| {
            ValidationError::InvalidFormat {
                field: "receiverDocumentNumber".to_string(),
                reason: "must be exactly 11 digits".to_string(),
            }
        })?,
        ReceiverDocType::NoDocument => {}
    }

    Ok(())
}

impl InvoiceLine {
    /// Copies a sale line onto an invoice. Prices include IGV, so the
    /// line's own IGV is zero.
    pub fn from_sale_line(id: String, invoice_id: &str, line: &SaleLine) -> Self {
        InvoiceLine {
            id,
            invoice_id: invoice_id.to_string(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_code: UNIT_CODE_UNITS.to_string(),
            unit_price_cents: line.unit_price_cents,
            subtotal_cents: line.subtotal_cents,
            igv_cents: 0,
            igv_type: IGV_TYPE_TAXED.to_string(),
            sale_line_id: Some(line.id.clone()),
        }
    }
}

// =============================================================================
// Tax Configuration Input
// =============================================================================

/// Upsert payload for a site's SUNAT configuration.
///
/// Counters are not part of it: they only move when invoices are issued.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxConfigInput {
    pub site_id: String,
    #[serde(default = "default_boleta_series")]
    pub boleta_series: String,
    #[serde(default = "default_factura_series")]
    pub factura_series: String,
    #[serde(default)]
    pub environment: SunatEnvironment,
    #[serde(default)]
    pub issuer_ruc: Option<String>,
    #[serde(default)]
    pub issuer_legal_name: Option<String>,
    #[serde(default)]
    pub issuer_address: Option<String>,
    #[serde(default)]
    pub issuer_ubigeo: Option<String>,
    #[serde(default)]
    pub certificate_ref: Option<String>,
    #[serde(default)]
    pub sunat_endpoint: Option<String>,
    #[serde(default)]
    pub sunat_user: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_boleta_series() -> String {
    DEFAULT_BOLETA_SERIES.to_string()
}

fn default_factura_series() -> String {
    DEFAULT_FACTURA_SERIES.to_string()
}

fn default_active() -> bool {
    true
}

impl TaxConfigInput {
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("siteId", &self.site_id)?;
        validate_series("boletaSeries", &self.boleta_series)?;
        validate_series("facturaSeries", &self.factura_series)?;
        if let Some(ruc) = self.issuer_ruc.as_deref() {
            validate_ruc(ruc)?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemType;
    use chrono::Utc;

    fn config() -> TaxConfig {
        let now = Utc::now();
        TaxConfig {
            site_id: "sede-1".to_string(),
            boleta_series: "B002".to_string(),
            factura_series: "".to_string(),
            last_boleta_number: 10,
            last_factura_number: 3,
            environment: SunatEnvironment::Certification,
            issuer_ruc: Some("20601234567".to_string()),
            issuer_legal_name: Some("Restaurante SAC".to_string()),
            issuer_address: Some("Av. Lima 123".to_string()),
            issuer_ubigeo: None,
            certificate_ref: None,
            sunat_endpoint: None,
            sunat_user: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn emit(invoice_type: &str, doc_type: &str, number: &str) -> EmitInvoice {
        EmitInvoice {
            sale_id: "s1".to_string(),
            invoice_type: invoice_type.to_string(),
            receiver_document_type: doc_type.to_string(),
            receiver_document_number: number.to_string(),
            receiver_name: "Cliente".to_string(),
            receiver_address: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_counter_selection() {
        assert_eq!(InvoiceType::Factura.counter(), Counter::Factura);
        assert_eq!(InvoiceType::Boleta.counter(), Counter::Boleta);
        assert_eq!(InvoiceType::CreditNote.counter(), Counter::Boleta);
        assert_eq!(InvoiceType::DebitNote.counter(), Counter::Boleta);
    }

    #[test]
    fn test_series_fallback() {
        let cfg = config();
        assert_eq!(cfg.series_for(Counter::Boleta), "B002");
        assert_eq!(cfg.series_for(Counter::Factura), DEFAULT_FACTURA_SERIES);
    }

    #[test]
    fn test_inactive_and_missing_issuer() {
        let mut cfg = config();
        assert!(cfg.ensure_active().is_ok());
        assert_eq!(cfg.issuer().unwrap().ruc, "20601234567");

        cfg.active = false;
        assert!(matches!(cfg.ensure_active(), Err(CoreError::TaxConfigInactive { .. })));

        cfg.issuer_address = Some(" ".to_string());
        match cfg.issuer() {
            Err(CoreError::MissingIssuerData { field, .. }) => assert_eq!(field, "issuer_address"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_emit_validation() {
        let valid = emit("03", "1", "12345678").validate().unwrap();
        assert_eq!(valid.invoice_type, InvoiceType::Boleta);
        assert_eq!(valid.receiver_doc_type, ReceiverDocType::Dni);
        assert_eq!(valid.receiver_address, None);

        assert!(emit("03", "0", "").validate().is_ok());
        assert!(emit("01", "6", "20601234567").validate().is_ok());

        // Factura needs a RUC
        assert!(emit("01", "1", "12345678").validate().is_err());
        // Unknown codes
        assert!(emit("02", "1", "12345678").validate().is_err());
        assert!(emit("03", "4", "12345678").validate().is_err());
        // Wrong lengths
        assert!(emit("03", "1", "1234567").validate().is_err());
        assert!(emit("03", "6", "2060123456").validate().is_err());
    }

    #[test]
    fn test_line_from_sale_line() {
        let sale_line = SaleLine {
            id: "sl1".to_string(),
            sale_id: "s1".to_string(),
            item_type: ItemType::Product,
            product_id: Some("p1".to_string()),
            description: "Arroz".to_string(),
            quantity: 2,
            unit_price_cents: 450,
            subtotal_cents: 900,
        };
        let line = InvoiceLine::from_sale_line("il1".to_string(), "inv1", &sale_line);
        assert_eq!(line.unit_code, "NIU");
        assert_eq!(line.igv_type, "10");
        assert_eq!(line.igv_cents, 0);
        assert_eq!(line.subtotal_cents, 900);
        assert_eq!(line.sale_line_id.as_deref(), Some("sl1"));
    }

    #[test]
    fn test_tax_config_input_defaults() {
        let input: TaxConfigInput = serde_json::from_str(r#"{"siteId":"sede-1"}"#).unwrap();
        assert_eq!(input.boleta_series, "B001");
        assert_eq!(input.factura_series, "F001");
        assert!(input.active);
        assert!(input.validate().is_ok());
    }
}
