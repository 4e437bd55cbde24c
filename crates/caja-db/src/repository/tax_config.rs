//! # Tax Configuration Repository
//!
//! One SUNAT configuration row per site, including the two correlative
//! counters.
//!
//! ## Correlatives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  emitirComprobante (inside the invoice transaction)                    │
//! │                                                                         │
//! │    UPDATE tax_configs                                                  │
//! │    SET last_boleta_number = last_boleta_number + 1                     │
//! │    WHERE site_id = ?                                                   │
//! │    RETURNING last_boleta_number          → 43 becomes B001-43          │
//! │                                                                         │
//! │  Read and increment are one statement: two cashiers emitting at the    │
//! │  same moment get 43 and 44, never 43 twice. If the invoice insert      │
//! │  fails afterwards, the rollback returns the number.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use caja_core::invoice::{Counter, TaxConfigInput};
use caja_core::TaxConfig;

const TAX_CONFIG_COLUMNS: &str = r#"
    site_id, boleta_series, factura_series, last_boleta_number, last_factura_number,
    environment, issuer_ruc, issuer_legal_name, issuer_address, issuer_ubigeo,
    certificate_ref, sunat_endpoint, sunat_user, active, created_at, updated_at
"#;

/// Repository for SUNAT configuration.
#[derive(Debug, Clone)]
pub struct TaxConfigRepository {
    pool: SqlitePool,
}

impl TaxConfigRepository {
    /// Creates a new TaxConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaxConfigRepository { pool }
    }

    /// Creates or replaces a site's configuration. Counters are preserved
    /// on update and start at 0 on insert.
    pub async fn upsert(&self, input: &TaxConfigInput) -> DbResult<TaxConfig> {
        input.validate()?;

        if super::site::fetch(&self.pool, &input.site_id).await?.is_none() {
            return Err(DbError::not_found("Site", &input.site_id));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO tax_configs (
                site_id, boleta_series, factura_series, last_boleta_number, last_factura_number,
                environment, issuer_ruc, issuer_legal_name, issuer_address, issuer_ubigeo,
                certificate_ref, sunat_endpoint, sunat_user, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(site_id) DO UPDATE SET
                boleta_series = excluded.boleta_series,
                factura_series = excluded.factura_series,
                environment = excluded.environment,
                issuer_ruc = excluded.issuer_ruc,
                issuer_legal_name = excluded.issuer_legal_name,
                issuer_address = excluded.issuer_address,
                issuer_ubigeo = excluded.issuer_ubigeo,
                certificate_ref = excluded.certificate_ref,
                sunat_endpoint = excluded.sunat_endpoint,
                sunat_user = excluded.sunat_user,
                active = excluded.active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&input.site_id)
        .bind(input.boleta_series.trim())
        .bind(input.factura_series.trim())
        .bind(input.environment)
        .bind(&input.issuer_ruc)
        .bind(&input.issuer_legal_name)
        .bind(&input.issuer_address)
        .bind(&input.issuer_ubigeo)
        .bind(&input.certificate_ref)
        .bind(&input.sunat_endpoint)
        .bind(&input.sunat_user)
        .bind(input.active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let config = fetch(&self.pool, &input.site_id)
            .await?
            .ok_or_else(|| DbError::not_found("TaxConfig", &input.site_id))?;

        info!(
            site_id = %config.site_id,
            environment = %config.environment,
            active = config.active,
            "SUNAT configuration saved"
        );
        Ok(config)
    }

    /// Gets a site's configuration.
    pub async fn get(&self, site_id: &str) -> DbResult<Option<TaxConfig>> {
        fetch(&self.pool, site_id).await
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, site_id: &str) -> DbResult<Option<TaxConfig>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {TAX_CONFIG_COLUMNS} FROM tax_configs WHERE site_id = ?1");
    let config = sqlx::query_as::<_, TaxConfig>(&sql)
        .bind(site_id)
        .fetch_optional(exec)
        .await?;
    Ok(config)
}

/// Increments one counter and returns its new value.
pub(crate) async fn bump_counter<'e, E>(exec: E, site_id: &str, counter: Counter) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    // Column names come from a closed enum, never from input.
    let column = counter.column();
    let sql = format!(
        "UPDATE tax_configs SET {column} = {column} + 1, updated_at = ?2 WHERE site_id = ?1 RETURNING {column}"
    );

    let number: Option<i64> = sqlx::query_scalar(&sql)
        .bind(site_id)
        .bind(Utc::now())
        .fetch_optional(exec)
        .await?;

    let number = number.ok_or_else(|| DbError::not_found("TaxConfig", site_id))?;
    debug!(site_id = %site_id, counter = column, number, "Correlative reserved");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::bump_counter;
    use crate::repository::test_support::{setup, tax_input};
    use crate::DbError;
    use caja_core::invoice::Counter;
    use caja_core::SunatEnvironment;

    #[tokio::test]
    async fn test_upsert_keeps_counters() {
        let (db, site) = setup().await;
        let repo = db.tax_configs();

        let created = repo.upsert(&tax_input(&site.id)).await.unwrap();
        assert_eq!(created.last_boleta_number, 0);
        assert!(created.active);

        assert_eq!(bump_counter(db.pool(), &site.id, Counter::Boleta).await.unwrap(), 1);
        assert_eq!(bump_counter(db.pool(), &site.id, Counter::Boleta).await.unwrap(), 2);
        assert_eq!(bump_counter(db.pool(), &site.id, Counter::Factura).await.unwrap(), 1);

        let mut input = tax_input(&site.id);
        input.environment = SunatEnvironment::Production;
        input.boleta_series = "B002".to_string();
        let updated = repo.upsert(&input).await.unwrap();

        assert_eq!(updated.environment, SunatEnvironment::Production);
        assert_eq!(updated.boleta_series, "B002");
        assert_eq!(updated.last_boleta_number, 2);
        assert_eq!(updated.last_factura_number, 1);
    }

    #[tokio::test]
    async fn test_bump_without_config() {
        let (db, site) = setup().await;
        let err = bump_counter(db.pool(), &site.id, Counter::Factura).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "TaxConfig"));
        assert!(db.tax_configs().get(&site.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_series() {
        let (db, site) = setup().await;
        let mut input = tax_input(&site.id);
        input.factura_series = "f1".to_string();
        assert!(matches!(db.tax_configs().upsert(&input).await.unwrap_err(), DbError::Domain(_)));
    }
}
