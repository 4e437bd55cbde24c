//! # Site Repository
//!
//! Sites (sedes) own products, registers and the SUNAT configuration.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use caja_core::catalog::NewSite;
use caja_core::Site;

/// Repository for site database operations.
#[derive(Debug, Clone)]
pub struct SiteRepository {
    pool: SqlitePool,
}

impl SiteRepository {
    /// Creates a new SiteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SiteRepository { pool }
    }

    /// Creates a site.
    pub async fn create(&self, input: &NewSite) -> DbResult<Site> {
        input.validate()?;

        let now = Utc::now();
        let site = Site {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            ruc: input.ruc.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sites (id, name, address, phone, ruc, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&site.id)
        .bind(&site.name)
        .bind(&site.address)
        .bind(&site.phone)
        .bind(&site.ruc)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&self.pool)
        .await?;

        info!(site_id = %site.id, name = %site.name, "Site created");
        Ok(site)
    }

    /// Gets a site by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Site>> {
        fetch(&self.pool, id).await
    }

    /// Lists all sites by name.
    pub async fn list(&self) -> DbResult<Vec<Site>> {
        debug!("Listing sites");
        let sites = sqlx::query_as::<_, Site>(
            r#"
            SELECT id, name, address, phone, ruc, created_at, updated_at
            FROM sites
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sites)
    }
}

pub(crate) async fn fetch<'e, E>(exec: E, id: &str) -> DbResult<Option<Site>>
where
    E: SqliteExecutor<'e>,
{
    let site = sqlx::query_as::<_, Site>(
        r#"
        SELECT id, name, address, phone, ruc, created_at, updated_at
        FROM sites
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(site)
}
