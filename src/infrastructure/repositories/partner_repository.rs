//! Partner Repository Implementation
//!
//! PostgreSQL implementation of the PartnerRepository trait. Integrity
//! violations raised by the `partners` constraints are reported as
//! [`PartnerStoreError`] variants; `website_links` is a JSON text column.

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::PgPool;

use crate::domain::{Partner, PartnerRecord, PartnerRepository, PartnerStoreError, WebsiteLink};
use crate::shared::error::AppError;

const PARTNER_COLUMNS: &str = "id, name, primary_hashtag, secondary_hashtag, logo_url, \
     link_meta, link_x, link_instagram, current_projects, permalink, website_links";

#[derive(Debug, sqlx::FromRow)]
struct PartnerRow {
    id: i64,
    name: String,
    primary_hashtag: String,
    secondary_hashtag: Option<String>,
    logo_url: Option<String>,
    link_meta: Option<String>,
    link_x: Option<String>,
    link_instagram: Option<String>,
    current_projects: Option<String>,
    permalink: Option<String>,
    website_links: Option<String>,
}

impl PartnerRow {
    fn into_partner(self) -> Partner {
        Partner {
            id: self.id,
            name: self.name,
            primary_hashtag: self.primary_hashtag,
            secondary_hashtag: self.secondary_hashtag,
            logo_url: self.logo_url,
            link_meta: self.link_meta,
            link_x: self.link_x,
            link_instagram: self.link_instagram,
            current_projects: self.current_projects,
            permalink: self.permalink,
            website_links: WebsiteLink::decode_list(self.website_links.as_deref()),
        }
    }
}

/// Translate a failed write into the store error the service understands.
fn store_error(e: sqlx::Error) -> PartnerStoreError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.kind() {
            ErrorKind::UniqueViolation => {
                let constraint = db_err.constraint().unwrap_or("partners").to_string();
                return PartnerStoreError::UniqueViolation(constraint);
            }
            ErrorKind::NotNullViolation => {
                return PartnerStoreError::NotNullViolation(db_err.message().to_string());
            }
            _ => {}
        }
    }
    PartnerStoreError::Other(AppError::Database(e))
}

/// PostgreSQL partner repository implementation.
#[derive(Clone)]
pub struct PgPartnerRepository {
    pool: PgPool,
}

impl PgPartnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartnerRepository for PgPartnerRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Partner>, AppError> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            "SELECT {PARTNER_COLUMNS} FROM partners WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PartnerRow::into_partner))
    }

    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<Partner>, AppError> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            "SELECT {PARTNER_COLUMNS} FROM partners WHERE permalink = $1"
        ))
        .bind(permalink)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PartnerRow::into_partner))
    }

    async fn find_all(&self) -> Result<Vec<Partner>, AppError> {
        let rows = sqlx::query_as::<_, PartnerRow>(&format!(
            "SELECT {PARTNER_COLUMNS} FROM partners ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PartnerRow::into_partner).collect())
    }

    async fn create(&self, record: &PartnerRecord) -> Result<Partner, PartnerStoreError> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            r#"
            INSERT INTO partners (name, primary_hashtag, secondary_hashtag, logo_url, link_meta,
                                  link_x, link_instagram, current_projects, permalink, website_links)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PARTNER_COLUMNS}
            "#
        ))
        .bind(&record.name)
        .bind(&record.primary_hashtag)
        .bind(&record.secondary_hashtag)
        .bind(&record.logo_url)
        .bind(&record.link_meta)
        .bind(&record.link_x)
        .bind(&record.link_instagram)
        .bind(&record.current_projects)
        .bind(&record.permalink)
        .bind(WebsiteLink::encode_list(&record.website_links))
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into_partner())
    }

    async fn update(&self, id: i64, record: &PartnerRecord) -> Result<Partner, PartnerStoreError> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            r#"
            UPDATE partners
            SET name = $2, primary_hashtag = $3, secondary_hashtag = $4, logo_url = $5,
                link_meta = $6, link_x = $7, link_instagram = $8, current_projects = $9,
                permalink = $10, website_links = $11
            WHERE id = $1
            RETURNING {PARTNER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&record.name)
        .bind(&record.primary_hashtag)
        .bind(&record.secondary_hashtag)
        .bind(&record.logo_url)
        .bind(&record.link_meta)
        .bind(&record.link_x)
        .bind(&record.link_instagram)
        .bind(&record.current_projects)
        .bind(&record.permalink)
        .bind(WebsiteLink::encode_list(&record.website_links))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(PartnerRow::into_partner)
            .ok_or_else(|| AppError::not_found("PartnerNotFound-Partner not found").into())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM partners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
