//! Partner Service
//!
//! CRUD over partner organisations. Database constraint violations surface
//! as `NameExists` and `NullName`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::domain::{Partner, PartnerRecord, PartnerRepository, PartnerStoreError, WebsiteLink};
use crate::shared::error::AppError;

/// Partner service trait
#[async_trait]
pub trait PartnerService: Send + Sync {
    async fn get_partner_by_id(&self, partner_id: i64) -> Result<Partner, PartnerError>;

    async fn get_partner_by_permalink(&self, permalink: &str) -> Result<Partner, PartnerError>;

    async fn get_all_partners(&self) -> Result<Vec<Partner>, PartnerError>;

    async fn create_partner(&self, dto: CreatePartnerDto) -> Result<Partner, PartnerError>;

    /// Overwrite the provided fields; website links are rebuilt from the payload.
    async fn update_partner(&self, partner_id: i64, dto: UpdatePartnerDto)
        -> Result<Partner, PartnerError>;

    async fn delete_partner(&self, partner_id: i64) -> Result<(), PartnerError>;
}

/// Create partner request
#[derive(Debug, Clone, Default)]
pub struct CreatePartnerDto {
    pub name: Option<String>,
    pub primary_hashtag: Option<String>,
    pub secondary_hashtag: Option<String>,
    pub logo_url: Option<String>,
    pub link_meta: Option<String>,
    pub link_x: Option<String>,
    pub link_instagram: Option<String>,
    pub current_projects: Option<String>,
    pub permalink: Option<String>,
    pub website_links: Vec<WebsiteLink>,
}

/// Update partner request
///
/// Outer `None` leaves a column untouched; `Some(None)` is an explicit null
/// and reaches the store as such.
#[derive(Debug, Clone, Default)]
pub struct UpdatePartnerDto {
    pub name: Option<Option<String>>,
    pub primary_hashtag: Option<Option<String>>,
    pub secondary_hashtag: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
    pub link_meta: Option<Option<String>>,
    pub link_x: Option<Option<String>>,
    pub link_instagram: Option<Option<String>>,
    pub current_projects: Option<Option<String>>,
    pub permalink: Option<Option<String>>,
    pub website_links: Vec<WebsiteLink>,
}

/// Partner service errors
#[derive(Debug, thiserror::Error)]
pub enum PartnerError {
    #[error("PartnerNotFound-Partner not found")]
    NotFound,

    #[error("PartnerNotFound-Partner cannot be deleted")]
    CannotDelete,

    #[error("NameExists-Partner name already exists")]
    NameExists,

    #[error("NullName-Partner name and primary hashtag cannot be null")]
    NullName,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<PartnerStoreError> for PartnerError {
    fn from(err: PartnerStoreError) -> Self {
        match err {
            PartnerStoreError::UniqueViolation(constraint) => {
                error!(constraint = %constraint, "Partner insert violated a unique constraint");
                PartnerError::NameExists
            }
            PartnerStoreError::NotNullViolation(column) => {
                error!(column = %column, "Partner insert violated a not-null constraint");
                PartnerError::NullName
            }
            PartnerStoreError::Other(e) => PartnerError::Store(e),
        }
    }
}

impl From<PartnerError> for AppError {
    fn from(err: PartnerError) -> Self {
        match err {
            PartnerError::NotFound => AppError::not_found(PartnerError::NotFound),
            PartnerError::Store(e) => e,
            other => AppError::bad_request(other),
        }
    }
}

/// PartnerService implementation
pub struct PartnerServiceImpl<R>
where
    R: PartnerRepository,
{
    partner_repo: Arc<R>,
}

impl<R> PartnerServiceImpl<R>
where
    R: PartnerRepository,
{
    pub fn new(partner_repo: Arc<R>) -> Self {
        Self { partner_repo }
    }
}

#[async_trait]
impl<R> PartnerService for PartnerServiceImpl<R>
where
    R: PartnerRepository + 'static,
{
    async fn get_partner_by_id(&self, partner_id: i64) -> Result<Partner, PartnerError> {
        self.partner_repo
            .find_by_id(partner_id)
            .await?
            .ok_or(PartnerError::NotFound)
    }

    async fn get_partner_by_permalink(&self, permalink: &str) -> Result<Partner, PartnerError> {
        self.partner_repo
            .find_by_permalink(permalink)
            .await?
            .ok_or(PartnerError::NotFound)
    }

    async fn get_all_partners(&self) -> Result<Vec<Partner>, PartnerError> {
        Ok(self.partner_repo.find_all().await?)
    }

    async fn create_partner(&self, dto: CreatePartnerDto) -> Result<Partner, PartnerError> {
        let record = PartnerRecord {
            name: dto.name,
            primary_hashtag: dto.primary_hashtag,
            secondary_hashtag: dto.secondary_hashtag,
            logo_url: dto.logo_url,
            link_meta: dto.link_meta,
            link_x: dto.link_x,
            link_instagram: dto.link_instagram,
            current_projects: dto.current_projects,
            permalink: dto.permalink,
            website_links: dto.website_links,
        };

        let partner = self.partner_repo.create(&record).await?;
        info!(partner_id = partner.id, "Partner created");
        Ok(partner)
    }

    async fn update_partner(
        &self,
        partner_id: i64,
        dto: UpdatePartnerDto,
    ) -> Result<Partner, PartnerError> {
        let current = self.get_partner_by_id(partner_id).await?;
        let mut record = PartnerRecord::from(current);

        let overwrite = |slot: &mut Option<String>, value: Option<Option<String>>| {
            if let Some(value) = value {
                *slot = value;
            }
        };
        overwrite(&mut record.name, dto.name);
        overwrite(&mut record.primary_hashtag, dto.primary_hashtag);
        overwrite(&mut record.secondary_hashtag, dto.secondary_hashtag);
        overwrite(&mut record.logo_url, dto.logo_url);
        overwrite(&mut record.link_meta, dto.link_meta);
        overwrite(&mut record.link_x, dto.link_x);
        overwrite(&mut record.link_instagram, dto.link_instagram);
        overwrite(&mut record.current_projects, dto.current_projects);
        overwrite(&mut record.permalink, dto.permalink);
        record.website_links = dto.website_links;

        Ok(self.partner_repo.update(partner_id, &record).await?)
    }

    async fn delete_partner(&self, partner_id: i64) -> Result<(), PartnerError> {
        if self.partner_repo.delete(partner_id).await? {
            info!(partner_id, "Partner deleted");
            Ok(())
        } else {
            Err(PartnerError::CannotDelete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryPartnerRepository;
    use axum::http::StatusCode;
    use fake::faker::company::en::CompanyName;
    use fake::Fake;
    use pretty_assertions::assert_eq;

    fn service() -> PartnerServiceImpl<InMemoryPartnerRepository> {
        PartnerServiceImpl::new(Arc::new(InMemoryPartnerRepository::default()))
    }

    fn create_dto(name: &str) -> CreatePartnerDto {
        CreatePartnerDto {
            name: Some(name.to_string()),
            primary_hashtag: Some("#mapping".into()),
            permalink: Some(name.to_lowercase().replace(' ', "-")),
            website_links: vec![WebsiteLink { name: "Home".into(), url: "https://example.org".into() }],
            ..CreatePartnerDto::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let svc = service();
        let name: String = CompanyName().fake();
        let created = svc.create_partner(create_dto(&name)).await.unwrap();

        assert_eq!(svc.get_partner_by_id(created.id).await.unwrap(), created);
        let permalink = created.permalink.clone().unwrap();
        assert_eq!(svc.get_partner_by_permalink(&permalink).await.unwrap().id, created.id);
        assert_eq!(svc.get_all_partners().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_name_exists() {
        let svc = service();
        svc.create_partner(create_dto("HOT")).await.unwrap();
        let err = svc.create_partner(create_dto("HOT")).await.unwrap_err();
        assert!(matches!(err, PartnerError::NameExists));

        let err: AppError = err.into();
        assert_eq!(err.status_and_sub_code(), (StatusCode::BAD_REQUEST, "NameExists"));
    }

    #[tokio::test]
    async fn test_null_name_is_null_name() {
        let svc = service();
        let dto = CreatePartnerDto { name: None, ..create_dto("HOT") };
        assert!(matches!(svc.create_partner(dto).await, Err(PartnerError::NullName)));

        let created = svc.create_partner(create_dto("HOT")).await.unwrap();
        let update = UpdatePartnerDto { name: Some(None), ..UpdatePartnerDto::default() };
        assert!(matches!(
            svc.update_partner(created.id, update).await,
            Err(PartnerError::NullName)
        ));
    }

    #[tokio::test]
    async fn test_update_overwrites_given_fields_and_rebuilds_links() {
        let svc = service();
        let created = svc.create_partner(create_dto("HOT")).await.unwrap();

        let updated = svc
            .update_partner(
                created.id,
                UpdatePartnerDto {
                    logo_url: Some(Some("https://example.org/logo.png".into())),
                    secondary_hashtag: Some(None),
                    ..UpdatePartnerDto::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "HOT");
        assert_eq!(updated.logo_url.as_deref(), Some("https://example.org/logo.png"));
        assert_eq!(updated.secondary_hashtag, None);
        assert_eq!(updated.permalink, created.permalink);
        assert!(updated.website_links.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_partner() {
        let svc = service();
        let err: AppError = svc.delete_partner(42).await.unwrap_err().into();
        match err {
            AppError::BadRequest { sub_code, message } => {
                assert_eq!(sub_code, "PartnerNotFound");
                assert_eq!(message, "Partner cannot be deleted");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err: AppError = svc.get_partner_by_id(42).await.unwrap_err().into();
        assert_eq!(err.status_and_sub_code(), (StatusCode::NOT_FOUND, "PartnerNotFound"));
    }
}
