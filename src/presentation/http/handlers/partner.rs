//! Partner Handlers
//!
//! Reads are public; writes need an authenticated admin.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CreatePartnerRequest, UpdatePartnerRequest};
use crate::application::dto::response::{PartnerResponse, PartnersResponse, SuccessResponse};
use crate::application::services::UserError;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::{parse_id, validated_body};
use crate::startup::AppState;

/// 403 `UserPermissionError` unless the caller is an admin.
async fn require_admin(state: &AppState, user_id: i64) -> Result<(), AppError> {
    match state.services.user.get_user_by_id(user_id).await {
        Ok(user) if user.is_admin() => Ok(()),
        Ok(_) | Err(UserError::NotFound) => Err(AppError::UserPermission(
            "User is not an admin".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// List every partner
pub async fn list_partners(
    State(state): State<AppState>,
) -> Result<Json<PartnersResponse>, AppError> {
    let partners = state.services.partner.get_all_partners().await?;
    Ok(Json(PartnersResponse::from(partners)))
}

/// Get a partner by id
pub async fn get_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> Result<Json<PartnerResponse>, AppError> {
    let partner_id = parse_id(&partner_id, "Invalid partner id")?;
    let partner = state.services.partner.get_partner_by_id(partner_id).await?;
    Ok(Json(PartnerResponse::from(partner)))
}

/// Get a partner by permalink
pub async fn get_partner_by_permalink(
    State(state): State<AppState>,
    Path(permalink): Path<String>,
) -> Result<Json<PartnerResponse>, AppError> {
    let partner = state
        .services
        .partner
        .get_partner_by_permalink(&permalink)
        .await?;
    Ok(Json(PartnerResponse::from(partner)))
}

/// Create a partner
pub async fn create_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<CreatePartnerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PartnerResponse>), AppError> {
    require_admin(&state, auth.user_id).await?;
    let body = validated_body(body, "Unable to create partner")?;

    let partner = state.services.partner.create_partner(body.into()).await?;
    Ok((StatusCode::CREATED, Json(PartnerResponse::from(partner))))
}

/// Update a partner
pub async fn update_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(partner_id): Path<String>,
    body: Result<Json<UpdatePartnerRequest>, JsonRejection>,
) -> Result<Json<PartnerResponse>, AppError> {
    require_admin(&state, auth.user_id).await?;
    let partner_id = parse_id(&partner_id, "Unable to update partner")?;
    let body = validated_body(body, "Unable to update partner")?;

    let partner = state
        .services
        .partner
        .update_partner(partner_id, body.into())
        .await?;
    Ok(Json(PartnerResponse::from(partner)))
}

/// Delete a partner
pub async fn delete_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(partner_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_admin(&state, auth.user_id).await?;
    let partner_id = parse_id(&partner_id, "Unable to delete partner")?;

    state.services.partner.delete_partner(partner_id).await?;
    Ok(Json(SuccessResponse::new("Partner deleted")))
}
