use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::dtos::{requests::CreateTenantRequest, responses::TenantResponse};
use crate::domain::models::tenant::Tenant;
use std::sync::Arc;
use crate::error::AppError;
use tracing::info;

pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let slug = payload.slug.trim().to_lowercase();
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("Tenant name is required".into()));
    }
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::Validation("Slug may only contain letters, digits and dashes".into()));
    }

    let mut tenant = Tenant::new(payload.name.trim().to_string(), slug);
    tenant.custom_domain = payload.custom_domain.filter(|d| !d.trim().is_empty());

    let created = state.tenant_repo.create(&tenant).await?;

    info!("Tenant created: {}", created.id);

    Ok((StatusCode::CREATED, Json(TenantResponse::from(created))))
}

pub async fn get_tenant_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state.tenant_repo.find_by_slug(&slug).await?
        .ok_or(AppError::NotFound("Tenant not found".into()))?;

    Ok(Json(TenantResponse::from(tenant)))
}
