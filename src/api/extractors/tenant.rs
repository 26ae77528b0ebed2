use axum::{
    extract::{FromRequestParts, Path},
    http::{request::Parts, StatusCode},
};
use std::collections::HashMap;
use crate::domain::models::tenant::Tenant;
use crate::state::AppState;
use std::sync::Arc;
use tracing::{error, Span};

/// Tenant named by the `{tenant_id}` path segment, loaded and verified to exist.
pub struct CurrentTenant(pub Tenant);

impl FromRequestParts<Arc<AppState>> for CurrentTenant {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let params: Path<HashMap<String, String>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;

        let tenant_id = params.get("tenant_id").ok_or(StatusCode::BAD_REQUEST)?;

        match state.tenant_repo.find_by_id(tenant_id).await {
            Ok(Some(tenant)) => {
                Span::current().record("tenant_id", tenant.id.as_str());
                Ok(CurrentTenant(tenant))
            }
            Ok(None) => Err(StatusCode::NOT_FOUND),
            Err(e) => {
                error!("Tenant lookup failed: {:?}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
