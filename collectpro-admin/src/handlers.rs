use crate::auth_admin::AuthAdmin;
use crate::error::AdminError;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedAdmin = Arc<dyn AuthAdmin>;

#[derive(Debug, Deserialize)]
pub struct SignOutRequest {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignOutResponse {
    pub success: bool,
}

pub async fn sign_out_handler(
    State(admin): State<SharedAdmin>,
    payload: Result<Json<SignOutRequest>, JsonRejection>,
) -> Result<Json<SignOutResponse>, AdminError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("rejected sign-out request: {rejection}");
        AdminError::InvalidRequest(rejection.body_text())
    })?;

    let user_id = request
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AdminError::InvalidRequest("userId is required".to_string()))?;

    admin
        .sign_out_everywhere(&user_id)
        .await
        .inspect_err(|e| warn!("global sign-out failed for {user_id}: {e}"))?;

    info!("signed out {user_id} from all sessions");
    Ok(Json(SignOutResponse { success: true }))
}
