//! Authentication API handlers
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AuthError, AuthenticatedAccount, LoginRequest, TokenResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Logout response
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Login with username (or email) and password
///
/// # Responses
///
/// * `201 Created` - `{"token": "..."}`
/// * `400 Bad Request` - Missing fields or invalid credentials
/// * `404 Not Found` - No such user exists
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.auth.login(&request).await {
        Ok(issued) => {
            audit_log(&AuditEvent::LoginSuccess {
                account_id: issued.account.id.as_uuid(),
                username: issued.account.username.clone(),
                ip_address,
                user_agent,
            });
            Ok((
                StatusCode::CREATED,
                Json(TokenResponse { token: issued.key }),
            ))
        }
        Err(e) => {
            if matches!(e, AuthError::NoSuchUser | AuthError::InvalidCredentials) {
                audit_log(&AuditEvent::LoginFailure {
                    username: request.username.unwrap_or_default(),
                    reason: e.to_string(),
                    ip_address,
                    user_agent,
                });
            }
            Err(e.into())
        }
    }
}

/// Logout, deleting the token used for this request
///
/// # Responses
///
/// * `200 OK` - `{"message": "Logged out successfully"}`
/// * `401 Unauthorized` - Missing or invalid token
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&auth.token_hash).await?;

    audit_log(&AuditEvent::Logout {
        account_id: auth.id().as_uuid(),
        username: auth.account.username.clone(),
        ip_address: extract_ip_address(&headers),
    });

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}
