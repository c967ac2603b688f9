/// Authentication middleware for protecting routes
///
/// Extracts the token key from the Authorization header, resolves it
/// through `AuthService::validate_or_refresh` and adds the authenticated
/// account to the request extensions.
use super::models::Account;
use super::password::PasswordError;
use super::repository::RepositoryError;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use address_core::AccountId;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

/// Response header carrying the replacement key after an expired token was rotated
pub const REFRESHED_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refreshed-token");

/// Authenticated account, added to request extensions by `auth_middleware`
///
/// Extract in handlers with `Extension<AuthenticatedAccount>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account: Account,
    /// Hash of the token that authenticated this request
    pub token_hash: String,
}

impl AuthenticatedAccount {
    pub fn id(&self) -> AccountId {
        self.account.id
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication credentials were not provided.")]
    MissingAuthHeader,

    #[error("Invalid token header.")]
    InvalidAuthHeader,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("Must include \"username\" and \"password\".")]
    MissingCredentials,

    #[error("No such user exists")]
    NoSuchUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UsernameAlreadyExists | RepositoryError::EmailAlreadyExists => {
                AuthError::AccountExists(err.to_string())
            }
            RepositoryError::DatabaseError(_) => AuthError::Repository(err),
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::NoSuchUser => StatusCode::NOT_FOUND,
            AuthError::MissingCredentials
            | AuthError::InvalidCredentials
            | AuthError::InvalidEmail
            | AuthError::AccountExists(_) => StatusCode::BAD_REQUEST,
            AuthError::Password(_) | AuthError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader | AuthError::InvalidToken => {
                ApiError::new("UNAUTHORIZED", self.to_string())
            }
            AuthError::NoSuchUser => ApiError::new("NOT_FOUND", self.to_string()),
            AuthError::Password(_) | AuthError::Repository(_) => {
                tracing::error!(error = %self, "Authentication backend failure");
                ApiError::internal_error()
            }
            _ => ApiError::bad_request(self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

/// Extract the key from `Token <key>` or `Bearer <key>`
fn parse_authorization(value: &str) -> Result<&str, AuthError> {
    let (scheme, key) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }
    let key = key.trim();
    if key.is_empty() || key.contains(' ') {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(key)
}

/// Authentication middleware that requires a valid token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/addresses/", get(list_addresses))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
///
/// When the presented token had expired it is rotated, and the new key is
/// returned in the `X-Refreshed-Token` response header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let key = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)
        .and_then(|value| value.to_str().map_err(|_| AuthError::InvalidAuthHeader))
        .and_then(parse_authorization);
    let key = match key {
        Ok(key) => key.to_string(),
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return Err(e);
        }
    };

    let authenticated = match state.auth.validate_or_refresh(&key).await {
        Ok(authenticated) => authenticated,
        Err(e) => {
            if matches!(e, AuthError::InvalidToken) {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address,
                    user_agent,
                    reason: e.to_string(),
                });
            }
            return Err(e);
        }
    };

    if authenticated.refreshed.is_some() {
        audit_log(&AuditEvent::TokenRefresh {
            account_id: authenticated.account.id.as_uuid(),
            username: authenticated.account.username.clone(),
            ip_address,
        });
    }

    request.extensions_mut().insert(AuthenticatedAccount {
        account: authenticated.account,
        token_hash: authenticated.token_hash,
    });

    let mut response = next.run(request).await;

    if let Some(new_key) = authenticated.refreshed {
        if let Ok(value) = HeaderValue::from_str(&new_key) {
            response.headers_mut().insert(REFRESHED_TOKEN_HEADER, value);
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorization_schemes() {
        assert_eq!(parse_authorization("Token abc123").unwrap(), "abc123");
        assert_eq!(parse_authorization("Bearer abc123").unwrap(), "abc123");
        assert_eq!(parse_authorization("token abc123").unwrap(), "abc123");
    }

    #[test]
    fn test_parse_authorization_rejects_malformed() {
        for value in ["Token", "Token ", "Basic abc", "abc123", "Token a b"] {
            assert!(
                matches!(parse_authorization(value), Err(AuthError::InvalidAuthHeader)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NoSuchUser.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::from(RepositoryError::DatabaseError("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_duplicate_account_maps_to_bad_request() {
        let err = AuthError::from(RepositoryError::UsernameAlreadyExists);
        assert!(matches!(err, AuthError::AccountExists(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
