//! Authentication service layer
//!
//! Account registration, login, token validation with rotation on expiry,
//! logout and account deletion.

use super::middleware::AuthError;
use super::models::{Account, AuthToken};
use super::password::{hash_password_with_config, verify_password, PasswordConfig};
use super::repository::AuthRepository;
use address_core::AuthConfig;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Login request
///
/// `username` may also hold the account email. Fields are optional so that
/// missing credentials are reported as a 400 with a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// A freshly issued token key and the account it belongs to
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Raw key, shown to the client once
    pub key: String,
    pub account: Account,
}

/// Outcome of a successful token check
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub account: Account,
    /// Hash of the token now valid for this account
    pub token_hash: String,
    /// New raw key when the presented one had expired and was rotated
    pub refreshed: Option<String>,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    repository: Arc<dyn AuthRepository>,
    token_ttl: Duration,
    password_config: PasswordConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(repository: Arc<dyn AuthRepository>, config: &AuthConfig) -> Self {
        // Out-of-range lifetimes are capped at a century
        let token_ttl = i64::try_from(config.token_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(36_500));
        Self {
            repository,
            token_ttl,
            password_config: PasswordConfig::default(),
        }
    }

    /// Override the Argon2 cost parameters used for new passwords
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.password_config = password_config;
        self
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Create a new account
    ///
    /// # Errors
    ///
    /// * `MissingCredentials` - blank username or password
    /// * `InvalidEmail` - email without `@`
    /// * `AccountExists` - username or email already taken
    pub async fn register_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        let password_hash = hash_password_with_config(password, &self.password_config)?;
        let account = Account::new(username, email, password_hash);
        self.repository.create_account(&account).await?;

        tracing::info!(account_id = %account.id, username = %account.username, "Account created");
        Ok(account)
    }

    /// Log in with username (or email) and password
    ///
    /// Every login starts a new session with its own token; tokens of other
    /// sessions stay valid.
    ///
    /// # Errors
    ///
    /// * `MissingCredentials` - a field is absent or blank
    /// * `NoSuchUser` - no account matches the identifier
    /// * `InvalidCredentials` - wrong password
    pub async fn login(&self, request: &LoginRequest) -> Result<IssuedToken, AuthError> {
        let identifier = non_blank(&request.username).ok_or(AuthError::MissingCredentials)?;
        let password = request
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        let account = self
            .repository
            .find_account_by_identifier(identifier)
            .await?
            .ok_or(AuthError::NoSuchUser)?;

        if !verify_password(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let key = generate_token_key();
        self.repository
            .insert_token(&AuthToken::new(hash_token(&key), account.id))
            .await?;

        Ok(IssuedToken { key, account })
    }

    /// Resolve a token key to its account
    ///
    /// A token older than the configured TTL is replaced by a new one: the
    /// old key is deleted, the request is still authenticated and the new
    /// key is returned in `Authenticated::refreshed`.
    pub async fn validate_or_refresh(&self, key: &str) -> Result<Authenticated, AuthError> {
        let token_hash = hash_token(key);
        let token = self
            .repository
            .find_token(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let account = self
            .repository
            .find_account_by_id(token.account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !token.is_expired(self.token_ttl, Utc::now()) {
            return Ok(Authenticated {
                account,
                token_hash,
                refreshed: None,
            });
        }

        let new_key = generate_token_key();
        let new_token = AuthToken::new(hash_token(&new_key), account.id);
        if !self.repository.rotate_token(&token_hash, &new_token).await? {
            // Lost a race with another request presenting the same expired key
            return Err(AuthError::InvalidToken);
        }
        tracing::debug!(account_id = %account.id, "Rotated expired token");

        Ok(Authenticated {
            account,
            token_hash: new_token.token_hash,
            refreshed: Some(new_key),
        })
    }

    /// Delete the token; the key stops working immediately
    pub async fn logout(&self, token_hash: &str) -> Result<(), AuthError> {
        self.repository.delete_token(token_hash).await?;
        Ok(())
    }

    /// Look up an account by username or email
    pub async fn find_account(&self, identifier: &str) -> Result<Account, AuthError> {
        self.repository
            .find_account_by_identifier(identifier)
            .await?
            .ok_or(AuthError::NoSuchUser)
    }

    /// Delete an account and all of its tokens
    pub async fn delete_account(&self, account: &Account) -> Result<(), AuthError> {
        if !self.repository.delete_account(account.id).await? {
            return Err(AuthError::NoSuchUser);
        }
        tracing::info!(account_id = %account.id, username = %account.username, "Account deleted");
        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Generate a cryptographically secure token key
fn generate_token_key() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Hash a token key for storage (SHA-256, hex)
pub fn hash_token(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
