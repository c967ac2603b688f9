//! Database models for token authentication
//!
//! - Account: login identity that owns addresses
//! - AuthToken: the single active token of an account, stored hashed
//!
//! These map to the `accounts` and `auth_tokens` tables.

use address_core::AccountId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Login name (unique)
    pub username: String,

    /// Email address (unique, also accepted at login)
    pub email: String,

    /// Hashed password (Argon2id), never serialized in API responses
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with an already hashed password
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether `identifier` names this account, by username or email
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username == identifier || self.has_email(identifier)
    }

    /// Case-insensitive email comparison, as enforced by `accounts_email_lower_key`
    pub fn has_email(&self, email: &str) -> bool {
        self.email.to_lowercase() == email.to_lowercase()
    }
}

/// Stored authentication token
///
/// Only the SHA-256 hex digest of the key is kept; the key itself is
/// shown to the client once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token_hash: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(token_hash: impl Into<String>, account_id: AccountId) -> Self {
        Self {
            token_hash: token_hash.into(),
            account_id,
            created_at: Utc::now(),
        }
    }

    /// A token expires once `ttl` has fully elapsed since issue
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.created_at
            .checked_add_signed(ttl)
            .is_some_and(|expires_at| expires_at <= now)
    }
}
