//! Account and token persistence
//!
//! `AuthRepository` is implemented for PostgreSQL (`sqlx`) and for process
//! memory. An account holds one token per login session.

use super::models::{Account, AuthToken};
use address_core::AccountId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already exists")]
    EmailAlreadyExists,
}

/// Storage of accounts and their tokens
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// Insert a new account; username and email must both be unused
    async fn create_account(&self, account: &Account) -> Result<(), RepositoryError>;

    /// Find an account by username, or by email (case-insensitive)
    async fn find_account_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Remove an account and its tokens. Returns false if it did not exist.
    async fn delete_account(&self, id: AccountId) -> Result<bool, RepositoryError>;

    /// Store a token for a new session; other sessions keep their tokens
    async fn insert_token(&self, token: &AuthToken) -> Result<(), RepositoryError>;

    /// Swap the token stored under `old_hash` for `token`
    ///
    /// Returns false if `old_hash` is no longer stored, e.g. because a
    /// concurrent request already rotated it.
    async fn rotate_token(&self, old_hash: &str, token: &AuthToken)
        -> Result<bool, RepositoryError>;

    async fn find_token(&self, token_hash: &str) -> Result<Option<AuthToken>, RepositoryError>;

    /// Delete a token. Returns false if it did not exist.
    async fn delete_token(&self, token_hash: &str) -> Result<bool, RepositoryError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Account row from database
#[derive(Debug, sqlx::FromRow)]
struct AccountRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account {
            id: AccountId::from_uuid(record.id),
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            created_at: record.created_at,
        }
    }
}

/// Token row from database
#[derive(Debug, sqlx::FromRow)]
struct TokenRecord {
    token_hash: String,
    account_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<TokenRecord> for AuthToken {
    fn from(record: TokenRecord) -> Self {
        AuthToken {
            token_hash: record.token_hash,
            account_id: AccountId::from_uuid(record.account_id),
            created_at: record.created_at,
        }
    }
}

/// PostgreSQL-backed account and token storage
#[derive(Clone)]
pub struct PgAuthRepository {
    db_pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn db_error(action: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(format!("Failed to {action}: {err}"))
}

#[async_trait]
impl AuthRepository for PgAuthRepository {
    async fn create_account(&self, account: &Account) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO accounts (id, username, email, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&self.db_pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return match db_err.constraint() {
                        Some("accounts_email_lower_key") => RepositoryError::EmailAlreadyExists,
                        _ => RepositoryError::UsernameAlreadyExists,
                    };
                }
            }
            db_error("create account", e)
        })?;

        Ok(())
    }

    async fn find_account_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        // Username match wins over an email match on another account
        let record = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, username, email, password_hash, created_at FROM accounts
            WHERE username = $1 OR LOWER(email) = LOWER($1)
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| db_error("fetch account", e))?;

        Ok(record.map(Account::from))
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, username, email, password_hash, created_at FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| db_error("fetch account", e))?;

        Ok(record.map(Account::from))
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, RepositoryError> {
        // Tokens and addresses go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| db_error("delete account", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_token(&self, token: &AuthToken) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, account_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token_hash)
        .bind(token.account_id)
        .bind(token.created_at)
        .execute(&self.db_pool)
        .await
        .map_err(|e| db_error("store token", e))?;

        Ok(())
    }

    async fn rotate_token(
        &self,
        old_hash: &str,
        token: &AuthToken,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET token_hash = $2, created_at = $3 WHERE token_hash = $1 AND account_id = $4",
        )
        .bind(old_hash)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.account_id)
        .execute(&self.db_pool)
        .await
        .map_err(|e| db_error("rotate token", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<AuthToken>, RepositoryError> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT token_hash, account_id, created_at FROM auth_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| db_error("fetch token", e))?;

        Ok(record.map(AuthToken::from))
    }

    async fn delete_token(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.db_pool)
            .await
            .map_err(|e| db_error("delete token", e))?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    /// token hash -> token
    tokens: HashMap<String, AuthToken>,
}

impl MemoryState {
    fn remove_tokens_of(&mut self, account_id: AccountId) {
        self.tokens.retain(|_, t| t.account_id != account_id);
    }
}

/// Account and token storage in process memory
#[derive(Default)]
pub struct InMemoryAuthRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthRepository for InMemoryAuthRepository {
    async fn create_account(&self, account: &Account) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.username == account.username) {
            return Err(RepositoryError::UsernameAlreadyExists);
        }
        if state.accounts.values().any(|a| a.has_email(&account.email)) {
            return Err(RepositoryError::EmailAlreadyExists);
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_account_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.read().await;
        let by_username = state.accounts.values().find(|a| a.username == identifier);
        Ok(by_username
            .or_else(|| {
                state
                    .accounts
                    .values()
                    .find(|a| a.matches_identifier(identifier))
            })
            .cloned())
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let existed = state.accounts.remove(&id).is_some();
        state.remove_tokens_of(id);
        Ok(existed)
    }

    async fn insert_token(&self, token: &AuthToken) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn rotate_token(
        &self,
        old_hash: &str,
        token: &AuthToken,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.tokens.get(old_hash) {
            Some(old) if old.account_id == token.account_id => {
                state.tokens.remove(old_hash);
                state.tokens.insert(token.token_hash.clone(), token.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<AuthToken>, RepositoryError> {
        Ok(self.state.read().await.tokens.get(token_hash).cloned())
    }

    async fn delete_token(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        Ok(self.state.write().await.tokens.remove(token_hash).is_some())
    }
}
