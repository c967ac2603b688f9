//! Token authentication
//!
//! - Opaque token keys, stored as SHA-256 hashes, one per login session
//! - Password hashing with Argon2
//! - Middleware for request authentication with rotation of expired tokens
//! - Authentication service for login, logout and account management
//! - Repository layer for PostgreSQL and in-memory storage

pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use middleware::{auth_middleware, AuthError, AuthenticatedAccount, REFRESHED_TOKEN_HEADER};
pub use models::{Account, AuthToken};
pub use password::{hash_password_with_config, verify_password, PasswordConfig, PasswordError};
pub use repository::{AuthRepository, InMemoryAuthRepository, PgAuthRepository, RepositoryError};
pub use service::{
    hash_token, AuthService, Authenticated, IssuedToken, LoginRequest, TokenResponse,
};
