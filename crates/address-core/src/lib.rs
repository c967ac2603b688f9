//! Address Core - Domain models, validation and storage for the address book
//!
//! This crate defines the core of the address book service:
//! - Address and account identifiers
//! - Candidate addresses and their validation
//! - The owner-scoped address store (PostgreSQL and in-memory)
//! - The address service with the duplicate-detection rules
//! - Configuration management

pub mod config;
pub mod country;
pub mod memory;
pub mod service;
pub mod store;
pub mod validator;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, PaginationConfig, StorageBackend};
pub use memory::InMemoryAddressStore;
pub use service::{AddressService, Page, PageRequest};
pub use store::{AddressStore, PgAddressStore, MIGRATOR};
pub use validator::{validate, Field, ValidatedAddress, ValidationError, ValidationErrors};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for address book operations
#[derive(Error, Debug)]
pub enum AddressBookError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("attempting to add duplicate address")]
    DuplicateAddress,

    #[error("Address not found")]
    NotFound,

    #[error("Invalid page.")]
    InvalidPage,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub type Result<T> = std::result::Result<T, AddressBookError>;

// ============================================================================
// Identifiers
// ============================================================================

/// Identity of the account owning a set of addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh random account id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque address identifier, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AddressId(Uuid);

impl AddressId {
    /// Generate a fresh random address id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AddressId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AddressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for AddressId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Address Models
// ============================================================================

/// Candidate address as submitted by a client
///
/// Every field is optional here so that absent fields surface as
/// `MissingField` errors from the validator instead of decode failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub country: Option<String>,
    pub address_line_one: Option<String>,
    pub address_line_two: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

impl AddressInput {
    /// Build a candidate with all required fields and no second line
    pub fn new(
        country: impl Into<String>,
        address_line_one: impl Into<String>,
        city: impl Into<String>,
        zip_code: impl Into<String>,
    ) -> Self {
        Self {
            country: Some(country.into()),
            address_line_one: Some(address_line_one.into()),
            address_line_two: None,
            city: Some(city.into()),
            zip_code: Some(zip_code.into()),
        }
    }

    /// Set the optional second address line
    pub fn with_line_two(mut self, line: impl Into<String>) -> Self {
        self.address_line_two = Some(line.into());
        self
    }
}

/// The mutable fields of an address, after validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    /// ISO 3166-1 alpha-2 code, upper-case
    pub country: String,
    pub address_line_one: String,
    pub address_line_two: Option<String>,
    pub city: String,
    pub zip_code: String,
}

/// A persisted address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub owner: AccountId,
    #[serde(flatten)]
    pub fields: AddressFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Create a new address for `owner` from validated fields
    pub fn new(owner: AccountId, address: ValidatedAddress) -> Self {
        let now = Utc::now();
        Self {
            id: AddressId::new(),
            owner,
            fields: address.into_fields(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this address carries the given de-duplication key
    pub fn has_key(&self, address_line_one: &str, zip_code: &str) -> bool {
        self.fields.address_line_one == address_line_one && self.fields.zip_code == zip_code
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {} {}",
            self.fields.address_line_one, self.fields.city, self.fields.zip_code
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
