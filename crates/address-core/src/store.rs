//! PostgreSQL address store
//!
//! Provides owner-scoped address persistence using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{AccountId, Address, AddressBookError, AddressFields, AddressId, Result};

/// Embedded schema migrations (`crates/address-core/migrations`)
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Name of the unique constraint guarding the de-duplication key
const OWNER_KEY_CONSTRAINT: &str = "addresses_owner_line_one_zip_key";

/// Trait for owner-scoped address persistence
///
/// Every operation takes the owner explicitly. Mutations re-check
/// ownership in the same statement, so an id belonging to another owner
/// behaves exactly like a nonexistent id.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Persist a new address
    ///
    /// Fails with `DuplicateAddress` if the owner already has an address
    /// with the same `(address_line_one, zip_code)`.
    async fn insert(&self, address: &Address) -> Result<AddressId>;

    /// Find the owner's address carrying the de-duplication key
    async fn find_by_owner_and_key(
        &self,
        owner: AccountId,
        address_line_one: &str,
        zip_code: &str,
    ) -> Result<Option<Address>>;

    /// Find an address by id, only if owned by `owner`
    async fn find_by_id_and_owner(&self, id: AddressId, owner: AccountId)
        -> Result<Option<Address>>;

    /// List the owner's addresses in creation order
    async fn list_by_owner(&self, owner: AccountId, limit: u64, offset: u64)
        -> Result<Vec<Address>>;

    /// Count the owner's addresses
    async fn count_by_owner(&self, owner: AccountId) -> Result<u64>;

    /// Overwrite the mutable fields of an owned address
    ///
    /// Returns `None` if no address with `id` is owned by `owner`.
    async fn update(
        &self,
        id: AddressId,
        owner: AccountId,
        fields: &AddressFields,
    ) -> Result<Option<Address>>;

    /// Delete the owned subset of `ids`, returning how many were removed
    async fn delete_many(&self, ids: &[AddressId], owner: AccountId) -> Result<u64>;

    /// Delete every address of an owner
    async fn delete_by_owner(&self, owner: AccountId) -> Result<u64>;
}

/// PostgreSQL address store
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    /// Create a new store connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                AddressBookError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AddressBookError::DatabaseError(format!("Migration failed: {e}")))
    }
}

/// Address row from database
#[derive(Debug, FromRow)]
struct AddressRow {
    id: Uuid,
    owner_id: Uuid,
    country: String,
    address_line_one: String,
    address_line_two: Option<String>,
    city: String,
    zip_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: AddressId::from_uuid(row.id),
            owner: AccountId::from_uuid(row.owner_id),
            fields: AddressFields {
                country: row.country,
                address_line_one: row.address_line_one,
                address_line_two: row.address_line_two,
                city: row.city,
                zip_code: row.zip_code,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, owner_id, country, address_line_one, address_line_two, \
                               city, zip_code, created_at, updated_at";

/// Map a write error, translating the owner-key constraint into `DuplicateAddress`
fn write_error(action: &str, err: sqlx::Error) -> AddressBookError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.constraint() == Some(OWNER_KEY_CONSTRAINT) {
            return AddressBookError::DuplicateAddress;
        }
    }
    AddressBookError::DatabaseError(format!("Failed to {action}: {err}"))
}

#[async_trait]
impl AddressStore for PgAddressStore {
    async fn insert(&self, address: &Address) -> Result<AddressId> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO addresses (
                id, owner_id, country, address_line_one, address_line_two,
                city, zip_code, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(address.id)
        .bind(address.owner)
        .bind(&address.fields.country)
        .bind(&address.fields.address_line_one)
        .bind(&address.fields.address_line_two)
        .bind(&address.fields.city)
        .bind(&address.fields.zip_code)
        .bind(address.created_at)
        .bind(address.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("create address", e))?;

        Ok(AddressId::from_uuid(row.0))
    }

    async fn find_by_owner_and_key(
        &self,
        owner: AccountId,
        address_line_one: &str,
        zip_code: &str,
    ) -> Result<Option<Address>> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE owner_id = $1 AND address_line_one = $2 AND zip_code = $3"
        ))
        .bind(owner)
        .bind(address_line_one)
        .bind(zip_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AddressBookError::DatabaseError(format!("Failed to find address: {e}")))?;

        Ok(row.map(Address::from))
    }

    async fn find_by_id_and_owner(
        &self,
        id: AddressId,
        owner: AccountId,
    ) -> Result<Option<Address>> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AddressBookError::DatabaseError(format!("Failed to get address: {e}")))?;

        Ok(row.map(Address::from))
    }

    async fn list_by_owner(
        &self,
        owner: AccountId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Address>> {
        let rows: Vec<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE owner_id = $1 \
             ORDER BY seq \
             LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AddressBookError::DatabaseError(format!("Failed to list addresses: {e}")))?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn count_by_owner(&self, owner: AccountId) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM addresses WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AddressBookError::DatabaseError(format!("Failed to count addresses: {e}"))
            })?;

        Ok(count.max(0) as u64)
    }

    async fn update(
        &self,
        id: AddressId,
        owner: AccountId,
        fields: &AddressFields,
    ) -> Result<Option<Address>> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            r#"
            UPDATE addresses SET
                country = $3,
                address_line_one = $4,
                address_line_two = $5,
                city = $6,
                zip_code = $7,
                updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(&fields.country)
        .bind(&fields.address_line_one)
        .bind(&fields.address_line_two)
        .bind(&fields.city)
        .bind(&fields.zip_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error("update address", e))?;

        Ok(row.map(Address::from))
    }

    async fn delete_many(&self, ids: &[AddressId], owner: AccountId) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = ids.iter().map(AddressId::as_uuid).collect();

        let result = sqlx::query("DELETE FROM addresses WHERE owner_id = $1 AND id = ANY($2)")
            .bind(owner)
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AddressBookError::DatabaseError(format!("Failed to delete addresses: {e}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn delete_by_owner(&self, owner: AccountId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM addresses WHERE owner_id = $1")
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AddressBookError::DatabaseError(format!("Failed to delete addresses: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{validate, AddressInput};

    // These tests require a running PostgreSQL instance with DATABASE_URL set

    async fn connect() -> PgAddressStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgAddressStore::new(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn create_owner(store: &PgAddressStore) -> AccountId {
        let owner = AccountId::new();
        sqlx::query(
            "INSERT INTO accounts (id, username, email, password_hash) VALUES ($1, $2, $3, 'x')",
        )
        .bind(owner)
        .bind(format!("user-{owner}"))
        .bind(format!("{owner}@example.com"))
        .execute(store.pool())
        .await
        .unwrap();
        owner
    }

    fn address(owner: AccountId, line_one: &str) -> Address {
        let validated = validate(&AddressInput::new("GB", line_one, "London", "TE1 1ST")).unwrap();
        Address::new(owner, validated)
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_insert_and_find() {
        let store = connect().await;
        let owner = create_owner(&store).await;
        let address = address(owner, "1 Test Street");

        let id = store.insert(&address).await.unwrap();
        let found = store.find_by_id_and_owner(id, owner).await.unwrap();
        assert_eq!(found.map(|a| a.fields), Some(address.fields));

        let other = create_owner(&store).await;
        assert!(store.find_by_id_and_owner(id, other).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_unique_key_violation_is_duplicate() {
        let store = connect().await;
        let owner = create_owner(&store).await;
        store.insert(&address(owner, "2 Test Street")).await.unwrap();

        let err = store
            .insert(&address(owner, "2 Test Street"))
            .await
            .unwrap_err();
        assert!(matches!(err, AddressBookError::DuplicateAddress));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_delete_many_scoped_to_owner() {
        let store = connect().await;
        let owner = create_owner(&store).await;
        let other = create_owner(&store).await;
        let mine = store.insert(&address(owner, "3 Test Street")).await.unwrap();
        let theirs = store.insert(&address(other, "3 Test Street")).await.unwrap();

        let deleted = store.delete_many(&[mine, theirs], owner).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_by_owner(other).await.unwrap(), 1);
    }
}
