//! In-memory address store
//!
//! Keeps each owner's addresses in insertion order behind a single
//! `RwLock`. The duplicate check and the write happen under the same
//! write guard, so concurrent inserts of one key cannot both succeed.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::store::AddressStore;
use crate::{AccountId, Address, AddressBookError, AddressFields, AddressId, Result};

/// Address store backed by process memory
#[derive(Default)]
pub struct InMemoryAddressStore {
    addresses: RwLock<HashMap<AccountId, Vec<Address>>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored addresses across all owners
    pub async fn len(&self) -> usize {
        self.addresses.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn insert(&self, address: &Address) -> Result<AddressId> {
        let mut guard = self.addresses.write().await;
        let owned = guard.entry(address.owner).or_default();

        if owned
            .iter()
            .any(|a| a.has_key(&address.fields.address_line_one, &address.fields.zip_code))
        {
            return Err(AddressBookError::DuplicateAddress);
        }

        owned.push(address.clone());
        Ok(address.id)
    }

    async fn find_by_owner_and_key(
        &self,
        owner: AccountId,
        address_line_one: &str,
        zip_code: &str,
    ) -> Result<Option<Address>> {
        let guard = self.addresses.read().await;
        Ok(guard.get(&owner).and_then(|owned| {
            owned
                .iter()
                .find(|a| a.has_key(address_line_one, zip_code))
                .cloned()
        }))
    }

    async fn find_by_id_and_owner(
        &self,
        id: AddressId,
        owner: AccountId,
    ) -> Result<Option<Address>> {
        let guard = self.addresses.read().await;
        Ok(guard
            .get(&owner)
            .and_then(|owned| owned.iter().find(|a| a.id == id).cloned()))
    }

    async fn list_by_owner(
        &self,
        owner: AccountId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Address>> {
        let guard = self.addresses.read().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(guard
            .get(&owner)
            .map(|owned| owned.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count_by_owner(&self, owner: AccountId) -> Result<u64> {
        let guard = self.addresses.read().await;
        Ok(guard.get(&owner).map_or(0, |owned| owned.len() as u64))
    }

    async fn update(
        &self,
        id: AddressId,
        owner: AccountId,
        fields: &AddressFields,
    ) -> Result<Option<Address>> {
        let mut guard = self.addresses.write().await;
        let Some(owned) = guard.get_mut(&owner) else {
            return Ok(None);
        };

        if owned
            .iter()
            .any(|a| a.id != id && a.has_key(&fields.address_line_one, &fields.zip_code))
        {
            return Err(AddressBookError::DuplicateAddress);
        }

        Ok(owned.iter_mut().find(|a| a.id == id).map(|address| {
            address.fields = fields.clone();
            address.updated_at = Utc::now();
            address.clone()
        }))
    }

    async fn delete_many(&self, ids: &[AddressId], owner: AccountId) -> Result<u64> {
        let mut guard = self.addresses.write().await;
        let Some(owned) = guard.get_mut(&owner) else {
            return Ok(0);
        };

        let before = owned.len();
        owned.retain(|a| !ids.contains(&a.id));
        Ok((before - owned.len()) as u64)
    }

    async fn delete_by_owner(&self, owner: AccountId) -> Result<u64> {
        let mut guard = self.addresses.write().await;
        Ok(guard.remove(&owner).map_or(0, |owned| owned.len() as u64))
    }
}
