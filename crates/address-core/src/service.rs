//! Address service
//!
//! Business rules on top of the validator and the store: ownership scoping,
//! duplicate detection on `(address_line_one, zip_code)` and pagination.

use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::store::AddressStore;
use crate::{
    validate, AccountId, Address, AddressBookError, AddressId, AddressInput, Result,
};

/// Requested page window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-indexed page number, defaults to 1
    pub page: Option<u64>,
    /// Page size, defaults to the configured size and is clamped to the maximum
    pub page_size: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64) -> Self {
        Self {
            page: Some(page),
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Total number of items across all pages
    pub count: u64,
    /// Current page number (1-indexed)
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Number of pages; an empty listing still has one (empty) page
    pub fn num_pages(&self) -> u64 {
        self.count.div_ceil(self.page_size).max(1)
    }

    pub fn next_page(&self) -> Option<u64> {
        (self.page < self.num_pages()).then(|| self.page + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.page > 1).then(|| self.page - 1)
    }
}

/// Address service
pub struct AddressService {
    store: Arc<dyn AddressStore>,
    pagination: PaginationConfig,
}

impl AddressService {
    /// Create a new address service over a store
    pub fn new(store: Arc<dyn AddressStore>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Create an address owned by `owner`
    ///
    /// # Errors
    ///
    /// * `Validation` - the candidate failed field validation
    /// * `DuplicateAddress` - the owner already has this line one / zip code
    pub async fn create(&self, owner: AccountId, candidate: &AddressInput) -> Result<Address> {
        let validated = validate(candidate)?;

        let fields = validated.fields();
        if self
            .store
            .find_by_owner_and_key(owner, &fields.address_line_one, &fields.zip_code)
            .await?
            .is_some()
        {
            tracing::debug!(owner = %owner, "Rejected duplicate address");
            return Err(AddressBookError::DuplicateAddress);
        }

        let address = Address::new(owner, validated);
        self.store.insert(&address).await?;
        tracing::info!(owner = %owner, address_id = %address.id, "Created address");

        Ok(address)
    }

    /// List the owner's addresses, in creation order
    ///
    /// # Errors
    ///
    /// * `InvalidPage` - the page number is outside `1..=num_pages`
    pub async fn list(&self, owner: AccountId, request: PageRequest) -> Result<Page<Address>> {
        let page_size = self.pagination.clamp_page_size(request.page_size);
        let page = request.page.unwrap_or(1);

        let count = self.store.count_by_owner(owner).await?;
        let mut window = Page {
            count,
            page,
            page_size,
            results: Vec::new(),
        };
        if page == 0 || page > window.num_pages() {
            return Err(AddressBookError::InvalidPage);
        }

        window.results = self
            .store
            .list_by_owner(owner, page_size, (page - 1) * page_size)
            .await?;

        Ok(window)
    }

    /// Get one of the owner's addresses
    ///
    /// Addresses of other owners are reported as `NotFound`.
    pub async fn get(&self, owner: AccountId, id: AddressId) -> Result<Address> {
        self.store
            .find_by_id_and_owner(id, owner)
            .await?
            .ok_or(AddressBookError::NotFound)
    }

    /// Replace every mutable field of one of the owner's addresses
    ///
    /// The duplicate check skips the address being updated, so an address
    /// may keep its own line one / zip code.
    pub async fn update(
        &self,
        owner: AccountId,
        id: AddressId,
        candidate: &AddressInput,
    ) -> Result<Address> {
        let validated = validate(candidate)?;

        // Existence first: a foreign or unknown id must not reveal anything
        self.get(owner, id).await?;

        let fields = validated.into_fields();
        if let Some(existing) = self
            .store
            .find_by_owner_and_key(owner, &fields.address_line_one, &fields.zip_code)
            .await?
        {
            if existing.id != id {
                tracing::debug!(owner = %owner, address_id = %id, "Rejected duplicate update");
                return Err(AddressBookError::DuplicateAddress);
            }
        }

        let updated = self
            .store
            .update(id, owner, &fields)
            .await?
            .ok_or(AddressBookError::NotFound)?;
        tracing::info!(owner = %owner, address_id = %id, "Updated address");

        Ok(updated)
    }

    /// Delete the owner's addresses among `ids`
    ///
    /// Unknown ids and ids of other owners are ignored. Returns the number
    /// of addresses removed; zero is not an error.
    pub async fn delete(&self, owner: AccountId, ids: &[AddressId]) -> Result<u64> {
        let deleted = self.store.delete_many(ids, owner).await?;
        tracing::info!(owner = %owner, requested = ids.len(), deleted, "Deleted addresses");
        Ok(deleted)
    }

    /// Remove every address of an owner, used when the account goes away
    pub async fn purge_owner(&self, owner: AccountId) -> Result<u64> {
        let deleted = self.store.delete_by_owner(owner).await?;
        tracing::info!(owner = %owner, deleted, "Purged addresses");
        Ok(deleted)
    }
}
