//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthRepository, AuthService, InMemoryAuthRepository, PasswordConfig, PgAuthRepository};
use address_core::config::{AppConfig, StorageBackend};
use address_core::{AddressService, AddressStore, InMemoryAddressStore, PgAddressStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Address business rules
    pub addresses: AddressService,
    /// Token authentication and accounts
    pub auth: AuthService,
}

impl AppState {
    /// Assemble state from explicit stores
    pub fn new(
        config: AppConfig,
        address_store: Arc<dyn AddressStore>,
        auth_repository: Arc<dyn AuthRepository>,
    ) -> Self {
        let addresses = AddressService::new(address_store, config.pagination.clone());
        let auth = AuthService::new(auth_repository, &config.auth);
        Self {
            config,
            start_time: Instant::now(),
            addresses,
            auth,
        }
    }

    /// State backed by process memory
    ///
    /// Uses the cheapest Argon2 parameters; nothing here outlives the process.
    pub fn in_memory(config: AppConfig) -> Self {
        let mut state = Self::new(
            config,
            Arc::new(InMemoryAddressStore::new()),
            Arc::new(InMemoryAuthRepository::new()),
        );
        state.auth = state.auth.with_password_config(PasswordConfig::fast());
        state
    }

    /// State backed by PostgreSQL, applying pending migrations first
    pub async fn postgres(config: AppConfig) -> anyhow::Result<Self> {
        let store = PgAddressStore::new(
            &config.database.postgres_url,
            config.database.pool_size,
        )
        .await?;
        store.migrate().await?;

        let auth_repository = PgAuthRepository::new(store.pool().clone());
        Ok(Self::new(config, Arc::new(store), Arc::new(auth_repository)))
    }

    /// State for the configured storage backend
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        match config.database.backend {
            StorageBackend::Postgres => Self::postgres(config).await,
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
