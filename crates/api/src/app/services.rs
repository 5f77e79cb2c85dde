//! Service wiring: picks the storage backend and builds the shared services.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use stockledger_infra::{AppConfig, InMemoryStore, InventoryStore, PostgresStore, Services, StoreBackend};

pub type SharedStore = Arc<dyn InventoryStore>;

/// Everything a handler needs, shared across requests.
#[derive(Clone)]
pub struct AppServices {
    pub services: Services<SharedStore>,
    pub ledger_page_size: u32,
}

impl AppServices {
    pub fn new(store: SharedStore, ledger_page_size: u32) -> Self {
        Self {
            services: Services::new(store),
            ledger_page_size,
        }
    }

    pub fn in_memory(ledger_page_size: u32) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), ledger_page_size)
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.store {
        StoreBackend::InMemory => {
            info!("using in-memory store");
            Arc::new(InMemoryStore::new())
        }
        StoreBackend::Postgres { database_url } => {
            let store = PostgresStore::connect(database_url)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("failed to apply migrations")?;
            info!("using postgres store");
            Arc::new(store)
        }
    };
    Ok(AppServices::new(store, config.ledger_page_size))
}
