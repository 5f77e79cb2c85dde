//! Infrastructure layer: storage backends, application services, config.

pub mod config;
pub mod error;
pub mod ledger_query;
pub mod services;
pub mod store;


pub use config::{AppConfig, ConfigError, StoreBackend};
pub use error::{InfraError, InfraResult};
pub use ledger_query::{LedgerFilter, LedgerPage, LedgerRow, Pagination};
pub use services::Services;
pub use store::{AccountListing, InMemoryStore, InventoryStore, PostgresStore};
