//! Application services.
//!
//! Each service composes the pure domain types with an [`InventoryStore`];
//! none of them does IO itself. Callers pass the acting actor and location
//! explicitly on every call.

use crate::store::InventoryStore;

pub mod accounts;
pub mod catalog;
pub mod ledger;
pub mod products;
pub mod reconciliation;

pub use accounts::{AccountService, NewAccount};
pub use catalog::CatalogService;
pub use ledger::{ChangeOutcome, LedgerService};
pub use products::ProductResolver;
pub use reconciliation::ReconciliationService;

/// All services over one shared store.
#[derive(Debug, Clone)]
pub struct Services<S> {
    pub catalog: CatalogService<S>,
    pub products: ProductResolver<S>,
    pub accounts: AccountService<S>,
    pub ledger: LedgerService<S>,
    pub reconciliation: ReconciliationService<S>,
}

impl<S: InventoryStore + Clone> Services<S> {
    pub fn new(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            products: ProductResolver::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            ledger: LedgerService::new(store.clone()),
            reconciliation: ReconciliationService::new(store),
        }
    }
}
