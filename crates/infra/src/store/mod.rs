//! Persistence seam.
//!
//! Every method that changes an account's quantity is atomic together with its
//! ledger entry: either both are written or neither is. Implementations
//! serialize ledger writes per account; writes to different accounts do not
//! contend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockledger_catalog::{SpecCategory, SpecCombination, SpecOption};
use stockledger_core::{
    AccountId, ActorId, LocationId, ProductId, ReconciliationTaskId, SpecCategoryId, SpecOptionId,
};
use stockledger_inventory::{
    AccountUpdate, ChangeRequest, InventoryAccount, LedgerEntry, OpenAccount, OpenedAccount,
    ReconciliationTask, StockLevel,
};
use stockledger_products::{NewProduct, Product};

use crate::error::InfraResult;
use crate::ledger_query::{LedgerFilter, LedgerPage, Pagination};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// An account joined with its product, as listed to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountListing {
    #[serde(flatten)]
    pub account: InventoryAccount,
    pub product_name: String,
    pub spec_combination: SpecCombination,
    pub stock_level: StockLevel,
}

impl AccountListing {
    pub fn new(account: InventoryAccount, product: &Product) -> Self {
        let stock_level = account.stock_level();
        Self {
            account,
            product_name: product.name.clone(),
            spec_combination: product.spec_combination.clone(),
            stock_level,
        }
    }
}

#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    // -- catalog --

    /// Insert a category; `DuplicateCode` if the code is taken (active or not).
    async fn insert_category(&self, category: SpecCategory) -> InfraResult<()>;
    async fn get_category(&self, id: SpecCategoryId) -> InfraResult<Option<SpecCategory>>;
    async fn save_category(&self, category: &SpecCategory) -> InfraResult<()>;
    async fn list_categories(&self) -> InfraResult<Vec<SpecCategory>>;

    async fn insert_option(&self, option: SpecOption) -> InfraResult<()>;
    async fn get_option(&self, id: SpecOptionId) -> InfraResult<Option<SpecOption>>;
    async fn save_option(&self, option: &SpecOption) -> InfraResult<()>;
    async fn list_options(&self) -> InfraResult<Vec<SpecOption>>;

    // -- products --

    /// Resolve and insert in one step so two concurrent requests for the same
    /// combination cannot both create a product.
    async fn create_product(&self, request: NewProduct) -> InfraResult<Product>;
    async fn get_product(&self, id: ProductId) -> InfraResult<Option<Product>>;
    async fn find_product(&self, combination: &SpecCombination) -> InfraResult<Option<Product>>;
    /// All products, newest first.
    async fn list_products(&self) -> InfraResult<Vec<Product>>;
    async fn product_combinations(&self) -> InfraResult<Vec<SpecCombination>>;

    // -- accounts --

    /// Insert the account and its opening entry atomically. `NotFound` for an
    /// unknown product, `DuplicateAccount` if (product, location) is taken.
    async fn open_account(&self, cmd: OpenAccount) -> InfraResult<OpenedAccount>;
    /// Unscoped lookup; callers check the location.
    async fn get_account(&self, id: AccountId) -> InfraResult<Option<InventoryAccount>>;
    async fn list_accounts(&self, location_id: LocationId) -> InfraResult<Vec<AccountListing>>;
    async fn update_account(
        &self,
        id: AccountId,
        location_id: LocationId,
        update: &AccountUpdate,
    ) -> InfraResult<InventoryAccount>;

    // -- ledger --

    /// The only write path for quantities. For reconciliation sources the item
    /// is marked applied in the same write, and an item that is already
    /// applied (or a task no longer pending) is refused.
    async fn record_change(&self, request: ChangeRequest) -> InfraResult<LedgerEntry>;
    async fn query_ledger(
        &self,
        location_id: LocationId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> InfraResult<LedgerPage>;

    // -- reconciliation --

    async fn insert_task(&self, task: &ReconciliationTask) -> InfraResult<()>;
    async fn get_task(&self, id: ReconciliationTaskId) -> InfraResult<Option<ReconciliationTask>>;
    /// Compare-and-set `pending -> confirmed`.
    async fn confirm_task(
        &self,
        id: ReconciliationTaskId,
        actor_id: ActorId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> InfraResult<ReconciliationTask>;
    /// Compare-and-set `pending -> canceled`.
    async fn cancel_task(&self, id: ReconciliationTaskId) -> InfraResult<ReconciliationTask>;
}

#[async_trait::async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert_category(&self, category: SpecCategory) -> InfraResult<()> {
        (**self).insert_category(category).await
    }

    async fn get_category(&self, id: SpecCategoryId) -> InfraResult<Option<SpecCategory>> {
        (**self).get_category(id).await
    }

    async fn save_category(&self, category: &SpecCategory) -> InfraResult<()> {
        (**self).save_category(category).await
    }

    async fn list_categories(&self) -> InfraResult<Vec<SpecCategory>> {
        (**self).list_categories().await
    }

    async fn insert_option(&self, option: SpecOption) -> InfraResult<()> {
        (**self).insert_option(option).await
    }

    async fn get_option(&self, id: SpecOptionId) -> InfraResult<Option<SpecOption>> {
        (**self).get_option(id).await
    }

    async fn save_option(&self, option: &SpecOption) -> InfraResult<()> {
        (**self).save_option(option).await
    }

    async fn list_options(&self) -> InfraResult<Vec<SpecOption>> {
        (**self).list_options().await
    }

    async fn create_product(&self, request: NewProduct) -> InfraResult<Product> {
        (**self).create_product(request).await
    }

    async fn get_product(&self, id: ProductId) -> InfraResult<Option<Product>> {
        (**self).get_product(id).await
    }

    async fn find_product(&self, combination: &SpecCombination) -> InfraResult<Option<Product>> {
        (**self).find_product(combination).await
    }

    async fn list_products(&self) -> InfraResult<Vec<Product>> {
        (**self).list_products().await
    }

    async fn product_combinations(&self) -> InfraResult<Vec<SpecCombination>> {
        (**self).product_combinations().await
    }

    async fn open_account(&self, cmd: OpenAccount) -> InfraResult<OpenedAccount> {
        (**self).open_account(cmd).await
    }

    async fn get_account(&self, id: AccountId) -> InfraResult<Option<InventoryAccount>> {
        (**self).get_account(id).await
    }

    async fn list_accounts(&self, location_id: LocationId) -> InfraResult<Vec<AccountListing>> {
        (**self).list_accounts(location_id).await
    }

    async fn update_account(
        &self,
        id: AccountId,
        location_id: LocationId,
        update: &AccountUpdate,
    ) -> InfraResult<InventoryAccount> {
        (**self).update_account(id, location_id, update).await
    }

    async fn record_change(&self, request: ChangeRequest) -> InfraResult<LedgerEntry> {
        (**self).record_change(request).await
    }

    async fn query_ledger(
        &self,
        location_id: LocationId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> InfraResult<LedgerPage> {
        (**self).query_ledger(location_id, filter, pagination).await
    }

    async fn insert_task(&self, task: &ReconciliationTask) -> InfraResult<()> {
        (**self).insert_task(task).await
    }

    async fn get_task(&self, id: ReconciliationTaskId) -> InfraResult<Option<ReconciliationTask>> {
        (**self).get_task(id).await
    }

    async fn confirm_task(
        &self,
        id: ReconciliationTaskId,
        actor_id: ActorId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> InfraResult<ReconciliationTask> {
        (**self).confirm_task(id, actor_id, at).await
    }

    async fn cancel_task(&self, id: ReconciliationTaskId) -> InfraResult<ReconciliationTask> {
        (**self).cancel_task(id).await
    }
}
