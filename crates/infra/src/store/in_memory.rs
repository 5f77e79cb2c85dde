use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use stockledger_catalog::{SpecCategory, SpecCombination, SpecOption};
use stockledger_core::{
    AccountId, ActorId, DomainError, LocationId, LocationScoped, ProductId, ReconciliationTaskId,
    SpecCategoryId, SpecOptionId,
};
use stockledger_inventory::{
    AccountUpdate, ChangeRequest, ChangeSource, InventoryAccount, LedgerEntry, OpenAccount,
    OpenedAccount, ReconciliationTask,
};
use stockledger_products::{NewProduct, Product, find_by_combination, resolve};

use super::{AccountListing, InventoryStore};
use crate::error::{InfraResult, poisoned};
use crate::ledger_query::{LedgerFilter, LedgerPage, LedgerRow, Pagination};

type AccountHandle = Arc<Mutex<InventoryAccount>>;

/// In-memory backend for tests/dev.
///
/// Each account sits behind its own `Mutex`; the account map is behind an
/// `RwLock` that is only held long enough to fetch a handle. Lock order is
/// account, then tasks, then ledger.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    categories: RwLock<Vec<SpecCategory>>,
    options: RwLock<Vec<SpecOption>>,
    products: RwLock<Vec<Product>>,
    accounts: RwLock<HashMap<AccountId, AccountHandle>>,
    ledger: RwLock<Vec<LedgerEntry>>,
    tasks: RwLock<HashMap<ReconciliationTaskId, ReconciliationTask>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn account_handle(&self, id: AccountId) -> InfraResult<Option<AccountHandle>> {
        let map = self.accounts.read().map_err(poisoned)?;
        Ok(map.get(&id).cloned())
    }

    /// Number of ledger entries held, across all locations.
    pub fn ledger_len(&self) -> InfraResult<usize> {
        Ok(self.ledger.read().map_err(poisoned)?.len())
    }
}

fn newest_first<T, K: Ord>(rows: &mut [T], key: impl Fn(&T) -> K) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryStore {
    async fn insert_category(&self, category: SpecCategory) -> InfraResult<()> {
        let mut categories = self.categories.write().map_err(poisoned)?;
        if categories.iter().any(|c| c.code == category.code) {
            return Err(DomainError::duplicate_code(format!(
                "category code '{}' already exists",
                category.code
            ))
            .into());
        }
        categories.push(category);
        Ok(())
    }

    async fn get_category(&self, id: SpecCategoryId) -> InfraResult<Option<SpecCategory>> {
        let categories = self.categories.read().map_err(poisoned)?;
        Ok(categories.iter().find(|c| c.id == id).cloned())
    }

    async fn save_category(&self, category: &SpecCategory) -> InfraResult<()> {
        let mut categories = self.categories.write().map_err(poisoned)?;
        let slot = categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| DomainError::not_found("specification category"))?;
        *slot = category.clone();
        Ok(())
    }

    async fn list_categories(&self) -> InfraResult<Vec<SpecCategory>> {
        Ok(self.categories.read().map_err(poisoned)?.clone())
    }

    async fn insert_option(&self, option: SpecOption) -> InfraResult<()> {
        let mut options = self.options.write().map_err(poisoned)?;
        let category_exists = self
            .categories
            .read()
            .map_err(poisoned)?
            .iter()
            .any(|c| c.id == option.category_id);
        if !category_exists {
            return Err(DomainError::not_found("specification category").into());
        }
        options.push(option);
        Ok(())
    }

    async fn get_option(&self, id: SpecOptionId) -> InfraResult<Option<SpecOption>> {
        let options = self.options.read().map_err(poisoned)?;
        Ok(options.iter().find(|o| o.id == id).cloned())
    }

    async fn save_option(&self, option: &SpecOption) -> InfraResult<()> {
        let mut options = self.options.write().map_err(poisoned)?;
        let slot = options
            .iter_mut()
            .find(|o| o.id == option.id)
            .ok_or_else(|| DomainError::not_found("specification option"))?;
        *slot = option.clone();
        Ok(())
    }

    async fn list_options(&self) -> InfraResult<Vec<SpecOption>> {
        Ok(self.options.read().map_err(poisoned)?.clone())
    }

    async fn create_product(&self, request: NewProduct) -> InfraResult<Product> {
        let mut products = self.products.write().map_err(poisoned)?;
        let product = resolve(products.iter(), request)?;
        products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> InfraResult<Option<Product>> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_product(&self, combination: &SpecCombination) -> InfraResult<Option<Product>> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(find_by_combination(products.iter(), combination).cloned())
    }

    async fn list_products(&self) -> InfraResult<Vec<Product>> {
        let mut products = self.products.read().map_err(poisoned)?.clone();
        newest_first(&mut products, |p| (p.created_at, p.id));
        Ok(products)
    }

    async fn product_combinations(&self) -> InfraResult<Vec<SpecCombination>> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(products.iter().map(|p| p.spec_combination.clone()).collect())
    }

    async fn open_account(&self, cmd: OpenAccount) -> InfraResult<OpenedAccount> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;

        let product_exists = self
            .products
            .read()
            .map_err(poisoned)?
            .iter()
            .any(|p| p.id == cmd.product_id);
        if !product_exists {
            return Err(DomainError::not_found("product").into());
        }

        for handle in accounts.values() {
            let existing = handle.lock().map_err(poisoned)?;
            if existing.product_id == cmd.product_id && existing.location_id == cmd.location_id {
                return Err(DomainError::DuplicateAccount {
                    account_id: existing.id,
                }
                .into());
            }
        }

        let opened = InventoryAccount::open(cmd)?;
        if let Some(entry) = &opened.opening_entry {
            self.ledger.write().map_err(poisoned)?.push(entry.clone());
        }
        accounts.insert(
            opened.account.id,
            Arc::new(Mutex::new(opened.account.clone())),
        );
        Ok(opened)
    }

    async fn get_account(&self, id: AccountId) -> InfraResult<Option<InventoryAccount>> {
        match self.account_handle(id)? {
            Some(handle) => Ok(Some(handle.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_accounts(&self, location_id: LocationId) -> InfraResult<Vec<AccountListing>> {
        let mut accounts = Vec::new();
        {
            let map = self.accounts.read().map_err(poisoned)?;
            for handle in map.values() {
                let account = handle.lock().map_err(poisoned)?;
                if account.visible_to(location_id) {
                    accounts.push(account.clone());
                }
            }
        }

        let products = self.products.read().map_err(poisoned)?;
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut listings: Vec<AccountListing> = accounts
            .into_iter()
            .filter_map(|a| {
                let product = by_id.get(&a.product_id)?;
                Some(AccountListing::new(a, product))
            })
            .collect();
        newest_first(&mut listings, |l| (l.account.created_at, l.account.id));
        Ok(listings)
    }

    async fn update_account(
        &self,
        id: AccountId,
        location_id: LocationId,
        update: &AccountUpdate,
    ) -> InfraResult<InventoryAccount> {
        let handle = self
            .account_handle(id)?
            .ok_or_else(|| DomainError::not_found("inventory account"))?;
        let mut account = handle.lock().map_err(poisoned)?;
        if !account.visible_to(location_id) {
            return Err(DomainError::not_found("inventory account").into());
        }
        account.apply_update(update)?;
        Ok(account.clone())
    }

    async fn record_change(&self, request: ChangeRequest) -> InfraResult<LedgerEntry> {
        request.action.signed_change(request.magnitude)?;
        let handle = self
            .account_handle(request.account_id)?
            .ok_or_else(|| DomainError::not_found("inventory account"))?;
        let mut account = handle.lock().map_err(poisoned)?;

        let mut next = account.clone();
        let entry = next.record_change(&request)?;

        match request.source {
            ChangeSource::Direct => {
                self.ledger.write().map_err(poisoned)?.push(entry.clone());
            }
            ChangeSource::Reconciliation { task_id, item_id } => {
                let mut tasks = self.tasks.write().map_err(poisoned)?;
                let task = tasks
                    .get(&task_id)
                    .filter(|t| t.visible_to(request.location_id))
                    .ok_or_else(|| DomainError::not_found("reconciliation task"))?;
                let item = task
                    .item(item_id)
                    .ok_or_else(|| DomainError::not_found("reconciliation item"))?;
                if item.account_id != request.account_id {
                    return Err(DomainError::validation("item belongs to another account").into());
                }
                if item.applied_entry.is_some() {
                    return Err(DomainError::invalid_transition(format!(
                        "item {item_id} was already applied"
                    ))
                    .into());
                }

                let mut next_task = task.clone();
                next_task.mark_item_applied(item_id, entry.id)?;

                self.ledger.write().map_err(poisoned)?.push(entry.clone());
                tasks.insert(task_id, next_task);
            }
        }

        *account = next;
        Ok(entry)
    }

    async fn query_ledger(
        &self,
        location_id: LocationId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> InfraResult<LedgerPage> {
        // Snapshot, then release the ledger before touching account locks.
        let entries: Vec<LedgerEntry> = {
            let ledger = self.ledger.read().map_err(poisoned)?;
            ledger
                .iter()
                .filter(|e| e.location_id == location_id)
                .filter(|e| filter.account_id.is_none_or(|id| e.account_id == id))
                .cloned()
                .collect()
        };

        let mut owners: HashMap<AccountId, (ProductId, String)> = HashMap::new();
        for entry in &entries {
            if owners.contains_key(&entry.account_id) {
                continue;
            }
            if let Some(handle) = self.account_handle(entry.account_id)? {
                let account = handle.lock().map_err(poisoned)?;
                owners.insert(account.id, (account.product_id, account.display_name.clone()));
            }
        }

        let products = self.products.read().map_err(poisoned)?;
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut rows: Vec<LedgerRow> = entries
            .into_iter()
            .filter_map(|entry| {
                let (product_id, display_name) = owners.get(&entry.account_id)?.clone();
                let product = by_id.get(&product_id)?;
                if !filter.matches(&entry, &product.spec_combination) {
                    return None;
                }
                Some(LedgerRow {
                    entry,
                    product_id,
                    product_name: product.name.clone(),
                    display_name,
                    spec_combination: product.spec_combination.clone(),
                })
            })
            .collect();
        newest_first(&mut rows, |r| (r.entry.created_at, r.entry.id));

        let total = rows.len() as u64;
        let page: Vec<LedgerRow> = rows
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect();
        Ok(LedgerPage::new(page, total, pagination))
    }

    async fn insert_task(&self, task: &ReconciliationTask) -> InfraResult<()> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: ReconciliationTaskId) -> InfraResult<Option<ReconciliationTask>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        Ok(tasks.get(&id).cloned())
    }

    async fn confirm_task(
        &self,
        id: ReconciliationTaskId,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> InfraResult<ReconciliationTask> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("reconciliation task"))?;
        let mut next = task.clone();
        next.mark_confirmed(actor_id, at)?;
        *task = next.clone();
        Ok(next)
    }

    async fn cancel_task(&self, id: ReconciliationTaskId) -> InfraResult<ReconciliationTask> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("reconciliation task"))?;
        let mut next = task.clone();
        next.cancel()?;
        *task = next.clone();
        Ok(next)
    }
}
