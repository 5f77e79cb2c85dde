use chrono::{DateTime, Utc};
use tracing::info;

use stockledger_core::{AccountId, ActorId, DomainError, LocationId, LocationScoped, ProductId};
use stockledger_inventory::{AccountUpdate, InventoryAccount, OpenAccount, OpenedAccount};

use crate::error::InfraResult;
use crate::store::{AccountListing, InventoryStore};

/// Input for opening an account, minus the acting identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub product_id: ProductId,
    pub display_name: String,
    pub quantity: i64,
    pub warning_min: i64,
    pub warning_max: Option<i64>,
    pub cost_price: Option<i64>,
}

impl NewAccount {
    pub fn new(product_id: ProductId, display_name: impl Into<String>) -> Self {
        Self {
            product_id,
            display_name: display_name.into(),
            quantity: 0,
            warning_min: 0,
            warning_max: None,
            cost_price: None,
        }
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AccountService<S> {
    store: S,
}

impl<S: InventoryStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        actor_id: ActorId,
        location_id: LocationId,
        input: NewAccount,
        at: DateTime<Utc>,
    ) -> InfraResult<OpenedAccount> {
        let opened = self
            .store
            .open_account(OpenAccount {
                product_id: input.product_id,
                location_id,
                actor_id,
                display_name: input.display_name,
                quantity: input.quantity,
                warning_min: input.warning_min,
                warning_max: input.warning_max,
                cost_price: input.cost_price,
                occurred_at: at,
            })
            .await?;
        info!(
            account_id = %opened.account.id,
            product_id = %opened.account.product_id,
            location_id = %location_id,
            quantity = opened.account.quantity(),
            "inventory account opened"
        );
        Ok(opened)
    }

    pub async fn update_metadata(
        &self,
        id: AccountId,
        location_id: LocationId,
        update: &AccountUpdate,
    ) -> InfraResult<InventoryAccount> {
        let account = self.store.update_account(id, location_id, update).await?;
        info!(account_id = %id, frozen = account.is_frozen, "inventory account updated");
        Ok(account)
    }

    pub async fn list(&self, location_id: LocationId) -> InfraResult<Vec<AccountListing>> {
        self.store.list_accounts(location_id).await
    }

    /// Scoped lookup: an account of another location is reported as absent.
    pub async fn get(&self, id: AccountId, location_id: LocationId) -> InfraResult<InventoryAccount> {
        self.store
            .get_account(id)
            .await?
            .filter(|a| a.visible_to(location_id))
            .ok_or_else(|| DomainError::not_found("inventory account").into())
    }
}
