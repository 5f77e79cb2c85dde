use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AccountId, ActorId, DomainError, DomainResult, Entity, LocationId, LocationScoped, ProductId,
};

use crate::ledger::{ChangeRequest, ChangeSource, LedgerAction, LedgerEntry, StockChange};

/// Remark recorded on the entry that explains an account's opening quantity.
pub const OPENING_BALANCE_REMARK: &str = "opening balance";

/// Per (product, location) stock record.
///
/// `quantity` is only ever changed through [`InventoryAccount::record_change`],
/// which also produces the ledger entry that explains the change. Accounts are
/// never deleted; frozen accounts refuse every ledger action but stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAccount {
    pub id: AccountId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    /// Location-local alias for the product.
    pub display_name: String,
    quantity: i64,
    pub warning_min: i64,
    pub warning_max: Option<i64>,
    /// Reference cost in the smallest currency unit (e.g. cents).
    pub cost_price: Option<i64>,
    pub is_frozen: bool,
    pub created_at: DateTime<Utc>,
}

/// Command: open a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub actor_id: ActorId,
    pub display_name: String,
    pub quantity: i64,
    pub warning_min: i64,
    pub warning_max: Option<i64>,
    pub cost_price: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Result of opening an account: the row plus the entry explaining a nonzero
/// opening quantity. Both must be persisted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedAccount {
    pub account: InventoryAccount,
    pub opening_entry: Option<LedgerEntry>,
}

/// Metadata-only update. `quantity` is not reachable from here.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub display_name: Option<String>,
    pub warning_min: Option<i64>,
    pub warning_max: Option<Option<i64>>,
    pub cost_price: Option<Option<i64>>,
    pub is_frozen: Option<bool>,
}

/// Where the quantity sits relative to the warning thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    BelowMinimum,
    Normal,
    AboveMaximum,
}

impl InventoryAccount {
    pub fn open(cmd: OpenAccount) -> DomainResult<OpenedAccount> {
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display_name cannot be empty"));
        }
        if cmd.quantity < 0 {
            return Err(DomainError::validation("opening quantity cannot be negative"));
        }
        validate_thresholds(cmd.warning_min, cmd.warning_max)?;
        validate_cost(cmd.cost_price)?;

        let mut account = InventoryAccount {
            id: AccountId::new(),
            product_id: cmd.product_id,
            location_id: cmd.location_id,
            display_name: cmd.display_name,
            quantity: 0,
            warning_min: cmd.warning_min,
            warning_max: cmd.warning_max,
            cost_price: cmd.cost_price,
            is_frozen: false,
            created_at: cmd.occurred_at,
        };

        let opening_entry = if cmd.quantity > 0 {
            let request = ChangeRequest {
                location_id: cmd.location_id,
                account_id: account.id,
                actor_id: cmd.actor_id,
                action: LedgerAction::In,
                magnitude: cmd.quantity,
                remark: OPENING_BALANCE_REMARK.to_string(),
                source: ChangeSource::Direct,
                occurred_at: cmd.occurred_at,
            };
            Some(account.record_change(&request)?)
        } else {
            None
        };

        Ok(OpenedAccount {
            account,
            opening_entry,
        })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn stock_level(&self) -> StockLevel {
        if self.quantity < self.warning_min {
            StockLevel::BelowMinimum
        } else if self.warning_max.is_some_and(|max| self.quantity > max) {
            StockLevel::AboveMaximum
        } else {
            StockLevel::Normal
        }
    }

    /// Apply a metadata update. Validation happens on the merged result, so a
    /// rejected update leaves the account untouched.
    pub fn apply_update(&mut self, update: &AccountUpdate) -> DomainResult<()> {
        let mut next = self.clone();

        if let Some(name) = &update.display_name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("display_name cannot be empty"));
            }
            next.display_name = name.clone();
        }
        if let Some(min) = update.warning_min {
            next.warning_min = min;
        }
        if let Some(max) = update.warning_max {
            next.warning_max = max;
        }
        if let Some(cost) = update.cost_price {
            next.cost_price = cost;
        }
        if let Some(frozen) = update.is_frozen {
            next.is_frozen = frozen;
        }

        validate_thresholds(next.warning_min, next.warning_max)?;
        validate_cost(next.cost_price)?;

        *self = next;
        Ok(())
    }

    /// Decide a quantity change without mutating anything.
    ///
    /// Enforces, in order: positive magnitude for `in`/`out`, location scope,
    /// frozen gate, non-negative result.
    pub fn plan_change(
        &self,
        location_id: LocationId,
        action: LedgerAction,
        magnitude: i64,
    ) -> DomainResult<StockChange> {
        let change_quantity = action.signed_change(magnitude)?;

        if !self.visible_to(location_id) {
            return Err(DomainError::not_found("inventory account"));
        }

        if self.is_frozen {
            return Err(DomainError::AccountFrozen);
        }

        let after = self
            .quantity
            .checked_add(change_quantity)
            .ok_or_else(|| DomainError::invalid_magnitude("quantity overflow"))?;

        if after < 0 {
            return Err(DomainError::InsufficientStock {
                available: self.quantity,
                requested_change: change_quantity,
            });
        }

        Ok(StockChange {
            action,
            change_quantity,
            before: self.quantity,
            after,
        })
    }

    /// The single choke point for quantity mutation.
    ///
    /// Plans the change, applies it, and returns the ledger entry that must be
    /// persisted in the same atomic write as the new quantity. On error the
    /// account is unchanged.
    pub fn record_change(&mut self, request: &ChangeRequest) -> DomainResult<LedgerEntry> {
        request.action.signed_change(request.magnitude)?;
        if request.account_id != self.id {
            return Err(DomainError::not_found("inventory account"));
        }
        let change = self.plan_change(request.location_id, request.action, request.magnitude)?;

        self.quantity = change.after;

        Ok(LedgerEntry::record(self, &change, request))
    }

    /// Rebuild an account from storage. Only storage adapters should call this.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: AccountId,
        product_id: ProductId,
        location_id: LocationId,
        display_name: String,
        quantity: i64,
        warning_min: i64,
        warning_max: Option<i64>,
        cost_price: Option<i64>,
        is_frozen: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            location_id,
            display_name,
            quantity,
            warning_min,
            warning_max,
            cost_price,
            is_frozen,
            created_at,
        }
    }
}

impl Entity for InventoryAccount {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl LocationScoped for InventoryAccount {
    fn location_id(&self) -> LocationId {
        self.location_id
    }
}

fn validate_thresholds(min: i64, max: Option<i64>) -> DomainResult<()> {
    if min < 0 {
        return Err(DomainError::validation("warning_min cannot be negative"));
    }
    if let Some(max) = max {
        if max < min {
            return Err(DomainError::validation("warning_max cannot be below warning_min"));
        }
    }
    Ok(())
}

fn validate_cost(cost: Option<i64>) -> DomainResult<()> {
    if cost.is_some_and(|c| c < 0) {
        return Err(DomainError::validation("cost_price cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_with(quantity: i64) -> OpenedAccount {
        InventoryAccount::open(OpenAccount {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            actor_id: ActorId::new(),
            display_name: "Bar 2m".to_string(),
            quantity,
            warning_min: 0,
            warning_max: None,
            cost_price: None,
            occurred_at: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn opening_quantity_is_explained_by_an_entry() {
        let opened = open_with(10);
        assert_eq!(opened.account.quantity(), 10);
        let entry = opened.opening_entry.expect("opening entry");
        assert_eq!(entry.action, LedgerAction::In);
        assert_eq!((entry.before_quantity, entry.after_quantity), (0, 10));
        assert_eq!(entry.remark, OPENING_BALANCE_REMARK);
    }

    #[test]
    fn zero_opening_quantity_has_no_entry() {
        let opened = open_with(0);
        assert_eq!(opened.account.quantity(), 0);
        assert!(opened.opening_entry.is_none());
    }

    #[test]
    fn negative_opening_quantity_is_rejected() {
        let err = InventoryAccount::open(OpenAccount {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            actor_id: ActorId::new(),
            display_name: "x".into(),
            quantity: -1,
            warning_min: 0,
            warning_max: None,
            cost_price: None,
            occurred_at: Utc::now(),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_changes_metadata_only() {
        let mut account = open_with(5).account;
        account
            .apply_update(&AccountUpdate {
                display_name: Some("Alias".into()),
                warning_min: Some(2),
                warning_max: Some(Some(50)),
                cost_price: Some(Some(1250)),
                is_frozen: Some(true),
            })
            .unwrap();
        assert_eq!(account.display_name, "Alias");
        assert_eq!(account.warning_max, Some(50));
        assert_eq!(account.cost_price, Some(1250));
        assert!(account.is_frozen);
        assert_eq!(account.quantity(), 5);

        account
            .apply_update(&AccountUpdate {
                warning_max: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(account.warning_max, None);
    }

    #[test]
    fn invalid_update_leaves_account_untouched() {
        let mut account = open_with(5).account;
        let before = account.clone();
        let err = account
            .apply_update(&AccountUpdate {
                display_name: Some("New".into()),
                warning_min: Some(10),
                warning_max: Some(Some(3)),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(account, before);
    }

    #[test]
    fn magnitude_is_checked_before_location_scope() {
        let mut account = open_with(10).account;
        let before = account.clone();
        let request = ChangeRequest::direct(
            LocationId::new(),
            account.id,
            ActorId::new(),
            LedgerAction::Out,
            0,
            "",
            Utc::now(),
        );
        let err = account.record_change(&request).unwrap_err();
        assert!(matches!(err, DomainError::InvalidMagnitude(_)));
        assert_eq!(account, before);

        let err = account
            .plan_change(LocationId::new(), LedgerAction::Out, 1)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn opened_account_serializes_with_its_opening_entry() {
        let opened = open_with(3);
        let json = serde_json::to_value(&opened).unwrap();
        assert_eq!(json["account"]["display_name"], "Bar 2m");
        assert_eq!(json["opening_entry"]["after_quantity"], 3);
    }

    #[test]
    fn stock_level_tracks_thresholds() {
        let mut account = open_with(5).account;
        account.warning_min = 6;
        assert_eq!(account.stock_level(), StockLevel::BelowMinimum);
        account.warning_min = 0;
        account.warning_max = Some(4);
        assert_eq!(account.stock_level(), StockLevel::AboveMaximum);
        account.warning_max = Some(5);
        assert_eq!(account.stock_level(), StockLevel::Normal);
    }
}
