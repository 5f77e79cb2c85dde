use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AccountId, ActorId, DomainError, DomainResult, Entity, LedgerEntryId, LocationId,
    ReconciliationItemId, ReconciliationTaskId,
};

use crate::account::InventoryAccount;

/// Remark written on entries produced by a confirmed physical count.
pub const RECONCILIATION_REMARK: &str = "reconciliation adjustment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    In,
    Out,
    Adjust,
}

impl LedgerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerAction::In => "in",
            LedgerAction::Out => "out",
            LedgerAction::Adjust => "adjust",
        }
    }

    /// Signed quantity change for `magnitude`.
    ///
    /// `in` and `out` take a strictly positive magnitude; `adjust` takes any
    /// signed value, zero included.
    pub fn signed_change(self, magnitude: i64) -> DomainResult<i64> {
        match self {
            LedgerAction::In | LedgerAction::Out if magnitude <= 0 => Err(
                DomainError::invalid_magnitude(format!(
                    "'{}' requires a positive magnitude, got {magnitude}",
                    self.as_str()
                )),
            ),
            LedgerAction::In => Ok(magnitude),
            LedgerAction::Out => Ok(-magnitude),
            LedgerAction::Adjust => Ok(magnitude),
        }
    }
}

impl core::fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for LedgerAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(LedgerAction::In),
            "out" => Ok(LedgerAction::Out),
            "adjust" => Ok(LedgerAction::Adjust),
            other => Err(DomainError::invalid_action(format!(
                "'{other}' is not one of in, out, adjust"
            ))),
        }
    }
}

/// A planned quantity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub action: LedgerAction,
    pub change_quantity: i64,
    pub before: i64,
    pub after: i64,
}

/// What caused a ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeSource {
    Direct,
    /// A confirmed count item. Storage marks the item applied in the same write.
    Reconciliation {
        task_id: ReconciliationTaskId,
        item_id: ReconciliationItemId,
    },
}

/// Input to the ledger write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub location_id: LocationId,
    pub account_id: AccountId,
    pub actor_id: ActorId,
    pub action: LedgerAction,
    pub magnitude: i64,
    pub remark: String,
    pub source: ChangeSource,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeRequest {
    pub fn direct(
        location_id: LocationId,
        account_id: AccountId,
        actor_id: ActorId,
        action: LedgerAction,
        magnitude: i64,
        remark: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location_id,
            account_id,
            actor_id,
            action,
            magnitude,
            remark: remark.into(),
            source: ChangeSource::Direct,
            occurred_at,
        }
    }
}

/// One immutable row of the inventory ledger.
///
/// Invariant: `after_quantity == before_quantity + change_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: AccountId,
    pub location_id: LocationId,
    pub actor_id: ActorId,
    pub action: LedgerAction,
    pub change_quantity: i64,
    pub before_quantity: i64,
    pub after_quantity: i64,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub(crate) fn record(
        account: &InventoryAccount,
        change: &StockChange,
        request: &ChangeRequest,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            account_id: account.id,
            location_id: account.location_id,
            actor_id: request.actor_id,
            action: change.action,
            change_quantity: change.change_quantity,
            before_quantity: change.before,
            after_quantity: change.after,
            remark: request.remark.clone(),
            created_at: request.occurred_at,
        }
    }

    pub fn change(&self) -> StockChange {
        StockChange {
            action: self.action,
            change_quantity: self.change_quantity,
            before: self.before_quantity,
            after: self.after_quantity,
        }
    }
}

impl Entity for LedgerEntry {
    type Id = LedgerEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
