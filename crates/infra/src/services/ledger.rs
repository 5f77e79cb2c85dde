use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockledger_core::{AccountId, ActorId, LocationId};
use stockledger_inventory::{ChangeRequest, LedgerAction, LedgerEntry};

use crate::error::InfraResult;
use crate::ledger_query::{LedgerFilter, LedgerPage, Pagination};
use crate::store::InventoryStore;

/// Quantities around an accepted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub before: i64,
    pub after: i64,
    pub entry: LedgerEntry,
}

/// The inventory ledger: the only way a quantity changes.
#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
}

impl<S: InventoryStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn apply(
        &self,
        account_id: AccountId,
        location_id: LocationId,
        actor_id: ActorId,
        action: LedgerAction,
        magnitude: i64,
        remark: &str,
        at: DateTime<Utc>,
    ) -> InfraResult<ChangeOutcome> {
        let request = ChangeRequest::direct(
            location_id,
            account_id,
            actor_id,
            action,
            magnitude,
            remark,
            at,
        );
        self.record(request).await
    }

    /// Shared write path for direct changes and count adjustments.
    pub async fn record(&self, request: ChangeRequest) -> InfraResult<ChangeOutcome> {
        let account_id = request.account_id;
        let action = request.action;
        let magnitude = request.magnitude;

        let written = match action.signed_change(magnitude) {
            Ok(_) => self.store.record_change(request).await,
            Err(e) => Err(e.into()),
        };

        match written {
            Ok(entry) => {
                info!(
                    account_id = %account_id,
                    action = %action,
                    before = entry.before_quantity,
                    after = entry.after_quantity,
                    "ledger entry recorded"
                );
                Ok(ChangeOutcome {
                    before: entry.before_quantity,
                    after: entry.after_quantity,
                    entry,
                })
            }
            Err(e) => {
                warn!(
                    account_id = %account_id,
                    action = %action,
                    magnitude,
                    error = %e,
                    "ledger change rejected"
                );
                Err(e)
            }
        }
    }

    pub async fn query(
        &self,
        location_id: LocationId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> InfraResult<LedgerPage> {
        self.store.query_ledger(location_id, filter, pagination).await
    }
}
