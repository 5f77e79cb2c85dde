//! Physical count workflow: propose, then confirm or cancel.
//!
//! Confirmation is a sequence of independent ledger writes, one per item with
//! a nonzero difference. Each write marks its item applied atomically, so a
//! confirmation that stops partway can be retried without applying any item
//! twice. The task only leaves `pending` once every such item is applied.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use stockledger_core::{
    AccountId, ActorId, DomainError, LocationId, LocationScoped, ReconciliationTaskId,
};
use stockledger_inventory::{
    AppliedItem, ConfirmationReport, CountLine, FailedItem, InventoryAccount, ProposeCount,
    ReconciliationTask, TaskStatus,
};

use crate::error::{InfraError, InfraResult};
use crate::services::ledger::LedgerService;
use crate::store::InventoryStore;

#[derive(Debug, Clone)]
pub struct ReconciliationService<S> {
    store: S,
    ledger: LedgerService<S>,
}

impl<S: InventoryStore + Clone> ReconciliationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: LedgerService::new(store.clone()),
            store,
        }
    }

    pub async fn propose(
        &self,
        actor_id: ActorId,
        location_id: LocationId,
        lines: Vec<CountLine>,
        remark: &str,
        at: DateTime<Utc>,
    ) -> InfraResult<ReconciliationTask> {
        let mut snapshots: Vec<InventoryAccount> = Vec::with_capacity(lines.len());
        for line in &lines {
            if snapshots.iter().any(|a| a.id == line.account_id) {
                continue;
            }
            if let Some(account) = self.store.get_account(line.account_id).await? {
                snapshots.push(account);
            }
        }

        let task = ReconciliationTask::propose(
            ProposeCount {
                location_id,
                actor_id,
                lines,
                remark: remark.to_string(),
                occurred_at: at,
            },
            |id: AccountId| snapshots.iter().find(|a| a.id == id),
        )?;

        self.store.insert_task(&task).await?;
        info!(
            task_id = %task.id,
            location_id = %location_id,
            items = task.items.len(),
            "reconciliation task proposed"
        );
        Ok(task)
    }

    /// Apply every outstanding difference, then move the task to confirmed.
    ///
    /// Returns `Err` only when the task itself cannot be confirmed (absent,
    /// wrong location, not pending). An item failure yields `Ok` with the
    /// report's `failure` set and the task still pending.
    pub async fn confirm(
        &self,
        task_id: ReconciliationTaskId,
        location_id: LocationId,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> InfraResult<ConfirmationReport> {
        let task = self.get(task_id, location_id).await?;
        task.ensure_pending()?;

        let mut report = ConfirmationReport {
            task_id,
            status: TaskStatus::Pending,
            applied: Vec::new(),
            skipped: task
                .items
                .iter()
                .filter(|i| !i.needs_adjustment())
                .map(|i| i.id)
                .collect(),
            failure: None,
        };

        for item in task.pending_adjustments() {
            let request = task.adjustment_request(item, actor_id, at);
            match self.ledger.record(request).await {
                Ok(outcome) => report.applied.push(AppliedItem::new(item, &outcome.entry)),
                Err(e) => {
                    warn!(
                        task_id = %task_id,
                        item_id = %item.id,
                        account_id = %item.account_id,
                        error = %e,
                        applied = report.applied.len(),
                        "reconciliation confirmation stopped"
                    );
                    report.failure = Some(FailedItem {
                        item_id: item.id,
                        account_id: item.account_id,
                        error: e.code().to_string(),
                        message: e.to_string(),
                    });
                    return Ok(report);
                }
            }
        }

        let confirmed = self.store.confirm_task(task_id, actor_id, at).await?;
        report.status = confirmed.status;
        info!(
            task_id = %task_id,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "reconciliation task confirmed"
        );
        Ok(report)
    }

    pub async fn cancel(
        &self,
        task_id: ReconciliationTaskId,
        location_id: LocationId,
    ) -> InfraResult<ReconciliationTask> {
        self.get(task_id, location_id).await?;
        let task = self.store.cancel_task(task_id).await?;
        info!(task_id = %task_id, "reconciliation task canceled");
        Ok(task)
    }

    /// Scoped lookup: a task of another location is reported as absent.
    pub async fn get(
        &self,
        task_id: ReconciliationTaskId,
        location_id: LocationId,
    ) -> InfraResult<ReconciliationTask> {
        self.store
            .get_task(task_id)
            .await?
            .filter(|t| t.visible_to(location_id))
            .ok_or_else(|| InfraError::from(DomainError::not_found("reconciliation task")))
    }
}
