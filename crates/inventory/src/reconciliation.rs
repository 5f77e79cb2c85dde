use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AccountId, ActorId, DomainError, DomainResult, Entity, LedgerEntryId, LocationId,
    LocationScoped, ReconciliationItemId, ReconciliationTaskId,
};

use crate::account::InventoryAccount;
use crate::ledger::{ChangeRequest, ChangeSource, LedgerAction, LedgerEntry, RECONCILIATION_REMARK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Confirmed => "confirmed",
            TaskStatus::Canceled => "canceled",
        }
    }
}

impl core::str::FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "confirmed" => Ok(TaskStatus::Confirmed),
            "canceled" => Ok(TaskStatus::Canceled),
            other => Err(DomainError::validation(format!("unknown task status '{other}'"))),
        }
    }
}

/// One counted line of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLine {
    pub account_id: AccountId,
    pub actual_quantity: i64,
}

/// Command: propose a physical count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeCount {
    pub location_id: LocationId,
    pub actor_id: ActorId,
    pub lines: Vec<CountLine>,
    pub remark: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub id: ReconciliationItemId,
    pub task_id: ReconciliationTaskId,
    pub account_id: AccountId,
    /// Account quantity at proposal time.
    pub system_quantity: i64,
    pub actual_quantity: i64,
    /// `actual_quantity - system_quantity`, fixed at proposal time.
    pub difference: i64,
    /// Set in the same write as the ledger entry this item produced.
    pub applied_entry: Option<LedgerEntryId>,
}

impl ReconciliationItem {
    pub fn needs_adjustment(&self) -> bool {
        self.difference != 0 && self.applied_entry.is_none()
    }
}

/// A physical count awaiting confirmation.
///
/// Lifecycle: `pending -> confirmed` or `pending -> canceled`; both terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationTask {
    pub id: ReconciliationTaskId,
    pub location_id: LocationId,
    pub status: TaskStatus,
    pub remark: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<ActorId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub items: Vec<ReconciliationItem>,
}

impl ReconciliationTask {
    /// Snapshot each counted account and compute the differences.
    ///
    /// `lookup` returns the account for an id regardless of location; the scope
    /// check happens here so a foreign account is reported as such.
    pub fn propose<'a, F>(cmd: ProposeCount, lookup: F) -> DomainResult<Self>
    where
        F: Fn(AccountId) -> Option<&'a InventoryAccount>,
    {
        if cmd.lines.is_empty() {
            return Err(DomainError::EmptyTask);
        }

        let task_id = ReconciliationTaskId::new();
        let mut seen = HashSet::with_capacity(cmd.lines.len());
        let mut items = Vec::with_capacity(cmd.lines.len());

        for line in &cmd.lines {
            if line.actual_quantity < 0 {
                return Err(DomainError::validation(format!(
                    "actual quantity for account {} cannot be negative",
                    line.account_id
                )));
            }
            if !seen.insert(line.account_id) {
                return Err(DomainError::validation(format!(
                    "account {} is counted more than once",
                    line.account_id
                )));
            }

            let account = lookup(line.account_id).ok_or_else(|| {
                DomainError::not_found(format!("inventory account {}", line.account_id))
            })?;
            if !account.visible_to(cmd.location_id) {
                return Err(DomainError::cross_location(format!(
                    "account {} belongs to another location",
                    line.account_id
                )));
            }

            let system_quantity = account.quantity();
            items.push(ReconciliationItem {
                id: ReconciliationItemId::new(),
                task_id,
                account_id: line.account_id,
                system_quantity,
                actual_quantity: line.actual_quantity,
                difference: line.actual_quantity - system_quantity,
                applied_entry: None,
            });
        }

        Ok(Self {
            id: task_id,
            location_id: cmd.location_id,
            status: TaskStatus::Pending,
            remark: cmd.remark,
            created_by: cmd.actor_id,
            created_at: cmd.occurred_at,
            confirmed_by: None,
            confirmed_at: None,
            items,
        })
    }

    pub fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != TaskStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "task is {}, expected pending",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Items that still have to go through the ledger, in proposal order.
    pub fn pending_adjustments(&self) -> impl Iterator<Item = &ReconciliationItem> {
        self.items.iter().filter(|i| i.needs_adjustment())
    }

    pub fn has_applied_items(&self) -> bool {
        self.items.iter().any(|i| i.applied_entry.is_some())
    }

    pub fn item(&self, item_id: ReconciliationItemId) -> Option<&ReconciliationItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Ledger request applying `item`'s difference as an `adjust`.
    pub fn adjustment_request(
        &self,
        item: &ReconciliationItem,
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
    ) -> ChangeRequest {
        ChangeRequest {
            location_id: self.location_id,
            account_id: item.account_id,
            actor_id,
            action: LedgerAction::Adjust,
            magnitude: item.difference,
            remark: RECONCILIATION_REMARK.to_string(),
            source: ChangeSource::Reconciliation {
                task_id: self.id,
                item_id: item.id,
            },
            occurred_at,
        }
    }

    /// Record that `item_id` produced `entry_id`. Idempotent for the same entry.
    pub fn mark_item_applied(
        &mut self,
        item_id: ReconciliationItemId,
        entry_id: LedgerEntryId,
    ) -> DomainResult<()> {
        self.ensure_pending()?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| DomainError::not_found(format!("reconciliation item {item_id}")))?;
        match item.applied_entry {
            Some(existing) if existing != entry_id => Err(DomainError::invalid_transition(
                format!("item {item_id} was already applied"),
            )),
            _ => {
                item.applied_entry = Some(entry_id);
                Ok(())
            }
        }
    }

    /// `pending -> confirmed`, only once every nonzero item has been applied.
    pub fn mark_confirmed(&mut self, actor_id: ActorId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;
        if let Some(item) = self.pending_adjustments().next() {
            return Err(DomainError::invalid_transition(format!(
                "item {} has not been applied",
                item.id
            )));
        }
        self.status = TaskStatus::Confirmed;
        self.confirmed_by = Some(actor_id);
        self.confirmed_at = Some(at);
        Ok(())
    }

    /// `pending -> canceled`, refused once any item has touched the ledger.
    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_pending()?;
        if self.has_applied_items() {
            return Err(DomainError::invalid_transition(
                "task has applied items and cannot be canceled",
            ));
        }
        self.status = TaskStatus::Canceled;
        Ok(())
    }
}

impl Entity for ReconciliationTask {
    type Id = ReconciliationTaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl LocationScoped for ReconciliationTask {
    fn location_id(&self) -> LocationId {
        self.location_id
    }
}

/// One item that went through the ledger during a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedItem {
    pub item_id: ReconciliationItemId,
    pub account_id: AccountId,
    pub entry_id: LedgerEntryId,
    pub before: i64,
    pub after: i64,
}

impl AppliedItem {
    pub fn new(item: &ReconciliationItem, entry: &LedgerEntry) -> Self {
        Self {
            item_id: item.id,
            account_id: item.account_id,
            entry_id: entry.id,
            before: entry.before_quantity,
            after: entry.after_quantity,
        }
    }
}

/// The item a confirmation stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item_id: ReconciliationItemId,
    pub account_id: AccountId,
    pub error: String,
    pub message: String,
}

/// Outcome of a confirmation attempt.
///
/// `failure` is set when processing stopped; the task is then still pending and
/// every item in `applied` is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationReport {
    pub task_id: ReconciliationTaskId,
    pub status: TaskStatus,
    pub applied: Vec<AppliedItem>,
    /// Items with zero difference or applied by an earlier attempt.
    pub skipped: Vec<ReconciliationItemId>,
    pub failure: Option<FailedItem>,
}

impl ConfirmationReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.status == TaskStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::OpenAccount;
    use std::collections::HashMap;
    use stockledger_core::ProductId;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn account_at(location_id: LocationId, quantity: i64) -> InventoryAccount {
        InventoryAccount::open(OpenAccount {
            product_id: ProductId::new(),
            location_id,
            actor_id: ActorId::new(),
            display_name: "bar".into(),
            quantity,
            warning_min: 0,
            warning_max: None,
            cost_price: None,
            occurred_at: test_time(),
        })
        .unwrap()
        .account
    }

    fn index(accounts: &[InventoryAccount]) -> HashMap<AccountId, InventoryAccount> {
        accounts.iter().map(|a| (a.id, a.clone())).collect()
    }

    fn propose(
        location_id: LocationId,
        accounts: &HashMap<AccountId, InventoryAccount>,
        lines: Vec<CountLine>,
    ) -> DomainResult<ReconciliationTask> {
        ReconciliationTask::propose(
            ProposeCount {
                location_id,
                actor_id: ActorId::new(),
                lines,
                remark: "monthly".into(),
                occurred_at: test_time(),
            },
            |id| accounts.get(&id),
        )
    }

    #[test]
    fn empty_proposal_is_rejected() {
        let accounts = HashMap::new();
        let err = propose(LocationId::new(), &accounts, vec![]).unwrap_err();
        assert_eq!(err, DomainError::EmptyTask);
    }

    #[test]
    fn proposal_snapshots_and_computes_difference() {
        let loc = LocationId::new();
        let a = account_at(loc, 10);
        let accounts = index(&[a.clone()]);
        let task = propose(
            loc,
            &accounts,
            vec![CountLine { account_id: a.id, actual_quantity: 7 }],
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.items[0].system_quantity, 10);
        assert_eq!(task.items[0].difference, -3);
        assert_eq!(task.items[0].task_id, task.id);
    }

    #[test]
    fn foreign_account_is_cross_location() {
        let a = account_at(LocationId::new(), 10);
        let accounts = index(&[a.clone()]);
        let err = propose(
            LocationId::new(),
            &accounts,
            vec![CountLine { account_id: a.id, actual_quantity: 1 }],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::CrossLocationViolation(_)));
    }

    #[test]
    fn negative_or_repeated_lines_are_invalid() {
        let loc = LocationId::new();
        let a = account_at(loc, 1);
        let accounts = index(&[a.clone()]);
        let negative = propose(
            loc,
            &accounts,
            vec![CountLine { account_id: a.id, actual_quantity: -1 }],
        );
        assert!(matches!(negative, Err(DomainError::Validation(_))));

        let line = CountLine { account_id: a.id, actual_quantity: 1 };
        let repeated = propose(loc, &accounts, vec![line, line]);
        assert!(matches!(repeated, Err(DomainError::Validation(_))));
    }

    #[test]
    fn confirm_drives_adjustments_against_current_quantity() {
        let loc = LocationId::new();
        let mut account = account_at(loc, 10);
        let unchanged = account_at(loc, 4);
        let accounts = index(&[account.clone(), unchanged.clone()]);
        let mut task = propose(
            loc,
            &accounts,
            vec![
                CountLine { account_id: account.id, actual_quantity: 7 },
                CountLine { account_id: unchanged.id, actual_quantity: 4 },
            ],
        )
        .unwrap();

        // Stock moves between proposal and confirmation.
        account
            .record_change(&ChangeRequest::direct(
                loc,
                account.id,
                ActorId::new(),
                LedgerAction::In,
                5,
                "",
                test_time(),
            ))
            .unwrap();
        assert_eq!(account.quantity(), 15);

        let actor = ActorId::new();
        let pending: Vec<_> = task.pending_adjustments().cloned().collect();
        assert_eq!(pending.len(), 1);
        for item in &pending {
            let request = task.adjustment_request(item, actor, test_time());
            assert_eq!(request.remark, RECONCILIATION_REMARK);
            let entry = account.record_change(&request).unwrap();
            assert_eq!(entry.change_quantity, -3);
            assert_eq!(entry.after_quantity, 12);
            task.mark_item_applied(item.id, entry.id).unwrap();
        }

        task.mark_confirmed(actor, test_time()).unwrap();
        assert_eq!(task.status, TaskStatus::Confirmed);
        assert!(matches!(
            task.mark_confirmed(actor, test_time()),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn confirm_refused_while_items_unapplied() {
        let loc = LocationId::new();
        let a = account_at(loc, 10);
        let accounts = index(&[a.clone()]);
        let mut task = propose(
            loc,
            &accounts,
            vec![CountLine { account_id: a.id, actual_quantity: 2 }],
        )
        .unwrap();
        let err = task.mark_confirmed(ActorId::new(), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn cancel_only_from_untouched_pending() {
        let loc = LocationId::new();
        let a = account_at(loc, 10);
        let accounts = index(&[a.clone()]);
        let lines = vec![CountLine { account_id: a.id, actual_quantity: 2 }];

        let mut untouched = propose(loc, &accounts, lines.clone()).unwrap();
        untouched.cancel().unwrap();
        assert_eq!(untouched.status, TaskStatus::Canceled);
        assert!(untouched.cancel().is_err());

        let mut partial = propose(loc, &accounts, lines).unwrap();
        let item_id = partial.items[0].id;
        partial.mark_item_applied(item_id, LedgerEntryId::new()).unwrap();
        assert!(matches!(partial.cancel(), Err(DomainError::InvalidTransition(_))));
    }

    #[test]
    fn applying_an_item_twice_with_another_entry_is_refused() {
        let loc = LocationId::new();
        let a = account_at(loc, 10);
        let accounts = index(&[a.clone()]);
        let mut task = propose(
            loc,
            &accounts,
            vec![CountLine { account_id: a.id, actual_quantity: 2 }],
        )
        .unwrap();
        let item_id = task.items[0].id;
        let entry = LedgerEntryId::new();
        task.mark_item_applied(item_id, entry).unwrap();
        task.mark_item_applied(item_id, entry).unwrap();
        assert!(task.mark_item_applied(item_id, LedgerEntryId::new()).is_err());
        assert_eq!(task.pending_adjustments().count(), 0);
    }
}
