//! Inventory accounts, the ledger write path and the physical count workflow.
//!
//! Pure domain: no IO. Storage adapters persist what these types decide.

pub mod account;
pub mod ledger;
pub mod reconciliation;

pub use account::{
    AccountUpdate, InventoryAccount, OPENING_BALANCE_REMARK, OpenAccount, OpenedAccount,
    StockLevel,
};
pub use ledger::{
    ChangeRequest, ChangeSource, LedgerAction, LedgerEntry, RECONCILIATION_REMARK, StockChange,
};
pub use reconciliation::{
    AppliedItem, ConfirmationReport, CountLine, FailedItem, ProposeCount, ReconciliationItem,
    ReconciliationTask, TaskStatus,
};
