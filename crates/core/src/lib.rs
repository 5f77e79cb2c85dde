//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, LocationScoped};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{
    AccountId, ActorId, LedgerEntryId, LocationId, ProductId, ReconciliationItemId,
    ReconciliationTaskId, SpecCategoryId, SpecOptionId,
};
pub use value_object::ValueObject;
