//! Domain error model.

use thiserror::Error;

use crate::id::{AccountId, ProductId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a [`DomainError`].
///
/// Transports map these to status codes; none of them is retried automatically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input (client error).
    Validation,
    /// Duplicate code, referenced-by-product, already-exists.
    Conflict,
    /// Missing entity, or entity outside the caller's location scope.
    NotFound,
    /// Frozen account, invalid task transition.
    State,
    /// Insufficient stock.
    InvariantViolation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::State => "state_error",
            ErrorKind::InvariantViolation => "invariant_violation",
        }
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Every rejected
/// precondition gets its own variant so callers can tell them apart. Storage
/// failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. blank name, negative threshold).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A specification combination was empty or not a mapping.
    #[error("invalid specification: {0}")]
    InvalidSpecification(String),

    /// Ledger action outside `in` / `out` / `adjust`.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Ledger magnitude missing, non-integer, or not positive for `in`/`out`.
    #[error("invalid magnitude: {0}")]
    InvalidMagnitude(String),

    /// A reconciliation proposal without items.
    #[error("reconciliation task must contain at least one item")]
    EmptyTask,

    /// A unique code (category code, product external code) is already taken.
    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    /// An inventory account already exists for the (product, location) pair.
    #[error("inventory account already exists for this product and location ({account_id})")]
    DuplicateAccount { account_id: AccountId },

    /// A catalog entry cannot be deactivated while products still use it.
    #[error("referenced by product: {0}")]
    ReferencedByProduct(String),

    /// A product with an identical specification combination already exists.
    #[error("product with this specification combination already exists ({product_id})")]
    AlreadyExists { product_id: ProductId },

    /// A requested resource was not found (or is outside the caller's location).
    #[error("not found: {0}")]
    NotFound(String),

    /// A reconciliation item targets an account from another location.
    #[error("cross-location violation: {0}")]
    CrossLocationViolation(String),

    /// The account is frozen and refuses every ledger action.
    #[error("inventory account is frozen")]
    AccountFrozen,

    /// A reconciliation task transition that is not allowed from its current status.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The change would drive the quantity below zero.
    #[error("insufficient stock (available: {available}, change: {requested_change})")]
    InsufficientStock {
        available: i64,
        requested_change: i64,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_specification(msg: impl Into<String>) -> Self {
        Self::InvalidSpecification(msg.into())
    }

    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    pub fn invalid_magnitude(msg: impl Into<String>) -> Self {
        Self::InvalidMagnitude(msg.into())
    }

    pub fn duplicate_code(msg: impl Into<String>) -> Self {
        Self::DuplicateCode(msg.into())
    }

    pub fn referenced_by_product(msg: impl Into<String>) -> Self {
        Self::ReferencedByProduct(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn cross_location(msg: impl Into<String>) -> Self {
        Self::CrossLocationViolation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_)
            | DomainError::InvalidSpecification(_)
            | DomainError::InvalidAction(_)
            | DomainError::InvalidMagnitude(_)
            | DomainError::EmptyTask => ErrorKind::Validation,
            DomainError::DuplicateCode(_)
            | DomainError::DuplicateAccount { .. }
            | DomainError::ReferencedByProduct(_)
            | DomainError::AlreadyExists { .. } => ErrorKind::Conflict,
            DomainError::NotFound(_) | DomainError::CrossLocationViolation(_) => {
                ErrorKind::NotFound
            }
            DomainError::AccountFrozen | DomainError::InvalidTransition(_) => ErrorKind::State,
            DomainError::InsufficientStock { .. } => ErrorKind::InvariantViolation,
        }
    }

    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidSpecification(_) => "invalid_specification",
            DomainError::InvalidAction(_) => "invalid_action",
            DomainError::InvalidMagnitude(_) => "invalid_magnitude",
            DomainError::EmptyTask => "empty_task",
            DomainError::DuplicateCode(_) => "duplicate_code",
            DomainError::DuplicateAccount { .. } => "duplicate_account",
            DomainError::ReferencedByProduct(_) => "referenced_by_product",
            DomainError::AlreadyExists { .. } => "already_exists",
            DomainError::NotFound(_) => "not_found",
            DomainError::CrossLocationViolation(_) => "cross_location_violation",
            DomainError::AccountFrozen => "account_frozen",
            DomainError::InvalidTransition(_) => "invalid_transition",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(DomainError::EmptyTask.kind(), ErrorKind::Validation);
        assert_eq!(
            DomainError::AlreadyExists { product_id: ProductId::new() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(DomainError::cross_location("x").kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::AccountFrozen.kind(), ErrorKind::State);
        assert_eq!(
            DomainError::InsufficientStock { available: 1, requested_change: -2 }.kind(),
            ErrorKind::InvariantViolation
        );
    }

    #[test]
    fn codes_are_distinct_per_variant() {
        let errors = [
            DomainError::validation("x"),
            DomainError::invalid_specification("x"),
            DomainError::invalid_action("x"),
            DomainError::invalid_magnitude("x"),
            DomainError::EmptyTask,
            DomainError::duplicate_code("x"),
            DomainError::DuplicateAccount { account_id: AccountId::new() },
            DomainError::referenced_by_product("x"),
            DomainError::AlreadyExists { product_id: ProductId::new() },
            DomainError::not_found("x"),
            DomainError::cross_location("x"),
            DomainError::AccountFrozen,
            DomainError::invalid_transition("x"),
            DomainError::InsufficientStock { available: 0, requested_change: -1 },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
