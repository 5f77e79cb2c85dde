use thiserror::Error;

use stockledger_core::{DomainError, ErrorKind};

pub type InfraResult<T> = Result<T, InfraError>;

/// Failure of a service call: either a rejected domain precondition or a
/// backend that could not complete the write. A storage failure inside an
/// atomic account + ledger write leaves neither side changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl InfraError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Domain kind, or `None` for storage failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            InfraError::Domain(e) => Some(e.kind()),
            InfraError::Storage(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InfraError::Domain(e) => e.code(),
            InfraError::Storage(_) => "storage_failure",
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            InfraError::Domain(e) => Some(e),
            InfraError::Storage(_) => None,
        }
    }
}

/// Poisoned lock in the in-memory backend.
pub(crate) fn poisoned<T>(_: T) -> InfraError {
    InfraError::storage("in-memory store lock poisoned")
}
