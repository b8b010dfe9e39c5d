use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

/// Failure kinds of bill generation and the collaborators it depends on.
///
/// Every variant aborts the operation that raised it; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    /// The caller may not act on the building the record belongs to.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Storage(String),
}
