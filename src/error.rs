use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// The only failure surface of the resolution service. Callers branch on
/// the kind; the wrapped cause is for diagnostics.
#[derive(Error, Debug)]
#[error("address resolution failed: {source}")]
pub struct AddressResolutionError {
    #[from]
    pub source: StorageError,
}

#[derive(Error, Debug)]
#[error("invalid address value: {0}")]
pub struct InvalidAddressInput(pub String);
