use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unknown tier {0:?}")]
    UnknownTier(String),
    #[error("unknown feature {0:?}")]
    UnknownFeature(String),
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of the backing vendor store. Never produced for a plain denial.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no vendor store attached to the access context")]
    Unconfigured,
    #[error("vendor store lookup failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}
