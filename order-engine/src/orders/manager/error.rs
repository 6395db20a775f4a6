use super::super::error::OrderError;
use super::super::storage::StoreError;
use crate::printing::DispatchError;
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The transition happened in memory but is not yet durable; `flush`
    /// retries the save
    #[error("Order {order_id} could not be persisted: {source}")]
    Persistence {
        order_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Kitchen dispatch error: {0}")]
    Dispatch(DispatchError),
}

impl From<DispatchError> for ManagerError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Order(e) => ManagerError::Order(e),
            other => ManagerError::Dispatch(other),
        }
    }
}

impl ManagerError {
    /// Whether the caller can retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ManagerError::Store(_) | ManagerError::Persistence { .. }
        )
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
