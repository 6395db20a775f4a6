use thiserror::Error;

/// Aggregate validation errors
///
/// Returned synchronously by `OrderAggregate`. The order is left untouched
/// whenever one of these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),

    #[error("Invalid gratuity: {0}")]
    InvalidGratuity(String),

    #[error("Invalid note: {0}")]
    InvalidNote(String),

    #[error("Item {item_id} was already sent to the kitchen; removal requires a manager")]
    RemovalNotPermitted { item_id: String },

    #[error("Items already sent to the kitchen: {}", item_ids.join(", "))]
    AlreadySent { item_ids: Vec<String> },

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Order {order_id} is closed ({status})")]
    OrderClosed { order_id: String, status: String },

    #[error("Order {0} still has unsent items; clear them before cancelling")]
    PendingItemsMustBeCleared(String),

    #[error("Order {0} has no items")]
    EmptyOrder(String),
}

pub type OrderResult<T> = Result<T, OrderError>;
