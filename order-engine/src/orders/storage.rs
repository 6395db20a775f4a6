//! Order persistence
//!
//! [`OrderStore`] is the durable snapshot contract the engine depends on.
//! [`RedbOrderStore`] backs it with redb.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | JSON `Order` | Latest snapshot |
//! | `open_orders` | `order_id` | `()` | Pending/confirmed index |
//! | `counters` | `"order_count"` | `u64` | Order number counter |
//!
//! Saves may complete out of order. A snapshot older than the stored one
//! (lower `revision`) is ignored, so the store always converges on the
//! newest state.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

const OPEN_ORDERS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("open_orders");

const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ORDER_COUNT_KEY: &str = "order_count";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable order snapshots
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the snapshot unless a newer revision is already stored
    async fn save(&self, order: &Order) -> StoreResult<()>;

    /// `StoreError::NotFound` when the id is unknown
    async fn load(&self, order_id: &str) -> StoreResult<Order>;

    async fn delete(&self, order_id: &str) -> StoreResult<()>;

    /// Crash-safe increasing counter for order numbers
    async fn next_order_count(&self) -> StoreResult<u64>;

    /// Every stored order that is still pending or confirmed
    async fn list_open(&self) -> StoreResult<Vec<Order>>;
}

/// redb-backed [`OrderStore`]
///
/// redb calls are blocking; the async trait methods hop onto the blocking
/// pool.
#[derive(Clone)]
pub struct RedbOrderStore {
    db: Arc<Database>,
}

impl RedbOrderStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default, so a save is
    /// on disk once `commit()` returns.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(OPEN_ORDERS_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Returns `false` when the snapshot was stale and skipped
    pub fn save_blocking(&self, order: &Order) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let written = {
            let mut table = txn.open_table(ORDERS_TABLE)?;

            let stored_revision = match table.get(order.id.as_str())? {
                Some(guard) => {
                    let stored: Order = serde_json::from_slice(guard.value())?;
                    Some(stored.revision)
                }
                None => None,
            };

            if stored_revision.is_some_and(|rev| rev > order.revision) {
                false
            } else {
                let value = serde_json::to_vec(order)?;
                table.insert(order.id.as_str(), value.as_slice())?;

                let mut open = txn.open_table(OPEN_ORDERS_TABLE)?;
                if order.is_open() {
                    open.insert(order.id.as_str(), ())?;
                } else {
                    open.remove(order.id.as_str())?;
                }
                true
            }
        };
        txn.commit()?;

        if !written {
            tracing::debug!(
                order_id = %order.id,
                revision = order.revision,
                "Skipped stale snapshot"
            );
        }
        Ok(written)
    }

    pub fn load_blocking(&self, order_id: &str) -> StoreResult<Order> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }

    pub fn delete_blocking(&self, order_id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.remove(order_id)?;
            let mut open = txn.open_table(OPEN_ORDERS_TABLE)?;
            open.remove(order_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn next_order_count_blocking(&self) -> StoreResult<u64> {
        let txn = self.db.begin_write()?;
        let next = {
            let mut table = txn.open_table(COUNTERS_TABLE)?;
            let current = table.get(ORDER_COUNT_KEY)?.map(|g| g.value()).unwrap_or(0);
            let next = current + 1;
            table.insert(ORDER_COUNT_KEY, next)?;
            next
        };
        txn.commit()?;
        Ok(next)
    }

    pub fn list_open_blocking(&self) -> StoreResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let open = read_txn.open_table(OPEN_ORDERS_TABLE)?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in open.iter()? {
            let (key, _) = result?;
            if let Some(guard) = table.get(key.value())? {
                let order: Order = serde_json::from_slice(guard.value())?;
                orders.push(order);
            }
        }
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn run_blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(RedbOrderStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl OrderStore for RedbOrderStore {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        let order = order.clone();
        self.run_blocking(move |store| store.save_blocking(&order).map(|_| ()))
            .await
    }

    async fn load(&self, order_id: &str) -> StoreResult<Order> {
        let order_id = order_id.to_string();
        self.run_blocking(move |store| store.load_blocking(&order_id))
            .await
    }

    async fn delete(&self, order_id: &str) -> StoreResult<()> {
        let order_id = order_id.to_string();
        self.run_blocking(move |store| store.delete_blocking(&order_id))
            .await
    }

    async fn next_order_count(&self) -> StoreResult<u64> {
        self.run_blocking(|store| store.next_order_count_blocking())
            .await
    }

    async fn list_open(&self) -> StoreResult<Vec<Order>> {
        self.run_blocking(|store| store.list_open_blocking()).await
    }
}
