//! redb-based storage for emitted kitchen tickets (reprint history)

use super::types::KitchenTicket;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Tickets table: key = ticket_id, value = JSON
const TICKETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kitchen_tickets");

/// Index: (order_id, ticket_id) -> ()
const TICKETS_BY_ORDER_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("kitchen_tickets_by_order");

#[derive(Debug, Error)]
pub enum TicketStorageError {
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

    #[error("Kitchen ticket not found: {0}")]
    TicketNotFound(String),
}

pub type TicketStorageResult<T> = Result<T, TicketStorageError>;

/// Kitchen ticket history
#[derive(Clone)]
pub struct TicketStorage {
    db: Arc<Database>,
}

impl TicketStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> TicketStorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> TicketStorageResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> TicketStorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TICKETS_TABLE)?;
            let _ = write_txn.open_table(TICKETS_BY_ORDER_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Store a batch of tickets in one transaction
    pub fn store_tickets(&self, tickets: &[KitchenTicket]) -> TicketStorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TICKETS_TABLE)?;
            let mut idx_table = txn.open_table(TICKETS_BY_ORDER_TABLE)?;
            for ticket in tickets {
                let value = serde_json::to_vec(ticket)?;
                table.insert(ticket.id.as_str(), value.as_slice())?;
                idx_table.insert((ticket.order_id.as_str(), ticket.id.as_str()), ())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Get a ticket by ID
    pub fn get_ticket(&self, id: &str) -> TicketStorageResult<Option<KitchenTicket>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Tickets emitted for an order, oldest first
    pub fn tickets_for_order(&self, order_id: &str) -> TicketStorageResult<Vec<KitchenTicket>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(TICKETS_BY_ORDER_TABLE)?;
        let data_table = read_txn.open_table(TICKETS_TABLE)?;

        let mut tickets = Vec::new();
        let range_start: (&str, &str) = (order_id, "");
        let range_end: (&str, &str) = (order_id, "\u{ffff}");

        for result in idx_table.range(range_start..=range_end)? {
            let (key, _) = result?;
            let (_, ticket_id) = key.value();
            if let Some(guard) = data_table.get(ticket_id)? {
                let ticket: KitchenTicket = serde_json::from_slice(guard.value())?;
                tickets.push(ticket);
            }
        }

        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    /// Bump a ticket's print count and return the updated ticket
    pub fn increment_print_count(&self, id: &str) -> TicketStorageResult<KitchenTicket> {
        let txn = self.db.begin_write()?;
        let ticket = {
            let mut table = txn.open_table(TICKETS_TABLE)?;

            let bytes = {
                let value = table
                    .get(id)?
                    .ok_or_else(|| TicketStorageError::TicketNotFound(id.to_string()))?;
                value.value().to_vec()
            };

            let mut ticket: KitchenTicket = serde_json::from_slice(&bytes)?;
            ticket.print_count += 1;

            let new_value = serde_json::to_vec(&ticket)?;
            table.insert(id, new_value.as_slice())?;
            ticket
        };
        txn.commit()?;
        Ok(ticket)
    }

    pub fn count(&self) -> TicketStorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;
        Ok(table.len()?)
    }
}
