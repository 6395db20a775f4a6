//! redb-based audit trail storage
//!
//! Append-only: there is no update or delete API. Every entry is linked to
//! its predecessor through a SHA-256 hash chain.
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `audit_log` | `sequence` | JSON `AuditEntry` |
//! | `audit_log_by_order` | `(order_id, sequence)` | `()` |

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use sha2::{Digest, Sha256};
use shared::order::{AuditEvent, AuditEventKind, AuditSeverity};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::types::{AuditChainBreak, AuditChainVerification, AuditEntry, GENESIS_HASH};

const AUDIT_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");

const AUDIT_BY_ORDER_TABLE: TableDefinition<(&str, u64), ()> =
    TableDefinition::new("audit_log_by_order");

#[derive(Debug, Error)]
pub enum AuditStorageError {
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
}

pub type AuditStorageResult<T> = Result<T, AuditStorageError>;

/// Audit trail storage (redb)
#[derive(Clone)]
pub struct AuditStorage {
    db: Arc<Database>,
}

impl AuditStorage {
    /// Open or create the audit database
    pub fn open(path: impl AsRef<Path>) -> AuditStorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> AuditStorageResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> AuditStorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(AUDIT_TABLE)?;
            let _ = write_txn.open_table(AUDIT_BY_ORDER_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append one event to the chain
    ///
    /// redb serializes write transactions, so reading the tail and writing
    /// the new entry happen atomically.
    pub fn append(&self, event: AuditEvent) -> AuditStorageResult<AuditEntry> {
        let txn = self.db.begin_write()?;
        let entry = {
            let mut table = txn.open_table(AUDIT_TABLE)?;

            let (sequence, prev_hash) = match table.last()? {
                Some((key, value)) => {
                    let last: AuditEntry = serde_json::from_slice(value.value())?;
                    (key.value() + 1, last.curr_hash)
                }
                None => (1, GENESIS_HASH.to_string()),
            };

            let curr_hash = compute_audit_hash(
                &prev_hash,
                sequence,
                event.timestamp,
                event.kind,
                event.severity,
                &event.order_id,
                &event.actor_id,
                &event.actor_name,
                &event.description,
                &event.payload,
            );

            let entry = AuditEntry {
                sequence,
                order_id: event.order_id,
                kind: event.kind,
                severity: event.severity,
                actor_id: event.actor_id,
                actor_name: event.actor_name,
                timestamp: event.timestamp,
                description: event.description,
                payload: event.payload,
                prev_hash,
                curr_hash,
            };

            let bytes = serde_json::to_vec(&entry)?;
            table.insert(sequence, bytes.as_slice())?;

            let mut idx = txn.open_table(AUDIT_BY_ORDER_TABLE)?;
            idx.insert((entry.order_id.as_str(), sequence), ())?;

            entry
        };
        txn.commit()?;
        Ok(entry)
    }

    /// All entries of one order, oldest first
    pub fn query_order(&self, order_id: &str) -> AuditStorageResult<Vec<AuditEntry>> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(AUDIT_BY_ORDER_TABLE)?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut entries = Vec::new();
        for result in idx.range((order_id, 0u64)..=(order_id, u64::MAX))? {
            let (key, _) = result?;
            let (_, sequence) = key.value();
            if let Some(guard) = table.get(sequence)? {
                entries.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(entries)
    }

    /// Last `count` entries, newest first
    pub fn query_last(&self, count: usize) -> AuditStorageResult<Vec<AuditEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut entries = Vec::with_capacity(count);
        for result in table.iter()?.rev().take(count) {
            let (_, guard) = result?;
            entries.push(serde_json::from_slice(guard.value())?);
        }
        Ok(entries)
    }

    /// Number of stored entries
    pub fn len(&self) -> AuditStorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> AuditStorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Walk the chain from genesis and report every break
    pub fn verify_chain(&self) -> AuditStorageResult<AuditChainVerification> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_TABLE)?;

        let mut expected_prev = GENESIS_HASH.to_string();
        let mut total_entries = 0u64;
        let mut breaks = Vec::new();

        for result in table.iter()? {
            let (_, guard) = result?;
            let entry: AuditEntry = serde_json::from_slice(guard.value())?;
            total_entries += 1;

            let recomputed = compute_audit_hash(
                &entry.prev_hash,
                entry.sequence,
                entry.timestamp,
                entry.kind,
                entry.severity,
                &entry.order_id,
                &entry.actor_id,
                &entry.actor_name,
                &entry.description,
                &entry.payload,
            );
            let tampered = recomputed != entry.curr_hash;

            if entry.prev_hash != expected_prev || tampered {
                breaks.push(AuditChainBreak {
                    sequence: entry.sequence,
                    expected_prev_hash: expected_prev.clone(),
                    actual_prev_hash: entry.prev_hash.clone(),
                    tampered,
                });
            }
            expected_prev = entry.curr_hash;
        }

        Ok(AuditChainVerification {
            total_entries,
            chain_intact: breaks.is_empty(),
            breaks,
        })
    }
}

/// SHA-256 over the predecessor hash and every stored field
///
/// Variable-length fields are `\x00`-separated so `("ab","c")` and
/// `("a","bc")` never collide. Fixed-width integers are little-endian.
#[allow(clippy::too_many_arguments)]
fn compute_audit_hash(
    prev_hash: &str,
    sequence: u64,
    timestamp: i64,
    kind: AuditEventKind,
    severity: AuditSeverity,
    order_id: &str,
    actor_id: &str,
    actor_name: &str,
    description: &str,
    payload: &serde_json::Value,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(prev_hash.as_bytes());
    hasher.update(b"\x00");

    hasher.update(sequence.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());

    // serde names are stable across releases, Debug output is not
    let kind_str = serde_json::to_string(&kind).unwrap_or_default();
    hasher.update(kind_str.as_bytes());
    hasher.update(b"\x00");
    let severity_str = serde_json::to_string(&severity).unwrap_or_default();
    hasher.update(severity_str.as_bytes());
    hasher.update(b"\x00");

    for field in [order_id, actor_id, actor_name, description] {
        hasher.update(field.as_bytes());
        hasher.update(b"\x00");
    }

    let payload_json = serde_json::to_string(payload).unwrap_or_default();
    hasher.update(payload_json.as_bytes());

    hex::encode(hasher.finalize())
}
