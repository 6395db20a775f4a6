//! Audit trail types
//!
//! Stored entries are immutable. Each carries the hash of its predecessor so
//! any edit or deletion breaks the chain.

use serde::{Deserialize, Serialize};
use shared::order::{AuditEventKind, AuditSeverity};

/// Hash used as `prev_hash` of the first entry
pub const GENESIS_HASH: &str = "genesis";

/// One persisted audit entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Global, gap-free sequence number (starts at 1)
    pub sequence: u64,
    pub order_id: String,
    pub kind: AuditEventKind,
    pub severity: AuditSeverity,
    pub actor_id: String,
    pub actor_name: String,
    /// Event time (Unix millis)
    pub timestamp: i64,
    pub description: String,
    pub payload: serde_json::Value,
    pub prev_hash: String,
    /// SHA-256 over prev_hash and every stored field
    pub curr_hash: String,
}

/// Where the chain stops matching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditChainBreak {
    pub sequence: u64,
    pub expected_prev_hash: String,
    pub actual_prev_hash: String,
    /// `curr_hash` no longer matches the entry's own fields
    pub tampered: bool,
}

/// Result of walking the whole chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditChainVerification {
    pub total_entries: u64,
    pub chain_intact: bool,
    pub breaks: Vec<AuditChainBreak>,
}
