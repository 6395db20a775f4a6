//! Audit trail
//!
//! ```text
//! OrderAggregate / KitchenDispatchEngine
//!   └─ AuditLogger::record() → try_send → AuditWorker → AuditStorage (redb)
//!
//! SHA-256 hash chain: genesis → entry₁ → entry₂ → ... → entryₙ
//! ```
//!
//! Delivery is at-most-once: a full or closed channel drops the event with
//! a log line and never fails the order mutation that produced it.

pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use service::{AuditLogger, AuditService};
pub use storage::{AuditStorage, AuditStorageError, AuditStorageResult};
pub use types::{AuditChainBreak, AuditChainVerification, AuditEntry, GENESIS_HASH};
pub use worker::AuditWorker;
