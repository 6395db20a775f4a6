//! Audit logging service
//!
//! `AuditService` is the production [`AuditLogger`]: events go through a
//! bounded mpsc channel to [`super::AuditWorker`], which appends them to the
//! hash-chained [`AuditStorage`]. Queries read the storage directly.

use shared::order::{AuditEvent, AuditSeverity};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::storage::{AuditStorage, AuditStorageResult};
use super::types::{AuditChainVerification, AuditEntry};

/// Fire-and-forget sink for audit events
///
/// Called after a state transition has succeeded. Implementations must not
/// block, and a failure to deliver never affects the caller.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Channel-backed audit logger with hash-chained persistence
pub struct AuditService {
    storage: AuditStorage,
    tx: mpsc::Sender<AuditEvent>,
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService")
            .field("capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

impl AuditService {
    /// Create the service and the receiving end for the worker
    pub fn new(
        storage: AuditStorage,
        buffer_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Arc::new(Self { storage, tx }), rx)
    }

    pub fn storage(&self) -> &AuditStorage {
        &self.storage
    }

    /// Entries of one order, oldest first
    pub fn query_order(&self, order_id: &str) -> AuditStorageResult<Vec<AuditEntry>> {
        self.storage.query_order(order_id)
    }

    pub fn verify_chain(&self) -> AuditStorageResult<AuditChainVerification> {
        self.storage.verify_chain()
    }
}

impl AuditLogger for AuditService {
    fn record(&self, event: AuditEvent) {
        match event.severity {
            AuditSeverity::Info => tracing::info!(
                target: "audit",
                order_id = %event.order_id,
                kind = %event.kind,
                actor = %event.actor_name,
                "{}",
                event.description
            ),
            AuditSeverity::Warning => tracing::warn!(
                target: "audit",
                order_id = %event.order_id,
                kind = %event.kind,
                actor = %event.actor_name,
                "{}",
                event.description
            ),
        }

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    order_id = %event.order_id,
                    kind = %event.kind,
                    "Audit channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::error!(
                    order_id = %event.order_id,
                    kind = %event.kind,
                    "Audit channel closed, event dropped"
                );
            }
        }
    }
}
