//! Audit log background worker
//!
//! Drains the audit channel into `AuditStorage`. Stops when the channel
//! closes or the shutdown token fires; queued events are flushed first.

use shared::order::AuditEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::storage::AuditStorage;

pub struct AuditWorker {
    storage: AuditStorage,
}

impl AuditWorker {
    pub fn new(storage: AuditStorage) -> Self {
        Self { storage }
    }

    /// Run until the channel closes or `shutdown` is cancelled
    pub async fn run(self, mut rx: mpsc::Receiver<AuditEvent>, shutdown: CancellationToken) {
        tracing::info!("📋 Audit log worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        self.write(event).await;
                    }
                    tracing::info!("Audit log worker received shutdown signal");
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(event) => self.write(event).await,
                    None => {
                        tracing::info!("Audit log channel closed, worker stopping");
                        break;
                    }
                },
            }
        }
    }

    async fn write(&self, event: AuditEvent) {
        let storage = self.storage.clone();
        match tokio::task::spawn_blocking(move || storage.append(event)).await {
            Ok(Ok(entry)) => {
                tracing::debug!(
                    sequence = entry.sequence,
                    order_id = %entry.order_id,
                    kind = %entry.kind,
                    "Audit entry recorded"
                );
            }
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to write audit entry"),
            Err(e) => tracing::error!(error = %e, "Audit write task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{Actor, AuditEventKind};

    fn event(kind: AuditEventKind) -> AuditEvent {
        AuditEvent::new(
            "o1",
            kind,
            &Actor::staff("u1", "Alice"),
            "test",
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn test_worker_persists_until_channel_closes() {
        let storage = AuditStorage::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let worker = AuditWorker::new(storage.clone());

        tx.send(event(AuditEventKind::ItemAdded)).await.unwrap();
        tx.send(event(AuditEventKind::SentToKitchen)).await.unwrap();
        drop(tx);

        worker.run(rx, CancellationToken::new()).await;

        assert_eq!(storage.len().unwrap(), 2);
        assert!(storage.verify_chain().unwrap().chain_intact);
    }

    #[tokio::test]
    async fn test_worker_flushes_on_shutdown() {
        let storage = AuditStorage::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();

        tx.send(event(AuditEventKind::OrderOpened)).await.unwrap();
        token.cancel();

        AuditWorker::new(storage.clone()).run(rx, token).await;

        assert_eq!(storage.len().unwrap(), 1);
    }
}
