use anyhow::Context;
use shared::models::{PrintDestination, PrinterAssignment};
use std::sync::Arc;
use std::time::Duration;

use super::config::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::audit::{AuditService, AuditStorage, AuditWorker};
use crate::orders::{OrderStore, OrdersManager, RedbOrderStore};
use crate::printing::{
    AssignmentTable, KitchenDispatchEngine, KitchenTicketRenderer, NetworkPrintDispatcher,
    TicketStorage,
};
use crate::utils::logger::{LOG_RETENTION_DAYS, cleanup_old_logs};

const LOG_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Every long-lived service of one engine instance
///
/// | Field | Purpose |
/// |-------|---------|
/// | orders | OrdersManager (all order mutations) |
/// | audit | AuditService (record + query the hash chain) |
/// | assignments | printer routing table, editable at runtime |
/// | dispatcher | network printers, editable at runtime |
pub struct EngineState {
    pub config: Config,
    pub orders: Arc<OrdersManager>,
    pub audit: Arc<AuditService>,
    pub assignments: Arc<AssignmentTable>,
    pub dispatcher: Arc<NetworkPrintDispatcher>,
    tasks: BackgroundTasks,
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("config", &self.config)
            .field("orders", &self.orders)
            .field("background_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl EngineState {
    /// Open the stores under `WORK_DIR`, start the workers and restore open orders
    pub async fn initialize(
        config: Config,
        destinations: Vec<PrintDestination>,
        assignments: Vec<PrinterAssignment>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.work_dir)
            .with_context(|| format!("Failed to create work dir {}", config.work_dir))?;

        let order_store = RedbOrderStore::open(config.orders_db_path())
            .context("Failed to open order store")?;
        let audit_storage =
            AuditStorage::open(config.audit_db_path()).context("Failed to open audit storage")?;
        let tickets = TicketStorage::open(config.tickets_db_path())
            .context("Failed to open ticket storage")?;

        let mut tasks = BackgroundTasks::new();

        let (audit, audit_rx) = AuditService::new(audit_storage.clone(), config.audit_buffer_size);
        let worker = AuditWorker::new(audit_storage);
        let token = tasks.shutdown_token();
        tasks.spawn("audit_worker", TaskKind::Worker, worker.run(audit_rx, token));

        let log_dir = config.log_dir();
        let token = tasks.shutdown_token();
        tasks.spawn("log_cleanup", TaskKind::Periodic, async move {
            let mut interval = tokio::time::interval(LOG_CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
                            tracing::warn!(error = %e, "Log cleanup failed");
                        }
                    }
                }
            }
        });

        let assignments = Arc::new(AssignmentTable::new(assignments));
        let dispatcher = Arc::new(NetworkPrintDispatcher::new(
            destinations,
            KitchenTicketRenderer::new(config.ticket_width),
            config.print_timeout(),
        ));
        let store: Arc<dyn OrderStore> = Arc::new(order_store);

        let engine = KitchenDispatchEngine::new(
            assignments.clone(),
            dispatcher.clone(),
            store.clone(),
            audit.clone(),
        )
        .with_default_destination(config.default_print_destination.clone())
        .with_ticket_storage(tickets);

        let orders = Arc::new(OrdersManager::new(
            store,
            Arc::new(engine),
            audit.clone(),
            config.tax_rate_percent,
        ));
        let restored = orders
            .restore_open_orders()
            .await
            .context("Failed to restore open orders")?;

        tracing::info!(
            work_dir = %config.work_dir,
            tax_rate_percent = %config.tax_rate_percent,
            restored,
            background_tasks = tasks.len(),
            "Order engine initialized"
        );

        Ok(Self {
            config,
            orders,
            audit,
            assignments,
            dispatcher,
            tasks,
        })
    }

    /// Tasks that died early; 0 when healthy
    pub fn check_health(&self) -> usize {
        self.tasks.check_health()
    }

    /// Flush every live order, then stop the workers (the audit queue drains)
    pub async fn shutdown(self) {
        for order in self.orders.list_orders() {
            if let Err(e) = self.orders.flush(&order.id).await {
                tracing::error!(order_id = %order.id, error = %e, "Failed to flush order on shutdown");
            }
        }
        self.tasks.shutdown().await;
    }
}
