//! Order Engine - restaurant order lifecycle and kitchen dispatch
//!
//! # Module layout
//!
//! ```text
//! order-engine/src/
//! ├── core/          # config, engine state, background tasks
//! ├── orders/        # aggregate, money, manager, order store
//! ├── printing/      # routing, tickets, dispatch engine, printers
//! ├── audit/         # audit service, worker, hash-chained storage
//! └── utils/         # logger
//! ```

pub mod audit;
pub mod core;
pub mod orders;
pub mod printing;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::{AuditLogger, AuditService};
pub use core::{Config, EngineState};
pub use orders::{
    FinancialBreakdown, ManagerError, OrderAggregate, OrderError, OrderStore, OrdersManager,
    RedbOrderStore,
};
pub use printing::{
    AssignmentTable, DispatchReport, KitchenDispatchEngine, PrintDispatcher,
    PrinterAssignmentResolver,
};

pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};
