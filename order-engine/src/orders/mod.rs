//! Order lifecycle
//!
//! - **money**: FinancialBreakdown and the pure money functions
//! - **aggregate**: OrderAggregate, the only writer of an order's state
//! - **manager**: OrdersManager, per-order serialization and auto-save
//! - **storage**: OrderStore contract and its redb implementation
//!
//! # Architecture
//!
//! ```text
//! caller → OrdersManager ─ lock(order) → OrderAggregate → AuditLogger
//!               │                            │
//!               │                     KitchenDispatchEngine
//!               ↓
//!     projection refresh + auto-save → OrderStore (redb)
//! ```

pub mod aggregate;
pub mod error;
pub mod manager;
pub mod money;
pub mod storage;

pub use aggregate::OrderAggregate;
pub use error::{OrderError, OrderResult};
pub use manager::{ManagerError, ManagerResult, OrdersManager};
pub use money::FinancialBreakdown;
pub use storage::{OrderStore, RedbOrderStore, StoreError, StoreResult};
