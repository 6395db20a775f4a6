//! Shared types for the order engine
//!
//! Serializable domain types used by the engine and by any front end that
//! observes it: order snapshots, audit events and printer routing models.

pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use models::{
    AssignmentStats, AssignmentTarget, NetworkPrinter, PrintDestination, PrinterAssignment,
};
pub use order::{
    Actor, ActorRole, Adjustment, AdjustmentKind, AuditEvent, AuditEventKind, AuditSeverity,
    MenuItemRef, Order, OrderItem, OrderNote, OrderStatus,
};
