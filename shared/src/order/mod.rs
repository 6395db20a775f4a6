//! Order domain types
//!
//! - `types`: value types (status, adjustments, catalog snapshot, actor, notes)
//! - `snapshot`: the `Order` aggregate state and its `OrderItem` lines
//! - `event`: audit events emitted on every state-changing action

pub mod event;
pub mod snapshot;
pub mod types;

pub use event::{AuditEvent, AuditEventKind, AuditSeverity};
pub use snapshot::{Order, OrderItem};
pub use types::{Actor, ActorRole, Adjustment, AdjustmentKind, MenuItemRef, OrderNote, OrderStatus};
