//! Kitchen printing
//!
//! - [`resolver`]: menu item / category → destination routing
//! - [`engine`]: send cycle with per-destination success tracking
//! - [`dispatcher`]: raw TCP emission with printer failover
//! - [`renderer`]: fixed-width ticket text
//! - [`storage`]: emitted ticket history for reprints

pub mod dispatcher;
pub mod engine;
pub mod renderer;
pub mod resolver;
pub mod storage;
pub mod types;

pub use dispatcher::{
    NetworkPrintDispatcher, PrintDispatchError, PrintDispatchResult, PrintDispatcher,
};
pub use engine::{DispatchError, DispatchResult, KitchenDispatchEngine};
pub use renderer::KitchenTicketRenderer;
pub use resolver::{AssignmentTable, PrinterAssignmentResolver};
pub use storage::{TicketStorage, TicketStorageError, TicketStorageResult};
pub use types::{
    DestinationOutcome, DispatchReport, KitchenTicket, RetryItem, RetryReason, TicketItem,
};
