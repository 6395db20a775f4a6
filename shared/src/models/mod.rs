//! Printer routing models consumed by the dispatch engine

pub mod print_destination;
pub mod printer_assignment;

pub use print_destination::{NetworkPrinter, PrintDestination};
pub use printer_assignment::{AssignmentStats, AssignmentTarget, PrinterAssignment};
