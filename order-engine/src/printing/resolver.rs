//! Printer assignment routing
//!
//! Item-level assignments win over category-level ones. Inactive
//! assignments are ignored. The default destination fallback belongs to
//! the dispatch engine, not to the resolver.

use parking_lot::RwLock;
use shared::models::{AssignmentStats, AssignmentTarget, PrinterAssignment};
use shared::order::OrderItem;
use std::collections::{BTreeSet, HashMap};

/// Maps an order line to the destinations that should print it
pub trait PrinterAssignmentResolver: Send + Sync {
    /// Empty when nothing matches
    fn resolve(&self, item: &OrderItem) -> BTreeSet<String>;

    fn stats(&self) -> AssignmentStats;
}

/// In-memory assignment table
#[derive(Debug, Default)]
pub struct AssignmentTable {
    inner: RwLock<AssignmentIndex>,
}

#[derive(Debug, Default)]
struct AssignmentIndex {
    /// assignment_id → assignment
    assignments: HashMap<String, PrinterAssignment>,
    by_item: HashMap<String, BTreeSet<String>>,
    by_category: HashMap<String, BTreeSet<String>>,
}

impl AssignmentIndex {
    fn rebuild(&mut self) {
        self.by_item.clear();
        self.by_category.clear();
        for a in self.assignments.values().filter(|a| a.is_active) {
            let (map, key) = match &a.target {
                AssignmentTarget::Item(id) => (&mut self.by_item, id),
                AssignmentTarget::Category(id) => (&mut self.by_category, id),
            };
            map.entry(key.clone())
                .or_default()
                .insert(a.destination_id.clone());
        }
    }
}

impl AssignmentTable {
    pub fn new(assignments: Vec<PrinterAssignment>) -> Self {
        let table = Self::default();
        table.replace_all(assignments);
        table
    }

    /// Swap the whole table (e.g. after a config reload)
    pub fn replace_all(&self, assignments: Vec<PrinterAssignment>) {
        let mut inner = self.inner.write();
        inner.assignments = assignments.into_iter().map(|a| (a.id.clone(), a)).collect();
        inner.rebuild();
        tracing::debug!(count = inner.assignments.len(), "Printer assignments loaded");
    }

    /// Insert or replace one assignment by id
    pub fn upsert(&self, assignment: PrinterAssignment) {
        let mut inner = self.inner.write();
        inner.assignments.insert(assignment.id.clone(), assignment);
        inner.rebuild();
    }

    /// Returns the removed assignment
    pub fn remove(&self, assignment_id: &str) -> Option<PrinterAssignment> {
        let mut inner = self.inner.write();
        let removed = inner.assignments.remove(assignment_id);
        if removed.is_some() {
            inner.rebuild();
        }
        removed
    }

    pub fn list(&self) -> Vec<PrinterAssignment> {
        let inner = self.inner.read();
        let mut all: Vec<_> = inner.assignments.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl PrinterAssignmentResolver for AssignmentTable {
    fn resolve(&self, item: &OrderItem) -> BTreeSet<String> {
        let inner = self.inner.read();
        if let Some(dests) = inner.by_item.get(&item.menu_item.id) {
            return dests.clone();
        }
        item.menu_item
            .category_id
            .as_ref()
            .and_then(|cat| inner.by_category.get(cat))
            .cloned()
            .unwrap_or_default()
    }

    fn stats(&self) -> AssignmentStats {
        let inner = self.inner.read();
        let mut stats = AssignmentStats::default();
        let mut destinations = BTreeSet::new();
        for a in inner.assignments.values() {
            stats.total_assignments += 1;
            match a.target {
                AssignmentTarget::Category(_) => stats.category_assignments += 1,
                AssignmentTarget::Item(_) => stats.item_assignments += 1,
            }
            destinations.insert(a.destination_id.as_str());
        }
        stats.unique_destinations = destinations.len();
        stats
    }
}
