//! Printer Assignment Model
//!
//! Maps a category or a specific menu item to a print destination.
//! Item-level assignments take precedence over category-level ones.

use serde::{Deserialize, Serialize};

/// What an assignment targets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentTarget {
    Category(String),
    Item(String),
}

/// One routing rule: target → destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrinterAssignment {
    pub id: String,
    pub destination_id: String,
    pub target: AssignmentTarget,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl PrinterAssignment {
    pub fn category(
        id: impl Into<String>,
        category_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            destination_id: destination_id.into(),
            target: AssignmentTarget::Category(category_id.into()),
            is_active: true,
        }
    }

    pub fn item(
        id: impl Into<String>,
        menu_item_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            destination_id: destination_id.into(),
            target: AssignmentTarget::Item(menu_item_id.into()),
            is_active: true,
        }
    }
}

/// Informational summary of the assignment table
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentStats {
    pub total_assignments: usize,
    pub category_assignments: usize,
    pub item_assignments: usize,
    pub unique_destinations: usize,
}
