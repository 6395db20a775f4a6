//! Shared value types for orders

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Status
// ============================================================================

/// Order lifecycle status
///
/// `Pending → Confirmed` on the first successful kitchen send,
/// then `Completed` (checkout) or `Cancelled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl OrderStatus {
    /// Terminal orders accept no further mutation
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

// ============================================================================
// Adjustments (discount / gratuity)
// ============================================================================

/// How an adjustment value is interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    /// `value` is a percent in [0, 100] of the adjustment base
    Percentage,
    /// `value` is an absolute monetary amount
    Fixed,
}

/// A configured discount or gratuity
///
/// Only the configuration is stored; the resulting amount is derived from
/// the current subtotal on every recompute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub value: Decimal,
}

impl Adjustment {
    pub fn percentage(value: Decimal) -> Self {
        Self {
            kind: AdjustmentKind::Percentage,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self {
            kind: AdjustmentKind::Fixed,
            value,
        }
    }
}

// ============================================================================
// Catalog snapshot
// ============================================================================

/// Read-only snapshot of a catalog item, taken when the item is added
///
/// Later catalog edits never change historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuItemRef {
    /// Catalog item ID (merge identity)
    pub id: String,
    /// Display name
    pub name: String,
    /// Catalog price at add-time
    pub price: Decimal,
    /// Category ID (printer routing fallback)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Category name snapshot (ticket grouping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

impl MenuItemRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            category_id: None,
            category_name: None,
        }
    }

    pub fn with_category(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.category_id = Some(id.into());
        self.category_name = Some(name.into());
        self
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Role of the person issuing an intent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    #[default]
    Staff,
    Manager,
    Admin,
}

/// Identity attached to every mutation and audit event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn staff(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ActorRole::Staff)
    }

    pub fn admin(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ActorRole::Admin)
    }

    /// Managers and admins may remove items already sent to the kitchen
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, ActorRole::Manager | ActorRole::Admin)
    }
}

// ============================================================================
// Notes
// ============================================================================

/// Append-only order annotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderNote {
    pub text: String,
    /// Kitchen-only when true, customer-visible otherwise
    pub internal: bool,
    pub author_id: String,
    pub author_name: String,
    pub created_at: i64,
}
