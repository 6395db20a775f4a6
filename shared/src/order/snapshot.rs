//! Order snapshot - the persisted state of one customer transaction
//!
//! All monetary fields are derived. They are only ever written together by
//! the engine's recompute step and are never set independently.

use super::types::{Adjustment, MenuItemRef, OrderNote, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    /// Line ID (unique within the order)
    pub id: String,
    /// Catalog snapshot taken at add-time
    pub menu_item: MenuItemRef,
    /// Always >= 1 while present in `Order::items`
    pub quantity: i32,
    /// Unit price captured at add-time
    pub unit_price: Decimal,
    /// Monotonic false → true
    #[serde(default)]
    pub sent_to_kitchen: bool,
    /// Customer-facing free text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    /// Kitchen-facing free text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderItem {
    /// quantity × unit_price
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order aggregate state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    /// Opaque unique ID, immutable
    pub id: String,
    /// Human-readable display code, immutable
    pub order_number: String,
    /// Table name for ticket display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Server (waiter) name for ticket display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Lines, in display order
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,

    // === Configured adjustments ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gratuity: Option<Adjustment>,

    // === Derived (recomputed together) ===
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub gratuity_amount: Decimal,
    pub total_amount: Decimal,

    /// Append-only annotations
    #[serde(default)]
    pub notes: Vec<OrderNote>,

    /// Creation timestamp (Unix millis)
    pub created_at: i64,
    /// Last mutation timestamp (Unix millis), always >= created_at
    pub updated_at: i64,
    /// Incremented on every mutation; the store keeps the highest revision
    #[serde(default)]
    pub revision: u64,
}

impl Order {
    /// Create a new empty pending order
    pub fn new(id: String, order_number: String) -> Self {
        let now = crate::util::now_millis();
        Self {
            id,
            order_number,
            table: None,
            server: None,
            items: Vec::new(),
            status: OrderStatus::Pending,
            discount: None,
            gratuity: None,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            gratuity_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Find an item by line ID
    pub fn find_item(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Items not yet included in a successful kitchen dispatch
    pub fn unsent_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| !i.sent_to_kitchen)
    }

    /// Whether any item has already reached the kitchen
    pub fn has_sent_items(&self) -> bool {
        self.items.iter().any(|i| i.sent_to_kitchen)
    }

    /// Kitchen-only notes, in insertion order
    pub fn internal_notes(&self) -> impl Iterator<Item = &OrderNote> {
        self.notes.iter().filter(|n| n.internal)
    }

    /// Whether the order accepts further mutation
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}
