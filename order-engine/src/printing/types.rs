//! Kitchen printing types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::{Order, OrderItem};

/// One line on a kitchen ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketItem {
    pub item_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub category_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub special_instructions: Option<String>,
    /// Kitchen-facing note on the line
    pub notes: Option<String>,
}

impl From<&OrderItem> for TicketItem {
    fn from(item: &OrderItem) -> Self {
        Self {
            item_id: item.id.clone(),
            menu_item_id: item.menu_item.id.clone(),
            name: item.menu_item.name.clone(),
            category_name: item.menu_item.category_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            special_instructions: item.special_instructions.clone(),
            notes: item.notes.clone(),
        }
    }
}

/// Job payload for one destination in one send cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KitchenTicket {
    pub id: String,
    pub order_id: String,
    pub order_number: String,
    pub destination_id: String,
    pub table: Option<String>,
    pub server: Option<String>,
    /// Unix millis
    pub created_at: i64,
    pub items: Vec<TicketItem>,
    /// Internal order notes, in insertion order
    #[serde(default)]
    pub kitchen_notes: Vec<String>,
    /// Successful emissions so far (0 until first printed)
    #[serde(default)]
    pub print_count: u32,
}

impl KitchenTicket {
    /// Ticket for `destination_id` carrying only `items`
    pub fn for_destination<'a>(
        order: &Order,
        destination_id: &str,
        items: impl IntoIterator<Item = &'a OrderItem>,
    ) -> Self {
        Self {
            id: shared::util::new_id(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            destination_id: destination_id.to_string(),
            table: order.table.clone(),
            server: order.server.clone(),
            created_at: shared::util::now_millis(),
            items: items.into_iter().map(TicketItem::from).collect(),
            kitchen_notes: order.internal_notes().map(|n| n.text.clone()).collect(),
            print_count: 0,
        }
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.item_id.as_str())
    }
}

/// Result of emitting one ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationOutcome {
    pub destination_id: String,
    pub ticket_id: String,
    pub item_ids: Vec<String>,
    /// `None` on success
    pub error: Option<String>,
}

impl DestinationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Why an item stayed unsent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryReason {
    /// At least one resolved destination failed
    DispatchFailed { destination_ids: Vec<String> },
    /// No assignment matched and no default destination is configured
    Unroutable,
}

/// Item the caller must retry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryItem {
    pub item_id: String,
    pub name: String,
    pub reason: RetryReason,
}

/// What a kitchen send did
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchReport {
    pub order_id: String,
    pub destinations_attempted: usize,
    pub destinations_succeeded: usize,
    /// Items flipped to sent in this cycle
    pub marked_sent: Vec<String>,
    pub retry: Vec<RetryItem>,
    pub outcomes: Vec<DestinationOutcome>,
    /// Whether the post-send snapshot reached the store
    pub persisted: bool,
}

impl DispatchReport {
    /// Report for a send with nothing left to dispatch
    pub fn empty(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            persisted: true,
            ..Default::default()
        }
    }

    /// Nothing was dispatched (everything already sent)
    pub fn is_noop(&self) -> bool {
        self.destinations_attempted == 0 && self.retry.is_empty()
    }

    /// Every unsent item made it
    pub fn is_complete(&self) -> bool {
        self.retry.is_empty()
    }

    pub fn failed_destinations(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.destination_id.as_str())
    }
}
