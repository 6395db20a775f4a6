//! Audit events - structured, attributed records of every state change

use super::types::Actor;
use serde::{Deserialize, Serialize};

/// Audit event kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    // Lifecycle
    OrderOpened,
    OrderCompleted,
    OrderCancelled,

    // Items
    ItemAdded,
    ItemRemoved,
    QuantityChanged,
    PrivilegedRemoval,
    ItemsCleared,

    // Money
    DiscountApplied,
    GratuityApplied,

    // Kitchen
    SentToKitchen,
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEventKind::OrderOpened => write!(f, "ORDER_OPENED"),
            AuditEventKind::OrderCompleted => write!(f, "ORDER_COMPLETED"),
            AuditEventKind::OrderCancelled => write!(f, "ORDER_CANCELLED"),
            AuditEventKind::ItemAdded => write!(f, "ITEM_ADDED"),
            AuditEventKind::ItemRemoved => write!(f, "ITEM_REMOVED"),
            AuditEventKind::QuantityChanged => write!(f, "QUANTITY_CHANGED"),
            AuditEventKind::PrivilegedRemoval => write!(f, "PRIVILEGED_REMOVAL"),
            AuditEventKind::ItemsCleared => write!(f, "ITEMS_CLEARED"),
            AuditEventKind::DiscountApplied => write!(f, "DISCOUNT_APPLIED"),
            AuditEventKind::GratuityApplied => write!(f, "GRATUITY_APPLIED"),
            AuditEventKind::SentToKitchen => write!(f, "SENT_TO_KITCHEN"),
        }
    }
}

/// Severity attached to an audit event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSeverity {
    #[default]
    Info,
    Warning,
}

/// Audit event delivered to the audit logger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub order_id: String,
    pub kind: AuditEventKind,
    #[serde(default)]
    pub severity: AuditSeverity,
    pub actor_id: String,
    pub actor_name: String,
    /// Unix millis
    pub timestamp: i64,
    pub description: String,
    /// Structured details (ids, old/new values)
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        order_id: impl Into<String>,
        kind: AuditEventKind,
        actor: &Actor,
        description: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            kind,
            severity: AuditSeverity::Info,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            timestamp: crate::util::now_millis(),
            description: description.into(),
            payload,
        }
    }

    pub fn warning(mut self) -> Self {
        self.severity = AuditSeverity::Warning;
        self
    }
}
