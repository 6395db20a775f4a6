//! OrderAggregate - owns one order's mutable state
//!
//! Every mutating call validates first and writes second, so a returned
//! error always leaves the order untouched. After a successful transition
//! the derived money is recomputed through [`FinancialBreakdown`] and the
//! audit event is recorded.
//!
//! The aggregate holds no lock. Callers serialize access per order
//! (see `OrdersManager`).

use rust_decimal::Decimal;
use serde_json::json;
use shared::order::{
    Actor, Adjustment, AdjustmentKind, AuditEvent, AuditEventKind, MenuItemRef, Order,
    OrderItem, OrderNote, OrderStatus,
};
use std::collections::HashSet;
use std::sync::Arc;

use super::error::{OrderError, OrderResult};
use super::money::{self, FinancialBreakdown, MAX_QUANTITY};
use crate::audit::AuditLogger;

/// Maximum length of an order note
const MAX_NOTE_LEN: usize = 500;

pub struct OrderAggregate {
    order: Order,
    /// Injected configuration, percent
    tax_rate_percent: Decimal,
    audit: Arc<dyn AuditLogger>,
}

impl std::fmt::Debug for OrderAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderAggregate")
            .field("order_id", &self.order.id)
            .field("status", &self.order.status)
            .field("revision", &self.order.revision)
            .finish_non_exhaustive()
    }
}

impl OrderAggregate {
    /// Open a new pending order and record `OrderOpened`
    pub fn open(
        order_number: String,
        table: Option<String>,
        server: Option<String>,
        actor: &Actor,
        tax_rate_percent: Decimal,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        let mut order = Order::new(shared::util::new_id(), order_number);
        order.table = table;
        order.server = server;

        let aggregate = Self {
            order,
            tax_rate_percent,
            audit,
        };
        aggregate.record(AuditEvent::new(
            &aggregate.order.id,
            AuditEventKind::OrderOpened,
            actor,
            format!("Order {} opened", aggregate.order.order_number),
            json!({
                "order_number": aggregate.order.order_number,
                "table": aggregate.order.table,
                "server": aggregate.order.server,
            }),
        ));
        aggregate
    }

    /// Rebuild an aggregate from a stored snapshot
    ///
    /// Derived money is recomputed with the current tax rate; revision and
    /// timestamps are kept.
    pub fn restore(order: Order, tax_rate_percent: Decimal, audit: Arc<dyn AuditLogger>) -> Self {
        let mut aggregate = Self {
            order,
            tax_rate_percent,
            audit,
        };
        aggregate.recompute();
        aggregate
    }

    // ========== Read side ==========

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn id(&self) -> &str {
        &self.order.id
    }

    /// Owned copy for persistence and read projections
    pub fn snapshot(&self) -> Order {
        self.order.clone()
    }

    pub fn tax_rate_percent(&self) -> Decimal {
        self.tax_rate_percent
    }

    /// Current derived amounts
    pub fn breakdown(&self) -> FinancialBreakdown {
        FinancialBreakdown::compute(
            &self.order.items,
            self.order.discount.as_ref(),
            self.order.gratuity.as_ref(),
            self.tax_rate_percent,
        )
    }

    /// What the totals would be with different adjustments, without mutating
    ///
    /// `None` keeps the currently configured adjustment.
    pub fn preview(
        &self,
        discount: Option<&Adjustment>,
        gratuity: Option<&Adjustment>,
    ) -> FinancialBreakdown {
        FinancialBreakdown::compute(
            &self.order.items,
            discount.or(self.order.discount.as_ref()),
            gratuity.or(self.order.gratuity.as_ref()),
            self.tax_rate_percent,
        )
    }

    // ========== Items ==========

    /// Add a menu item, merging into an existing unsent row of the same item
    ///
    /// Returns the id of the row that now holds the quantity. A new row
    /// records `ItemAdded`; a merge records `QuantityChanged`.
    pub fn add_item(
        &mut self,
        actor: &Actor,
        menu_item: MenuItemRef,
        quantity: i32,
        unit_price: Decimal,
        special_instructions: Option<String>,
    ) -> OrderResult<String> {
        self.ensure_open()?;
        validate_quantity(quantity)?;
        money::validate_unit_price(unit_price).map_err(OrderError::InvalidPrice)?;

        let existing = self
            .order
            .items
            .iter()
            .position(|i| !i.sent_to_kitchen && i.menu_item.id == menu_item.id);

        if let Some(index) = existing {
            let old_quantity = self.order.items[index].quantity;
            let new_quantity = old_quantity.saturating_add(quantity);
            validate_quantity(new_quantity)?;

            // The row keeps its first price; a different incoming price is
            // only recorded
            let item = &mut self.order.items[index];
            item.quantity = new_quantity;
            let item_id = item.id.clone();
            let name = item.menu_item.name.clone();
            let kept_price = item.unit_price;

            self.recompute();
            self.touch();
            self.record(AuditEvent::new(
                &self.order.id,
                AuditEventKind::QuantityChanged,
                actor,
                format!("{name}: {old_quantity} → {new_quantity}"),
                json!({
                    "item_id": item_id,
                    "menu_item_id": menu_item.id,
                    "old_quantity": old_quantity,
                    "new_quantity": new_quantity,
                    "merged": true,
                    "unit_price": kept_price,
                    "incoming_unit_price": unit_price,
                }),
            ));
            return Ok(item_id);
        }

        let item = OrderItem {
            id: shared::util::new_id(),
            menu_item,
            quantity,
            unit_price,
            sent_to_kitchen: false,
            special_instructions: normalize_text(special_instructions),
            notes: None,
        };
        let item_id = item.id.clone();
        let description = format!("{} × {} added", quantity, item.menu_item.name);
        let payload = json!({
            "item_id": item.id,
            "menu_item_id": item.menu_item.id,
            "name": item.menu_item.name,
            "quantity": quantity,
            "unit_price": unit_price,
        });
        self.order.items.push(item);

        self.recompute();
        self.touch();
        self.record(AuditEvent::new(
            &self.order.id,
            AuditEventKind::ItemAdded,
            actor,
            description,
            payload,
        ));
        Ok(item_id)
    }

    /// Set a row's quantity; zero or below removes the row
    ///
    /// A sent row never changes its sent quantity upwards: the extra units
    /// go through [`Self::add_item`] onto an unsent row so the next kitchen
    /// send carries exactly the difference. Lowering a sent row follows the
    /// removal rule and needs a privileged actor.
    pub fn update_item_quantity(
        &mut self,
        actor: &Actor,
        item_id: &str,
        new_quantity: i32,
    ) -> OrderResult<()> {
        self.ensure_open()?;
        if new_quantity <= 0 {
            return self.remove_item(actor, item_id).map(|_| ());
        }
        validate_quantity(new_quantity)?;

        let index = self.item_index(item_id)?;
        let item = &self.order.items[index];
        let old_quantity = item.quantity;
        if old_quantity == new_quantity {
            return Ok(());
        }

        if item.sent_to_kitchen {
            if new_quantity > old_quantity {
                let menu_item = item.menu_item.clone();
                let unit_price = item.unit_price;
                let instructions = item.special_instructions.clone();
                return self
                    .add_item(
                        actor,
                        menu_item,
                        new_quantity - old_quantity,
                        unit_price,
                        instructions,
                    )
                    .map(|_| ());
            }
            if !actor.is_privileged() {
                return Err(OrderError::RemovalNotPermitted {
                    item_id: item_id.to_string(),
                });
            }
        }

        let item = &mut self.order.items[index];
        item.quantity = new_quantity;
        let sent = item.sent_to_kitchen;
        let name = item.menu_item.name.clone();

        self.recompute();
        self.touch();
        let payload = json!({
            "item_id": item_id,
            "old_quantity": old_quantity,
            "new_quantity": new_quantity,
            "sent_to_kitchen": sent,
        });
        let event = if sent {
            AuditEvent::new(
                &self.order.id,
                AuditEventKind::PrivilegedRemoval,
                actor,
                format!("{name}: {old_quantity} → {new_quantity} after kitchen send"),
                payload,
            )
            .warning()
        } else {
            AuditEvent::new(
                &self.order.id,
                AuditEventKind::QuantityChanged,
                actor,
                format!("{name}: {old_quantity} → {new_quantity}"),
                payload,
            )
        };
        self.record(event);
        Ok(())
    }

    /// Remove a row
    ///
    /// Rows already sent to the kitchen need a privileged actor and are
    /// recorded as `PrivilegedRemoval` with warning severity.
    pub fn remove_item(&mut self, actor: &Actor, item_id: &str) -> OrderResult<OrderItem> {
        self.ensure_open()?;
        let index = self.item_index(item_id)?;

        let sent = self.order.items[index].sent_to_kitchen;
        if sent && !actor.is_privileged() {
            return Err(OrderError::RemovalNotPermitted {
                item_id: item_id.to_string(),
            });
        }

        let removed = self.order.items.remove(index);
        self.recompute();
        self.touch();

        let payload = json!({
            "item_id": removed.id,
            "menu_item_id": removed.menu_item.id,
            "name": removed.menu_item.name,
            "quantity": removed.quantity,
            "unit_price": removed.unit_price,
            "sent_to_kitchen": removed.sent_to_kitchen,
        });
        let event = if sent {
            AuditEvent::new(
                &self.order.id,
                AuditEventKind::PrivilegedRemoval,
                actor,
                format!(
                    "{} × {} removed after kitchen send",
                    removed.quantity, removed.menu_item.name
                ),
                payload,
            )
            .warning()
        } else {
            AuditEvent::new(
                &self.order.id,
                AuditEventKind::ItemRemoved,
                actor,
                format!("{} × {} removed", removed.quantity, removed.menu_item.name),
                payload,
            )
        };
        self.record(event);
        Ok(removed)
    }

    /// Kitchen-facing note on one row (no recompute, no audit)
    pub fn update_item_notes(&mut self, item_id: &str, text: Option<String>) -> OrderResult<()> {
        self.ensure_open()?;
        let index = self.item_index(item_id)?;
        self.order.items[index].notes = normalize_text(text);
        self.touch();
        Ok(())
    }

    /// Customer-facing instructions on one row (no recompute, no audit)
    pub fn update_item_special_instructions(
        &mut self,
        item_id: &str,
        text: Option<String>,
    ) -> OrderResult<()> {
        self.ensure_open()?;
        let index = self.item_index(item_id)?;
        self.order.items[index].special_instructions = normalize_text(text);
        self.touch();
        Ok(())
    }

    /// Empty the order and zero every derived amount
    ///
    /// Sent rows can only be cleared by a privileged actor.
    pub fn clear_all_items(&mut self, actor: &Actor) -> OrderResult<()> {
        self.ensure_open()?;
        if !actor.is_privileged()
            && let Some(sent) = self.order.items.iter().find(|i| i.sent_to_kitchen)
        {
            return Err(OrderError::RemovalNotPermitted {
                item_id: sent.id.clone(),
            });
        }

        let cleared: Vec<String> = self.order.items.iter().map(|i| i.id.clone()).collect();
        self.order.items.clear();
        self.order.discount = None;
        self.order.gratuity = None;
        self.recompute();
        self.touch();

        self.record(AuditEvent::new(
            &self.order.id,
            AuditEventKind::ItemsCleared,
            actor,
            format!("{} items cleared", cleared.len()),
            json!({ "item_ids": cleared }),
        ));
        Ok(())
    }

    // ========== Adjustments ==========

    /// Discount against the subtotal (percentage) or an absolute amount (fixed)
    pub fn apply_discount(
        &mut self,
        actor: &Actor,
        kind: AdjustmentKind,
        value: f64,
    ) -> OrderResult<()> {
        self.ensure_open()?;
        let adjustment = money::adjustment_from_input(kind, value, "discount")
            .map_err(OrderError::InvalidDiscount)?;

        self.order.discount = Some(adjustment);
        self.recompute();
        self.touch();
        self.record(AuditEvent::new(
            &self.order.id,
            AuditEventKind::DiscountApplied,
            actor,
            format!("Discount {}", describe_adjustment(&adjustment)),
            json!({
                "adjustment": adjustment,
                "discount_amount": self.order.discount_amount,
                "total_amount": self.order.total_amount,
            }),
        ));
        Ok(())
    }

    /// Gratuity against the post-discount subtotal (percentage) or fixed
    pub fn apply_gratuity(
        &mut self,
        actor: &Actor,
        kind: AdjustmentKind,
        value: f64,
    ) -> OrderResult<()> {
        self.ensure_open()?;
        let adjustment = money::adjustment_from_input(kind, value, "gratuity")
            .map_err(OrderError::InvalidGratuity)?;

        self.order.gratuity = Some(adjustment);
        self.recompute();
        self.touch();
        self.record(AuditEvent::new(
            &self.order.id,
            AuditEventKind::GratuityApplied,
            actor,
            format!("Gratuity {}", describe_adjustment(&adjustment)),
            json!({
                "adjustment": adjustment,
                "gratuity_amount": self.order.gratuity_amount,
                "total_amount": self.order.total_amount,
            }),
        ));
        Ok(())
    }

    // ========== Kitchen ==========

    /// Flip `sent_to_kitchen` for exactly these rows
    ///
    /// Rejects the whole call if any id is unknown or already sent. The
    /// first marking confirms a pending order. Audit is left to the caller,
    /// which knows the destinations.
    pub fn mark_items_sent(&mut self, item_ids: &[String]) -> OrderResult<()> {
        self.ensure_open()?;
        if item_ids.is_empty() {
            return Ok(());
        }

        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        let mut already_sent = Vec::new();
        for id in &wanted {
            let item = self
                .order
                .find_item(id)
                .ok_or_else(|| OrderError::ItemNotFound(id.to_string()))?;
            if item.sent_to_kitchen {
                already_sent.push(item.id.clone());
            }
        }
        if !already_sent.is_empty() {
            already_sent.sort();
            return Err(OrderError::AlreadySent {
                item_ids: already_sent,
            });
        }

        for item in &mut self.order.items {
            if wanted.contains(item.id.as_str()) {
                item.sent_to_kitchen = true;
            }
        }
        if self.order.status == OrderStatus::Pending {
            self.order.status = OrderStatus::Confirmed;
        }
        self.touch();
        Ok(())
    }

    // ========== Notes ==========

    /// Append an attributed note (internal = kitchen-only)
    pub fn add_note(&mut self, actor: &Actor, text: &str, internal: bool) -> OrderResult<()> {
        self.ensure_open()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(OrderError::InvalidNote("note must not be blank".to_string()));
        }
        if text.chars().count() > MAX_NOTE_LEN {
            return Err(OrderError::InvalidNote(format!(
                "note exceeds {MAX_NOTE_LEN} characters"
            )));
        }

        self.order.notes.push(OrderNote {
            text: text.to_string(),
            internal,
            author_id: actor.id.clone(),
            author_name: actor.name.clone(),
            created_at: shared::util::now_millis(),
        });
        self.touch();
        Ok(())
    }

    // ========== Lifecycle ==========

    /// Cancel the order
    ///
    /// An order holding only unsent items must be cleared first. With sent
    /// items the cancel goes through directly and is recorded as a warning.
    pub fn cancel(&mut self, actor: &Actor, reason: Option<String>) -> OrderResult<()> {
        self.ensure_open()?;
        let has_sent = self.order.has_sent_items();
        if !self.order.items.is_empty() && !has_sent {
            return Err(OrderError::PendingItemsMustBeCleared(self.order.id.clone()));
        }

        let reason = normalize_text(reason);
        self.order.status = OrderStatus::Cancelled;
        self.touch();

        let description = match &reason {
            Some(r) => format!("Order {} cancelled: {}", self.order.order_number, r),
            None => format!("Order {} cancelled", self.order.order_number),
        };
        let event = AuditEvent::new(
            &self.order.id,
            AuditEventKind::OrderCancelled,
            actor,
            description,
            json!({
                "reason": reason,
                "item_count": self.order.items.len(),
                "total_amount": self.order.total_amount,
            }),
        );
        self.record(if has_sent { event.warning() } else { event });
        Ok(())
    }

    /// Finish the order (`pending | confirmed → completed`)
    pub fn checkout(&mut self, actor: &Actor) -> OrderResult<()> {
        self.ensure_open()?;
        if self.order.items.is_empty() {
            return Err(OrderError::EmptyOrder(self.order.id.clone()));
        }

        self.order.status = OrderStatus::Completed;
        self.touch();
        self.record(AuditEvent::new(
            &self.order.id,
            AuditEventKind::OrderCompleted,
            actor,
            format!(
                "Order {} completed, total {}",
                self.order.order_number,
                money::round_money(self.order.total_amount)
            ),
            json!({
                "subtotal": self.order.subtotal,
                "discount_amount": self.order.discount_amount,
                "tax_amount": self.order.tax_amount,
                "gratuity_amount": self.order.gratuity_amount,
                "total_amount": self.order.total_amount,
            }),
        ));
        Ok(())
    }

    // ========== Internals ==========

    /// `OrderClosed` once completed or cancelled
    pub fn ensure_open(&self) -> OrderResult<()> {
        if self.order.status.is_terminal() {
            return Err(OrderError::OrderClosed {
                order_id: self.order.id.clone(),
                status: self.order.status.to_string(),
            });
        }
        Ok(())
    }

    fn item_index(&self, item_id: &str) -> OrderResult<usize> {
        self.order
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| OrderError::ItemNotFound(item_id.to_string()))
    }

    /// Single write path for the derived money fields
    fn recompute(&mut self) {
        let b = self.breakdown();
        self.order.subtotal = b.subtotal;
        self.order.discount_amount = b.discount_amount;
        self.order.gratuity_amount = b.gratuity_amount;
        self.order.tax_amount = b.tax_amount;
        self.order.total_amount = b.total_amount;
    }

    fn touch(&mut self) {
        let now = shared::util::now_millis();
        self.order.updated_at = now.max(self.order.updated_at).max(self.order.created_at);
        self.order.revision += 1;
    }

    fn record(&self, event: AuditEvent) {
        self.audit.record(event);
    }
}

fn validate_quantity(quantity: i32) -> OrderResult<()> {
    if quantity < 1 {
        return Err(OrderError::InvalidQuantity(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidQuantity(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}

/// Trim and drop empty free text
fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn describe_adjustment(adjustment: &Adjustment) -> String {
    match adjustment.kind {
        AdjustmentKind::Percentage => format!("{}%", adjustment.value),
        AdjustmentKind::Fixed => format!("{} fixed", adjustment.value),
    }
}
