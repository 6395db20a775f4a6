//! OrdersManager - serialized access to live orders
//!
//! Each open order lives in an [`OrderHandle`]: the aggregate behind an
//! async mutex (the per-order serialization point) and a read projection
//! refreshed after every successful mutation. Reads only touch the
//! projection, so they never wait on an in-flight kitchen send or save.
//!
//! # Mutation Flow
//!
//! ```text
//! mutate(order_id, f)
//!     ├─ 1. Look up handle (unknown → OrderNotFound, closed → OrderClosed)
//!     ├─ 2. Lock aggregate
//!     ├─ 3. Apply f (validation error → nothing changes)
//!     ├─ 4. Refresh projection
//!     └─ 5. Spawn auto-save of the snapshot
//! ```
//!
//! Checkout and cancel save synchronously instead of step 5 and drop the
//! order from the registry once the save succeeded.

mod error;
pub use error::*;

use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use shared::order::{Actor, Adjustment, AdjustmentKind, MenuItemRef, Order, OrderItem};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::aggregate::OrderAggregate;
use super::error::{OrderError, OrderResult};
use super::money::FinancialBreakdown;
use super::storage::{OrderStore, StoreError};
use crate::audit::AuditLogger;
use crate::printing::{DispatchReport, KitchenDispatchEngine, KitchenTicket};

struct OrderHandle {
    aggregate: Mutex<OrderAggregate>,
    projection: RwLock<Order>,
}

impl OrderHandle {
    fn new(aggregate: OrderAggregate) -> Self {
        let projection = RwLock::new(aggregate.snapshot());
        Self {
            aggregate: Mutex::new(aggregate),
            projection,
        }
    }
}

pub struct OrdersManager {
    orders: DashMap<String, Arc<OrderHandle>>,
    store: Arc<dyn OrderStore>,
    engine: Arc<KitchenDispatchEngine>,
    audit: Arc<dyn AuditLogger>,
    tax_rate_percent: Decimal,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("open_orders", &self.orders.len())
            .field("tax_rate_percent", &self.tax_rate_percent)
            .finish_non_exhaustive()
    }
}

impl OrdersManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        engine: Arc<KitchenDispatchEngine>,
        audit: Arc<dyn AuditLogger>,
        tax_rate_percent: Decimal,
    ) -> Self {
        Self {
            orders: DashMap::new(),
            store,
            engine,
            audit,
            tax_rate_percent,
        }
    }

    pub fn tax_rate_percent(&self) -> Decimal {
        self.tax_rate_percent
    }

    pub fn engine(&self) -> &Arc<KitchenDispatchEngine> {
        &self.engine
    }

    /// Reload every pending/confirmed order from the store
    ///
    /// Orders already in the registry are left alone. Returns how many
    /// were restored.
    pub async fn restore_open_orders(&self) -> ManagerResult<usize> {
        let stored = self.store.list_open().await?;
        let mut restored = 0;
        for order in stored {
            if self.orders.contains_key(&order.id) {
                continue;
            }
            let id = order.id.clone();
            let aggregate = OrderAggregate::restore(order, self.tax_rate_percent, self.audit.clone());
            self.orders.insert(id, Arc::new(OrderHandle::new(aggregate)));
            restored += 1;
        }
        info!(restored, "Open orders restored");
        Ok(restored)
    }

    // ========== Lifecycle ==========

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn open_order(
        &self,
        actor: &Actor,
        table: Option<String>,
        server: Option<String>,
    ) -> ManagerResult<Order> {
        let count = self.store.next_order_count().await?;
        let order_number = format!("{}-{:04}", chrono::Local::now().format("%Y%m%d"), count);

        let aggregate = OrderAggregate::open(
            order_number,
            table,
            server,
            actor,
            self.tax_rate_percent,
            self.audit.clone(),
        );
        let snapshot = aggregate.snapshot();
        self.orders
            .insert(snapshot.id.clone(), Arc::new(OrderHandle::new(aggregate)));
        self.spawn_save(snapshot.clone());

        info!(order_id = %snapshot.id, order_number = %snapshot.order_number, "Order opened");
        Ok(snapshot)
    }

    /// Complete the order; durable before returning
    #[instrument(skip(self, actor))]
    pub async fn checkout(&self, order_id: &str, actor: &Actor) -> ManagerResult<Order> {
        self.finish(order_id, |agg| agg.checkout(actor)).await
    }

    /// Cancel the order; durable before returning
    #[instrument(skip(self, actor))]
    pub async fn cancel_order(
        &self,
        order_id: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> ManagerResult<Order> {
        self.finish(order_id, |agg| agg.cancel(actor, reason)).await
    }

    /// Persist the latest snapshot now
    ///
    /// Retries a failed terminal save; a terminal order leaves the registry
    /// once the save succeeds.
    pub async fn flush(&self, order_id: &str) -> ManagerResult<()> {
        let Some(handle) = self.registered(order_id) else {
            // Already durable and evicted
            self.store.load(order_id).await.map_err(|e| match e {
                StoreError::NotFound(id) => ManagerError::OrderNotFound(id),
                other => other.into(),
            })?;
            return Ok(());
        };

        let snapshot = handle.projection.read().clone();
        self.store
            .save(&snapshot)
            .await
            .map_err(|source| ManagerError::Persistence {
                order_id: order_id.to_string(),
                source,
            })?;
        if !snapshot.is_open() {
            self.orders.remove(order_id);
            debug!(order_id, "Closed order evicted");
        }
        Ok(())
    }

    // ========== Items ==========

    pub async fn add_item(
        &self,
        order_id: &str,
        actor: &Actor,
        menu_item: MenuItemRef,
        quantity: i32,
        unit_price: Decimal,
        special_instructions: Option<String>,
    ) -> ManagerResult<String> {
        self.mutate(order_id, |agg| {
            agg.add_item(actor, menu_item, quantity, unit_price, special_instructions)
        })
        .await
    }

    pub async fn update_item_quantity(
        &self,
        order_id: &str,
        actor: &Actor,
        item_id: &str,
        quantity: i32,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.update_item_quantity(actor, item_id, quantity))
            .await
    }

    pub async fn remove_item(
        &self,
        order_id: &str,
        actor: &Actor,
        item_id: &str,
    ) -> ManagerResult<OrderItem> {
        self.mutate(order_id, |agg| agg.remove_item(actor, item_id))
            .await
    }

    pub async fn update_item_notes(
        &self,
        order_id: &str,
        item_id: &str,
        notes: Option<String>,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.update_item_notes(item_id, notes))
            .await
    }

    pub async fn update_item_special_instructions(
        &self,
        order_id: &str,
        item_id: &str,
        instructions: Option<String>,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| {
            agg.update_item_special_instructions(item_id, instructions)
        })
        .await
    }

    pub async fn clear_all_items(&self, order_id: &str, actor: &Actor) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.clear_all_items(actor)).await
    }

    // ========== Adjustments and notes ==========

    pub async fn apply_discount(
        &self,
        order_id: &str,
        actor: &Actor,
        kind: AdjustmentKind,
        value: f64,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.apply_discount(actor, kind, value))
            .await
    }

    pub async fn apply_gratuity(
        &self,
        order_id: &str,
        actor: &Actor,
        kind: AdjustmentKind,
        value: f64,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.apply_gratuity(actor, kind, value))
            .await
    }

    pub async fn add_note(
        &self,
        order_id: &str,
        actor: &Actor,
        text: &str,
        internal: bool,
    ) -> ManagerResult<()> {
        self.mutate(order_id, |agg| agg.add_note(actor, text, internal))
            .await
    }

    // ========== Kitchen ==========

    /// Send every unsent item to its destinations
    ///
    /// The order stays locked for the whole cycle; reads keep being served
    /// from the projection meanwhile.
    #[instrument(skip(self, actor))]
    pub async fn send_to_kitchen(
        &self,
        order_id: &str,
        actor: &Actor,
    ) -> ManagerResult<DispatchReport> {
        let handle = self.handle(order_id).await?;
        let mut aggregate = handle.aggregate.lock().await;

        let report = self.engine.send(&mut *aggregate, actor).await?;
        if !report.marked_sent.is_empty() {
            *handle.projection.write() = aggregate.snapshot();
        }
        Ok(report)
    }

    pub async fn reprint(&self, ticket_id: &str) -> ManagerResult<KitchenTicket> {
        Ok(self.engine.reprint(ticket_id).await?)
    }

    pub async fn tickets_for_order(&self, order_id: &str) -> ManagerResult<Vec<KitchenTicket>> {
        Ok(self.engine.tickets_for_order(order_id).await?)
    }

    // ========== Read side ==========

    /// Latest projection of a live order
    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.registered(order_id).map(|h| h.projection.read().clone())
    }

    /// Live order, falling back to the store for evicted ones
    pub async fn load_order(&self, order_id: &str) -> ManagerResult<Order> {
        if let Some(order) = self.get_order(order_id) {
            return Ok(order);
        }
        self.store.load(order_id).await.map_err(|e| match e {
            StoreError::NotFound(id) => ManagerError::OrderNotFound(id),
            other => other.into(),
        })
    }

    /// Every live order, oldest first
    pub fn list_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().projection.read().clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Hypothetical totals; `None` keeps the order's current adjustment
    pub fn preview(
        &self,
        order_id: &str,
        discount: Option<Adjustment>,
        gratuity: Option<Adjustment>,
    ) -> ManagerResult<FinancialBreakdown> {
        let handle = self
            .registered(order_id)
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;
        let order = handle.projection.read();
        Ok(FinancialBreakdown::compute(
            &order.items,
            discount.as_ref().or(order.discount.as_ref()),
            gratuity.as_ref().or(order.gratuity.as_ref()),
            self.tax_rate_percent,
        ))
    }

    // ========== Internals ==========

    fn registered(&self, order_id: &str) -> Option<Arc<OrderHandle>> {
        self.orders.get(order_id).map(|h| h.value().clone())
    }

    /// Registry lookup; evicted terminal orders report `OrderClosed`
    async fn handle(&self, order_id: &str) -> ManagerResult<Arc<OrderHandle>> {
        if let Some(handle) = self.registered(order_id) {
            return Ok(handle);
        }
        match self.store.load(order_id).await {
            Ok(order) if !order.is_open() => Err(OrderError::OrderClosed {
                order_id: order.id,
                status: order.status.to_string(),
            }
            .into()),
            Ok(_) | Err(StoreError::NotFound(_)) => {
                Err(ManagerError::OrderNotFound(order_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn mutate<T, F>(&self, order_id: &str, f: F) -> ManagerResult<T>
    where
        F: FnOnce(&mut OrderAggregate) -> OrderResult<T>,
    {
        let handle = self.handle(order_id).await?;
        let mut aggregate = handle.aggregate.lock().await;

        let value = f(&mut *aggregate)?;
        let snapshot = aggregate.snapshot();
        *handle.projection.write() = snapshot.clone();
        drop(aggregate);

        self.spawn_save(snapshot);
        Ok(value)
    }

    async fn finish<F>(&self, order_id: &str, f: F) -> ManagerResult<Order>
    where
        F: FnOnce(&mut OrderAggregate) -> OrderResult<()>,
    {
        let handle = self.handle(order_id).await?;
        let mut aggregate = handle.aggregate.lock().await;

        f(&mut *aggregate)?;
        let snapshot = aggregate.snapshot();
        *handle.projection.write() = snapshot.clone();

        self.store
            .save(&snapshot)
            .await
            .map_err(|source| ManagerError::Persistence {
                order_id: order_id.to_string(),
                source,
            })?;
        drop(aggregate);

        self.orders.remove(order_id);
        info!(order_id, status = %snapshot.status, "Order closed");
        Ok(snapshot)
    }

    fn spawn_save(&self, snapshot: Order) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&snapshot).await {
                warn!(
                    order_id = %snapshot.id,
                    revision = snapshot.revision,
                    error = %e,
                    "Auto-save failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests;
