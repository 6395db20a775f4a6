//! Shared fakes for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::order::{AuditEvent, AuditEventKind, Order};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::audit::AuditLogger;
use crate::orders::{OrderStore, StoreError, StoreResult};
use crate::printing::{KitchenTicket, PrintDispatchError, PrintDispatchResult, PrintDispatcher};

/// Keeps every recorded event in memory
#[derive(Debug, Default)]
pub struct RecordingAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLogger {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn last(&self) -> Option<AuditEvent> {
        self.events.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

/// Dispatcher whose destinations can be switched off per test
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    failing: Mutex<HashSet<String>>,
    emitted: Mutex<Vec<KitchenTicket>>,
}

impl ScriptedDispatcher {
    pub fn fail(&self, destination_id: &str) {
        self.failing.lock().insert(destination_id.to_string());
    }

    pub fn recover(&self, destination_id: &str) {
        self.failing.lock().remove(destination_id);
    }

    /// Successfully emitted tickets for one destination
    pub fn emitted_to(&self, destination_id: &str) -> Vec<KitchenTicket> {
        self.emitted
            .lock()
            .iter()
            .filter(|t| t.destination_id == destination_id)
            .cloned()
            .collect()
    }

    pub fn emit_count(&self) -> usize {
        self.emitted.lock().len()
    }
}

#[async_trait]
impl PrintDispatcher for ScriptedDispatcher {
    async fn emit(&self, destination_id: &str, ticket: &KitchenTicket) -> PrintDispatchResult<()> {
        if self.failing.lock().contains(destination_id) {
            return Err(PrintDispatchError::Failed(format!("{destination_id} offline")));
        }
        self.emitted.lock().push(ticket.clone());
        Ok(())
    }
}

/// Store that rejects every call
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl OrderStore for FailingStore {
    async fn save(&self, _order: &Order) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn load(&self, order_id: &str) -> StoreResult<Order> {
        Err(StoreError::NotFound(order_id.to_string()))
    }

    async fn delete(&self, _order_id: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn next_order_count(&self) -> StoreResult<u64> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn list_open(&self) -> StoreResult<Vec<Order>> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

/// In-memory store whose saves can be switched off
#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<String, Order>>,
    count: AtomicU64,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.lock().get(order_id).cloned()
    }

    pub fn insert(&self, order: Order) {
        self.orders.lock().insert(order.id.clone(), order);
    }

    pub fn set_count(&self, count: u64) {
        self.count.store(count, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        self.check()?;
        let mut orders = self.orders.lock();
        let stale = orders
            .get(&order.id)
            .is_some_and(|stored| stored.revision > order.revision);
        if !stale {
            orders.insert(order.id.clone(), order.clone());
        }
        Ok(())
    }

    async fn load(&self, order_id: &str) -> StoreResult<Order> {
        self.get(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))
    }

    async fn delete(&self, order_id: &str) -> StoreResult<()> {
        self.check()?;
        self.orders.lock().remove(order_id);
        Ok(())
    }

    async fn next_order_count(&self) -> StoreResult<u64> {
        self.check()?;
        Ok(self.count.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn list_open(&self) -> StoreResult<Vec<Order>> {
        let mut open: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|o| o.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|o| o.created_at);
        Ok(open)
    }
}
