use super::*;
use crate::printing::{
    AssignmentTable, PrintDispatchResult, PrintDispatcher, TicketStorage,
};
use crate::test_support::{MemoryStore, RecordingAuditLogger, ScriptedDispatcher};
use async_trait::async_trait;
use shared::models::PrinterAssignment;
use shared::order::{ActorRole, AuditEventKind, OrderStatus};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Notify;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn waiter() -> Actor {
    Actor::staff("u1", "Alice")
}

fn manager_actor() -> Actor {
    Actor::new("m1", "Maria", ActorRole::Manager)
}

fn steak() -> MenuItemRef {
    MenuItemRef::new("steak", "Steak", dec("10.00")).with_category("grill", "Grill")
}

fn cake() -> MenuItemRef {
    MenuItemRef::new("cake", "Cake", dec("5.00")).with_category("dessert", "Dessert")
}

struct Fixture {
    manager: Arc<OrdersManager>,
    store: Arc<MemoryStore>,
    dispatcher: Arc<ScriptedDispatcher>,
    audit: Arc<RecordingAuditLogger>,
}

fn build(store: Arc<MemoryStore>, dispatcher: Arc<dyn PrintDispatcher>) -> (Arc<OrdersManager>, Arc<RecordingAuditLogger>) {
    let audit = Arc::new(RecordingAuditLogger::default());
    let table = AssignmentTable::new(vec![
        PrinterAssignment::category("a1", "grill", "printer1"),
        PrinterAssignment::category("a2", "dessert", "printer2"),
    ]);
    let engine = KitchenDispatchEngine::new(
        Arc::new(table),
        dispatcher,
        store.clone(),
        audit.clone(),
    )
    .with_ticket_storage(TicketStorage::open_in_memory().unwrap());
    let manager = OrdersManager::new(store, Arc::new(engine), audit.clone(), dec("13"));
    (Arc::new(manager), audit)
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let (manager, audit) = build(store.clone(), dispatcher.clone());
    Fixture {
        manager,
        store,
        dispatcher,
        audit,
    }
}

async fn open_with_items(f: &Fixture) -> String {
    let order = f
        .manager
        .open_order(&waiter(), Some("T1".to_string()), Some("Alice".to_string()))
        .await
        .unwrap();
    f.manager
        .add_item(&order.id, &waiter(), steak(), 2, dec("10.00"), None)
        .await
        .unwrap();
    f.manager
        .add_item(&order.id, &waiter(), cake(), 1, dec("5.00"), None)
        .await
        .unwrap();
    order.id
}

/// Auto-save runs in the background; poll until it caught up
async fn wait_for_revision(store: &MemoryStore, order_id: &str, revision: u64) -> Order {
    for _ in 0..200 {
        if let Some(order) = store.get(order_id)
            && order.revision >= revision
        {
            return order;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("order {order_id} never reached revision {revision}");
}

// ========================================================================
// Lifecycle
// ========================================================================

#[tokio::test]
async fn test_open_order_assigns_sequential_numbers() {
    let f = fixture();
    let a = f.manager.open_order(&waiter(), None, None).await.unwrap();
    let b = f.manager.open_order(&waiter(), None, None).await.unwrap();

    let today = chrono::Local::now().format("%Y%m%d").to_string();
    assert_eq!(a.order_number, format!("{today}-0001"));
    assert_eq!(b.order_number, format!("{today}-0002"));
    assert_eq!(a.status, OrderStatus::Pending);
    assert_eq!(f.manager.open_order_count(), 2);
    assert_eq!(
        f.audit.kinds(),
        vec![AuditEventKind::OrderOpened, AuditEventKind::OrderOpened]
    );
}

#[tokio::test]
async fn test_order_numbers_continue_from_stored_counter() {
    let f = fixture();
    f.store.set_count(41);
    let order = f.manager.open_order(&waiter(), None, None).await.unwrap();

    let today = chrono::Local::now().format("%Y%m%d").to_string();
    assert_eq!(order.order_number, format!("{today}-0042"));
}

#[tokio::test]
async fn test_mutations_refresh_projection() {
    let f = fixture();
    let id = open_with_items(&f).await;

    let order = f.manager.get_order(&id).unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.subtotal, dec("25.00"));
    assert_eq!(order.tax_amount, dec("3.25"));
    assert_eq!(order.total_amount, dec("28.25"));
}

#[tokio::test]
async fn test_auto_save_converges_on_latest_snapshot() {
    let f = fixture();
    let id = open_with_items(&f).await;
    f.manager
        .apply_discount(&id, &waiter(), AdjustmentKind::Percentage, 10.0)
        .await
        .unwrap();

    let latest = f.manager.get_order(&id).unwrap();
    let stored = wait_for_revision(&f.store, &id, latest.revision).await;
    assert_eq!(stored, latest);
}

#[tokio::test]
async fn test_auto_save_failure_keeps_memory_state() {
    let f = fixture();
    let order = f.manager.open_order(&waiter(), None, None).await.unwrap();
    f.store.set_failing(true);

    f.manager
        .add_item(&order.id, &waiter(), steak(), 1, dec("10.00"), None)
        .await
        .unwrap();
    assert_eq!(f.manager.get_order(&order.id).unwrap().items.len(), 1);

    f.store.set_failing(false);
    f.manager.flush(&order.id).await.unwrap();
    assert_eq!(f.store.get(&order.id).unwrap().items.len(), 1);
}

#[tokio::test]
async fn test_unknown_order() {
    let f = fixture();
    assert!(matches!(
        f.manager
            .add_item("missing", &waiter(), steak(), 1, dec("10.00"), None)
            .await,
        Err(ManagerError::OrderNotFound(_))
    ));
    assert!(matches!(
        f.manager.send_to_kitchen("missing", &waiter()).await,
        Err(ManagerError::OrderNotFound(_))
    ));
    assert!(f.manager.get_order("missing").is_none());
}

#[tokio::test]
async fn test_rejected_mutation_leaves_projection() {
    let f = fixture();
    let id = open_with_items(&f).await;
    let before = f.manager.get_order(&id).unwrap();

    assert!(matches!(
        f.manager
            .add_item(&id, &waiter(), steak(), 0, dec("10.00"), None)
            .await,
        Err(ManagerError::Order(OrderError::InvalidQuantity(_)))
    ));
    assert!(matches!(
        f.manager
            .apply_gratuity(&id, &waiter(), AdjustmentKind::Percentage, 150.0)
            .await,
        Err(ManagerError::Order(OrderError::InvalidGratuity(_)))
    ));
    assert_eq!(f.manager.get_order(&id).unwrap(), before);
}

#[tokio::test]
async fn test_checkout_persists_and_evicts() {
    let f = fixture();
    let id = open_with_items(&f).await;

    let done = f.manager.checkout(&id, &waiter()).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(f.manager.get_order(&id).is_none());
    assert_eq!(f.store.get(&id).unwrap().status, OrderStatus::Completed);
    assert_eq!(
        f.manager.load_order(&id).await.unwrap().status,
        OrderStatus::Completed
    );

    assert!(matches!(
        f.manager
            .add_item(&id, &waiter(), steak(), 1, dec("10.00"), None)
            .await,
        Err(ManagerError::Order(OrderError::OrderClosed { .. }))
    ));
    assert!(matches!(
        f.manager.send_to_kitchen(&id, &waiter()).await,
        Err(ManagerError::Order(OrderError::OrderClosed { .. }))
    ));
}

#[tokio::test]
async fn test_checkout_persistence_failure_then_flush() {
    let f = fixture();
    let id = open_with_items(&f).await;
    wait_for_revision(&f.store, &id, f.manager.get_order(&id).unwrap().revision).await;
    f.store.set_failing(true);

    let err = f.manager.checkout(&id, &waiter()).await.unwrap_err();
    assert!(matches!(err, ManagerError::Persistence { ref order_id, .. } if *order_id == id));
    assert!(err.is_retryable());

    // Completed in memory, not yet durable
    assert_eq!(
        f.manager.get_order(&id).unwrap().status,
        OrderStatus::Completed
    );
    assert!(f.store.get(&id).unwrap().is_open());

    f.store.set_failing(false);
    f.manager.flush(&id).await.unwrap();
    assert!(f.manager.get_order(&id).is_none());
    assert_eq!(f.store.get(&id).unwrap().status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_cancel_requires_clearing_unsent_items() {
    let f = fixture();
    let id = open_with_items(&f).await;

    assert!(matches!(
        f.manager.cancel_order(&id, &waiter(), None).await,
        Err(ManagerError::Order(OrderError::PendingItemsMustBeCleared(_)))
    ));

    f.manager.clear_all_items(&id, &waiter()).await.unwrap();
    let cancelled = f
        .manager
        .cancel_order(&id, &waiter(), Some("walked out".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(f.audit.last().unwrap().kind, AuditEventKind::OrderCancelled);
}

#[tokio::test]
async fn test_cancel_after_send_is_warning() {
    let f = fixture();
    let id = open_with_items(&f).await;
    f.manager.send_to_kitchen(&id, &waiter()).await.unwrap();

    f.manager.cancel_order(&id, &manager_actor(), None).await.unwrap();

    let last = f.audit.last().unwrap();
    assert_eq!(last.kind, AuditEventKind::OrderCancelled);
    assert_eq!(last.severity, shared::order::AuditSeverity::Warning);
}

#[tokio::test]
async fn test_restore_open_orders() {
    let f = fixture();

    let mut open = Order::new("o1".to_string(), "20240101-0001".to_string());
    open.items.push(OrderItem {
        id: "line-1".to_string(),
        menu_item: steak(),
        quantity: 2,
        unit_price: dec("10.00"),
        sent_to_kitchen: true,
        special_instructions: None,
        notes: None,
    });
    open.status = OrderStatus::Confirmed;
    let mut closed = Order::new("o2".to_string(), "20240101-0002".to_string());
    closed.status = OrderStatus::Completed;
    f.store.insert(open);
    f.store.insert(closed);

    assert_eq!(f.manager.restore_open_orders().await.unwrap(), 1);
    assert_eq!(f.manager.restore_open_orders().await.unwrap(), 0);

    let restored = f.manager.get_order("o1").unwrap();
    assert_eq!(restored.subtotal, dec("20.00"));
    assert_eq!(restored.tax_amount, dec("2.60"));
    assert!(f.manager.get_order("o2").is_none());
    // Restoring is not a state change
    assert!(f.audit.kinds().is_empty());
}

// ========================================================================
// Concurrency
// ========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_are_serialized() {
    let f = fixture();
    let order = f.manager.open_order(&waiter(), None, None).await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let manager = f.manager.clone();
            let id = order.id.clone();
            tokio::spawn(async move {
                manager
                    .add_item(&id, &waiter(), steak(), 1, dec("10.00"), None)
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    let order = f.manager.get_order(&order.id).unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 20);
    assert_eq!(order.subtotal, dec("200.00"));
    let kinds = f.audit.kinds();
    assert_eq!(kinds.iter().filter(|k| **k == AuditEventKind::ItemAdded).count(), 1);
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == AuditEventKind::QuantityChanged)
            .count(),
        19
    );
}

/// Holds every emit until released
#[derive(Default)]
struct GatedDispatcher {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PrintDispatcher for GatedDispatcher {
    async fn emit(&self, _destination_id: &str, _ticket: &KitchenTicket) -> PrintDispatchResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_reads_do_not_wait_on_dispatch() {
    let store = Arc::new(MemoryStore::default());
    let gate = Arc::new(GatedDispatcher::default());
    let (manager, _audit) = build(store, gate.clone());

    let order = manager.open_order(&waiter(), None, None).await.unwrap();
    manager
        .add_item(&order.id, &waiter(), steak(), 1, dec("10.00"), None)
        .await
        .unwrap();

    let send = {
        let manager = manager.clone();
        let id = order.id.clone();
        tokio::spawn(async move { manager.send_to_kitchen(&id, &waiter()).await })
    };
    gate.entered.notified().await;

    // Send cycle in flight: projection still readable, still unsent
    let during = manager.get_order(&order.id).unwrap();
    assert!(!during.items[0].sent_to_kitchen);
    assert_eq!(manager.list_orders().len(), 1);

    gate.release.notify_one();
    let report = send.await.unwrap().unwrap();
    assert!(report.is_complete());
    assert!(manager.get_order(&order.id).unwrap().items[0].sent_to_kitchen);
}

// ========================================================================
// Kitchen
// ========================================================================

#[tokio::test]
async fn test_send_to_kitchen_updates_projection() {
    let f = fixture();
    let id = open_with_items(&f).await;

    let report = f.manager.send_to_kitchen(&id, &waiter()).await.unwrap();
    assert_eq!(report.destinations_attempted, 2);
    assert!(report.persisted);

    let order = f.manager.get_order(&id).unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.items.iter().all(|i| i.sent_to_kitchen));
    assert_eq!(f.store.get(&id).unwrap().revision, order.revision);

    let tickets = f.manager.tickets_for_order(&id).await.unwrap();
    assert_eq!(tickets.len(), 2);

    let reprinted = f.manager.reprint(&tickets[0].id).await.unwrap();
    assert_eq!(reprinted.print_count, 2);
    assert_eq!(f.dispatcher.emit_count(), 3);
}

#[tokio::test]
async fn test_sent_item_removal_needs_privilege() {
    let f = fixture();
    let id = open_with_items(&f).await;
    f.manager.send_to_kitchen(&id, &waiter()).await.unwrap();
    let item_id = f.manager.get_order(&id).unwrap().items[0].id.clone();

    assert!(matches!(
        f.manager.remove_item(&id, &waiter(), &item_id).await,
        Err(ManagerError::Order(OrderError::RemovalNotPermitted { .. }))
    ));
    let removed = f
        .manager
        .remove_item(&id, &manager_actor(), &item_id)
        .await
        .unwrap();
    assert_eq!(removed.menu_item.id, "steak");
    assert_eq!(f.audit.last().unwrap().kind, AuditEventKind::PrivilegedRemoval);
}

#[tokio::test]
async fn test_preview_does_not_mutate() {
    let f = fixture();
    let order = f.manager.open_order(&waiter(), None, None).await.unwrap();
    f.manager
        .add_item(&order.id, &waiter(), steak(), 2, dec("10.00"), None)
        .await
        .unwrap();
    let before = f.manager.get_order(&order.id).unwrap();

    let preview = f
        .manager
        .preview(&order.id, Some(Adjustment::percentage(dec("10"))), None)
        .unwrap();
    assert_eq!(preview.subtotal, dec("20.00"));
    assert_eq!(preview.discount_amount, dec("2.00"));
    assert_eq!(preview.tax_amount, dec("2.60"));
    assert_eq!(preview.total_amount, dec("20.60"));
    assert_eq!(f.manager.get_order(&order.id).unwrap(), before);
}
