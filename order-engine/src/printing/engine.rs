//! KitchenDispatchEngine - fans unsent items out to kitchen destinations
//!
//! # Send cycle
//!
//! ```text
//! send(aggregate)
//!     ├─ 1. Collect unsent items (none → no-op report)
//!     ├─ 2. Resolve destinations (item → category → default)
//!     ├─ 3. Build one ticket per destination
//!     ├─ 4. Emit all tickets concurrently, collect failures
//!     ├─ 5. Mark items whose every destination succeeded
//!     ├─ 6. Persist the order, record SentToKitchen
//!     └─ 7. Report attempted / succeeded / retry items
//! ```
//!
//! The caller holds exclusive access to the aggregate for the whole cycle,
//! so nothing interleaves between reading the unsent set and marking it.

use futures::future::join_all;
use serde_json::json;
use shared::order::{Actor, AuditEvent, AuditEventKind, OrderItem};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::dispatcher::{PrintDispatchError, PrintDispatcher};
use super::resolver::PrinterAssignmentResolver;
use super::storage::{TicketStorage, TicketStorageError};
use super::types::{DestinationOutcome, DispatchReport, KitchenTicket, RetryItem, RetryReason};
use crate::audit::AuditLogger;
use crate::orders::{OrderAggregate, OrderError, OrderStore};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Ticket storage error: {0}")]
    Storage(#[from] TicketStorageError),

    #[error("Kitchen ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Ticket history is not enabled")]
    HistoryDisabled,

    #[error("Reprint of ticket {ticket_id} to {destination_id} failed: {source}")]
    Reprint {
        ticket_id: String,
        destination_id: String,
        #[source]
        source: PrintDispatchError,
    },

    #[error("Ticket storage task failed: {0}")]
    Task(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

pub struct KitchenDispatchEngine {
    resolver: Arc<dyn PrinterAssignmentResolver>,
    dispatcher: Arc<dyn PrintDispatcher>,
    store: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditLogger>,
    /// Where items without any assignment go
    default_destination: Option<String>,
    tickets: Option<TicketStorage>,
}

impl std::fmt::Debug for KitchenDispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KitchenDispatchEngine")
            .field("default_destination", &self.default_destination)
            .field("ticket_history", &self.tickets.is_some())
            .finish_non_exhaustive()
    }
}

impl KitchenDispatchEngine {
    pub fn new(
        resolver: Arc<dyn PrinterAssignmentResolver>,
        dispatcher: Arc<dyn PrintDispatcher>,
        store: Arc<dyn OrderStore>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            store,
            audit,
            default_destination: None,
            tickets: None,
        }
    }

    pub fn with_default_destination(mut self, destination_id: Option<String>) -> Self {
        self.default_destination = destination_id;
        self
    }

    pub fn with_ticket_storage(mut self, storage: TicketStorage) -> Self {
        self.tickets = Some(storage);
        self
    }

    pub fn resolver(&self) -> &Arc<dyn PrinterAssignmentResolver> {
        &self.resolver
    }

    /// Run one send cycle against the aggregate
    #[instrument(skip_all, fields(order_id = %aggregate.id()))]
    pub async fn send(
        &self,
        aggregate: &mut OrderAggregate,
        actor: &Actor,
    ) -> DispatchResult<DispatchReport> {
        aggregate.ensure_open()?;
        let order_id = aggregate.id().to_string();

        // 1. Unsent items
        let unsent: Vec<OrderItem> = aggregate.order().unsent_items().cloned().collect();
        if unsent.is_empty() {
            debug!("Nothing to send");
            return Ok(DispatchReport::empty(order_id));
        }

        // 2. Resolve destinations
        let mut retry = Vec::new();
        let mut routes: Vec<(&OrderItem, BTreeSet<String>)> = Vec::with_capacity(unsent.len());
        let mut by_destination: BTreeMap<String, Vec<&OrderItem>> = BTreeMap::new();
        for item in &unsent {
            let mut destinations = self.resolver.resolve(item);
            if destinations.is_empty()
                && let Some(default) = &self.default_destination
            {
                destinations.insert(default.clone());
            }
            if destinations.is_empty() {
                warn!(item_id = %item.id, name = %item.menu_item.name, "No print destination for item");
                retry.push(RetryItem {
                    item_id: item.id.clone(),
                    name: item.menu_item.name.clone(),
                    reason: RetryReason::Unroutable,
                });
                continue;
            }
            for dest in &destinations {
                by_destination.entry(dest.clone()).or_default().push(item);
            }
            routes.push((item, destinations));
        }

        // 3. One ticket per destination
        let tickets: Vec<KitchenTicket> = by_destination
            .iter()
            .map(|(dest, items)| {
                KitchenTicket::for_destination(aggregate.order(), dest, items.iter().copied())
            })
            .collect();

        // 4. Fan out, join, collect failures
        let results = join_all(
            tickets
                .iter()
                .map(|t| self.dispatcher.emit(&t.destination_id, t)),
        )
        .await;

        let mut failed: HashSet<String> = HashSet::new();
        let mut outcomes = Vec::with_capacity(tickets.len());
        for (ticket, result) in tickets.iter().zip(results) {
            let error = match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(destination_id = %ticket.destination_id, error = %e, "Kitchen ticket dispatch failed");
                    failed.insert(ticket.destination_id.clone());
                    Some(e.to_string())
                }
            };
            outcomes.push(DestinationOutcome {
                destination_id: ticket.destination_id.clone(),
                ticket_id: ticket.id.clone(),
                item_ids: ticket.item_ids().map(str::to_string).collect(),
                error,
            });
        }

        // 5. Mark only fully delivered items
        let mut marked = Vec::new();
        for (item, destinations) in &routes {
            let failed_here: Vec<String> = destinations
                .iter()
                .filter(|d| failed.contains(*d))
                .cloned()
                .collect();
            if failed_here.is_empty() {
                marked.push(item.id.clone());
            } else {
                retry.push(RetryItem {
                    item_id: item.id.clone(),
                    name: item.menu_item.name.clone(),
                    reason: RetryReason::DispatchFailed {
                        destination_ids: failed_here,
                    },
                });
            }
        }
        aggregate.mark_items_sent(&marked)?;

        let succeeded_destinations: Vec<String> = outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(|o| o.destination_id.clone())
            .collect();
        let printed: Vec<KitchenTicket> = tickets
            .into_iter()
            .filter(|t| !failed.contains(&t.destination_id))
            .map(|mut t| {
                t.print_count = 1;
                t
            })
            .collect();
        self.store_history(printed).await;

        // 6. Persist and audit
        let mut persisted = true;
        if !marked.is_empty() {
            if let Err(e) = self.store.save(&aggregate.snapshot()).await {
                persisted = false;
                warn!(error = %e, "Failed to persist order after kitchen send");
            }

            self.audit.record(AuditEvent::new(
                &order_id,
                AuditEventKind::SentToKitchen,
                actor,
                format!(
                    "{} items sent to {}",
                    marked.len(),
                    succeeded_destinations.join(", ")
                ),
                json!({
                    "item_ids": marked,
                    "destinations": succeeded_destinations,
                    "failed_destinations": outcomes
                        .iter()
                        .filter(|o| !o.succeeded())
                        .map(|o| o.destination_id.as_str())
                        .collect::<Vec<_>>(),
                }),
            ));
        }

        // 7. Report
        let report = DispatchReport {
            order_id,
            destinations_attempted: outcomes.len(),
            destinations_succeeded: succeeded_destinations.len(),
            marked_sent: marked,
            retry,
            outcomes,
            persisted,
        };
        info!(
            attempted = report.destinations_attempted,
            succeeded = report.destinations_succeeded,
            marked = report.marked_sent.len(),
            retry = report.retry.len(),
            "Kitchen send finished"
        );
        Ok(report)
    }

    /// Re-emit a stored ticket; sent flags are untouched
    #[instrument(skip(self))]
    pub async fn reprint(&self, ticket_id: &str) -> DispatchResult<KitchenTicket> {
        let storage = self.tickets.clone().ok_or(DispatchError::HistoryDisabled)?;

        let id = ticket_id.to_string();
        let lookup = storage.clone();
        let ticket = tokio::task::spawn_blocking(move || lookup.get_ticket(&id))
            .await
            .map_err(|e| DispatchError::Task(e.to_string()))??
            .ok_or_else(|| DispatchError::TicketNotFound(ticket_id.to_string()))?;

        self.dispatcher
            .emit(&ticket.destination_id, &ticket)
            .await
            .map_err(|source| DispatchError::Reprint {
                ticket_id: ticket.id.clone(),
                destination_id: ticket.destination_id.clone(),
                source,
            })?;

        let id = ticket.id.clone();
        let updated = tokio::task::spawn_blocking(move || storage.increment_print_count(&id))
            .await
            .map_err(|e| DispatchError::Task(e.to_string()))??;
        info!(print_count = updated.print_count, "Kitchen ticket reprinted");
        Ok(updated)
    }

    /// Emitted tickets of one order, oldest first
    pub async fn tickets_for_order(&self, order_id: &str) -> DispatchResult<Vec<KitchenTicket>> {
        let storage = self.tickets.clone().ok_or(DispatchError::HistoryDisabled)?;
        let order_id = order_id.to_string();
        Ok(
            tokio::task::spawn_blocking(move || storage.tickets_for_order(&order_id))
                .await
                .map_err(|e| DispatchError::Task(e.to_string()))??,
        )
    }

    async fn store_history(&self, printed: Vec<KitchenTicket>) {
        let Some(storage) = self.tickets.clone() else {
            return;
        };
        if printed.is_empty() {
            return;
        }
        match tokio::task::spawn_blocking(move || storage.store_tickets(&printed)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to store kitchen tickets"),
            Err(e) => warn!(error = %e, "Kitchen ticket storage task failed"),
        }
    }
}
