//! Print dispatch boundary
//!
//! [`PrintDispatcher`] is the contract the dispatch engine emits tickets
//! through. [`NetworkPrintDispatcher`] renders the ticket and writes it to
//! the destination's network printers over raw TCP, failing over by
//! priority.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::models::{NetworkPrinter, PrintDestination};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

use super::renderer::KitchenTicketRenderer;
use super::types::KitchenTicket;

#[derive(Debug, Error)]
pub enum PrintDispatchError {
    #[error("Unknown print destination: {0}")]
    UnknownDestination(String),

    #[error("Print destination inactive: {0}")]
    DestinationInactive(String),

    #[error("No active printers for destination: {0}")]
    NoPrinters(String),

    #[error("Printer {printer} timed out after {timeout_ms}ms")]
    Timeout { printer: String, timeout_ms: u64 },

    #[error("Printer {printer} failed: {source}")]
    Io {
        printer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Print failed: {0}")]
    Failed(String),
}

pub type PrintDispatchResult<T> = Result<T, PrintDispatchError>;

/// Emits one ticket to one destination
///
/// Owns its own timeout and failover policy; the engine only sees the
/// final success or failure.
#[async_trait]
pub trait PrintDispatcher: Send + Sync {
    async fn emit(&self, destination_id: &str, ticket: &KitchenTicket) -> PrintDispatchResult<()>;
}

/// Raw TCP (port 9100 style) dispatcher
pub struct NetworkPrintDispatcher {
    destinations: RwLock<HashMap<String, PrintDestination>>,
    renderer: KitchenTicketRenderer,
    timeout: Duration,
}

impl NetworkPrintDispatcher {
    pub fn new(
        destinations: Vec<PrintDestination>,
        renderer: KitchenTicketRenderer,
        timeout: Duration,
    ) -> Self {
        let dispatcher = Self {
            destinations: RwLock::new(HashMap::new()),
            renderer,
            timeout,
        };
        dispatcher.replace_destinations(destinations);
        dispatcher
    }

    pub fn replace_destinations(&self, destinations: Vec<PrintDestination>) {
        let mut map = self.destinations.write();
        *map = destinations.into_iter().map(|d| (d.id.clone(), d)).collect();
    }

    pub fn upsert_destination(&self, destination: PrintDestination) {
        self.destinations
            .write()
            .insert(destination.id.clone(), destination);
    }

    pub fn destination(&self, destination_id: &str) -> Option<PrintDestination> {
        self.destinations.read().get(destination_id).cloned()
    }

    async fn send_to_printer(&self, printer: &NetworkPrinter, data: &[u8]) -> PrintDispatchResult<()> {
        let addr = format!("{}:{}", printer.host, printer.port);
        let write = async {
            let mut stream = TcpStream::connect(&addr).await?;
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        };

        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(PrintDispatchError::Io {
                printer: addr,
                source,
            }),
            Err(_) => Err(PrintDispatchError::Timeout {
                printer: addr,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl PrintDispatcher for NetworkPrintDispatcher {
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    async fn emit(&self, destination_id: &str, ticket: &KitchenTicket) -> PrintDispatchResult<()> {
        // Clone out so the lock is not held across I/O
        let dest = self
            .destination(destination_id)
            .ok_or_else(|| PrintDispatchError::UnknownDestination(destination_id.to_string()))?;
        if !dest.is_active {
            return Err(PrintDispatchError::DestinationInactive(dest.name.clone()));
        }

        let printers = dest.active_printers();
        if printers.is_empty() {
            return Err(PrintDispatchError::NoPrinters(dest.name.clone()));
        }

        let data = self.renderer.render_bytes(ticket);

        // Try each printer until one succeeds
        let mut last_error = None;
        for printer in printers {
            match self.send_to_printer(printer, &data).await {
                Ok(()) => {
                    info!(dest = %dest.name, host = %printer.host, bytes = data.len(), "Print job sent");
                    return Ok(());
                }
                Err(e) => {
                    warn!(dest = %dest.name, host = %printer.host, error = %e, "Printer failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PrintDispatchError::NoPrinters(dest.name.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn ticket() -> KitchenTicket {
        KitchenTicket {
            id: "t1".to_string(),
            order_id: "o1".to_string(),
            order_number: "20240101-0001".to_string(),
            destination_id: "grill".to_string(),
            table: Some("T1".to_string()),
            server: None,
            created_at: 1_704_103_200_000,
            items: vec![],
            kitchen_notes: vec![],
            print_count: 0,
        }
    }

    fn destination(printers: Vec<NetworkPrinter>) -> PrintDestination {
        PrintDestination {
            id: "grill".to_string(),
            name: "Grill".to_string(),
            is_active: true,
            printers,
        }
    }

    fn printer(port: u16, priority: i32) -> NetworkPrinter {
        NetworkPrinter {
            host: "127.0.0.1".to_string(),
            port,
            priority,
            is_active: true,
        }
    }

    /// Port with nothing listening
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_emit_writes_rendered_ticket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            String::from_utf8(buf).unwrap()
        });

        let dispatcher = NetworkPrintDispatcher::new(
            vec![destination(vec![printer(port, 0)])],
            KitchenTicketRenderer::default(),
            Duration::from_secs(2),
        );
        dispatcher.emit("grill", &ticket()).await.unwrap();

        let received = server.await.unwrap();
        assert!(received.contains("ORDER 20240101-0001"));
    }

    #[tokio::test]
    async fn test_failover_to_next_printer() {
        let dead = closed_port().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf.len()
        });

        let dispatcher = NetworkPrintDispatcher::new(
            vec![destination(vec![printer(dead, 0), printer(live, 1)])],
            KitchenTicketRenderer::default(),
            Duration::from_secs(2),
        );
        dispatcher.emit("grill", &ticket()).await.unwrap();
        assert!(server.await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_destinations() {
        let mut inactive = destination(vec![printer(9100, 0)]);
        inactive.id = "bar".to_string();
        inactive.is_active = false;

        let dispatcher = NetworkPrintDispatcher::new(
            vec![destination(vec![]), inactive],
            KitchenTicketRenderer::default(),
            Duration::from_millis(200),
        );

        assert!(matches!(
            dispatcher.emit("nowhere", &ticket()).await,
            Err(PrintDispatchError::UnknownDestination(_))
        ));
        assert!(matches!(
            dispatcher.emit("grill", &ticket()).await,
            Err(PrintDispatchError::NoPrinters(_))
        ));
        assert!(matches!(
            dispatcher.emit("bar", &ticket()).await,
            Err(PrintDispatchError::DestinationInactive(_))
        ));
    }

    #[tokio::test]
    async fn test_all_printers_down_reports_last_error() {
        let dead = closed_port().await;
        let dispatcher = NetworkPrintDispatcher::new(
            vec![destination(vec![printer(dead, 0)])],
            KitchenTicketRenderer::default(),
            Duration::from_secs(2),
        );
        assert!(matches!(
            dispatcher.emit("grill", &ticket()).await,
            Err(PrintDispatchError::Io { .. })
        ));
    }
}
