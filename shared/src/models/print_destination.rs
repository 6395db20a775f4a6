//! Print Destination Model

use serde::{Deserialize, Serialize};

/// Physical network printer under a print destination (raw TCP, usually 9100)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkPrinter {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lower value is tried first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_port() -> u16 {
    9100
}

fn default_true() -> bool {
    true
}

/// Print destination (logical kitchen station, e.g. "Grill", "Bar")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrintDestination {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub printers: Vec<NetworkPrinter>,
}

impl PrintDestination {
    /// Active printers ordered by priority (failover order)
    pub fn active_printers(&self) -> Vec<&NetworkPrinter> {
        let mut printers: Vec<_> = self.printers.iter().filter(|p| p.is_active).collect();
        printers.sort_by_key(|p| p.priority);
        printers
    }
}
