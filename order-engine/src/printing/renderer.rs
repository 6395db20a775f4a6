//! Kitchen ticket renderer
//!
//! Renders a [`KitchenTicket`] as fixed-width plain text. Items are grouped
//! by category in first-seen order; uncategorized items come last.

use super::types::{KitchenTicket, TicketItem};
use crate::orders::money::round_money;

/// Kitchen ticket renderer
///
/// Common widths:
/// - 58mm paper: 32 characters
/// - 80mm paper: 48 characters
#[derive(Debug, Clone)]
pub struct KitchenTicketRenderer {
    width: usize,
}

impl KitchenTicketRenderer {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(24),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Render to bytes ready for a raw TCP printer
    pub fn render_bytes(&self, ticket: &KitchenTicket) -> Vec<u8> {
        self.render(ticket).into_bytes()
    }

    pub fn render(&self, ticket: &KitchenTicket) -> String {
        let mut b = TextBuilder::new(self.width);

        self.render_header(&mut b, ticket);
        for (category, items) in group_by_category(&ticket.items) {
            self.render_category(&mut b, category, &items);
        }
        self.render_footer(&mut b, ticket);

        b.build()
    }

    fn render_header(&self, b: &mut TextBuilder, ticket: &KitchenTicket) {
        b.sep_double();
        b.center(&format!("ORDER {}", ticket.order_number));
        let table = ticket.table.as_deref().unwrap_or("Takeaway");
        match ticket.server.as_deref() {
            Some(server) => b.split(&format!("Table: {table}"), &format!("Server: {server}")),
            None => b.line(&format!("Table: {table}")),
        }
        b.line(&format_timestamp(ticket.created_at));
        b.sep_single();
    }

    fn render_category(&self, b: &mut TextBuilder, category: Option<&str>, items: &[&TicketItem]) {
        if let Some(name) = category {
            b.line(&format!("[{name}]"));
        }
        for item in items {
            b.split(
                &format!("{} x {}", item.quantity, item.name),
                &format!("{:.2}", round_money(item.unit_price)),
            );
            if let Some(ref instructions) = item.special_instructions {
                b.line(&format!("   * {instructions}"));
            }
            if let Some(ref note) = item.notes {
                b.line(&format!("   > {note}"));
            }
        }
        b.sep_single();
    }

    fn render_footer(&self, b: &mut TextBuilder, ticket: &KitchenTicket) {
        if !ticket.kitchen_notes.is_empty() {
            b.line("NOTES:");
            for note in &ticket.kitchen_notes {
                b.line(&format!(" - {note}"));
            }
        }
        if ticket.print_count > 0 {
            b.center(&format!("*** REPRINT #{} ***", ticket.print_count));
        }
        b.sep_double();
        b.newline();
        b.newline();
    }
}

impl Default for KitchenTicketRenderer {
    fn default() -> Self {
        Self::new(48)
    }
}

fn group_by_category(items: &[TicketItem]) -> Vec<(Option<&str>, Vec<&TicketItem>)> {
    let mut groups: Vec<(Option<&str>, Vec<&TicketItem>)> = Vec::new();
    for item in items {
        let key = item.category_name.as_deref();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    // Stable: categorized groups keep their order, uncategorized last
    groups.sort_by_key(|(k, _)| k.is_none());
    groups
}

/// Format unix timestamp (millis) in local time (YYYY-MM-DD HH:MM:SS)
fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown time".to_string(),
    }
}

/// Minimal fixed-width line builder
struct TextBuilder {
    width: usize,
    out: String,
}

impl TextBuilder {
    fn new(width: usize) -> Self {
        Self {
            width,
            out: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    fn center(&mut self, text: &str) {
        let len = text.chars().count();
        let pad = self.width.saturating_sub(len) / 2;
        self.out.push_str(&" ".repeat(pad));
        self.line(text);
    }

    /// Left text and right-aligned text on one line, wrapping if too long
    fn split(&mut self, left: &str, right: &str) {
        let used = left.chars().count() + right.chars().count();
        if used < self.width {
            let gap = self.width - used;
            self.line(&format!("{left}{}{right}", " ".repeat(gap)));
        } else {
            self.line(left);
            let pad = self.width.saturating_sub(right.chars().count());
            self.line(&format!("{}{right}", " ".repeat(pad)));
        }
    }

    fn sep_single(&mut self) {
        self.line(&"-".repeat(self.width));
    }

    fn sep_double(&mut self) {
        self.line(&"=".repeat(self.width));
    }

    fn build(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn ticket_item(name: &str, category: Option<&str>, qty: i32, price: &str) -> TicketItem {
        TicketItem {
            item_id: format!("line-{name}"),
            menu_item_id: name.to_string(),
            name: name.to_string(),
            category_name: category.map(str::to_string),
            quantity: qty,
            unit_price: Decimal::from_str(price).unwrap(),
            special_instructions: None,
            notes: None,
        }
    }

    fn create_test_ticket() -> KitchenTicket {
        let mut steak = ticket_item("Steak", Some("Grill"), 2, "10.00");
        steak.special_instructions = Some("medium rare".to_string());
        steak.notes = Some("no salt".to_string());

        KitchenTicket {
            id: "t1".to_string(),
            order_id: "o1".to_string(),
            order_number: "20240122-0007".to_string(),
            destination_id: "grill".to_string(),
            table: Some("T12".to_string()),
            server: Some("Alice".to_string()),
            created_at: 1705933935000,
            items: vec![
                ticket_item("Water", None, 1, "1.5"),
                steak,
                ticket_item("Fries", Some("Sides"), 1, "3.25"),
                ticket_item("Ribs", Some("Grill"), 1, "14"),
            ],
            kitchen_notes: vec!["nut allergy".to_string()],
            print_count: 0,
        }
    }

    #[test]
    fn test_render_contains_metadata_and_items() {
        let text = KitchenTicketRenderer::new(48).render(&create_test_ticket());

        assert!(text.contains("ORDER 20240122-0007"));
        assert!(text.contains("Table: T12"));
        assert!(text.contains("Server: Alice"));
        assert!(text.contains("2 x Steak"));
        assert!(text.contains("10.00"));
        assert!(text.contains("   * medium rare"));
        assert!(text.contains("   > no salt"));
        assert!(text.contains(" - nut allergy"));
        assert!(!text.contains("REPRINT"));
    }

    #[test]
    fn test_lines_fit_width() {
        let text = KitchenTicketRenderer::new(32).render(&create_test_ticket());
        assert!(text.lines().all(|l| l.chars().count() <= 32));
    }

    #[test]
    fn test_group_by_category_order() {
        let ticket = create_test_ticket();
        let groups: Vec<_> = group_by_category(&ticket.items)
            .into_iter()
            .map(|(name, items)| (name, items.len()))
            .collect();

        assert_eq!(
            groups,
            vec![(Some("Grill"), 2), (Some("Sides"), 1), (None, 1)]
        );
    }

    #[test]
    fn test_reprint_marker() {
        let mut ticket = create_test_ticket();
        ticket.print_count = 2;
        let text = KitchenTicketRenderer::default().render(&ticket);
        assert!(text.contains("*** REPRINT #2 ***"));
    }
}
