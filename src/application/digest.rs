//! Notification digests
//!
//! Events are grouped by availability (available first), then ordered by
//! site and title, and split into messages bounded both by entry count
//! and by the channel's message length.

use std::cmp::Ordering;

use crate::domain::availability::status_text;
use crate::domain::candidate::ProductData;

/// One product whose state change is worth telling
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub product: ProductData,
    pub is_back_in_stock: bool,
}

impl NotificationEvent {
    pub fn new(product: ProductData, is_back_in_stock: bool) -> Self {
        Self {
            product,
            is_back_in_stock,
        }
    }

    fn render(&self) -> String {
        let product = &self.product;
        let mut lines = vec![
            format!(
                "{} | {}",
                status_text(product.is_available, self.is_back_in_stock),
                product.site_id
            ),
            product.title.clone(),
        ];
        if let Some(price) = &product.price {
            lines.push(format!("💶 {price}"));
        }
        if !product.status_text.is_empty() {
            lines.push(format!("ℹ️ {}", product.status_text));
        }
        lines.push(format!("🔎 {}", product.query));
        lines.push(format!("🔗 {}", product.url));
        lines.join("\n")
    }
}

fn digest_order(a: &NotificationEvent, b: &NotificationEvent) -> Ordering {
    b.product
        .is_available
        .cmp(&a.product.is_available)
        .then_with(|| a.product.site_id.cmp(&b.product.site_id))
        .then_with(|| a.product.title.cmp(&b.product.title))
}

/// Available first, then by site, then by title
pub fn order_events(events: &mut [NotificationEvent]) {
    events.sort_by(digest_order);
}

/// Message length as the chat channel counts it
pub fn message_units(message: &str) -> usize {
    message.encode_utf16().count()
}

/// Split ordered events into digests of at most `batch_size` entries whose
/// rendered text stays within `max_units`.
///
/// An event that exceeds `max_units` on its own still gets a digest of its own.
pub fn into_batches(
    mut events: Vec<NotificationEvent>,
    batch_size: usize,
    max_units: usize,
) -> Vec<Vec<NotificationEvent>> {
    order_events(&mut events);
    let size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<NotificationEvent> = Vec::new();
    for event in events {
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
        current.push(event);
        if current.len() > 1 && message_units(&format_digest(&current)) > max_units {
            if let Some(overflow) = current.pop() {
                batches.push(std::mem::replace(&mut current, vec![overflow]));
            }
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Render one digest message
pub fn format_digest(events: &[NotificationEvent]) -> String {
    let mut sections = vec![format!("🔔 TCG Stock Watch: {} update(s)", events.len())];

    let (available, unavailable): (Vec<_>, Vec<_>) =
        events.iter().partition(|event| event.product.is_available);
    if !available.is_empty() {
        sections.push("━━ ✅ Available ━━".to_string());
        sections.extend(available.iter().map(|event| event.render()));
    }
    if !unavailable.is_empty() {
        sections.push("━━ ❌ Sold out ━━".to_string());
        sections.extend(unavailable.iter().map(|event| event.render()));
    }
    sections.join("\n\n")
}

/// Message sent to the operator after repeated whole-cycle failures
pub fn format_operator_alert(consecutive_failures: u32, last_error: &str) -> String {
    format!(
        "⚠️ TCG Stock Watch: {consecutive_failures} consecutive scan cycles failed.\nLast error: {last_error}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::scan::{DEFAULT_DIGEST_BATCH_SIZE, MAX_MESSAGE_UTF16_UNITS};
    use crate::domain::identity::ProductIdentity;
    use crate::domain::product_type::ProductType;

    fn event(site: &str, title: &str, available: bool, back: bool) -> NotificationEvent {
        NotificationEvent::new(
            ProductData {
                identity: ProductIdentity::from_raw(format!("{site}_{title}")),
                site_id: site.into(),
                title: title.into(),
                url: format!("https://{site}.example/{title}"),
                query: "Journey Together display".into(),
                product_type: ProductType::Display,
                is_available: available,
                price: available.then(|| "159,90 €".to_string()),
                status_text: String::new(),
                from_cache: false,
            },
            back,
        )
    }

    #[test]
    fn orders_available_then_site_then_title() {
        let mut events = vec![
            event("b", "Z", false, false),
            event("b", "A", true, false),
            event("a", "Y", true, true),
            event("a", "B", false, false),
        ];
        order_events(&mut events);
        let order: Vec<_> = events
            .iter()
            .map(|e| format!("{}{}", e.product.site_id, e.product.title))
            .collect();
        assert_eq!(order, vec!["aY", "bA", "aB", "bZ"]);
    }

    #[test]
    fn splits_into_bounded_batches() {
        let events: Vec<_> = (0..5).map(|i| event("s", &format!("t{i}"), true, false)).collect();
        let batches = into_batches(events, 2, MAX_MESSAGE_UTF16_UNITS);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert!(into_batches(Vec::new(), 20, MAX_MESSAGE_UTF16_UNITS).is_empty());
    }

    fn shop_event(i: usize) -> NotificationEvent {
        let mut event = event(
            "gamesisland",
            &format!("Pokémon TCG: Karmesin & Purpur Reisegefährten (SV09) 36er Booster Display (EN) #{i:02}"),
            i % 3 != 0,
            i % 2 == 0,
        );
        event.product.url = format!(
            "https://www.games-island.eu/Pokemon-Karmesin-Purpur-Reisegefaehrten-36er-Booster-Display-EN-{i:02}"
        );
        event.product.status_text = "✅ Available (button: 'In den Warenkorb')".into();
        event
    }

    #[test]
    fn full_batches_are_split_to_fit_the_channel_limit() {
        let events: Vec<_> = (0..DEFAULT_DIGEST_BATCH_SIZE).map(shop_event).collect();
        let all_in_one = format_digest(&events);
        assert!(message_units(&all_in_one) > MAX_MESSAGE_UTF16_UNITS);

        let batches = into_batches(events, DEFAULT_DIGEST_BATCH_SIZE, MAX_MESSAGE_UTF16_UNITS);
        assert!(batches.len() > 1);
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), DEFAULT_DIGEST_BATCH_SIZE);
        for batch in &batches {
            assert!(message_units(&format_digest(batch)) <= MAX_MESSAGE_UTF16_UNITS);
        }
        let delivered: String = batches.iter().map(|batch| format_digest(batch)).collect();
        for i in 0..DEFAULT_DIGEST_BATCH_SIZE {
            assert!(delivered.contains(&format!("Booster-Display-EN-{i:02}")));
        }
    }

    #[test]
    fn oversized_event_gets_its_own_digest() {
        let events: Vec<_> = (0..3).map(shop_event).collect();
        let batches = into_batches(events, 20, 10);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 1, 1]);
    }

    #[test]
    fn counts_utf16_units() {
        assert_eq!(message_units("abc"), 3);
        assert_eq!(message_units("🎉"), 2);
        assert_eq!(message_units("ä"), 1);
    }

    #[test]
    fn digest_groups_by_availability() {
        let events = vec![event("shop", "JT Display", true, true), event("shop", "DR Display", false, false)];
        let text = format_digest(&events);
        assert!(text.starts_with("🔔 TCG Stock Watch: 2 update(s)"));
        let available = text.find("✅ Available ━━").unwrap();
        let sold_out = text.find("❌ Sold out ━━").unwrap();
        assert!(available < sold_out);
        assert!(text.contains("🎉 Back in stock! | shop"));
        assert!(text.contains("💶 159,90 €"));
    }

    #[test]
    fn operator_alert_mentions_count() {
        assert!(format_operator_alert(3, "boom").contains("3 consecutive"));
    }
}
