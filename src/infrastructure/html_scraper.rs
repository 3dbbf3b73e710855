//! Generic HTML scraper used for shops without a registered scraper
//!
//! Candidates are the anchors of a listing page. Availability is read from
//! schema.org markup when present, otherwise from sold-out, pre-order and
//! add-to-cart wording in the page text.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::domain::candidate::Candidate;
use crate::infrastructure::http_fetcher::FetchedPage;
use crate::infrastructure::site_scraper::{AvailabilityReport, SiteScraper};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

static ANCHORS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IMAGES: Lazy<Selector> = Lazy::new(|| selector("img[alt]"));
static SCHEMA_AVAILABILITY: Lazy<Selector> =
    Lazy::new(|| selector(r#"[itemprop="availability"], meta[property="product:availability"], meta[property="og:availability"]"#));
static PRICE_ATTRIBUTES: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[itemprop="price"], [itemprop="price"][content], meta[property="product:price:amount"], meta[property="og:price:amount"]"#)
});
static PRICE_ELEMENTS: Lazy<Selector> =
    Lazy::new(|| selector(r#"[itemprop="price"], .price, .product-price, .product__price, .price-item, span.money"#));
static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static SCRIPTS_AND_STYLES: Lazy<Selector> = Lazy::new(|| selector("script, style, noscript"));

static PRICE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:€\s?\d{1,5}(?:[.,]\d{3})*(?:[.,]\d{2})?|\d{1,5}(?:[.,]\d{3})*[.,]\d{2}\s?(?:€|eur\b))")
        .unwrap_or_else(|e| panic!("invalid price pattern: {e}"))
});

const SOLD_OUT_PATTERNS: &[&str] = &[
    "ausverkauft",
    "nicht verfügbar",
    "nicht lieferbar",
    "nicht auf lager",
    "derzeit nicht erhältlich",
    "vergriffen",
    "sold out",
    "out of stock",
    "currently unavailable",
];

const PRE_ORDER_PATTERNS: &[&str] = &["vorbestellen", "vorbestellung", "pre-order", "preorder", "vorverkauf"];

const IN_STOCK_PATTERNS: &[&str] = &[
    "in den warenkorb",
    "add to cart",
    "jetzt kaufen",
    "buy now",
    "sofort lieferbar",
    "auf lager",
    "in stock",
    "lieferbar",
];

/// Link-based candidates, text-based availability
#[derive(Debug, Clone, Default)]
pub struct GenericSiteScraper;

impl GenericSiteScraper {
    pub fn new() -> Self {
        Self
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse(&element.text().collect::<Vec<_>>().join(" "))
}

fn anchor_text(anchor: &ElementRef<'_>) -> Option<String> {
    let text = element_text(anchor);
    if !text.is_empty() {
        return Some(text);
    }
    if let Some(title) = anchor.value().attr("title").map(collapse).filter(|t| !t.is_empty()) {
        return Some(title);
    }
    anchor
        .select(&IMAGES)
        .filter_map(|img| img.value().attr("alt"))
        .map(collapse)
        .find(|alt| !alt.is_empty())
}

/// Visible page text, lowercased, without script and style contents
fn visible_text(document: &Html) -> String {
    let hidden: HashSet<_> = document
        .select(&SCRIPTS_AND_STYLES)
        .flat_map(|element| element.descendants().map(|node| node.id()))
        .collect();
    let text = document
        .root_element()
        .descendants()
        .filter(|node| !hidden.contains(&node.id()))
        .filter_map(|node| node.value().as_text().map(|t| (**t).to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    collapse(&text).to_lowercase()
}

fn schema_availability(document: &Html) -> Option<AvailabilityReport> {
    for element in document.select(&SCHEMA_AVAILABILITY) {
        let value = element
            .value()
            .attr("href")
            .or_else(|| element.value().attr("content"))
            .map(str::to_string)
            .unwrap_or_else(|| element_text(&element))
            .to_lowercase();

        let (is_available, status_text) = if value.contains("outofstock") || value.contains("soldout") || value.contains("discontinued") {
            (false, "❌ Sold out (schema.org availability)")
        } else if value.contains("preorder") || value.contains("presale") {
            (true, "🔜 Pre-order (schema.org availability)")
        } else if value.contains("instock") || value.contains("limitedavailability") || value == "in stock" {
            (true, "✅ Available (schema.org availability)")
        } else {
            continue;
        };
        return Some(AvailabilityReport {
            is_available,
            price: None,
            status_text: status_text.to_string(),
        });
    }
    None
}

fn text_availability(text: &str) -> AvailabilityReport {
    let report = |is_available: bool, label: &str, pattern: &str| AvailabilityReport {
        is_available,
        price: None,
        status_text: format!("{label} (pattern: '{pattern}')"),
    };

    if let Some(pattern) = SOLD_OUT_PATTERNS.iter().find(|p| text.contains(*p)) {
        return report(false, "❌ Sold out", pattern);
    }
    if let Some(pattern) = PRE_ORDER_PATTERNS.iter().find(|p| text.contains(*p)) {
        return report(true, "🔜 Pre-order", pattern);
    }
    if let Some(pattern) = IN_STOCK_PATTERNS.iter().find(|p| text.contains(*p)) {
        return report(true, "✅ Available", pattern);
    }
    AvailabilityReport {
        is_available: false,
        price: None,
        status_text: "❓ No availability signal".to_string(),
    }
}

fn extract_price(document: &Html, text: &str) -> Option<String> {
    let from_attribute = document
        .select(&PRICE_ATTRIBUTES)
        .filter_map(|element| element.value().attr("content"))
        .map(str::trim)
        .find(|value| value.chars().any(|c| c.is_ascii_digit()))
        .map(|value| format!("{value} €"));
    if from_attribute.is_some() {
        return from_attribute;
    }

    let from_element = document
        .select(&PRICE_ELEMENTS)
        .map(|element| element_text(&element))
        .find_map(|value| PRICE_TEXT.find(&value).map(|m| m.as_str().trim().to_string()));
    if from_element.is_some() {
        return from_element;
    }

    PRICE_TEXT.find(text).map(|m| m.as_str().trim().to_string())
}

impl SiteScraper for GenericSiteScraper {
    fn find_candidates(&self, page: &FetchedPage, site_id: &str) -> Vec<Candidate> {
        let document = Html::parse_document(&page.body);
        let base = Url::parse(&page.url).ok();
        let mut seen_urls = HashSet::new();
        let mut candidates = Vec::new();

        for anchor in document.select(&ANCHORS) {
            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let url = match &base {
                Some(base) => match base.join(href) {
                    Ok(url) => url.to_string(),
                    Err(_) => continue,
                },
                None => href.to_string(),
            };
            let Some(text) = anchor_text(&anchor) else {
                continue;
            };
            if seen_urls.insert(url.clone()) {
                candidates.push(Candidate::new(text, url, site_id));
            }
        }

        debug!("🔗 {} candidate links on {}", candidates.len(), page.url);
        candidates
    }

    fn extract_availability(&self, page: &FetchedPage) -> AvailabilityReport {
        let document = Html::parse_document(&page.body);
        let text = visible_text(&document);
        let mut report = schema_availability(&document).unwrap_or_else(|| text_availability(&text));
        report.price = extract_price(&document, &text);
        report
    }

    fn extract_title(&self, page: &FetchedPage) -> Option<String> {
        let document = Html::parse_document(&page.body);
        document
            .select(&HEADING)
            .map(|h1| element_text(&h1))
            .find(|t| !t.is_empty())
            .or_else(|| {
                document
                    .select(&OG_TITLE)
                    .filter_map(|meta| meta.value().attr("content"))
                    .map(collapse)
                    .find(|t| !t.is_empty())
            })
            .or_else(|| {
                document
                    .select(&TITLE)
                    .map(|title| element_text(&title))
                    .find(|t| !t.is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://tcgviert.com/collections/pokemon".into(),
            status: 200,
            body: body.into(),
        }
    }

    #[test]
    fn finds_absolute_deduplicated_candidates() {
        let html = r##"
            <html><body>
              <a href="/products/jt-display">Pokémon TCG: Journey Together (SV09) – 36er Display (EN)</a>
              <a href="/products/jt-display">Duplicate link</a>
              <a href="https://tcgviert.com/products/jt-blister" title="Journey Together Blister"></a>
              <a href="/products/etb"><img src="x.png" alt="Journey Together ETB"></a>
              <a href="#top">Top</a>
              <a href="/empty"></a>
            </body></html>"##;
        let candidates = GenericSiteScraper::new().find_candidates(&page(html), "tcgviert");

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].url, "https://tcgviert.com/products/jt-display");
        assert_eq!(candidates[0].text, "Pokémon TCG: Journey Together (SV09) – 36er Display (EN)");
        assert_eq!(candidates[1].text, "Journey Together Blister");
        assert_eq!(candidates[2].text, "Journey Together ETB");
        assert!(candidates.iter().all(|c| c.site_id == "tcgviert"));
    }

    #[test]
    fn sold_out_wording_wins_over_cart_wording() {
        let html = "<html><body><h1>Display</h1><p>Leider ausverkauft</p><button>In den Warenkorb</button></body></html>";
        let report = GenericSiteScraper::new().extract_availability(&page(html));
        assert!(!report.is_available);
        assert_eq!(report.status_text, "❌ Sold out (pattern: 'ausverkauft')");
    }

    #[test]
    fn cart_button_means_available() {
        let html = r#"<html><body><span class="price">159,90 €</span><button>In den Warenkorb</button></body></html>"#;
        let report = GenericSiteScraper::new().extract_availability(&page(html));
        assert!(report.is_available);
        assert_eq!(report.price.as_deref(), Some("159,90 €"));
    }

    #[test]
    fn pre_order_counts_as_available() {
        let html = "<html><body><button>Jetzt vorbestellen</button></body></html>";
        let report = GenericSiteScraper::new().extract_availability(&page(html));
        assert!(report.is_available);
        assert!(report.status_text.starts_with("🔜 Pre-order"));
    }

    #[test]
    fn schema_markup_takes_precedence() {
        let html = r#"<html><body>
            <link itemprop="availability" href="https://schema.org/OutOfStock">
            <meta itemprop="price" content="149.99">
            <button>Add to cart</button>
        </body></html>"#;
        let report = GenericSiteScraper::new().extract_availability(&page(html));
        assert!(!report.is_available);
        assert_eq!(report.price.as_deref(), Some("149.99 €"));
    }

    #[test]
    fn script_text_is_ignored() {
        let html = r#"<html><body><script>var label = "ausverkauft";</script><p>Auf Lager</p></body></html>"#;
        let report = GenericSiteScraper::new().extract_availability(&page(html));
        assert!(report.is_available);
    }

    #[test]
    fn no_signal_is_unavailable() {
        let report = GenericSiteScraper::new().extract_availability(&page("<html><body>Hello</body></html>"));
        assert!(!report.is_available);
        assert_eq!(report.price, None);
    }

    #[test]
    fn title_prefers_heading() {
        let scraper = GenericSiteScraper::new();
        let html = r#"<html><head><title>Shop | JT</title><meta property="og:title" content="OG JT"></head><body><h1> Journey  Together Display </h1></body></html>"#;
        assert_eq!(scraper.extract_title(&page(html)).as_deref(), Some("Journey Together Display"));

        let html = r#"<html><head><title>Shop | JT</title><meta property="og:title" content="OG JT"></head><body></body></html>"#;
        assert_eq!(scraper.extract_title(&page(html)).as_deref(), Some("OG JT"));

        let html = "<html><head><title>Shop | JT</title></head><body></body></html>";
        assert_eq!(scraper.extract_title(&page(html)).as_deref(), Some("Shop | JT"));
    }
}
