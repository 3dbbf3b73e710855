//! Candidate blacklist
//!
//! Text terms are compared as whole words against the normalized candidate
//! title, URL terms as substrings of the lowercased URL.

use std::collections::HashMap;

use crate::domain::candidate::Candidate;
use crate::domain::normalizer::normalize;

const DEFAULT_TEXT_TERMS: &[&str] = &[
    "yugioh",
    "yu gi oh",
    "magic the gathering",
    "mtg",
    "lorcana",
    "flesh and blood",
    "digimon",
    "dragon ball",
    "star wars unlimited",
    "sleeves",
    "playmat",
    "binder",
    "deckbox",
    "sammelalbum",
    "plusch",
    "figur",
];

const DEFAULT_URL_TERMS: &[&str] = &[
    "javascript:",
    "mailto:",
    "tel:",
    "/login",
    "/account",
    "/cart",
    "/checkout",
    "/warenkorb",
    "/kasse",
    "/wishlist",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    text_terms: Vec<String>,
    url_terms: Vec<String>,
    site_terms: HashMap<String, Vec<String>>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            text_terms: DEFAULT_TEXT_TERMS.iter().map(|t| (*t).to_string()).collect(),
            url_terms: DEFAULT_URL_TERMS.iter().map(|t| (*t).to_string()).collect(),
            site_terms: HashMap::new(),
        }
    }
}

impl CandidateFilter {
    /// Built-in lists extended with configured global and per-site terms
    pub fn with_terms(global: &[String], per_site: &HashMap<String, Vec<String>>) -> Self {
        let mut filter = Self::default();
        filter
            .text_terms
            .extend(global.iter().map(|t| normalize(t)).filter(|t| !t.is_empty()));
        filter.site_terms = per_site
            .iter()
            .map(|(site, terms)| {
                let terms = terms.iter().map(|t| normalize(t)).filter(|t| !t.is_empty()).collect();
                (site.to_lowercase(), terms)
            })
            .collect();
        filter
    }

    /// The matching blacklist term, if the candidate is blocked
    pub fn blocked_by(&self, candidate: &Candidate) -> Option<&str> {
        let url = candidate.url.trim().to_lowercase();
        if let Some(term) = self.url_terms.iter().find(|term| url.contains(term.as_str())) {
            return Some(term.as_str());
        }

        let padded = format!(" {} ", normalize(&candidate.text));
        let contains_phrase = |term: &&String| padded.contains(&format!(" {term} "));
        if let Some(term) = self.text_terms.iter().find(contains_phrase) {
            return Some(term.as_str());
        }
        self.site_terms
            .get(&candidate.site_id.to_lowercase())
            .and_then(|terms| terms.iter().find(contains_phrase))
            .map(String::as_str)
    }

    pub fn is_blocked(&self, candidate: &Candidate) -> bool {
        self.blocked_by(candidate).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, url: &str) -> Candidate {
        Candidate::new(text, url, "tcgviert")
    }

    #[test]
    fn blocks_other_games_and_shop_pages() {
        let filter = CandidateFilter::default();
        assert!(filter.is_blocked(&candidate("Yu-Gi-Oh! 25th Anniversary Display", "https://x/p/1")));
        assert!(filter.is_blocked(&candidate("Disney Lorcana Booster Display", "https://x/p/2")));
        assert!(filter.is_blocked(&candidate("Warenkorb", "https://x/warenkorb")));
        assert!(filter.is_blocked(&candidate("Mail us", "mailto:shop@example.com")));
    }

    #[test]
    fn keeps_pokemon_products() {
        let filter = CandidateFilter::default();
        assert!(!filter.is_blocked(&candidate(
            "Pokémon TCG: Journey Together (SV09) – 36er Display (EN)",
            "https://tcgviert.com/products/journey-together-display"
        )));
        assert!(!filter.is_blocked(&candidate("Sleeved Booster Reisegefährten", "https://x/p/3")));
    }

    #[test]
    fn applies_configured_terms_per_site() {
        let per_site = HashMap::from([("TCGViert".to_string(), vec!["Vorbestellung".to_string()])]);
        let filter = CandidateFilter::with_terms(&["Pokemon Center".to_string()], &per_site);

        assert_eq!(
            filter.blocked_by(&candidate("Vorbestellung: Destined Rivals Display", "https://x/p/4")),
            Some("vorbestellung")
        );
        assert!(filter.is_blocked(&candidate("Pokémon Center ETB", "https://x/p/5")));

        let other_site = Candidate::new("Vorbestellung: Destined Rivals Display", "https://y/p/4", "othershop");
        assert!(!filter.is_blocked(&other_site));
    }
}
