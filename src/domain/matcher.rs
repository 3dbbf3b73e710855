//! Token-coverage matching of candidate texts against product queries
//!
//! Coverage is the share of required tokens found in the normalized
//! candidate. [`matches`] accepts substrings, [`strict_matches`] only whole
//! words. A query without tokens never matches.
//!
//! Queries for a display additionally require the candidate itself to be
//! classified as a display; single packs and blisters of the same set are
//! rejected even with full token coverage.

use crate::domain::constants::matching::{DEFAULT_MATCH_THRESHOLD, DEFAULT_STRICT_THRESHOLD};
use crate::domain::keywords::{ProductQuery, TokenSet};
use crate::domain::normalizer::normalize;
use crate::domain::product_type::{ProductType, classify_normalized};

/// Share of `required` tokens contained in `normalized_text`, `None` for an empty set
fn coverage_with<F>(required: &TokenSet, normalized_text: &str, contains: F) -> Option<f64>
where
    F: Fn(&str, &str) -> bool,
{
    if required.is_empty() {
        return None;
    }
    let found = required
        .iter()
        .filter(|token| contains(normalized_text, token))
        .count();
    Some(found as f64 / required.len() as f64)
}

fn contains_substring(text: &str, token: &str) -> bool {
    text.contains(token)
}

fn contains_word(text: &str, token: &str) -> bool {
    format!(" {text} ").contains(&format!(" {token} "))
}

/// Substring coverage of `required` in `candidate_text`
pub fn coverage(required: &TokenSet, candidate_text: &str) -> Option<f64> {
    coverage_with(required, &normalize(candidate_text), contains_substring)
}

/// True iff at least `threshold` of the required tokens occur in the candidate.
pub fn matches(required: &TokenSet, candidate_text: &str, threshold: f64) -> bool {
    coverage(required, candidate_text).is_some_and(|ratio| ratio >= threshold)
}

/// Like [`matches`] but tokens have to be whole words of the candidate.
pub fn strict_matches(required: &TokenSet, candidate_text: &str, threshold: f64) -> bool {
    coverage_with(required, &normalize(candidate_text), contains_word)
        .is_some_and(|ratio| ratio >= threshold)
}

/// Matching knobs, normally taken from the scan configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub threshold: f64,
    pub strict_threshold: f64,
    /// Reject any known-type disagreement, not only for display queries
    pub strict_type_gate: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            strict_threshold: DEFAULT_STRICT_THRESHOLD,
            strict_type_gate: false,
        }
    }
}

/// Result of evaluating one candidate against one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchVerdict {
    Matched { coverage: f64, candidate_type: ProductType },
    BelowThreshold { coverage: f64 },
    TypeRejected { wanted: ProductType, found: ProductType },
    NoTokens,
}

impl MatchVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Evaluate a candidate text against a query, including the type gate.
pub fn evaluate(query: &ProductQuery, candidate_text: &str, settings: &MatchSettings) -> MatchVerdict {
    let normalized = normalize(candidate_text);
    let Some(ratio) = coverage_with(query.tokens(), &normalized, contains_substring) else {
        return MatchVerdict::NoTokens;
    };
    if ratio < settings.threshold {
        return MatchVerdict::BelowThreshold { coverage: ratio };
    }

    let wanted = query.product_type();
    let found = classify_normalized(&normalized);
    if wanted.is_display() && !found.is_display() {
        return MatchVerdict::TypeRejected { wanted, found };
    }
    if settings.strict_type_gate && wanted.is_known() && found.is_known() && wanted != found {
        return MatchVerdict::TypeRejected { wanted, found };
    }

    MatchVerdict::Matched {
        coverage: ratio,
        candidate_type: found,
    }
}

/// A query that accepted a candidate
#[derive(Debug, Clone, Copy)]
pub struct QueryMatch<'q> {
    pub query: &'q ProductQuery,
    pub coverage: f64,
    pub candidate_type: ProductType,
}

/// Pick the query with the highest coverage; ties keep configuration order.
pub fn best_query<'q>(
    queries: &'q [ProductQuery],
    candidate_text: &str,
    settings: &MatchSettings,
) -> Option<QueryMatch<'q>> {
    let mut best: Option<QueryMatch<'q>> = None;
    for query in queries {
        if let MatchVerdict::Matched { coverage, candidate_type } = evaluate(query, candidate_text, settings) {
            let better = best.as_ref().is_none_or(|current| coverage > current.coverage);
            if better {
                best = Some(QueryMatch {
                    query,
                    coverage,
                    candidate_type,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keywords::{SynonymTable, expand};

    fn tokens(line: &str) -> TokenSet {
        expand(line, &SynonymTable::new())
    }

    fn query(line: &str) -> ProductQuery {
        ProductQuery::new(line, &SynonymTable::new())
    }

    #[test]
    fn empty_token_set_never_matches() {
        let empty = TokenSet::new();
        assert!(!matches(&empty, "anything at all", 0.0));
        assert!(!strict_matches(&empty, "anything at all", 0.0));
        assert_eq!(coverage(&empty, "anything"), None);
        assert_eq!(evaluate(&query("!!"), "anything", &MatchSettings::default()), MatchVerdict::NoTokens);
    }

    #[test]
    fn coverage_counts_substrings() {
        let required = tokens("journey together display");
        assert_eq!(coverage(&required, "Journey Together Booster"), Some(2.0 / 3.0));
        assert!(!matches(&required, "Journey Together Booster", 0.75));
        assert!(matches(&required, "JourneyTogether-Display", 0.75));
    }

    #[test]
    fn threshold_is_inclusive() {
        let required = tokens("a b c d");
        assert!(matches(&required, "a b c", 0.75));
        assert!(!matches(&required, "a b", 0.75));
    }

    #[test]
    fn strict_variant_requires_whole_words() {
        let required = tokens("journey together display");
        assert!(matches(&required, "JourneyTogether Display", 1.0));
        assert!(!strict_matches(&required, "JourneyTogether Display", 1.0));
        assert!(strict_matches(&required, "Journey Together - Display", 1.0));
    }

    #[test]
    fn display_query_accepts_display_candidate() {
        let verdict = evaluate(
            &query("Journey Together display"),
            "Pokémon TCG: Journey Together (SV09) – 36er Display (EN)",
            &MatchSettings::default(),
        );
        assert!(verdict.is_match());
        assert!(matches!(verdict, MatchVerdict::Matched { candidate_type: ProductType::Display, .. }));
    }

    #[test]
    fn display_query_rejects_blister_candidate() {
        let verdict = evaluate(
            &query("Journey Together display"),
            "Pokémon TCG: Journey Together (SV09) – Checklane Blister (EN)",
            &MatchSettings::default(),
        );
        assert!(!verdict.is_match());
    }

    #[test]
    fn display_query_rejects_mixed_packaging_with_full_coverage() {
        let pack = evaluate(
            &query("Journey Together display"),
            "Journey Together Pack - Display Ständer",
            &MatchSettings::default(),
        );
        assert_eq!(
            pack,
            MatchVerdict::TypeRejected {
                wanted: ProductType::Display,
                found: ProductType::MixedOrUnclear
            }
        );
    }

    #[test]
    fn non_display_queries_are_not_gated_by_default() {
        let etb_query = query("Journey Together ETB");
        let settings = MatchSettings::default();
        assert!(evaluate(&etb_query, "Journey Together ETB Bundle Booster", &settings).is_match());

        let strict = MatchSettings {
            strict_type_gate: true,
            ..MatchSettings::default()
        };
        let verdict = evaluate(&query("Journey Together Blister"), "Journey Together Blister ETB", &strict);
        assert!(verdict.is_match());
        let verdict = evaluate(&query("Journey Together ETB"), "Journey Together ETB Build & Battle 3er Blister", &strict);
        assert!(!verdict.is_match());
    }

    #[test]
    fn best_query_prefers_higher_coverage() {
        let queries = vec![query("Reisegefährten display"), query("Journey Together display")];
        let best = best_query(&queries, "Journey Together 36er Display EN", &MatchSettings::default()).unwrap();
        assert_eq!(best.query.raw(), "Journey Together display");
        assert!((best.coverage - 1.0).abs() < f64::EPSILON);
        assert!(best_query(&queries, "Destined Rivals Display", &MatchSettings::default()).is_none());
    }
}
