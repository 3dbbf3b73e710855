//! Product queries and synonym expansion
//!
//! A query is one user-authored line such as "Journey Together display".
//! Its token set is the normalized words of the line plus the normalized
//! synonyms of every word that has an entry in the synonym table.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::domain::normalizer::{normalize, tokens};
use crate::domain::product_type::{ProductType, classify};

/// Deduplicated, ordered set of required tokens
pub type TokenSet = BTreeSet<String>;

/// Word → synonyms mapping, keys and values stored normalized
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, Vec<String>>")]
pub struct SynonymTable {
    entries: HashMap<String, Vec<String>>,
}

impl From<HashMap<String, Vec<String>>> for SynonymTable {
    fn from(raw: HashMap<String, Vec<String>>) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for (word, synonyms) in raw {
            let key = normalize(&word);
            if key.is_empty() {
                continue;
            }
            let values = entries.entry(key).or_default();
            values.extend(
                synonyms
                    .iter()
                    .map(|s| normalize(s))
                    .filter(|s| !s.is_empty()),
            );
        }
        Self { entries }
    }
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Normalized synonyms of a normalized word
    pub fn synonyms_of(&self, word: &str) -> &[String] {
        self.entries.get(word).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Expand a query line into its required token set.
pub fn expand(query_line: &str, synonyms: &SynonymTable) -> TokenSet {
    let mut expanded = TokenSet::new();
    for token in tokens(query_line) {
        expanded.extend(synonyms.synonyms_of(&token).iter().cloned());
        expanded.insert(token);
    }
    expanded
}

/// One product of interest, derived from a configured query line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    raw: String,
    tokens: TokenSet,
    product_type: ProductType,
}

impl ProductQuery {
    pub fn new(raw: impl Into<String>, synonyms: &SynonymTable) -> Self {
        let raw = raw.into();
        let tokens = expand(&raw, synonyms);
        let product_type = classify(&raw);
        Self {
            raw,
            tokens,
            product_type,
        }
    }

    /// Build queries from configured lines, skipping blank ones
    pub fn from_lines<'a, I>(lines: I, synonyms: &SynonymTable) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Self::new(line, synonyms))
            .collect()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Packaging type the user asked for
    pub fn product_type(&self) -> ProductType {
        self.product_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &[&str])]) -> SynonymTable {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[test]
    fn expands_display_synonyms() {
        let synonyms = table(&[("display", &["box", "36er"][..])]);
        let expanded = expand("Pokemon display", &synonyms);
        let expected: TokenSet = ["pokemon", "display", "box", "36er"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn empty_table_keeps_plain_tokens() {
        let expanded = expand("Journey Together display", &SynonymTable::new());
        assert_eq!(expanded.len(), 3);
        assert!(expanded.contains("journey"));
    }

    #[test]
    fn synonym_keys_and_values_are_normalized() {
        let synonyms = table(&[("Reisegefährten", &["Journey Together", "SV09"][..])]);
        let expanded = expand("reisegefahrten display", &synonyms);
        assert!(expanded.contains("journey together"));
        assert!(expanded.contains("sv09"));
        assert!(expanded.contains("reisegefahrten"));
    }

    #[test]
    fn duplicates_collapse() {
        let synonyms = table(&[("display", &["display", "Display"][..])]);
        assert_eq!(expand("display display", &synonyms).len(), 1);
    }

    #[test]
    fn blank_line_yields_no_tokens() {
        assert!(expand("  ", &SynonymTable::new()).is_empty());
        assert!(expand("?!", &SynonymTable::new()).is_empty());
    }

    #[test]
    fn query_infers_product_type() {
        let query = ProductQuery::new("Journey Together display", &SynonymTable::new());
        assert_eq!(query.product_type(), ProductType::Display);
        assert_eq!(query.raw(), "Journey Together display");

        let etb = ProductQuery::new("Reisegefährten ETB", &SynonymTable::new());
        assert_eq!(etb.product_type(), ProductType::Etb);
    }

    #[test]
    fn from_lines_skips_blank_lines() {
        let queries = ProductQuery::from_lines(["Journey Together display", "", "  "], &SynonymTable::new());
        assert_eq!(queries.len(), 1);
    }

    #[test]
    fn deserializes_from_json_mapping() {
        let synonyms: SynonymTable = serde_json::from_str(r#"{"Display": ["Box", "36er"]}"#).unwrap();
        assert_eq!(synonyms.synonyms_of("display"), ["box".to_string(), "36er".to_string()]);
    }
}
