//! Product identity builder
//!
//! An identity is `{site}_{series}_{type}_{LANG}` plus optional modifier
//! suffixes. It is a pure function of the site id, the title text and the
//! series table, so the same product keeps its key across title rewordings
//! the rule tables recognize and across restarts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::domain::normalizer::normalize;
use crate::domain::product_type::classify_normalized;

/// Deterministic key of a product on one site
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductIdentity(String);

impl ProductIdentity {
    /// Wrap an already built identity, e.g. one read back from a state file
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Language tag of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    De,
    En,
    Jp,
    Unknown,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::De => "DE",
            Self::En => "EN",
            Self::Jp => "JP",
            Self::Unknown => "UNK",
        }
    }
}

// Misspellings seen in shop titles, applied word by word on normalized text.
const TYPO_CORRECTIONS: &[(&str, &str)] = &[
    ("togehter", "together"),
    ("togther", "together"),
    ("toghether", "together"),
    ("jouney", "journey"),
    ("journy", "journey"),
    ("reisegefaehrten", "reisegefahrten"),
    ("reisegefarten", "reisegefahrten"),
    ("reisegefahrtem", "reisegefahrten"),
    ("prismatishe", "prismatische"),
];

const BUILTIN_SERIES: &[(&str, &str)] = &[
    ("journey together", "sv09"),
    ("reisegefahrten", "kp09"),
    ("destined rivals", "sv10"),
    ("ewige rivalen", "kp10"),
    ("prismatic evolutions", "sv8pt5"),
    ("prismatische entwicklungen", "kp8pt5"),
    ("surging sparks", "sv08"),
    ("sturmische funken", "kp08"),
    ("stellar crown", "sv07"),
    ("stellarkrone", "kp07"),
    ("royal blood", "op10"),
];

// Words that never contribute to a derived series code.
const STOPWORDS: &[&str] = &[
    "pokemon", "tcg", "trading", "card", "game", "cards", "one", "piece", "karmesin", "purpur",
    "scarlet", "violet", "display", "booster", "box", "boxes", "pack", "packs", "blister", "etb",
    "elite", "trainer", "top", "build", "battle", "premium", "collection", "special", "36er", "18er",
    "36", "18", "3er", "checklane", "sleeved", "de", "en", "jp", "deutsch", "english", "englisch",
    "german", "japanese", "japanisch", "edition", "the", "and", "und", "der", "die", "das", "mit",
    "of", "sv", "kp",
];

static SERIES_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(sv|kp|op|swsh|sm|eb|ob)\s?(\d{1,2})(pt5|a)?\b")
        .unwrap_or_else(|e| panic!("invalid series code pattern: {e}"))
});

/// Replace known misspellings word by word. Expects normalized input.
pub fn correct_typos(normalized: &str) -> String {
    normalized
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            TYPO_CORRECTIONS
                .iter()
                .find(|(wrong, _)| *wrong == word)
                .map_or(word, |(_, right)| *right)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable series name to set code, configured entries take precedence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesTable {
    entries: Vec<(String, String)>,
}

impl Default for SeriesTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SeriesTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_SERIES
                .iter()
                .map(|(name, code)| ((*name).to_string(), (*code).to_string()))
                .collect(),
        }
    }

    /// Built-in table extended with configured `name -> code` pairs
    pub fn with_extra(extra: &HashMap<String, String>) -> Self {
        let mut configured: Vec<(String, String)> = extra
            .iter()
            .map(|(name, code)| (correct_typos(&normalize(name)), normalize(code).replace(' ', "")))
            .filter(|(name, code)| !name.is_empty() && !code.is_empty())
            .collect();
        // HashMap order is random; identities must not depend on it.
        configured.sort();
        configured.extend(Self::builtin().entries);
        Self { entries: configured }
    }

    /// Code of the first series name contained in `normalized` as whole words
    pub fn lookup(&self, normalized: &str) -> Option<&str> {
        let padded = format!(" {normalized} ");
        self.entries
            .iter()
            .find(|(name, _)| padded.contains(&format!(" {name} ")))
            .map(|(_, code)| code.as_str())
    }
}

fn has_word(words: &[&str], word: &str) -> bool {
    words.contains(&word)
}

fn has_any_word(words: &[&str], candidates: &[&str]) -> bool {
    candidates.iter().any(|c| has_word(words, c))
}

fn detect_language(raw: &str, words: &[&str]) -> Language {
    let upper = raw.to_uppercase();
    if upper.contains("(DE)") {
        return Language::De;
    }
    if upper.contains("(EN)") {
        return Language::En;
    }
    if upper.contains("(JP)") {
        return Language::Jp;
    }

    if has_any_word(words, &["de", "deutsch", "deutsche", "german"]) {
        Language::De
    } else if has_any_word(words, &["en", "eng", "english", "englisch"]) {
        Language::En
    } else if has_any_word(words, &["jp", "japan", "japanese", "japanisch"]) {
        Language::Jp
    } else {
        Language::Unknown
    }
}

fn series_code(normalized: &str, words: &[&str], series: &SeriesTable) -> String {
    if let Some(caps) = SERIES_CODE.captures(normalized) {
        let prefix = &caps[1];
        let number = &caps[2];
        return match caps.get(3) {
            Some(suffix) => format!("{prefix}{number}{}", suffix.as_str()),
            None => format!("{prefix}{number:0>2}"),
        };
    }
    if let Some(code) = series.lookup(normalized) {
        return code.to_string();
    }

    let derived: Vec<&str> = words
        .iter()
        .copied()
        .filter(|word| word.len() > 1 && !STOPWORDS.contains(word))
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .take(3)
        .collect();
    if derived.is_empty() {
        "unknown".to_string()
    } else {
        derived.join("-")
    }
}

fn modifiers(words: &[&str], normalized: &str) -> Vec<&'static str> {
    let mut suffixes = Vec::new();
    if has_word(words, "premium") {
        suffixes.push("premium");
    }
    if has_word(words, "elite") {
        suffixes.push("elite");
    }
    if has_word(words, "top") && normalized.contains("trainer") {
        suffixes.push("top");
    }
    if has_word(words, "18er") || normalized.contains("18 booster") {
        suffixes.push("18er");
    }
    suffixes
}

/// Lowercase alphanumeric form of a configured site id
pub fn sanitize_site_id(site_id: &str) -> String {
    site_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Site id derived from a shop URL: host without `www.` and TLD, alphanumerics only.
///
/// `https://www.games-island.eu/...` gives `gamesisland`.
pub fn site_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let without_tld = host.rsplit_once('.').map_or(host, |(rest, _)| rest);
    let id = sanitize_site_id(without_tld);
    (!id.is_empty()).then_some(id)
}

/// Build the identity of a product titled `text` on `site_id`.
pub fn build_identity(site_id: &str, text: &str, series: &SeriesTable) -> ProductIdentity {
    let normalized = correct_typos(&normalize(text));
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

    let language = detect_language(text, &words);
    let product_type = classify_normalized(&normalized);
    let code = series_code(&normalized, &words, series);

    let mut identity = format!(
        "{}_{}_{}_{}",
        sanitize_site_id(site_id),
        code,
        product_type.as_str(),
        language.as_str()
    );
    for suffix in modifiers(&words, &normalized) {
        identity.push('_');
        identity.push_str(suffix);
    }
    ProductIdentity(identity)
}
