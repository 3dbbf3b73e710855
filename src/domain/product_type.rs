//! Product-type classification
//!
//! Rules are tested in strict priority order against normalized text and the
//! first match wins. Display titles that also mention a competing packaging
//! term are resolved by comparing match offsets: the display wording has to
//! come first, otherwise the title is `MixedOrUnclear`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::normalizer::normalize;

/// Packaging type of a sealed trading-card product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Display,
    Etb,
    Blister,
    BuildBattle,
    Premium,
    SingleBooster,
    /// Display wording present but preceded by another packaging term
    MixedOrUnclear,
    Unknown,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Etb => "etb",
            Self::Blister => "blister",
            Self::BuildBattle => "build_battle",
            Self::Premium => "premium",
            Self::SingleBooster => "single_booster",
            Self::MixedOrUnclear => "mixed_or_unclear",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_display(self) -> bool {
        self == Self::Display
    }

    /// Whether the classifier recognized a concrete packaging type
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown | Self::MixedOrUnclear)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn pattern(source: &str) -> Regex {
    // Patterns are compile-time literals covered by the tests below.
    Regex::new(source).unwrap_or_else(|e| panic!("invalid product type pattern {source}: {e}"))
}

static DISPLAY: Lazy<Regex> = Lazy::new(|| pattern(r"display|36er|36 booster|booster ?box"));
static DISPLAY_COMPETITORS: Lazy<Regex> = Lazy::new(|| {
    pattern(r"blister|pack|build|etb|elite ?trainer|trainer ?box|check ?lane|sleeved")
});
static BLISTER: Lazy<Regex> =
    Lazy::new(|| pattern(r"blister|3 ?pack|3er pack|sleeved booster|check ?lane"));
static ETB: Lazy<Regex> = Lazy::new(|| pattern(r"elite ?trainer ?box|\betb\b|trainer ?box"));
static BUILD_BATTLE: Lazy<Regex> = Lazy::new(|| pattern(r"build ?(?:and )?battle|prerelease"));
static PREMIUM: Lazy<Regex> = Lazy::new(|| pattern(r"premium|collection|special"));
static BOOSTER_OR_PACK: Lazy<Regex> = Lazy::new(|| pattern(r"booster|pack"));

/// Classify free text into a [`ProductType`].
pub fn classify(text: &str) -> ProductType {
    classify_normalized(&normalize(text))
}

/// Classify text that already went through [`normalize`].
pub fn classify_normalized(text: &str) -> ProductType {
    if let Some(display) = DISPLAY.find(text) {
        return match DISPLAY_COMPETITORS.find(text) {
            Some(competitor) if competitor.start() <= display.start() => ProductType::MixedOrUnclear,
            _ => ProductType::Display,
        };
    }
    if BLISTER.is_match(text) {
        return ProductType::Blister;
    }
    if ETB.is_match(text) {
        return ProductType::Etb;
    }
    if BUILD_BATTLE.is_match(text) {
        return ProductType::BuildBattle;
    }
    if PREMIUM.is_match(text) {
        return ProductType::Premium;
    }
    // Rule 1 already returned for any display wording.
    if BOOSTER_OR_PACK.is_match(text) {
        return ProductType::SingleBooster;
    }
    ProductType::Unknown
}
