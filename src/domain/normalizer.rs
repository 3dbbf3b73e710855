//! Text normalization shared by matching, classification and identity building
//!
//! Rule: lowercase, Unicode compatibility decomposition, combining marks
//! dropped, a few letters without a decomposition transliterated
//! (`ß` → `ss`, `æ` → `ae`, ...), any whitespace turned into a space,
//! everything else outside `[a-z0-9 ]` removed, whitespace runs collapsed.
//!
//! So "Reisegefährten" and "reisegefahrten" compare equal, and
//! "Pokémon TCG: Journey Together (SV09)" becomes
//! "pokemon tcg journey together sv09".

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize free text for comparison. Total and idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut kept = String::with_capacity(lowered.len());

    for ch in lowered.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            'a'..='z' | '0'..='9' => kept.push(ch),
            c if c.is_whitespace() => kept.push(' '),
            c => {
                if let Some(replacement) = transliterate(c) {
                    kept.push_str(replacement);
                }
            }
        }
    }

    collapse_whitespace(&kept)
}

/// Letters that survive NFKD as a single code point
fn transliterate(ch: char) -> Option<&'static str> {
    match ch {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'þ' => Some("th"),
        'ð' | 'đ' => Some("d"),
        'ł' => Some("l"),
        'ı' => Some("i"),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized whitespace tokens of `text`
pub fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Reisegefährten", "reisegefahrten")]
    #[case("Pokémon TCG: Journey Together (SV09) – 36er Display (EN)", "pokemon tcg journey together sv09 36er display en")]
    #[case("  Build & Battle\tBox \n", "build battle box")]
    #[case("Straße", "strasse")]
    #[case("ＳＶ０９", "sv09")]
    #[case("", "")]
    #[case("!!!", "")]
    fn normalizes_examples(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn accented_and_plain_forms_compare_equal() {
        assert_eq!(normalize("Reisegefährten"), normalize("reisegefahrten"));
        assert_eq!(normalize("POKÉMON"), normalize("pokemon"));
    }

    #[test]
    fn tokens_split_on_spaces() {
        assert_eq!(tokens("Journey  Together-Display"), vec!["journey", "togetherdisplay"]);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in "\\PC{0,64}") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_output_stays_in_alphabet(input in "\\PC{0,64}") {
            let out = normalize(&input);
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '));
            prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
            prop_assert!(!out.contains("  "));
        }
    }
}
