// src/utils/text.rs

//! Text normalization shared by extraction and classification.
//!
//! Keyword matching runs on *normalized* text: lowercased, Polish diacritics
//! folded to ASCII, punctuation dropped and words joined by single spaces.
//! Keywords are normalized the same way, so `"Farma Wiatrowa"` in a notice and
//! `"farma wiatrowa"` in the configuration compare equal.

use unicode_segmentation::UnicodeSegmentation;

/// Fold a lowercase Polish letter to its ASCII base letter.
pub fn fold_diacritics(c: char) -> char {
    match c {
        'ą' => 'a',
        'ć' => 'c',
        'ę' => 'e',
        'ł' => 'l',
        'ń' => 'n',
        'ó' => 'o',
        'ś' => 's',
        'ź' | 'ż' => 'z',
        other => other,
    }
}

/// Lowercase and fold diacritics, keeping punctuation and spacing intact.
pub fn fold_lowercase(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritics)
        .collect()
}

/// Lowercase, fold diacritics and reduce to space-separated words.
pub fn normalize(text: &str) -> String {
    fold_lowercase(text)
        .unicode_words()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Take at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}

/// A keyword prepared for matching against normalized text.
///
/// Terms match at the start of a word, so the stem `fotowoltaiczn` matches
/// `fotowoltaicznej`. A keyword written with a trailing space in the
/// configuration (`"pv "`) must also end at a word boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    text: String,
    whole_word: bool,
}

impl Term {
    pub fn new(raw: &str) -> Self {
        Self {
            text: normalize(raw),
            whole_word: raw.ends_with(char::is_whitespace),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether this term occurs in `normalized` (output of [`normalize`]).
    pub fn found_in(&self, normalized: &str) -> bool {
        if self.text.is_empty() {
            return false;
        }
        normalized.match_indices(&self.text).any(|(idx, _)| {
            let starts_word = idx == 0 || normalized[..idx].ends_with(' ');
            let end = idx + self.text.len();
            let ends_word = end == normalized.len() || normalized[end..].starts_with(' ');
            starts_word && (!self.whole_word || ends_word)
        })
    }
}

/// Prepare a list of raw keywords, dropping those that normalize to nothing.
pub fn terms(raw: &[String]) -> Vec<Term> {
    raw.iter()
        .map(|k| Term::new(k))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether any of `terms` occurs in `normalized`.
pub fn any_term(terms: &[Term], normalized: &str) -> bool {
    terms.iter().any(|t| t.found_in(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_polish_letters() {
        assert_eq!(
            normalize("Wszczęcie  POSTĘPOWANIA — żółć, Łódź!"),
            "wszczecie postepowania zolc lodz"
        );
    }

    #[test]
    fn test_term_matches_word_start_only() {
        let term = Term::new("oze");
        assert!(term.found_in("instalacja oze na dachu"));
        assert!(!term.found_in("moze byc"));

        let stem = Term::new("fotowoltaiczn");
        assert!(stem.found_in(&normalize("Budowa farmy fotowoltaicznej 50 MW")));
        assert!(!Term::new("fotowoltaik").found_in(&normalize("farmy fotowoltaicznej")));
    }

    #[test]
    fn test_trailing_space_requires_whole_word() {
        let term = Term::new("pv ");
        assert!(term.found_in("instalacja pv o mocy"));
        assert!(term.found_in("instalacja pv"));
        assert!(!term.found_in("rury pvc"));
    }

    #[test]
    fn test_multi_word_term() {
        let term = Term::new("Farma wiatrowa");
        assert!(term.found_in(&normalize("Budowa farmy wiatrowej / farma wiatrowa Łęczyca")));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("żółw", 2), "żó");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
