use std::collections::BTreeSet;
use std::sync::OnceLock;

use isbnscan_core::{normalize, Identifier, IdentifierKind};
use regex::Regex;
use tracing::trace;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Optional "ISBN" / "ISBN-13:" prefix, then 3-1-3-5-1 digit groups.
re!(re_isbn13,
    r"(?i)(?:ISBN[-\s]?(?:13)?[-\s]?:?[-\s]?)?([0-9]{3}[-\s]?[0-9][-\s]?[0-9]{3}[-\s]?[0-9]{5}[-\s]?[0-9])");
// Optional "ISBN" / "ISBN-10:" prefix, then 1-3-5-1 groups with a digit or X check.
re!(re_isbn10,
    r"(?i)(?:ISBN[-\s]?(?:10)?[-\s]?:?[-\s]?)?([0-9][-\s]?[0-9]{3}[-\s]?[0-9]{5}[-\s]?[0-9X])");

/// A raw pattern match, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The digit groups as they appeared in the text, separators included.
    pub text: String,
    /// Which pattern produced the match.
    pub pattern: IdentifierKind,
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct IsbnExtractor;

impl IsbnExtractor {
    /// Every substring matching either ISBN pattern, ISBN-13 matches first.
    pub fn extract_candidates(text: &str) -> Vec<Candidate> {
        let patterns = [(re_isbn13(), IdentifierKind::Isbn13), (re_isbn10(), IdentifierKind::Isbn10)];

        patterns
            .into_iter()
            .flat_map(|(re, kind)| {
                re.captures_iter(text).filter_map(move |c| {
                    Some(Candidate { text: c.get(1)?.as_str().to_string(), pattern: kind })
                })
            })
            .collect()
    }

    /// Strip separators; `None` unless the result is 10 or 13 characters long.
    pub fn normalize(candidate: &str) -> Option<String> {
        let cleaned = normalize(candidate);
        matches!(cleaned.len(), 10 | 13).then_some(cleaned)
    }

    /// Unique, checksum-valid identifiers found anywhere in `text`.
    ///
    /// Garbage input simply produces an empty set.
    pub fn extract(text: &str) -> BTreeSet<Identifier> {
        Self::extract_candidates(text)
            .into_iter()
            .filter_map(|candidate| {
                let cleaned = Self::normalize(&candidate.text)?;
                match Identifier::parse(&cleaned) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        trace!(candidate = %candidate.text, "Rejected ISBN candidate: {e}");
                        None
                    }
                }
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use isbnscan_core::validate;

    fn values(text: &str) -> Vec<String> {
        IsbnExtractor::extract(text).iter().map(|id| id.to_string()).collect()
    }

    // ── Candidates ────────────────────────────────────────────────────────────

    #[test]
    fn candidates_keep_separators() {
        let c = IsbnExtractor::extract_candidates("ISBN-13: 978-0-596-52068-7");
        assert_eq!(c[0], Candidate { text: "978-0-596-52068-7".into(), pattern: IdentifierKind::Isbn13 });
    }

    #[test]
    fn candidates_from_both_patterns() {
        let c = IsbnExtractor::extract_candidates("9780134685991 and 0-596-00797-3");
        let kinds: Vec<IdentifierKind> = c.iter().map(|c| c.pattern).collect();
        assert!(kinds.contains(&IdentifierKind::Isbn13));
        assert!(kinds.contains(&IdentifierKind::Isbn10));
        assert!(c.iter().any(|c| c.text == "0-596-00797-3"));
    }

    #[test]
    fn prefix_is_case_insensitive() {
        assert_eq!(values("isbn 0596007973"), vec!["0596007973"]);
        assert_eq!(values("Isbn10:0596007973"), vec!["0596007973"]);
    }

    // ── Normalization ─────────────────────────────────────────────────────────

    #[test]
    fn normalize_rejects_wrong_lengths() {
        assert_eq!(IsbnExtractor::normalize("0-596-00797-3").as_deref(), Some("0596007973"));
        assert_eq!(IsbnExtractor::normalize("059600797"), None);
        assert_eq!(IsbnExtractor::normalize("05960079733"), None);
    }

    // ── Extraction ────────────────────────────────────────────────────────────

    #[test]
    fn extracts_hyphenated_isbn13() {
        assert_eq!(values("ISBN: 978-0-596-52068-7"), vec!["9780596520687"]);
    }

    #[test]
    fn extracts_spaced_isbn13() {
        assert_eq!(values("978 0 596 52068 7"), vec!["9780596520687"]);
    }

    #[test]
    fn extracts_isbn10_with_x() {
        assert_eq!(values("ISBN 0-804-42957-X"), vec!["080442957X"]);
        assert_eq!(values("0 804 42957 x"), vec!["080442957X"]);
    }

    #[test]
    fn extracts_several_from_one_text() {
        let text = "ISBN 9780134685991\nISBN-10: 0134034287\n";
        assert_eq!(values(text), vec!["0134034287", "9780134685991"]);
    }

    #[test]
    fn whitespace_gap_lets_isbn13_pattern_span_two_numbers() {
        // "4034287 978013" reads as 3-1-3-5-1 groups, fails its checksum and
        // consumes the start of the real ISBN-13.
        assert_eq!(values("0134034287 9780134685991"), vec!["0134034287"]);
        assert_eq!(values("0134034287; 9780134685991"), vec!["0134034287", "9780134685991"]);
        assert_eq!(values("0134034287\n\n9780134685991"), vec!["0134034287", "9780134685991"]);
    }

    #[test]
    fn duplicates_collapse() {
        let text = "9780596520687 978-0-596-52068-7 ISBN 9780596520687";
        assert_eq!(values(text), vec!["9780596520687"]);
    }

    #[test]
    fn checksum_failures_are_dropped() {
        assert!(values("9780123456788").is_empty());
        assert!(values("0123456788").is_empty());
    }

    #[test]
    fn unparsable_text_yields_nothing() {
        assert!(values("978-invalid-isbn").is_empty());
        assert!(values("").is_empty());
        assert!(values("XXXX----\n\n--X-").is_empty());
        assert!(values("!@#$%^&*()\n\0\x01\x02").is_empty());
    }

    #[test]
    fn nine_and_eleven_digit_runs_are_not_identifiers() {
        for id in IsbnExtractor::extract("059600797 05960079733 97805965206") {
            assert!(matches!(id.as_str().len(), 10 | 13));
            assert!(validate(id.as_str()));
        }
    }

    #[test]
    fn non_ascii_digits_are_ignored() {
        assert!(values("٠٥٩٦٠٠٧٩٧٣").is_empty());
    }

    #[test]
    fn extract_only_returns_valid_identifiers() {
        let noisy = "96-3 0596007973 12 9780596520687-1 80442957X 0-13-403428-7 978013468599 1";
        for id in IsbnExtractor::extract(noisy) {
            assert!(validate(id.as_str()), "{id} failed validation");
        }
    }
}
