//! Shared detection patterns.
//!
//! Regexes used by the gates, the claim extractor and the context matcher.
//! Kept in one place so the gates and the matcher agree on what a URL, a
//! citation or a source pointer looks like.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // SOURCE MARKERS
    // =========================================================================

    /// URL-like token
    pub static ref URL_PATTERN: Regex = Regex::new(
        r#"(?i)\bhttps?://[^\s\]\)>"']+"#
    ).unwrap();

    /// Bracketed source pointer: [Source: ...], [Context: ...], [InternalDoc: ...]
    pub static ref POINTER_PATTERN: Regex = Regex::new(
        r"(?i)\[\s*(source|context|internaldoc)\s*:\s*([^\]]*)\]"
    ).unwrap();

    /// References-style heading on its own line
    pub static ref REFERENCES_HEADING: Regex = Regex::new(
        r"(?im)^\s*(?:#{1,6}\s*)?(references|sources|bibliography|works cited)\s*:?\s*$"
    ).unwrap();

    // =========================================================================
    // CITATIONS
    // =========================================================================

    /// Author-year citation: "Smith et al. (2021)", "Smith (2021)", "Smith and Lee (2019)"
    pub static ref AUTHOR_YEAR_CITATION: Regex = Regex::new(
        r"\b[A-Z][A-Za-z'-]+(?:\s+(?:et al\.?|and|&)(?:\s+[A-Z][A-Za-z'-]+)?)?\s*\(\s*(?:1[5-9]|20)\d{2}[a-z]?\s*\)"
    ).unwrap();

    /// Numeric citation marker: [1], [2, 3], [4-6]
    pub static ref NUMERIC_CITATION: Regex = Regex::new(
        r"\[\d+(?:\s*[-,]\s*\d+)*\]"
    ).unwrap();

    // =========================================================================
    // STRUCTURE
    // =========================================================================

    /// Enumerated step at line start: "1.", "2)", "Step 3:"
    pub static ref STEP_MARKER: Regex = Regex::new(
        r"(?im)^\s*(?:step\s+)?\d{1,3}\s*[.):]\s+\S"
    ).unwrap();

    /// Word for claim overlap: alphanumeric, at least three characters
    pub static ref OVERLAP_WORD: Regex = Regex::new(
        r"\b[a-zA-Z0-9_]{3,}\b"
    ).unwrap();

    /// Word for intent matching: at least four characters
    pub static ref INTENT_WORD: Regex = Regex::new(
        r"\b[a-zA-Z0-9_]{4,}\b"
    ).unwrap();

    // =========================================================================
    // NUMBERS & DATES
    // =========================================================================

    /// Number with optional thousands/decimal separator and magnitude suffix
    pub static ref NUMBER_PATTERN: Regex = Regex::new(
        r"(\d+(?:[.,]\d+)*)(?:\s*([kKmMbB])\b)?"
    ).unwrap();

    /// ISO calendar date: 2024-03-15
    pub static ref ISO_DATE: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    /// Four-digit year between 1900 and 2099
    pub static ref YEAR_PATTERN: Regex = Regex::new(
        r"\b(19|20)\d{2}\b"
    ).unwrap();
}

/// Check if content contains any URL.
pub fn contains_url(content: &str) -> bool {
    URL_PATTERN.is_match(content)
}

/// Check if content contains a references-style heading.
pub fn contains_references_heading(content: &str) -> bool {
    REFERENCES_HEADING.is_match(content)
}

/// Check if content contains any citation-like marker.
pub fn contains_citation(content: &str) -> bool {
    AUTHOR_YEAR_CITATION.is_match(content)
        || NUMERIC_CITATION.is_match(content)
        || POINTER_PATTERN.is_match(content)
}

/// Count enumerated step markers.
pub fn count_steps(content: &str) -> usize {
    STEP_MARKER.find_iter(content).count()
}

/// Lowercased words of at least three characters, in order.
pub fn overlap_words(content: &str) -> Vec<String> {
    OVERLAP_WORD
        .find_iter(&content.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert!(contains_url("See https://example.com/report for details"));
        assert!(contains_url("[Source: http://data.gov/x]"));
        assert!(!contains_url("No link here, just example.com"));
    }

    #[test]
    fn test_references_heading() {
        assert!(contains_references_heading("Body text\n\n## References\n- a"));
        assert!(contains_references_heading("Sources:\n1. x"));
        assert!(!contains_references_heading("These sources were useful."));
    }

    #[test]
    fn test_citation_detection() {
        assert!(contains_citation("As Smith et al. (2021) showed"));
        assert!(contains_citation("Growth is documented [3]."));
        assert!(contains_citation("Revenue grew [Source: https://x.io]"));
        assert!(contains_citation("Revenue is 50M [Context: board memo]"));
        assert!(!contains_citation("Nothing cited in this sentence."));
    }

    #[test]
    fn test_step_markers() {
        let text = "Plan:\n1. Gather data\n2. Analyse\n3) Report";
        assert_eq!(count_steps(text), 3);
        assert_eq!(count_steps("In 2024. we grew"), 0);
    }

    #[test]
    fn test_overlap_words() {
        assert_eq!(overlap_words("Revenue is 50M"), vec!["revenue", "50m"]);
    }
}
