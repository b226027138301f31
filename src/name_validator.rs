//! Rejects table-header, boilerplate, and sentence-fragment strings that rule-based
//! and LLM extraction alike sometimes mistake for person names.
//!
//! The checks run in a fixed order (`validate` below); later checks assume earlier
//! ones already filtered the obvious cases — the concatenation heuristic at the end
//! only matters once pure-header and pure-sentence strings are already gone.

use regex::Regex;
use std::sync::LazyLock;

/// Case-insensitive exact-match blocklist: table headers and known LLM-hallucination
/// strings that show up verbatim often enough to blocklist directly rather than by
/// pattern.
const SKIP_EXACT: &[&str] = &[
    "name",
    "title",
    "age",
    "position",
    "director",
    "officer",
    "shares",
    "percent",
    "percentage",
    "total",
    "address",
    "beneficial owner",
    "beneficial ownership",
    "security ownership",
    "principal stockholders",
    "principal shareholders",
    "class of stock",
    "number of shares",
    "amount",
    "nominee",
    "chief executive officer",
    "chief financial officer",
    "chief operating officer",
    "chief technology officer",
    "chief legal officer",
    "executive officers",
    "board of directors",
    "shareholder engagement",
    "corporate governance",
    "audit committee",
    "compensation committee",
    "nominating committee",
    "none",
    "n/a",
    "not applicable",
    "unknown",
    "various",
    "all directors and executive officers as a group",
    "nikola badger",
    "tesla model",
    "john doe",
    "jane doe",
];

/// Substrings that, wherever they appear in the candidate, indicate captured
/// boilerplate rather than a name.
const SKIP_CONTAINS: &[&str] = &[
    "see footnote",
    "see note",
    "percent of class",
    "percent of outstanding",
    "based on",
    "as of the record date",
    "pursuant to rule",
    "incorporated by reference",
    "the foregoing",
    "set forth above",
    "set forth below",
];

/// Prefixes that mark the candidate as the opening of a document-structure sentence
/// rather than a name.
const SKIP_STARTS: &[&str] = &[
    "the ",
    "this ",
    "pursuant to",
    "in accordance with",
    "as of",
    "for the year",
    "table of",
    "item ",
    "section ",
    "note:",
    "footnote",
];

/// Section-heading openers, distinct from `SKIP_STARTS`.
const SECTION_STARTS: &[&str] = &[
    "executive officers",
    "board of directors",
    "security ownership",
    "beneficial ownership",
    "compensation discussion",
    "related party",
];

/// First-word openers recognizable as the start of a company name rather than a
/// person's given name — guards against a company name emitted in the person-name
/// slot (e.g. "Tesla Model S Program Director").
const COMPANY_FIRST_WORDS: &[&str] = &[
    "tesla", "apple", "amazon", "google", "alphabet", "microsoft", "meta", "nvidia",
    "berkshire", "jpmorgan", "goldman", "bank", "holdings", "group", "global", "national",
];

const COMPANY_SUFFIXES: &[&str] = &[
    " inc.", " inc", " corp.", " corp", " corporation", " llc", " l.l.c.", " ltd.", " ltd",
    " limited", " gmbh", " s.a.", " sa", " plc", " lp", " l.p.", " fund", " trust", " partners",
    " holdings", " group", " co.", " company",
];

const PARTICLES: &[&str] = &["de", "van", "von", "der", "la", "le", "du"];

const SUFFIX_TOKENS: &[&str] = &["jr", "sr", "ii", "iii", "iv", "phd", "md", "esq"];

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b20\d{2}\b").unwrap());
static FORM_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(10-K|10-Q|8-K|DEF 14A|S-1|13D|13G|Form \d+)\b").unwrap());
static SENTENCE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\.\s+[A-Z][a-z]+").unwrap());
static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\(\d+\)$|^\*+$").unwrap());
static NUMERIC_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").unwrap());
static PARENTHETICAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]*)\)").unwrap());

const SENTENCE_WORDS: &[&str] = &[
    " is ", " was ", " filed ", " january ", " february ", " march ", " april ", " may ",
    " june ", " july ", " august ", " september ", " october ", " november ", " december ",
];

/// Runs the full rejection chain against a candidate person name. Returns `true`
/// when the name is acceptable (should be inserted), `false` when it should be
/// silently skipped.
pub fn is_valid_name(candidate: &str) -> bool {
    rejection_reason(candidate).is_none()
}

/// Same check as [`is_valid_name`] but returns which rule rejected the candidate,
/// for `DEBUG`-level logging at call sites that want to explain a skip.
pub fn rejection_reason(candidate: &str) -> Option<&'static str> {
    let trimmed = candidate.trim();

    // 1. Empty or whitespace-only.
    if trimmed.is_empty() {
        return Some("empty");
    }

    let lower = trimmed.to_lowercase();

    // 2. Exact blocklist.
    if SKIP_EXACT.contains(&lower.as_str()) {
        return Some("exact_blocklist");
    }

    // 3. Substring blocklist.
    if SKIP_CONTAINS.iter().any(|s| lower.contains(s)) {
        return Some("contains_blocklist");
    }

    // 4. Prefix blocklists.
    if SKIP_STARTS.iter().any(|s| lower.starts_with(s)) {
        return Some("starts_blocklist");
    }
    if SECTION_STARTS.iter().any(|s| lower.starts_with(s)) {
        return Some("section_starts_blocklist");
    }

    // 5. Company-first-word rejection.
    if let Some(first) = lower.split_whitespace().next() {
        if COMPANY_FIRST_WORDS.contains(&first) {
            return Some("company_first_word");
        }
    }

    // 6. Company suffix.
    if COMPANY_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return Some("company_suffix");
    }

    // 7. ALL-CAPS and length > 10.
    if trimmed.len() > 10 && trimmed.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
    {
        return Some("all_caps_long");
    }

    // 8. Regex family.
    if SKIP_STARTS.iter().any(|s| lower.starts_with(s)) {
        return Some("document_structure_start");
    }
    if YEAR_RE.is_match(trimmed) {
        return Some("contains_year");
    }
    if FORM_REF_RE.is_match(trimmed) {
        return Some("contains_form_reference");
    }
    if SENTENCE_WORDS.iter().any(|w| lower.contains(w)) {
        return Some("sentence_word");
    }
    if SENTENCE_SHAPE_RE.is_match(trimmed) {
        return Some("sentence_shape");
    }
    if trimmed.matches('\n').count() >= 3 {
        return Some("too_many_newlines");
    }
    if FOOTNOTE_RE.is_match(trimmed) {
        return Some("footnote_marker");
    }

    // 9. Numeric/dotted-token rejection.
    if NUMERIC_TOKEN_RE.is_match(trimmed) {
        return Some("numeric_token");
    }

    // 10. Length/letter-count/digit-ratio.
    let letter_count = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    let digit_count = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    if trimmed.len() < 3 || letter_count < 3 {
        return Some("too_short");
    }
    if letter_count > 0 && (digit_count as f64 / letter_count as f64) > 0.3 {
        return Some("digit_ratio");
    }

    // 11. Word count / overall length.
    let word_count = trimmed.split_whitespace().count();
    if !(2..=6).contains(&word_count) || trimmed.len() > 60 {
        return Some("word_count_or_length");
    }

    // 12. Long-parenthetical rejection.
    if let Some(caps) = PARENTHETICAL_RE.captures(trimmed) {
        if caps[1].len() >= 15 {
            return Some("long_parenthetical");
        }
    }

    // 13. Lowercase-start rejection, unless a particle leads.
    let first_word_lower = trimmed.split_whitespace().next().unwrap_or("").to_lowercase();
    let starts_lower = trimmed
        .chars()
        .next()
        .map(|c| c.is_lowercase())
        .unwrap_or(false);
    if starts_lower && !PARTICLES.contains(&first_word_lower.as_str()) {
        return Some("lowercase_start");
    }

    // 14. Concatenated-name heuristic.
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    let capitalized_count = words
        .iter()
        .filter(|w| w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false))
        .count();
    if capitalized_count > 4 {
        return Some("too_many_capitalized_words");
    }
    if words.len() >= 4 {
        let mut transitions = 0;
        for pair in words.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let a_lower_clean = a.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if SUFFIX_TOKENS.contains(&a_lower_clean.as_str())
                || PARTICLES.contains(&a_lower_clean.as_str())
            {
                continue;
            }
            let a_is_lower_initial = a.chars().next().map(|c| c.is_lowercase()).unwrap_or(false);
            let b_is_upper_initial = b.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
            if a_is_lower_initial && b_is_upper_initial {
                transitions += 1;
            }
        }
        if transitions >= 3 {
            return Some("concatenated_name_transitions");
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_name() {
        assert!(is_valid_name("Jane Doe"));
        assert!(is_valid_name("Robert A. Smith"));
    }

    #[test]
    fn rejects_header_token() {
        assert_eq!(rejection_reason("Name"), Some("exact_blocklist"));
        assert_eq!(rejection_reason("Title"), Some("exact_blocklist"));
    }

    #[test]
    fn rejects_company_suffix() {
        assert_eq!(rejection_reason("Acme Holdings Inc."), Some("company_suffix"));
    }

    #[test]
    fn rejects_company_first_word_hallucination() {
        assert_eq!(
            rejection_reason("Tesla Model S Program Director"),
            Some("company_first_word")
        );
    }

    #[test]
    fn rejects_sentence_fragment() {
        assert_eq!(
            rejection_reason("The Company entered into a merger agreement on January 5"),
            Some("starts_blocklist")
        );
    }

    #[test]
    fn accepts_particle_led_surname() {
        assert!(is_valid_name("van der Berg Johan"));
    }

    #[test]
    fn rejects_numeric_token() {
        assert_eq!(rejection_reason("5.02"), Some("numeric_token"));
    }

    #[test]
    fn rejects_long_parenthetical() {
        assert_eq!(
            rejection_reason("Jane Doe (see the table above for more details please)"),
            Some("long_parenthetical")
        );
    }

    #[test]
    fn rejects_pure_header_row_not_concatenation() {
        // Exercises ordering: this would also trip the concatenation heuristic,
        // but the exact blocklist must fire first.
        assert_eq!(rejection_reason("Name"), Some("exact_blocklist"));
    }
}
