//! Extracts material-event items from 8-K filing HTML.
//!
//! Person extraction from raw item text is deliberately a no-op here: a
//! regex pass over 8-K boilerplate matches phrases like "Material Definitive"
//! and "Effective Da[te]" often enough that it did more harm than good.
//! `persons_mentioned` stays empty until the LLM fallback (`TextAnalyzer`)
//! fills it in.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{ExtractionMetadata, ExtractionMethod, ExtractionResult};

pub struct ItemDefinition {
    pub name: &'static str,
    pub signal_type: &'static str,
}

/// 8-K item number -> (name, signal_type). Unlisted items fall back to a
/// generic `"Item {n}"` / `"unknown"` pair in [`item_definition`].
pub const ITEM_DEFINITIONS: &[(&str, ItemDefinition)] = &[
    ("1.01", ItemDefinition { name: "Entry into Material Agreement", signal_type: "material_agreement" }),
    ("1.02", ItemDefinition { name: "Termination of Material Agreement", signal_type: "agreement_terminated" }),
    ("1.03", ItemDefinition { name: "Bankruptcy or Receivership", signal_type: "bankruptcy" }),
    ("2.01", ItemDefinition { name: "Completion of Acquisition or Disposition", signal_type: "acquisition_disposition" }),
    ("2.03", ItemDefinition { name: "Creation of Direct Financial Obligation", signal_type: "new_debt" }),
    ("2.04", ItemDefinition { name: "Triggering Events for Acceleration of Obligations", signal_type: "debt_acceleration" }),
    ("2.05", ItemDefinition { name: "Costs for Exit or Disposal Activities", signal_type: "restructuring" }),
    ("2.06", ItemDefinition { name: "Material Impairments", signal_type: "impairment" }),
    ("3.01", ItemDefinition { name: "Notice of Delisting", signal_type: "delisting" }),
    ("3.02", ItemDefinition { name: "Unregistered Sales of Equity Securities", signal_type: "equity_sale" }),
    ("3.03", ItemDefinition { name: "Material Modification to Rights", signal_type: "rights_modification" }),
    ("4.01", ItemDefinition { name: "Changes in Accountant", signal_type: "auditor_change" }),
    ("4.02", ItemDefinition { name: "Non-Reliance on Financial Statements", signal_type: "restatement" }),
    ("5.01", ItemDefinition { name: "Changes in Control", signal_type: "control_change" }),
    ("5.02", ItemDefinition { name: "Departure/Appointment of Officers/Directors", signal_type: "executive_change" }),
    ("5.03", ItemDefinition { name: "Amendments to Articles/Bylaws", signal_type: "governance_change" }),
    ("5.04", ItemDefinition { name: "Temporary Suspension of Trading", signal_type: "trading_suspended" }),
    ("5.05", ItemDefinition { name: "Amendment to Code of Ethics", signal_type: "ethics_change" }),
    ("5.06", ItemDefinition { name: "Change in Shell Company Status", signal_type: "shell_status_change" }),
    ("5.07", ItemDefinition { name: "Shareholder Vote Results", signal_type: "vote_results" }),
    ("5.08", ItemDefinition { name: "Shareholder Nominations", signal_type: "nominations" }),
    ("7.01", ItemDefinition { name: "Regulation FD Disclosure", signal_type: "reg_fd" }),
    ("8.01", ItemDefinition { name: "Other Events", signal_type: "other" }),
    ("9.01", ItemDefinition { name: "Financial Statements and Exhibits", signal_type: "exhibits" }),
];

/// Items whose presence is predictive of M&A activity.
pub const MA_SIGNAL_ITEMS: &[&str] = &["1.01", "2.01", "3.03", "5.01", "5.02", "5.03"];

const MAX_ITEM_TEXT_LEN: usize = 5000;

pub fn item_definition(item_number: &str) -> (String, &'static str) {
    match ITEM_DEFINITIONS.iter().find(|(n, _)| *n == item_number) {
        Some((_, def)) => (def.name.to_string(), def.signal_type),
        None => (format!("Item {item_number}"), "unknown"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedEvent {
    pub item_number: String,
    pub item_name: String,
    pub signal_type: String,
    pub raw_text: String,
    pub persons_mentioned: Vec<String>,
    pub is_ma_signal: bool,
}

static STYLE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#\d+;").unwrap());
static NAMED_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)&[a-z]+;").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ITEM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Item\s*(\d+\.\d+)[.\s]*([^\n<]{0,100})").unwrap());

fn clean_html(html: &str) -> String {
    let text = STYLE_TAG.replace_all(html, "");
    let text = SCRIPT_TAG.replace_all(&text, "");
    let text = ANY_TAG.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    let text = NUMERIC_ENTITY.replace_all(&text, " ");
    let text = NAMED_ENTITY.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Normalizes a raw item match (e.g. `"1.1"`) to zero-padded `X.XX` form.
fn normalize_item_number(raw: &str) -> String {
    match raw.split_once('.') {
        Some((whole, frac)) => format!("{whole}.{frac:0>2}"),
        None => raw.to_string(),
    }
}

fn find_items(text: &str) -> Vec<(String, usize)> {
    let mut items = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for cap in ITEM_PATTERN.captures_iter(text) {
        let raw = &cap[1];
        let item_number = normalize_item_number(raw);
        if seen.insert(item_number.clone()) {
            let m = cap.get(0).unwrap();
            items.push((item_number, m.start()));
        }
    }
    items
}

/// Parses 8-K filing HTML into a list of per-item events. Unlike most
/// extractors in this module, a filing with no recognizable items is not a
/// warning-worthy failure on its own — most 8-Ks have at least one item, so
/// the caller (`ExtractionResult::warnings`) surfaces the empty case.
pub struct EventParser;

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_8k(&self, html_content: &str) -> ExtractionResult<ExtractedEvent> {
        let text = clean_html(html_content);
        let found = find_items(&text);

        let mut result = ExtractionResult::empty(ExtractionMethod::RuleBased);
        result.metadata.confidence = 1.0;

        if found.is_empty() {
            result.warnings.push("no Item numbers found in filing".to_string());
            return result;
        }

        for (idx, (item_number, start)) in found.iter().enumerate() {
            let end = found
                .get(idx + 1)
                .map(|(_, p)| *p)
                .unwrap_or(text.len());
            let capped_end = end.min(start + MAX_ITEM_TEXT_LEN).min(text.len());
            let item_text = text[*start..capped_end].trim().to_string();
            let (item_name, signal_type) = item_definition(item_number);
            let is_ma_signal = MA_SIGNAL_ITEMS.contains(&item_number.as_str());

            result.records.push(ExtractedEvent {
                item_number: item_number.clone(),
                item_name,
                signal_type: signal_type.to_string(),
                raw_text: item_text,
                persons_mentioned: Vec::new(),
                is_ma_signal,
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_single_digit_decimal() {
        assert_eq!(normalize_item_number("1.1"), "1.01");
        assert_eq!(normalize_item_number("5.02"), "5.02");
    }

    #[test]
    fn extracts_multiple_items_and_flags_ma_signal() {
        let html = "<html><body>Item 1.01 Entry into a Material Definitive Agreement. \
                     The Company entered into an agreement on March 1, 2026. \
                     Item 9.01 Financial Statements and Exhibits. None.</body></html>";
        let parser = EventParser::new();
        let result = parser.parse_8k(html);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].item_number, "1.01");
        assert!(result.records[0].is_ma_signal);
        assert!(!result.records[1].is_ma_signal);
        assert!(result.records[0].persons_mentioned.is_empty());
    }

    #[test]
    fn dedups_repeated_item_mentions_keeping_first() {
        let html = "Item 5.02 Departure. See Item 5.02 above for details. Item 9.01 Exhibits.";
        let parser = EventParser::new();
        let result = parser.parse_8k(html);
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn no_items_found_is_a_warning_not_empty_silently() {
        let parser = EventParser::new();
        let result = parser.parse_8k("<html><body>Nothing relevant here.</body></html>");
        assert!(result.records.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn unknown_item_number_falls_back_to_generic_definition() {
        let (name, signal) = item_definition("6.01");
        assert_eq!(name, "Item 6.01");
        assert_eq!(signal, "unknown");
    }
}
