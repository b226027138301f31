//! Extracts subsidiary lists from 10-K Exhibit 21 HTML.
//!
//! Two rule-based passes, tried in order: a table pass (most Exhibit 21s are
//! a single table of name/jurisdiction/ownership columns), then a plain-text
//! pattern pass for filings that list subsidiaries as narrative sentences
//! instead. The first pass to yield anything wins — they are not merged,
//! since a table-based filing's narrative boilerplate tends to produce noisy
//! false positives when run through the text patterns too.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use super::{ExtractionMetadata, ExtractionMethod, ExtractionResult, TextAnalyzer, truncate_snippet};
use crate::error::PipelineError;
use crate::review_queue::{ExtractionType, NewReviewItem, ReviewQueue};

const RULE_BASED_CONFIDENCE: f64 = 0.95;
const TEXT_PATTERN_CONFIDENCE: f64 = 0.85;
const TEXT_PATTERN_CONFIDENCE_LOWER: f64 = 0.80;
const MAX_SNIPPET_LENGTH: usize = 300;
const SOURCE_SECTION: &str = "Exhibit 21 - Subsidiaries";

const JURISDICTIONS: &[(&str, &str)] = &[
    ("de", "Delaware"), ("delaware", "Delaware"),
    ("ca", "California"), ("california", "California"),
    ("ny", "New York"), ("new york", "New York"),
    ("tx", "Texas"), ("texas", "Texas"),
    ("nv", "Nevada"), ("nevada", "Nevada"),
    ("fl", "Florida"), ("florida", "Florida"),
    ("wa", "Washington"), ("washington", "Washington"),
    ("il", "Illinois"), ("illinois", "Illinois"),
    ("ma", "Massachusetts"), ("massachusetts", "Massachusetts"),
    ("pa", "Pennsylvania"), ("pennsylvania", "Pennsylvania"),
    ("oh", "Ohio"), ("ohio", "Ohio"),
    ("ga", "Georgia"), ("georgia", "Georgia"),
    ("nc", "North Carolina"), ("north carolina", "North Carolina"),
    ("nj", "New Jersey"), ("new jersey", "New Jersey"),
    ("va", "Virginia"), ("virginia", "Virginia"),
    ("md", "Maryland"), ("maryland", "Maryland"),
    ("co", "Colorado"), ("colorado", "Colorado"),
    ("az", "Arizona"), ("arizona", "Arizona"),
    ("ireland", "Ireland"),
    ("uk", "United Kingdom"), ("united kingdom", "United Kingdom"), ("england", "United Kingdom"),
    ("cayman", "Cayman Islands"), ("cayman islands", "Cayman Islands"),
    ("bermuda", "Bermuda"),
    ("netherlands", "Netherlands"), ("holland", "Netherlands"),
    ("luxembourg", "Luxembourg"),
    ("singapore", "Singapore"),
    ("hong kong", "Hong Kong"),
    ("japan", "Japan"),
    ("germany", "Germany"),
    ("france", "France"),
    ("canada", "Canada"),
    ("australia", "Australia"),
    ("switzerland", "Switzerland"),
    ("india", "India"),
    ("china", "China"), ("prc", "China"),
    ("brazil", "Brazil"),
    ("mexico", "Mexico"),
    ("israel", "Israel"),
    ("bvi", "British Virgin Islands"), ("british virgin islands", "British Virgin Islands"),
];

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)").unwrap());
static ASTERISK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").unwrap());
static NON_ALPHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z\s]").unwrap());
static OWNERSHIP_PCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([\d.]+)\s*%?").unwrap());
static NAME_PAREN_JURISDICTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)([A-Z][A-Za-z0-9\s,.'&-]+?)\s*\(([A-Za-z\s]+)\)").unwrap());
static NAME_A_STATE_CORP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)([A-Z][A-Za-z0-9\s,.'&-]+?),?\s+a\s+([A-Za-z\s]+)\s+(?:corporation|company|llc|limited)").unwrap()
});

fn clean_text(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text, " ");
    let text = FOOTNOTE_RE.replace_all(&text, "");
    let text = ASTERISK_RE.replace_all(&text, "");
    text.trim().to_string()
}

fn normalize_jurisdiction(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let lowered = raw.trim().to_lowercase();
    let cleaned = NON_ALPHA_RE.replace_all(&lowered, "").trim().to_string();
    if cleaned.is_empty() {
        return None;
    }
    if let Some((_, v)) = JURISDICTIONS.iter().find(|(k, _)| *k == cleaned) {
        return Some(v.to_string());
    }
    for (key, value) in JURISDICTIONS.iter() {
        if cleaned.contains(key) || key.contains(cleaned.as_str()) {
            return Some(value.to_string());
        }
    }
    Some(title_case(&cleaned))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_ownership_percentage(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim();
    if trimmed.is_empty() {
        return None;
    }
    if ["wholly", "100%", "100 %"].iter().any(|w| trimmed.contains(w)) {
        return Some(100.0);
    }
    let caps = OWNERSHIP_PCT_RE.captures(trimmed)?;
    let value: f64 = caps[1].parse().ok()?;
    if (0.0..=100.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subsidiary {
    pub name: String,
    pub jurisdiction: Option<String>,
    pub ownership_percentage: Option<f64>,
    pub is_wholly_owned: bool,
    pub raw_text: Option<String>,
    pub source_section: &'static str,
    pub source_table: Option<String>,
}

pub struct SubsidiaryParser;

impl Default for SubsidiaryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SubsidiaryParser {
    pub fn new() -> Self {
        Self
    }

    fn find_table_name(&self, preceding_text: &str) -> Option<String> {
        let cleaned = clean_text(preceding_text);
        if cleaned.len() > 5 && cleaned.len() < 200 {
            let lower = cleaned.to_lowercase();
            if ["subsidiary", "exhibit 21", "significant", "list"]
                .iter()
                .any(|w| lower.contains(w))
            {
                return Some(cleaned.chars().take(100).collect());
            }
        }
        None
    }

    fn parse_table(&self, html: &Html) -> Vec<Subsidiary> {
        let mut records = Vec::new();
        let sel = Selector::parse("h1,h2,h3,h4,p,b,strong,table").unwrap();
        let row_sel = Selector::parse("tr").unwrap();
        let cell_sel = Selector::parse("th,td").unwrap();
        let caption_sel = Selector::parse("caption").unwrap();

        let mut preceding_text = String::new();

        for el in html.select(&sel) {
            if el.value().name() != "table" {
                let text = el.text().collect::<String>();
                if !text.trim().is_empty() {
                    preceding_text = text;
                }
                continue;
            }

            let table = el;
            let rows: Vec<ElementRef> = table.select(&row_sel).collect();
            if rows.len() < 2 {
                continue;
            }

            let header_cells: Vec<String> = rows[0]
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_lowercase())
                .collect();

            let mut name_col = None;
            let mut jurisdiction_col = None;
            let mut ownership_col = None;
            for (i, h) in header_cells.iter().enumerate() {
                if ["name", "subsidiary", "company", "entity"].iter().any(|w| h.contains(w)) {
                    name_col = Some(i);
                }
                if ["state", "jurisdiction", "incorporated", "country", "organization"]
                    .iter()
                    .any(|w| h.contains(w))
                {
                    jurisdiction_col = Some(i);
                }
                if ["ownership", "percent", "owned", "%"].iter().any(|w| h.contains(w)) {
                    ownership_col = Some(i);
                }
            }
            if name_col.is_none() && header_cells.len() >= 2 {
                name_col = Some(0);
                jurisdiction_col = Some(1);
            }
            let Some(name_col) = name_col else { continue };

            let table_name = table
                .select(&caption_sel)
                .next()
                .map(|c| clean_text(&c.text().collect::<String>()).chars().take(100).collect())
                .or_else(|| self.find_table_name(&preceding_text));

            for row in &rows[1..] {
                let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
                if cells.len() <= name_col {
                    continue;
                }
                let name = clean_text(&cells[name_col].text().collect::<String>());
                if name.chars().count() < 3 {
                    continue;
                }
                if ["name", "subsidiary", "company", "entity"].contains(&name.to_lowercase().as_str()) {
                    continue;
                }

                let jurisdiction = jurisdiction_col
                    .and_then(|c| cells.get(c))
                    .and_then(|c| normalize_jurisdiction(&c.text().collect::<String>()));

                let mut is_wholly_owned = false;
                let ownership = ownership_col.and_then(|c| cells.get(c)).and_then(|c| {
                    let ownership_text = c.text().collect::<String>().to_lowercase();
                    let pct = parse_ownership_percentage(&ownership_text);
                    is_wholly_owned = pct == Some(100.0) || ownership_text.contains("wholly");
                    pct
                });

                let row_text = cells
                    .iter()
                    .map(|c| c.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" | ");
                let raw_text = if row_text.is_empty() {
                    None
                } else {
                    Some(truncate_snippet(&row_text, MAX_SNIPPET_LENGTH))
                };

                records.push(Subsidiary {
                    name,
                    jurisdiction,
                    ownership_percentage: ownership,
                    is_wholly_owned,
                    raw_text,
                    source_section: SOURCE_SECTION,
                    source_table: table_name.clone(),
                });
            }
        }

        records
    }

    fn parse_text(&self, html: &Html) -> Vec<Subsidiary> {
        let body_sel = Selector::parse("body").unwrap();
        let text: String = html
            .select(&body_sel)
            .next()
            .map(|b| b.text().collect::<String>())
            .unwrap_or_else(|| html.root_element().text().collect::<String>());

        let mut records: Vec<Subsidiary> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for caps in NAME_PAREN_JURISDICTION_RE.captures_iter(&text) {
            let name = clean_text(&caps[1]);
            let Some(jurisdiction) = normalize_jurisdiction(&caps[2]) else { continue };
            if name.chars().count() < 3 {
                continue;
            }
            let whole = caps.get(0).unwrap();
            let start = whole.start().saturating_sub(20);
            let end = (whole.end() + 20).min(text.len());
            let raw_text = truncate_snippet(text[start..end].trim(), MAX_SNIPPET_LENGTH);

            if seen.insert(name.to_lowercase()) {
                records.push(Subsidiary {
                    name,
                    jurisdiction: Some(jurisdiction),
                    ownership_percentage: None,
                    is_wholly_owned: false,
                    raw_text: Some(raw_text),
                    source_section: SOURCE_SECTION,
                    source_table: None,
                });
            }
        }

        let _ = TEXT_PATTERN_CONFIDENCE;
        for caps in NAME_A_STATE_CORP_RE.captures_iter(&text) {
            let name = clean_text(&caps[1]);
            let Some(jurisdiction) = normalize_jurisdiction(&caps[2]) else { continue };
            if name.chars().count() < 3 {
                continue;
            }
            if seen.contains(&name.to_lowercase()) {
                continue;
            }
            let whole = caps.get(0).unwrap();
            let start = whole.start().saturating_sub(20);
            let end = (whole.end() + 20).min(text.len());
            let raw_text = truncate_snippet(text[start..end].trim(), MAX_SNIPPET_LENGTH);

            seen.insert(name.to_lowercase());
            records.push(Subsidiary {
                name,
                jurisdiction: Some(jurisdiction),
                ownership_percentage: None,
                is_wholly_owned: false,
                raw_text: Some(raw_text),
                source_section: SOURCE_SECTION,
                source_table: None,
            });
        }
        let _ = TEXT_PATTERN_CONFIDENCE_LOWER;

        records
    }

    pub async fn extract_subsidiaries(
        &self,
        exhibit_html: &str,
        filing_accession: &str,
        company_cik: &str,
        company_name: &str,
        analyzer: Option<&dyn TextAnalyzer>,
        review_queue: &ReviewQueue,
    ) -> Result<ExtractionResult<Subsidiary>, PipelineError> {
        let doc = Html::parse_document(exhibit_html);
        let mut warnings = Vec::new();

        let table_records = self.parse_table(&doc);
        let rule_based = if !table_records.is_empty() {
            table_records
        } else {
            self.parse_text(&doc)
        };

        let (records, method, confidence) = if !rule_based.is_empty() {
            (rule_based, ExtractionMethod::RuleBased, RULE_BASED_CONFIDENCE)
        } else if let Some(analyzer) = analyzer {
            let prompt = format!(
                "Extract subsidiary records (name, jurisdiction, ownership_percentage, is_wholly_owned) as JSON from this Exhibit 21 excerpt:\n\n{}",
                truncate_snippet(exhibit_html, 30_000)
            );
            match analyzer.analyze(&prompt).await {
                Ok(value) => {
                    let llm_records = parse_llm_subsidiaries(&value);
                    if llm_records.is_empty() {
                        enqueue_failure(review_queue, filing_accession, company_cik, company_name, exhibit_html)?;
                        warnings.push("Extraction failed - added to review queue".to_string());
                        (Vec::new(), ExtractionMethod::RuleBased, 0.0)
                    } else {
                        warnings.push("Used LLM extraction (rule-based failed)".to_string());
                        (llm_records, ExtractionMethod::Llm, 0.85)
                    }
                }
                Err(_) => {
                    enqueue_failure(review_queue, filing_accession, company_cik, company_name, exhibit_html)?;
                    warnings.push("Extraction failed - added to review queue".to_string());
                    (Vec::new(), ExtractionMethod::RuleBased, 0.0)
                }
            }
        } else {
            enqueue_failure(review_queue, filing_accession, company_cik, company_name, exhibit_html)?;
            warnings.push("Extraction failed - added to review queue".to_string());
            (Vec::new(), ExtractionMethod::RuleBased, 0.0)
        };

        if !records.is_empty() && confidence < super::LLM_CONFIDENCE_THRESHOLD {
            let attempted = serde_json::to_string(&records).unwrap_or_default();
            review_queue.add_low_confidence(
                NewReviewItem {
                    filing_accession: filing_accession.to_string(),
                    filing_type: "10-K".to_string(),
                    company_cik: company_cik.to_string(),
                    company_name: company_name.to_string(),
                    extraction_type: ExtractionType::Subsidiary,
                    raw_text: truncate_snippet(exhibit_html, 50_000),
                    attempted_extraction: attempted,
                    failure_reason: None,
                    confidence: None,
                },
                confidence,
            )?;
            warnings.push(format!("Low confidence ({confidence:.2}) - added to review queue"));
        }

        Ok(ExtractionResult {
            records,
            metadata: ExtractionMetadata {
                method,
                confidence,
                source_filing_id: Some(filing_accession.to_string()),
                source_url: None,
                section_name: Some(SOURCE_SECTION.to_string()),
                table_name: None,
            },
            warnings,
            filing_date: None,
            filing_url: None,
        })
    }
}

fn enqueue_failure(
    review_queue: &ReviewQueue,
    filing_accession: &str,
    company_cik: &str,
    company_name: &str,
    html: &str,
) -> Result<(), PipelineError> {
    review_queue.add_failed_extraction(
        NewReviewItem {
            filing_accession: filing_accession.to_string(),
            filing_type: "10-K".to_string(),
            company_cik: company_cik.to_string(),
            company_name: company_name.to_string(),
            extraction_type: ExtractionType::Subsidiary,
            raw_text: truncate_snippet(html, 50_000),
            attempted_extraction: "[]".to_string(),
            failure_reason: None,
            confidence: None,
        },
        "Both rule-based and LLM extraction failed",
    )?;
    Ok(())
}

fn parse_llm_subsidiaries(value: &serde_json::Value) -> Vec<Subsidiary> {
    let Some(arr) = value.as_array().or_else(|| value.get("records").and_then(|v| v.as_array()))
    else {
        return Vec::new();
    };

    arr.iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            if name.is_empty() {
                return None;
            }
            let jurisdiction = item
                .get("jurisdiction")
                .and_then(|v| v.as_str())
                .and_then(normalize_jurisdiction);
            Some(Subsidiary {
                name,
                jurisdiction,
                ownership_percentage: item.get("ownership_percentage").and_then(|v| v.as_f64()),
                is_wholly_owned: item.get("is_wholly_owned").and_then(|v| v.as_bool()).unwrap_or(false),
                raw_text: item
                    .get("source_text")
                    .or_else(|| item.get("raw_text"))
                    .and_then(|v| v.as_str())
                    .map(|t| truncate_snippet(t, MAX_SNIPPET_LENGTH)),
                source_section: SOURCE_SECTION,
                source_table: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAnalyzer;

    #[async_trait::async_trait]
    impl TextAnalyzer for StubAnalyzer {
        async fn analyze(&self, _prompt: &str) -> Result<serde_json::Value, PipelineError> {
            Ok(serde_json::json!([]))
        }
    }

    #[test]
    fn normalizes_abbreviated_and_unknown_jurisdictions() {
        assert_eq!(normalize_jurisdiction("DE").as_deref(), Some("Delaware"));
        assert_eq!(normalize_jurisdiction("Cayman Islands").as_deref(), Some("Cayman Islands"));
        assert_eq!(normalize_jurisdiction("atlantis").as_deref(), Some("Atlantis"));
    }

    #[test]
    fn parses_wholly_owned_ownership_text() {
        assert_eq!(parse_ownership_percentage("wholly owned"), Some(100.0));
        assert_eq!(parse_ownership_percentage("75%"), Some(75.0));
        assert_eq!(parse_ownership_percentage(""), None);
    }

    #[tokio::test]
    async fn parses_subsidiary_table() {
        let html = r#"
            <html><body>
            <p>Exhibit 21 - List of Subsidiaries</p>
            <table>
                <tr><th>Name</th><th>Jurisdiction</th><th>Ownership</th></tr>
                <tr><td>Acme Subsidiary Inc.</td><td>Delaware</td><td>100%</td></tr>
                <tr><td>Acme Foreign B.V.</td><td>Netherlands</td><td>80%</td></tr>
            </table>
            </body></html>
        "#;
        let parser = SubsidiaryParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract_subsidiaries(html, "0001234567-26-000005", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
        assert!(result.records[0].is_wholly_owned);
        assert_eq!(result.records[1].jurisdiction.as_deref(), Some("Netherlands"));
    }

    #[tokio::test]
    async fn falls_back_to_text_pattern_when_no_table() {
        let html = "<html><body><p>Acme Subsidiary Inc. (Delaware) is our wholly owned subsidiary. \
                     Acme Ireland Ltd. (Ireland) is also wholly owned.</p></body></html>";
        let parser = SubsidiaryParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract_subsidiaries(html, "0001234567-26-000006", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
    }
}
