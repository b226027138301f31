//! Extracts beneficial ownership tables from DEF 14A, SC 13D, and SC 13G
//! filing HTML.
//!
//! Unlike [`super::officer`], there's no sibling-walking narrative fallback
//! here: beneficial ownership almost always lives in a table, so the LLM path
//! only kicks in when no table in the filing scores as an ownership table at
//! all.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use super::{ExtractionMetadata, ExtractionMethod, ExtractionResult, TextAnalyzer, parse_number, parse_percentage, truncate_snippet};
use crate::error::PipelineError;
use crate::review_queue::{ExtractionType, NewReviewItem, ReviewQueue};

const RULE_BASED_CONFIDENCE: f64 = 0.95;
const MAX_SNIPPET_LENGTH: usize = 300;

static OWNERSHIP_TABLE_HEADERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(beneficial\s*own|shares\s*(of\s*common\s*stock)?\s*beneficially\s*owned|security\s*ownership|principal\s*(stock)?holders|percent\s*(of\s*)?(class|outstanding))",
    )
    .unwrap()
});
static NAME_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(name|beneficial\s*owner|holder|stockholder|shareholder)").unwrap());
static SHARES_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(shares|number\s*of\s*shares|amount|shares\s*owned)").unwrap());
static PERCENT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(percent|%|percentage)").unwrap());
static NUMERIC_ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d()]+[a-z]?\.?$").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[(\[]\d+[)\]]").unwrap());
static ASTERISK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").unwrap());

const SKIP_NAME_PATTERNS: &[&str] = &[
    "name", "beneficial owner", "total", "shares", "percent", "class", "amount",
    "nature", "sole", "shared", "voting", "see footnote", "see note", "n/a", "none", "—", "–",
];

const COMPANY_INDICATORS: &[&str] = &["inc", "corp", "llc", "llp", "ltd", "lp", "co.", "group", "fund", "trust"];

const KNOWN_INSTITUTIONS: &[&str] = &[
    "vanguard", "blackrock", "state street", "fidelity", "berkshire", "jpmorgan",
    "morgan stanley", "goldman sachs", "bank of america", "wells fargo", "citadel",
    "bridgewater", "capital group", "t. rowe price", "invesco", "schwab",
    "northern trust", "geode capital", "norges bank", "calpers", "tiaa",
];

const COMPANY_KEYWORDS: &[&str] = &[
    "inc", "inc.", "corp", "corp.", "llc", "llp", "ltd", "ltd.", "l.p.", "lp", "company", "co.",
    "n.a.", "n.v.", "s.a.", "fund", "funds", "partners", "partnership", "holdings", "trust",
    "investment", "investments", "investors", "capital", "management", "asset", "assets",
    "group", "advisors", "advisers", "associates", "association", "bank", "financial",
    "securities", "services", "international", "global", "worldwide", "pension", "retirement",
    "endowment",
];

const PERSON_TITLES: &[&str] = &["mr.", "mrs.", "ms.", "dr.", "jr.", "sr.", "iii", "ii", "iv"];

fn clean_text(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text, " ");
    let text = FOOTNOTE_RE.replace_all(&text, "");
    let text = ASTERISK_RE.replace_all(&text, "");
    text.trim().to_string()
}

fn is_valid_owner_name(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    if SKIP_NAME_PATTERNS.iter().any(|p| name_lower.contains(p)) {
        return false;
    }
    if NUMERIC_ROW_RE.is_match(name_lower.trim()) {
        return false;
    }
    if name.chars().count() < 3 {
        return false;
    }
    let alpha_count = name.chars().filter(|c| c.is_alphabetic()).count();
    if alpha_count < 3 {
        return false;
    }
    if name.chars().count() > 200 {
        return false;
    }
    let has_company_indicator = COMPANY_INDICATORS.iter().any(|ind| name_lower.contains(ind));
    if !has_company_indicator
        && ["a change", "the ", "all ", "each ", "any "]
            .iter()
            .any(|p| name_lower.starts_with(p))
    {
        return false;
    }
    true
}

fn guess_owner_type(name: &str) -> &'static str {
    let name_lower = name.to_lowercase();
    if KNOWN_INSTITUTIONS.iter().any(|i| name_lower.contains(i)) {
        return "company";
    }
    if COMPANY_KEYWORDS.iter().any(|k| name_lower.contains(k)) {
        return "company";
    }
    if PERSON_TITLES.iter().any(|t| name_lower.contains(t)) {
        return "person";
    }
    let word_count = name.split_whitespace().count();
    if (2..=4).contains(&word_count) {
        "person"
    } else {
        "company"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnershipRecord {
    pub owner_name: String,
    pub owner_type: String,
    pub shares_owned: Option<f64>,
    pub percentage: Option<f64>,
    pub is_beneficial: bool,
    pub is_direct: bool,
    pub raw_text: Option<String>,
    pub source_section: Option<String>,
    pub source_table: Option<String>,
}

struct CandidateTable<'a> {
    table: ElementRef<'a>,
    section_name: Option<String>,
}

pub struct OwnershipParser;

impl Default for OwnershipParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnershipParser {
    pub fn new() -> Self {
        Self
    }

    /// Walks `p,div,h1-h4,span,table` in document order (the order `Select`
    /// yields matches in), remembering the last non-table element seen as the
    /// "preceding text" for whichever table comes next — this stands in for
    /// `find_previous()` without relying on any tree-navigation API.
    fn find_ownership_tables<'a>(&self, html: &'a Html) -> Vec<CandidateTable<'a>> {
        let sel = Selector::parse("p,div,h1,h2,h3,h4,span,table").unwrap();
        let mut preceding_text = String::new();
        let mut section_name: Option<String> = None;
        let mut candidates = Vec::new();

        for el in html.select(&sel) {
            if el.value().name() == "table" {
                let table_text = el.text().collect::<String>().to_lowercase();
                let combined = format!(
                    "{} {}",
                    preceding_text,
                    table_text.chars().take(500).collect::<String>()
                );
                if OWNERSHIP_TABLE_HEADERS.is_match(&combined) {
                    candidates.push(CandidateTable { table: el, section_name: section_name.clone() });
                }
            } else {
                let text = el.text().collect::<String>();
                if !text.trim().is_empty() {
                    preceding_text = text.to_lowercase();
                    section_name = Some(text.trim().chars().take(100).collect());
                }
            }
        }

        candidates
    }

    fn parse_single_table(&self, table: ElementRef, section_name: Option<String>) -> Vec<OwnershipRecord> {
        let mut records = Vec::new();
        let row_sel = Selector::parse("tr").unwrap();
        let cell_sel = Selector::parse("th,td").unwrap();
        let caption_sel = Selector::parse("caption").unwrap();

        let table_name = table
            .select(&caption_sel)
            .next()
            .map(|c| c.text().collect::<String>().trim().chars().take(100).collect());

        let rows: Vec<ElementRef> = table.select(&row_sel).collect();
        if rows.len() < 2 {
            return records;
        }

        let mut name_col = None;
        let mut shares_col = None;
        let mut percent_col = None;
        let mut header_row_idx = 0;

        for (i, row) in rows.iter().take(5).enumerate() {
            let cell_texts: Vec<String> = row
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_lowercase())
                .collect();
            for (j, text) in cell_texts.iter().enumerate() {
                if NAME_HEADER_RE.is_match(text) {
                    name_col = Some(j);
                    header_row_idx = i;
                }
                if SHARES_HEADER_RE.is_match(text) {
                    shares_col = Some(j);
                }
                if PERCENT_HEADER_RE.is_match(text) {
                    percent_col = Some(j);
                }
            }
            if name_col.is_some() {
                break;
            }
        }

        let Some(name_col) = name_col else { return records };

        for row in rows.iter().skip(header_row_idx + 1) {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() <= name_col {
                continue;
            }

            let owner_name = clean_text(&cells[name_col].text().collect::<String>());
            if owner_name.chars().count() < 2 || !is_valid_owner_name(&owner_name) {
                continue;
            }

            let row_text = row.text().collect::<String>().trim().to_string();
            let raw_text = if row_text.is_empty() {
                None
            } else {
                Some(truncate_snippet(&row_text, MAX_SNIPPET_LENGTH))
            };

            let shares = shares_col
                .and_then(|c| cells.get(c))
                .and_then(|c| parse_number(&c.text().collect::<String>()));
            let percentage = percent_col
                .and_then(|c| cells.get(c))
                .and_then(|c| parse_percentage(&c.text().collect::<String>()));

            if shares.is_none() && percentage.is_none() {
                continue;
            }

            records.push(OwnershipRecord {
                owner_type: guess_owner_type(&owner_name).to_string(),
                owner_name,
                shares_owned: shares,
                percentage,
                is_beneficial: true,
                is_direct: true,
                raw_text,
                source_section: section_name.clone(),
                source_table: table_name.clone(),
            });
        }

        records
    }

    fn parse_rule_based(&self, html: &Html) -> Vec<OwnershipRecord> {
        let mut records = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for candidate in self.find_ownership_tables(html) {
            for record in self.parse_single_table(candidate.table, candidate.section_name) {
                if seen.insert(record.owner_name.to_lowercase()) {
                    records.push(record);
                }
            }
        }

        records
    }

    pub async fn extract_ownership(
        &self,
        filing_html: &str,
        filing_accession: &str,
        filing_type: &str,
        company_cik: &str,
        company_name: &str,
        analyzer: Option<&dyn TextAnalyzer>,
        review_queue: &ReviewQueue,
    ) -> Result<ExtractionResult<OwnershipRecord>, PipelineError> {
        let doc = Html::parse_document(filing_html);
        let mut warnings = Vec::new();

        let rule_based = self.parse_rule_based(&doc);

        let (records, method, confidence) = if !rule_based.is_empty() {
            (rule_based, ExtractionMethod::RuleBased, RULE_BASED_CONFIDENCE)
        } else if let Some(analyzer) = analyzer {
            let prompt = format!(
                "Extract beneficial ownership records (owner_name, owner_type, shares_owned, percentage) as JSON from this filing excerpt:\n\n{}",
                truncate_snippet(filing_html, 30_000)
            );
            match analyzer.analyze(&prompt).await {
                Ok(value) => {
                    let llm_records = parse_llm_ownership(&value);
                    if llm_records.is_empty() {
                        enqueue_failure(review_queue, filing_accession, filing_type, company_cik, company_name, filing_html)?;
                        warnings.push("Extraction failed - added to review queue".to_string());
                        (Vec::new(), ExtractionMethod::RuleBased, 0.0)
                    } else {
                        warnings.push("Used LLM extraction (rule-based failed)".to_string());
                        (llm_records, ExtractionMethod::Llm, 0.85)
                    }
                }
                Err(_) => {
                    enqueue_failure(review_queue, filing_accession, filing_type, company_cik, company_name, filing_html)?;
                    warnings.push("Extraction failed - added to review queue".to_string());
                    (Vec::new(), ExtractionMethod::RuleBased, 0.0)
                }
            }
        } else {
            enqueue_failure(review_queue, filing_accession, filing_type, company_cik, company_name, filing_html)?;
            warnings.push("Extraction failed - added to review queue".to_string());
            (Vec::new(), ExtractionMethod::RuleBased, 0.0)
        };

        if !records.is_empty() && confidence < super::LLM_CONFIDENCE_THRESHOLD {
            let attempted = serde_json::to_string(&records).unwrap_or_default();
            review_queue.add_low_confidence(
                NewReviewItem {
                    filing_accession: filing_accession.to_string(),
                    filing_type: filing_type.to_string(),
                    company_cik: company_cik.to_string(),
                    company_name: company_name.to_string(),
                    extraction_type: ExtractionType::Ownership,
                    raw_text: truncate_snippet(filing_html, 50_000),
                    attempted_extraction: attempted,
                    failure_reason: None,
                    confidence: None,
                },
                confidence,
            )?;
            warnings.push(format!("Low confidence ({confidence:.2}) - added to review queue"));
        }

        let clean_accession = filing_accession.replace('-', "");
        let source_url = format!(
            "https://www.sec.gov/Archives/edgar/data/{}/{}/",
            company_cik.trim_start_matches('0'),
            clean_accession
        );

        Ok(ExtractionResult {
            records,
            metadata: ExtractionMetadata {
                method,
                confidence,
                source_filing_id: Some(filing_accession.to_string()),
                source_url: Some(source_url),
                section_name: None,
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
    filing_type: &str,
    company_cik: &str,
    company_name: &str,
    html: &str,
) -> Result<(), PipelineError> {
    review_queue.add_failed_extraction(
        NewReviewItem {
            filing_accession: filing_accession.to_string(),
            filing_type: filing_type.to_string(),
            company_cik: company_cik.to_string(),
            company_name: company_name.to_string(),
            extraction_type: ExtractionType::Ownership,
            raw_text: truncate_snippet(html, 50_000),
            attempted_extraction: "[]".to_string(),
            failure_reason: None,
            confidence: None,
        },
        "Both rule-based and LLM extraction failed",
    )?;
    Ok(())
}

fn parse_llm_ownership(value: &serde_json::Value) -> Vec<OwnershipRecord> {
    let Some(arr) = value.as_array().or_else(|| value.get("records").and_then(|v| v.as_array()))
    else {
        return Vec::new();
    };

    arr.iter()
        .filter_map(|item| {
            let owner_name = item.get("owner_name")?.as_str()?.to_string();
            if owner_name.is_empty() {
                return None;
            }
            let owner_type = item
                .get("owner_type")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| guess_owner_type(&owner_name))
                .to_string();
            Some(OwnershipRecord {
                owner_name,
                owner_type,
                shares_owned: item.get("shares_owned").and_then(|v| v.as_f64()),
                percentage: item.get("percentage").and_then(|v| v.as_f64()),
                is_beneficial: item.get("is_beneficial").and_then(|v| v.as_bool()).unwrap_or(true),
                is_direct: item.get("is_direct").and_then(|v| v.as_bool()).unwrap_or(true),
                raw_text: item
                    .get("source_text")
                    .or_else(|| item.get("raw_text"))
                    .and_then(|v| v.as_str())
                    .map(|t| truncate_snippet(t, MAX_SNIPPET_LENGTH)),
                source_section: None,
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
    fn guesses_known_institution_as_company() {
        assert_eq!(guess_owner_type("The Vanguard Group, Inc."), "company");
    }

    #[test]
    fn guesses_short_name_as_person() {
        assert_eq!(guess_owner_type("Jane A. Doe"), "person");
    }

    #[test]
    fn rejects_header_like_rows() {
        assert!(!is_valid_owner_name("Name"));
        assert!(!is_valid_owner_name("Total"));
        assert!(!is_valid_owner_name("1a."));
    }

    #[tokio::test]
    async fn parses_beneficial_ownership_table() {
        let html = r#"
            <html><body>
            <h2>Security Ownership of Certain Beneficial Owners</h2>
            <table>
                <tr><th>Name</th><th>Shares</th><th>Percent</th></tr>
                <tr><td>The Vanguard Group, Inc.</td><td>1,234,567</td><td>8.2%</td></tr>
                <tr><td>Jane A. Doe</td><td>50,000</td><td>0.4%</td></tr>
            </table>
            </body></html>
        "#;
        let parser = OwnershipParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract_ownership(html, "0001234567-26-000003", "DEF 14A", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].owner_type, "company");
        assert_eq!(result.records[1].owner_type, "person");
        assert_eq!(result.records[0].shares_owned, Some(1_234_567.0));
    }

    #[tokio::test]
    async fn no_ownership_table_enqueues_failure() {
        let html = "<html><body><p>No ownership table here.</p></body></html>";
        let parser = OwnershipParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract_ownership(html, "0001234567-26-000004", "DEF 14A", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert!(result.records.is_empty());
        assert_eq!(queue.stats().unwrap().pending, 1);
    }
}
